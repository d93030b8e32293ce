#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedSender};
use serde_json::json;

use labmatch_common::application::{Application, ApplicationDraft, ApplicationId, ApplicationStatus};
use labmatch_common::backend::{BackendError, ProjectBackend};
use labmatch_common::chat::Attachment;
use labmatch_common::identity::{Profile, UserId};
use labmatch_common::message::Message;
use labmatch_common::milestone::{Milestone, MilestoneId, MilestoneStatus};
use labmatch_common::notice::{Notice, Notifier, Severity};
use labmatch_common::project::{Project, ProjectId};
use labmatch_common::realtime::{InsertEvent, InsertFilter, RealtimeFeed, Subscription};

pub const OWNER: &str = "owner-1";

/// Project `p1` owned by [`OWNER`] with one pending milestone and the given
/// applications as `(id, contributor, status)`.
pub fn project(applications: &[(&str, &str, &str)]) -> Project {
    let applications: Vec<_> = applications
        .iter()
        .map(|(id, contributor, status)| {
            json!({
                "id": id,
                "project_id": "p1",
                "contributor_id": contributor,
                "status": status,
                "proposal": format!("Proposal from {contributor}"),
            })
        })
        .collect();

    serde_json::from_value(json!({
        "id": "p1",
        "title": "Sediment core dating",
        "description": "Radiocarbon dating of lake sediment cores",
        "status": "OPEN",
        "compensation_model": "MILESTONE",
        "owner_id": OWNER,
        "owner": {"id": OWNER, "full_name": "Dr. Ines Okafor", "role": "researcher"},
        "milestones": [
            {"id": "ms1", "project_id": "p1", "description": "Prepare samples", "amount": 500, "status": "PENDING"},
            {"id": "ms2", "project_id": "p1", "description": "Report", "amount": 250, "status": "COMPLETED"}
        ],
        "applications": applications,
    }))
    .unwrap()
}

pub fn message(id: &str, sender: &str, content: &str, second: u32) -> Message {
    serde_json::from_value(message_record(id, sender, content, second)).unwrap()
}

/// A raw `messages` row as the realtime feed delivers it, without a sender profile.
pub fn message_record(id: &str, sender: &str, content: &str, second: u32) -> serde_json::Value {
    json!({
        "id": id,
        "project_id": "p1",
        "sender_id": sender,
        "content": content,
        "attachment_url": null,
        "created_at": format!("2026-03-01T10:00:{second:02}Z"),
    })
}

pub fn profile(id: &str, name: &str) -> Profile {
    Profile {
        id: UserId::from(id),
        full_name: Some(name.to_string()),
        avatar_url: None,
        role: None,
    }
}

/// In-memory backend that records every call.
pub struct FakeBackend {
    pub session_user: UserId,
    pub project: RefCell<Option<Project>>,
    pub project_error: RefCell<Option<BackendError>>,
    pub history: RefCell<Result<Vec<Message>, BackendError>>,
    pub profiles: RefCell<HashMap<UserId, Profile>>,
    pub milestone_reply: RefCell<Result<Option<Milestone>, BackendError>>,
    pub fail_upload: Cell<bool>,
    pub fail_send: Cell<bool>,
    pub fail_status: Cell<bool>,
    pub fail_apply: Cell<bool>,
    pub calls: RefCell<Vec<String>>,
    pub submitted: RefCell<Vec<ApplicationDraft>>,
    next_id: Cell<u32>,
}

impl FakeBackend {
    pub fn new(session_user: &str, project: Project) -> Self {
        Self {
            session_user: UserId::from(session_user),
            project: RefCell::new(Some(project)),
            project_error: RefCell::new(None),
            history: RefCell::new(Ok(Vec::new())),
            profiles: RefCell::new(HashMap::new()),
            milestone_reply: RefCell::new(Ok(None)),
            fail_upload: Cell::new(false),
            fail_send: Cell::new(false),
            fail_status: Cell::new(false),
            fail_apply: Cell::new(false),
            calls: RefCell::new(Vec::new()),
            submitted: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn with_history(self, history: Vec<Message>) -> Self {
        *self.history.borrow_mut() = Ok(history);
        self
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.profiles.borrow_mut().insert(profile.id.clone(), profile);
        self
    }

    /// Number of recorded calls whose name starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        format!("{prefix}-{n}")
    }

    fn unavailable() -> BackendError {
        BackendError::Network("connection refused".into())
    }
}

impl ProjectBackend for FakeBackend {
    async fn get_project_by_id(&self, id: &ProjectId) -> Result<Project, BackendError> {
        self.record(format!("get_project {id}"));
        if let Some(e) = self.project_error.borrow().clone() {
            return Err(e);
        }
        self.project
            .borrow()
            .clone()
            .filter(|p| &p.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("project {id}")))
    }

    async fn get_messages(&self, project_id: &ProjectId) -> Result<Vec<Message>, BackendError> {
        self.record(format!("get_messages {project_id}"));
        self.history.borrow().clone()
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        self.record(format!("get_profile {user_id}"));
        self.profiles
            .borrow()
            .get(user_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("profile {user_id}")))
    }

    async fn get_sender_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        self.record(format!("sender_profile {user_id}"));
        self.profiles
            .borrow()
            .get(user_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("profile {user_id}")))
    }

    async fn send_message(
        &self,
        project_id: &ProjectId,
        text: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message, BackendError> {
        self.record(format!("send_message {text}"));
        if self.fail_send.get() {
            return Err(Self::unavailable());
        }
        let mut sent = message(&self.next_id("msg"), &self.session_user.0, text, 59);
        sent.project_id = project_id.clone();
        sent.attachment_url = attachment_url.map(str::to_string);
        Ok(sent)
    }

    async fn upload_file(&self, file: &Attachment, bucket: &str) -> Result<String, BackendError> {
        self.record(format!("upload {bucket}/{}", file.file_name));
        if self.fail_upload.get() {
            return Err(BackendError::Rejected {
                status: 413,
                message: "Payload too large".into(),
            });
        }
        Ok(format!("https://files.test/{bucket}/{}", file.file_name))
    }

    async fn submit_application(
        &self,
        project_id: &ProjectId,
        draft: &ApplicationDraft,
    ) -> Result<Application, BackendError> {
        self.record(format!("submit_application {project_id}"));
        if self.fail_apply.get() {
            return Err(Self::unavailable());
        }
        self.submitted.borrow_mut().push(draft.clone());
        Ok(Application {
            id: ApplicationId(self.next_id("app")),
            project_id: project_id.clone(),
            contributor_id: self.session_user.clone(),
            status: ApplicationStatus::Pending,
            proposal: draft.proposal.clone(),
            rate: draft.rate,
            availability: draft.availability.clone(),
            links: draft.links.clone(),
            contributor: None,
            created_at: None,
        })
    }

    async fn update_application_status(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), BackendError> {
        self.record(format!("update_application {application_id} {status}"));
        if self.fail_status.get() {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    async fn update_milestone_status(
        &self,
        milestone_id: &MilestoneId,
        project_id: &ProjectId,
        status: MilestoneStatus,
    ) -> Result<Option<Milestone>, BackendError> {
        self.record(format!("update_milestone {milestone_id} {project_id} {status}"));
        self.milestone_reply.borrow().clone()
    }
}

/// Realtime feed that hands out in-memory channels.
#[derive(Default)]
pub struct FakeFeed {
    pub opened: RefCell<Vec<String>>,
    pub released: Arc<AtomicUsize>,
    pub fail: Cell<bool>,
    senders: RefCell<Vec<UnboundedSender<InsertEvent>>>,
}

impl FakeFeed {
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Deliver a `messages` insert on the most recently opened channel.
    pub fn push(&self, record: serde_json::Value) {
        let senders = self.senders.borrow();
        let sender = senders.last().expect("no open channel");
        sender
            .unbounded_send(InsertEvent {
                table: "messages".into(),
                record,
            })
            .expect("channel closed");
    }

    /// Close every open channel from the server side.
    pub fn hang_up(&self) {
        self.senders.borrow_mut().clear();
    }
}

impl RealtimeFeed for FakeFeed {
    async fn subscribe(&self, channel: &str, _filter: InsertFilter) -> Result<Subscription, BackendError> {
        if self.fail.get() {
            return Err(BackendError::Realtime("join timed out".into()));
        }
        self.opened.borrow_mut().push(channel.to_string());
        let (tx, rx) = mpsc::unbounded();
        self.senders.borrow_mut().push(tx);
        let released = self.released.clone();
        Ok(Subscription::new(channel, rx, move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: RefCell<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn count(&self, severity: Severity) -> usize {
        self.notices
            .borrow()
            .iter()
            .filter(|n| n.severity == severity)
            .count()
    }

    pub fn last_message(&self) -> Option<String> {
        self.notices.borrow().last().map(|n| n.message.clone())
    }
}

impl Notifier for RecordingNotifier {
    fn post(&self, notice: Notice) {
        self.notices.borrow_mut().push(notice);
    }
}
