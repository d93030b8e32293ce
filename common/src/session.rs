//! The project-details page session.
//!
//! Owns the page's view state and performs every user action against the
//! backend. Local state is patched only after the backend confirms. Failures
//! are reported once through the notifier and leave state untouched.

use std::fmt;

use futures::channel::mpsc::UnboundedReceiver;
use futures::{FutureExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::application::{ApplicationDraft, ApplicationId, ApplicationStatus, DraftError};
use crate::backend::{BackendError, ProjectBackend};
use crate::chat::{Attachment, ComposeDraft, ComposeError, MessageLog, ATTACHMENT_BUCKET};
use crate::identity::Viewer;
use crate::message::Message;
use crate::milestone::{MilestoneId, MilestoneStatus};
use crate::notice::{Notice, Notifier};
use crate::page::{ChatStatus, LoadedPage, PageState, PageView};
use crate::permissions::Capabilities;
use crate::project::ProjectId;
use crate::realtime::{InsertEvent, RealtimeFeed};
use crate::subscription::{ChatSubscription, SlotChange, SubscriptionKey};

/// Actions the page can send to its session.
#[derive(Debug, Clone)]
pub enum PageCommand {
    /// Refetch the project. The realtime subscription is kept if the key is unchanged.
    Reload,
    Apply(ApplicationDraft),
    EditMessage(String),
    Attach(Attachment),
    Detach,
    SendMessage,
    SetApplicationStatus {
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
    CompleteMilestone(MilestoneId),
    /// The signed-in user changed (or signed out).
    SetViewer(Option<Viewer>),
}

impl PageCommand {
    /// Commands that talk to the backend, during which the page shows as busy.
    fn is_remote(&self) -> bool {
        !matches!(
            self,
            PageCommand::EditMessage(_) | PageCommand::Attach(_) | PageCommand::Detach
        )
    }
}

/// Why a session action did not go through.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The project is still loading or failed to load.
    NotLoaded,
    NotPermitted(&'static str),
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    UnknownApplication(ApplicationId),
    UnknownMilestone(MilestoneId),
    MilestoneAlreadyCompleted(MilestoneId),
    Draft(DraftError),
    Compose(ComposeError),
    Backend(BackendError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "the project has not loaded yet"),
            Self::NotPermitted(action) => write!(f, "you are not allowed to {action}"),
            Self::InvalidTransition { from, to } => write!(
                f,
                "an application cannot move from {} to {}",
                from.label(),
                to.label()
            ),
            Self::UnknownApplication(id) => write!(f, "application {id} is not on this project"),
            Self::UnknownMilestone(id) => write!(f, "milestone {id} is not on this project"),
            Self::MilestoneAlreadyCompleted(id) => write!(f, "milestone {id} is already completed"),
            Self::Draft(e) => write!(f, "{e}"),
            Self::Compose(e) => write!(f, "{e}"),
            Self::Backend(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

enum Step {
    Event(Option<InsertEvent>),
    Command(Option<PageCommand>),
}

/// Session for one project-details page.
pub struct ProjectSession<B, R, N> {
    project_id: ProjectId,
    viewer: Option<Viewer>,
    backend: B,
    feed: R,
    notifier: N,
    state: PageState,
    compose: ComposeDraft,
    busy: bool,
    subscription: ChatSubscription,
    attachment_bucket: String,
}

impl<B, R, N> ProjectSession<B, R, N>
where
    B: ProjectBackend,
    R: RealtimeFeed,
    N: Notifier,
{
    pub fn new(project_id: ProjectId, viewer: Option<Viewer>, backend: B, feed: R, notifier: N) -> Self {
        Self {
            project_id,
            viewer,
            backend,
            feed,
            notifier,
            state: PageState::Loading,
            compose: ComposeDraft::default(),
            busy: false,
            subscription: ChatSubscription::new(),
            attachment_bucket: ATTACHMENT_BUCKET.to_string(),
        }
    }

    pub fn with_attachment_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.attachment_bucket = bucket.into();
        self
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn compose(&self) -> &ComposeDraft {
        &self.compose
    }

    pub fn subscription_key(&self) -> Option<&SubscriptionKey> {
        self.subscription.key()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_open()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.state
            .loaded()
            .map(|page| page.capabilities(self.viewer.as_ref()))
            .unwrap_or_default()
    }

    pub fn view(&self) -> PageView {
        PageView {
            state: self.state.clone(),
            viewer: self.viewer.clone(),
            capabilities: self.capabilities(),
            compose: self.compose.clone(),
            busy: self.busy,
        }
    }

    /// Fetch the project, then attach chat if the viewer may use it.
    pub async fn load(&mut self) {
        info!("Loading project {}", self.project_id);
        self.state = PageState::Loading;

        match self.backend.get_project_by_id(&self.project_id).await {
            Ok(project) => {
                debug!(
                    "Project {} loaded: {} applications, {} milestones",
                    project.id,
                    project.applications.len(),
                    project.milestones.len()
                );
                self.state = PageState::Loaded(Box::new(LoadedPage::new(project)));
                self.sync_chat().await;
            }
            Err(e) => {
                error!("Failed to load project {}: {e}", self.project_id);
                self.subscription.reset();
                let reason = match e {
                    BackendError::NotFound(_) => "Project not found".to_string(),
                    other => format!("Could not load project: {other}"),
                };
                self.notifier.post(Notice::error(reason.clone()));
                self.state = PageState::Failed(reason);
            }
        }
    }

    /// Swap the signed-in user and re-derive chat access.
    pub async fn set_viewer(&mut self, viewer: Option<Viewer>) {
        self.viewer = viewer;
        self.sync_chat().await;
    }

    /// Bring the realtime subscription and chat history in line with the
    /// current capabilities.
    ///
    /// The live feed is attached before history is fetched, so rows inserted in
    /// between are buffered rather than lost. The idempotent merge absorbs any
    /// overlap.
    async fn sync_chat(&mut self) {
        let can_chat = self.capabilities().can_chat;
        let Some(project_id) = self.state.loaded().map(|page| page.project.id.clone()) else {
            return;
        };

        let mut problems = Vec::new();
        let mut opened = false;
        let key = SubscriptionKey::new(project_id.clone(), can_chat);
        match self.subscription.ensure(key, &self.feed).await {
            Ok(change) => {
                debug!("Chat subscription for {project_id}: {change:?}");
                opened = change == SlotChange::Opened;
            }
            Err(e) => {
                warn!("Realtime subscribe failed for {project_id}: {e}");
                problems.push(format!("live updates unavailable ({e})"));
            }
        }

        if !can_chat {
            if let Some(page) = self.state.loaded_mut() {
                page.messages.clear();
                page.chat = ChatStatus::Hidden;
            }
            return;
        }

        let needs_history = self
            .state
            .loaded()
            .is_some_and(|page| page.chat == ChatStatus::Hidden);
        if needs_history {
            match self.backend.get_messages(&project_id).await {
                Ok(history) => {
                    debug!("Fetched {} messages for {project_id}", history.len());
                    if let Some(page) = self.state.loaded_mut() {
                        let mut log = MessageLog::from_history(history);
                        for message in page.messages.messages() {
                            log.merge(message.clone());
                        }
                        page.messages = log;
                    }
                }
                Err(e) => {
                    warn!("Chat history fetch failed for {project_id}: {e}");
                    problems.push(format!("history unavailable ({e})"));
                }
            }
        } else if problems.is_empty() && !opened {
            return;
        }

        let status = if !problems.is_empty() {
            let reason = problems.join("; ");
            self.notifier.post(Notice::error(format!("Chat degraded: {reason}")));
            ChatStatus::Degraded(reason)
        } else if self.subscription.is_open() {
            ChatStatus::Live
        } else {
            ChatStatus::Degraded("live updates unavailable".into())
        };
        if let Some(page) = self.state.loaded_mut() {
            page.chat = status;
        }
    }

    /// Merge a realtime insert into the chat log.
    ///
    /// Known ids are dropped before any lookup. New messages get the sender's
    /// display profile attached. If that lookup fails the message is still shown.
    /// Returns true if a message was appended.
    pub async fn ingest(&mut self, event: InsertEvent) -> bool {
        if event.table != "messages" {
            debug!("Ignoring insert on {}", event.table);
            return false;
        }
        let message: Message = match event.decode() {
            Ok(message) => message,
            Err(e) => {
                warn!("Undecodable realtime message: {e}");
                return false;
            }
        };

        let known = match self.state.loaded() {
            Some(page) if page.chat != ChatStatus::Hidden => {
                if message.project_id != page.project.id {
                    debug!("Ignoring message {} for project {}", message.id, message.project_id);
                    return false;
                }
                page.messages.contains(&message.id)
            }
            _ => return false,
        };
        if known {
            debug!("Message {} already present", message.id);
            return false;
        }

        let message = match self.backend.get_sender_profile(&message.sender_id).await {
            Ok(profile) => message.with_sender(profile),
            Err(e) => {
                warn!("Sender profile lookup failed for {}: {e}", message.sender_id);
                message
            }
        };

        self.state
            .loaded_mut()
            .is_some_and(|page| page.messages.merge(message))
    }

    pub async fn apply(&mut self, draft: ApplicationDraft) -> Result<(), SessionError> {
        let caps = self.loaded_capabilities()?;
        if !caps.can_apply {
            return self.reject(SessionError::NotPermitted("apply to this project"));
        }
        if let Err(e) = draft.validate() {
            return self.reject(SessionError::Draft(e));
        }

        let draft = draft.normalized();
        match self.backend.submit_application(&self.project_id, &draft).await {
            Ok(application) => {
                info!("Application {} submitted to {}", application.id, self.project_id);
                if let Some(page) = self.state.loaded_mut() {
                    page.add_application(application);
                }
                self.notifier.post(Notice::success("Application submitted"));
                self.sync_chat().await;
                Ok(())
            }
            Err(e) => self.fail("Could not submit application", e),
        }
    }

    pub fn edit_message(&mut self, text: String) {
        self.compose.text = text;
    }

    pub fn attach(&mut self, attachment: Attachment) {
        debug!("Attached {attachment:?}");
        self.compose.attachment = Some(attachment);
    }

    pub fn detach(&mut self) {
        self.compose.attachment = None;
    }

    /// Send the current compose draft, uploading its attachment first.
    pub async fn send_message(&mut self) -> Result<(), SessionError> {
        let caps = self.loaded_capabilities()?;
        if let Err(e) = self.compose.validate() {
            return self.reject(SessionError::Compose(e));
        }
        if !caps.can_chat {
            return self.reject(SessionError::NotPermitted("post in this chat"));
        }

        let draft = self.compose.clone();
        let attachment_url = match &draft.attachment {
            Some(file) => match self.backend.upload_file(file, &self.attachment_bucket).await {
                Ok(url) => {
                    debug!("Uploaded {} to {url}", file.file_name);
                    Some(url)
                }
                Err(e) => return self.fail("Attachment upload failed", e),
            },
            None => None,
        };

        match self
            .backend
            .send_message(&self.project_id, draft.trimmed_text(), attachment_url.as_deref())
            .await
        {
            Ok(message) => {
                debug!("Message {} sent", message.id);
                if let Some(page) = self.state.loaded_mut() {
                    page.messages.merge(message);
                }
                self.compose.clear();
                Ok(())
            }
            Err(e) => self.fail("Message not sent", e),
        }
    }

    /// Owner only. Accepting also moves the project to `IN_PROGRESS` locally.
    pub async fn set_application_status(
        &mut self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), SessionError> {
        let caps = self.loaded_capabilities()?;
        if !caps.can_manage {
            return self.reject(SessionError::NotPermitted("change application status"));
        }
        let current = match self
            .state
            .loaded()
            .and_then(|page| page.application(application_id))
        {
            Some(app) => app.status.clone(),
            None => return self.reject(SessionError::UnknownApplication(application_id.clone())),
        };
        if !current.can_transition_to(&status) {
            return self.reject(SessionError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        match self
            .backend
            .update_application_status(application_id, status.clone())
            .await
        {
            Ok(()) => {
                info!("Application {application_id}: {current} -> {status}");
                if let Some(page) = self.state.loaded_mut() {
                    page.set_application_status(application_id, status.clone());
                }
                self.notifier.post(Notice::success(format!(
                    "Application marked {}",
                    status.label().to_lowercase()
                )));
                self.sync_chat().await;
                Ok(())
            }
            Err(e) => self.fail("Could not update application", e),
        }
    }

    /// Owner only.
    pub async fn complete_milestone(&mut self, milestone_id: &MilestoneId) -> Result<(), SessionError> {
        let caps = self.loaded_capabilities()?;
        if !caps.can_manage {
            return self.reject(SessionError::NotPermitted("complete milestones"));
        }
        match self.state.loaded().and_then(|page| page.milestone(milestone_id)) {
            Some(m) if m.status.is_completed() => {
                return self.reject(SessionError::MilestoneAlreadyCompleted(milestone_id.clone()))
            }
            Some(_) => {}
            None => return self.reject(SessionError::UnknownMilestone(milestone_id.clone())),
        }

        match self
            .backend
            .update_milestone_status(milestone_id, &self.project_id, MilestoneStatus::Completed)
            .await
        {
            Ok(row) => {
                info!("Milestone {milestone_id} completed");
                if let Some(page) = self.state.loaded_mut() {
                    let replaced = row.is_some_and(|row| page.replace_milestone(row));
                    if !replaced {
                        page.set_milestone_status(milestone_id, MilestoneStatus::Completed);
                    }
                }
                self.notifier.post(Notice::success("Milestone marked complete"));
                Ok(())
            }
            Err(e) => self.fail("Could not complete milestone", e),
        }
    }

    /// Apply one command. Failures have already been reported to the notifier.
    pub async fn handle(&mut self, command: PageCommand) {
        let result = match command {
            PageCommand::Reload => {
                self.load().await;
                Ok(())
            }
            PageCommand::Apply(draft) => self.apply(draft).await,
            PageCommand::EditMessage(text) => {
                self.edit_message(text);
                Ok(())
            }
            PageCommand::Attach(attachment) => {
                self.attach(attachment);
                Ok(())
            }
            PageCommand::Detach => {
                self.detach();
                Ok(())
            }
            PageCommand::SendMessage => self.send_message().await,
            PageCommand::SetApplicationStatus {
                application_id,
                status,
            } => self.set_application_status(&application_id, status).await,
            PageCommand::CompleteMilestone(id) => self.complete_milestone(&id).await,
            PageCommand::SetViewer(viewer) => {
                self.set_viewer(viewer).await;
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!("Command not applied: {e}");
        }
    }

    /// Load the page, then serve commands and realtime events until the command
    /// channel closes. `observe` gets a fresh snapshot after every change.
    pub async fn run<F>(&mut self, mut commands: UnboundedReceiver<PageCommand>, mut observe: F)
    where
        F: FnMut(&PageView),
    {
        observe(&self.view());
        self.load().await;
        observe(&self.view());

        loop {
            let step = {
                let event = self.subscription.next_event().fuse();
                futures::pin_mut!(event);
                futures::select! {
                    event = event => Step::Event(event),
                    command = commands.next() => Step::Command(command),
                }
            };

            match step {
                Step::Event(Some(event)) => {
                    self.ingest(event).await;
                }
                Step::Event(None) => {
                    warn!("Realtime feed closed for project {}", self.project_id);
                    // Forget the key too, so the next sync opens a fresh feed.
                    self.subscription.reset();
                    if let Some(page) = self.state.loaded_mut() {
                        page.chat = ChatStatus::Degraded("live updates stopped".into());
                    }
                }
                Step::Command(Some(command)) => {
                    if command.is_remote() {
                        self.busy = true;
                        observe(&self.view());
                    }
                    self.handle(command).await;
                    self.busy = false;
                }
                Step::Command(None) => break,
            }
            observe(&self.view());
        }

        self.close();
    }

    /// Release the realtime subscription.
    pub fn close(&mut self) {
        info!("Closing session for project {}", self.project_id);
        self.subscription.reset();
    }

    fn loaded_capabilities(&self) -> Result<Capabilities, SessionError> {
        match self.state.loaded() {
            Some(page) => Ok(page.capabilities(self.viewer.as_ref())),
            None => self.reject(SessionError::NotLoaded),
        }
    }

    fn reject<T>(&self, err: SessionError) -> Result<T, SessionError> {
        warn!("Rejected on project {}: {err}", self.project_id);
        self.notifier.post(Notice::error(capitalize(&err.to_string())));
        Err(err)
    }

    fn fail<T>(&self, context: &str, e: BackendError) -> Result<T, SessionError> {
        error!("{context} on project {}: {e}", self.project_id);
        self.notifier.post(Notice::error(format!("{context}: {e}")));
        Err(SessionError::Backend(e))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("you are not allowed"), "You are not allowed");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn local_compose_commands_are_not_remote() {
        assert!(!PageCommand::EditMessage("hi".into()).is_remote());
        assert!(!PageCommand::Detach.is_remote());
        assert!(PageCommand::SendMessage.is_remote());
        assert!(PageCommand::Reload.is_remote());
    }
}
