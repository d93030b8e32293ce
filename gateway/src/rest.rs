//! REST and storage access over the hosted backend's PostgREST-style API.

use chrono::Utc;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use labmatch_common::application::{Application, ApplicationDraft, ApplicationId, ApplicationStatus};
use labmatch_common::backend::{BackendError, ProjectBackend};
use labmatch_common::chat::Attachment;
use labmatch_common::identity::{Profile, UserId};
use labmatch_common::message::Message;
use labmatch_common::milestone::{Milestone, MilestoneId, MilestoneStatus};
use labmatch_common::project::{Project, ProjectId};

use crate::config::GatewayConfig;
use crate::error::{error_message, GatewayError};

const PROFILE_FIELDS: &str = "id,full_name,avatar_url,role";
const SENDER_FIELDS: &str = "id,full_name,avatar_url";
const PROJECT_SELECT: &str = "*,owner:profiles(id,full_name,avatar_url,role),milestones(*),\
applications(*,contributor:profiles(id,full_name,avatar_url,role))";
const MESSAGE_SELECT: &str = "*,sender:profiles(id,full_name,avatar_url)";
const APPLICATION_SELECT: &str = "*,contributor:profiles(id,full_name,avatar_url,role)";

#[derive(Serialize)]
struct NewMessage<'a> {
    project_id: &'a ProjectId,
    sender_id: &'a UserId,
    content: &'a str,
    attachment_url: Option<&'a str>,
}

#[derive(Serialize)]
struct NewApplication<'a> {
    project_id: &'a ProjectId,
    contributor_id: &'a UserId,
    status: ApplicationStatus,
    proposal: &'a str,
    rate: Option<f64>,
    availability: Option<&'a str>,
    links: &'a [String],
}

/// [`ProjectBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl RestBackend {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.endpoint(path))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.config.bearer())
    }

    fn session_user(&self) -> Result<&UserId, GatewayError> {
        self.config
            .user_id
            .as_ref()
            .ok_or(GatewayError::Config("LABMATCH_USER_ID"))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Request failed with {status}: {body}");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Request failed with {status}: {body}");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(())
    }

    /// First row of a filtered select. An empty result is `NotFound`.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: String,
    ) -> Result<T, GatewayError> {
        let rows: Vec<T> = self.send_json(request).await?;
        rows.into_iter().next().ok_or(GatewayError::NotFound(what))
    }

    pub async fn fetch_project(&self, id: &ProjectId) -> Result<Project, GatewayError> {
        debug!("Fetching project {id}");
        let request = self
            .request(Method::GET, "rest/v1/projects")
            .query(&[("id", format!("eq.{id}")), ("select", PROJECT_SELECT.to_string())]);
        self.fetch_one(request, format!("project {id}")).await
    }

    pub async fn fetch_messages(&self, project_id: &ProjectId) -> Result<Vec<Message>, GatewayError> {
        let request = self.request(Method::GET, "rest/v1/messages").query(&[
            ("project_id", format!("eq.{project_id}")),
            ("select", MESSAGE_SELECT.to_string()),
            ("order", "created_at.asc".to_string()),
        ]);
        self.send_json(request).await
    }

    pub async fn fetch_profile(&self, user_id: &UserId, fields: &str) -> Result<Profile, GatewayError> {
        let request = self
            .request(Method::GET, "rest/v1/profiles")
            .query(&[("id", format!("eq.{user_id}")), ("select", fields.to_string())]);
        self.fetch_one(request, format!("profile {user_id}")).await
    }

    pub async fn insert_message(
        &self,
        project_id: &ProjectId,
        content: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message, GatewayError> {
        let row = NewMessage {
            project_id,
            sender_id: self.session_user()?,
            content,
            attachment_url,
        };
        let request = self
            .request(Method::POST, "rest/v1/messages")
            .query(&[("select", MESSAGE_SELECT)])
            .header("Prefer", "return=representation")
            .json(&row);
        self.fetch_one(request, "inserted message".into()).await
    }

    /// Store `file` in `bucket` and return its public URL.
    pub async fn upload(&self, file: &Attachment, bucket: &str) -> Result<String, GatewayError> {
        let path = object_path(&file.file_name);
        debug!("Uploading {} ({} bytes) to {bucket}/{path}", file.file_name, file.size());
        let request = self
            .request(Method::POST, &format!("storage/v1/object/{bucket}/{path}"))
            .header(reqwest::header::CONTENT_TYPE, &file.content_type)
            .header("x-upsert", "false")
            .body(file.bytes.clone());
        self.send_empty(request).await?;
        Ok(self.config.public_object_url(bucket, &path))
    }

    pub async fn insert_application(
        &self,
        project_id: &ProjectId,
        draft: &ApplicationDraft,
    ) -> Result<Application, GatewayError> {
        let row = NewApplication {
            project_id,
            contributor_id: self.session_user()?,
            status: ApplicationStatus::Pending,
            proposal: &draft.proposal,
            rate: draft.rate,
            availability: draft.availability.as_deref(),
            links: &draft.links,
        };
        let request = self
            .request(Method::POST, "rest/v1/applications")
            .query(&[("select", APPLICATION_SELECT)])
            .header("Prefer", "return=representation")
            .json(&row);
        self.fetch_one(request, "inserted application".into()).await
    }

    pub async fn patch_application(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), GatewayError> {
        let request = self
            .request(Method::PATCH, "rest/v1/applications")
            .query(&[("id", format!("eq.{application_id}"))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "status": status }));
        self.send_empty(request).await
    }

    pub async fn patch_milestone(
        &self,
        milestone_id: &MilestoneId,
        project_id: &ProjectId,
        status: MilestoneStatus,
    ) -> Result<Option<Milestone>, GatewayError> {
        let request = self
            .request(Method::PATCH, "rest/v1/milestones")
            .query(&[
                ("id", format!("eq.{milestone_id}")),
                ("project_id", format!("eq.{project_id}")),
            ])
            .header("Prefer", "return=representation")
            .json(&json!({ "status": status }));
        let rows: Vec<Milestone> = self.send_json(request).await?;
        Ok(rows.into_iter().next())
    }
}

impl ProjectBackend for RestBackend {
    async fn get_project_by_id(&self, id: &ProjectId) -> Result<Project, BackendError> {
        Ok(self.fetch_project(id).await?)
    }

    async fn get_messages(&self, project_id: &ProjectId) -> Result<Vec<Message>, BackendError> {
        Ok(self.fetch_messages(project_id).await?)
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        Ok(self.fetch_profile(user_id, PROFILE_FIELDS).await?)
    }

    async fn get_sender_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        Ok(self.fetch_profile(user_id, SENDER_FIELDS).await?)
    }

    async fn send_message(
        &self,
        project_id: &ProjectId,
        text: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message, BackendError> {
        let message = self.insert_message(project_id, text, attachment_url).await?;
        info!("Sent message {} to project {project_id}", message.id);
        Ok(message)
    }

    async fn upload_file(&self, file: &Attachment, bucket: &str) -> Result<String, BackendError> {
        Ok(self.upload(file, bucket).await?)
    }

    async fn submit_application(
        &self,
        project_id: &ProjectId,
        draft: &ApplicationDraft,
    ) -> Result<Application, BackendError> {
        Ok(self.insert_application(project_id, draft).await?)
    }

    async fn update_application_status(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), BackendError> {
        Ok(self.patch_application(application_id, status).await?)
    }

    async fn update_milestone_status(
        &self,
        milestone_id: &MilestoneId,
        project_id: &ProjectId,
        status: MilestoneStatus,
    ) -> Result<Option<Milestone>, BackendError> {
        Ok(self.patch_milestone(milestone_id, project_id, status).await?)
    }
}

/// Unique storage path for an upload: `{millis}-{random hex}-{sanitized name}`.
fn object_path(file_name: &str) -> String {
    format!(
        "{}-{:08x}-{}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        sanitize_file_name(file_name)
    )
}

/// Keep ASCII letters, digits, `.`, `-` and `_`; everything else becomes `_`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
