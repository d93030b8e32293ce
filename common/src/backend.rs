use std::fmt;

use crate::application::{Application, ApplicationDraft, ApplicationId, ApplicationStatus};
use crate::chat::Attachment;
use crate::identity::{Profile, UserId};
use crate::message::Message;
use crate::milestone::{Milestone, MilestoneId, MilestoneStatus};
use crate::project::{Project, ProjectId};

/// Errors from backend calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The requested record does not exist or is not visible to the session.
    NotFound(String),
    /// Missing or expired credentials.
    Unauthorized,
    /// The backend answered with a non-success status.
    Rejected { status: u16, message: String },
    /// The request never got a response.
    Network(String),
    /// The response could not be decoded.
    Decode(String),
    /// Realtime channel failure.
    Realtime(String),
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Unauthorized => write!(f, "not signed in or session expired"),
            Self::Rejected { status, message } if message.is_empty() => {
                write!(f, "request rejected ({status})")
            }
            Self::Rejected { status, message } => {
                write!(f, "request rejected ({status}): {message}")
            }
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Decode(msg) => write!(f, "unexpected response: {msg}"),
            Self::Realtime(msg) => write!(f, "realtime error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

/// Data access for the project-details page.
///
/// Implementations own the wire format. The session user (for sends and
/// applications) is whoever the implementation is authenticated as.
#[allow(async_fn_in_trait)]
pub trait ProjectBackend {
    /// Project with owner profile, milestones and applications embedded.
    async fn get_project_by_id(&self, id: &ProjectId) -> Result<Project, BackendError>;

    /// Chat history for a project, oldest first, with sender profiles embedded.
    async fn get_messages(&self, project_id: &ProjectId) -> Result<Vec<Message>, BackendError>;

    /// Full profile including role.
    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError>;

    /// Public display fields only (id, name, avatar).
    async fn get_sender_profile(&self, user_id: &UserId) -> Result<Profile, BackendError>;

    async fn send_message(
        &self,
        project_id: &ProjectId,
        text: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message, BackendError>;

    /// Upload a file and return its public URL.
    async fn upload_file(&self, file: &Attachment, bucket: &str) -> Result<String, BackendError>;

    async fn submit_application(
        &self,
        project_id: &ProjectId,
        draft: &ApplicationDraft,
    ) -> Result<Application, BackendError>;

    async fn update_application_status(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), BackendError>;

    /// Returns the updated row when the backend sends one back.
    async fn update_milestone_status(
        &self,
        milestone_id: &MilestoneId,
        project_id: &ProjectId,
        status: MilestoneStatus,
    ) -> Result<Option<Milestone>, BackendError>;
}

impl<B: ProjectBackend + ?Sized> ProjectBackend for &B {
    async fn get_project_by_id(&self, id: &ProjectId) -> Result<Project, BackendError> {
        (**self).get_project_by_id(id).await
    }

    async fn get_messages(&self, project_id: &ProjectId) -> Result<Vec<Message>, BackendError> {
        (**self).get_messages(project_id).await
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        (**self).get_profile(user_id).await
    }

    async fn get_sender_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        (**self).get_sender_profile(user_id).await
    }

    async fn send_message(
        &self,
        project_id: &ProjectId,
        text: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message, BackendError> {
        (**self).send_message(project_id, text, attachment_url).await
    }

    async fn upload_file(&self, file: &Attachment, bucket: &str) -> Result<String, BackendError> {
        (**self).upload_file(file, bucket).await
    }

    async fn submit_application(
        &self,
        project_id: &ProjectId,
        draft: &ApplicationDraft,
    ) -> Result<Application, BackendError> {
        (**self).submit_application(project_id, draft).await
    }

    async fn update_application_status(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), BackendError> {
        (**self).update_application_status(application_id, status).await
    }

    async fn update_milestone_status(
        &self,
        milestone_id: &MilestoneId,
        project_id: &ProjectId,
        status: MilestoneStatus,
    ) -> Result<Option<Milestone>, BackendError> {
        (**self)
            .update_milestone_status(milestone_id, project_id, status)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_omits_empty_body() {
        let bare = BackendError::Rejected {
            status: 409,
            message: String::new(),
        };
        assert_eq!(bare.to_string(), "request rejected (409)");

        let detailed = BackendError::Rejected {
            status: 400,
            message: "duplicate key".into(),
        };
        assert_eq!(detailed.to_string(), "request rejected (400): duplicate key");
    }
}
