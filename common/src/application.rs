use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{Profile, UserId};
use crate::nullable;
use crate::project::ProjectId;

/// Unique application identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(s: &str) -> Self {
        ApplicationId(s.to_string())
    }
}

/// Where an application stands with the project owner.
///
/// Statuses this client does not know are kept verbatim so one odd row does
/// not fail the whole project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationStatus {
    Pending,
    Shortlisted,
    Accepted,
    Rejected,
    Other(String),
}

impl ApplicationStatus {
    /// The statuses an owner can set.
    pub fn all() -> [ApplicationStatus; 4] {
        [
            ApplicationStatus::Pending,
            ApplicationStatus::Shortlisted,
            ApplicationStatus::Accepted,
            ApplicationStatus::Rejected,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Shortlisted => "SHORTLISTED",
            ApplicationStatus::Accepted => "ACCEPTED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Other(s) => s,
        }
    }

    /// Accepted and rejected applications are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Rejected)
    }

    /// Returns true if an owner may move an application from self to `next`.
    /// Unknown statuses are left alone.
    pub fn can_transition_to(&self, next: &ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Pending, ApplicationStatus::Shortlisted)
                | (ApplicationStatus::Pending, ApplicationStatus::Accepted)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
                | (ApplicationStatus::Shortlisted, ApplicationStatus::Pending)
                | (ApplicationStatus::Shortlisted, ApplicationStatus::Accepted)
                | (ApplicationStatus::Shortlisted, ApplicationStatus::Rejected)
        )
    }
}

impl From<String> for ApplicationStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => ApplicationStatus::Pending,
            "SHORTLISTED" => ApplicationStatus::Shortlisted,
            "ACCEPTED" => ApplicationStatus::Accepted,
            "REJECTED" => ApplicationStatus::Rejected,
            _ => ApplicationStatus::Other(s),
        }
    }
}

impl From<ApplicationStatus> for String {
    fn from(status: ApplicationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses only the statuses an owner can set.
impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::all()
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown application status: {s}"))
    }
}

/// A contributor's application to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub project_id: ProjectId,
    pub contributor_id: UserId,
    pub status: ApplicationStatus,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub proposal: String,
    /// Proposed rate, in the project's compensation unit.
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor: Option<Profile>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Form input for a new application. The contributor is the session user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationDraft {
    pub proposal: String,
    pub rate: Option<f64>,
    pub availability: Option<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftError {
    EmptyProposal,
    /// Negative, infinite or NaN.
    InvalidRate(f64),
}

impl fmt::Display for DraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyProposal => write!(f, "a proposal is required"),
            Self::InvalidRate(rate) => write!(f, "rate must be a non-negative number (got {rate})"),
        }
    }
}

impl std::error::Error for DraftError {}

/// A rate must be a finite, non-negative number.
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate >= 0.0
}

impl ApplicationDraft {
    pub fn new(proposal: impl Into<String>) -> Self {
        Self {
            proposal: proposal.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DraftError> {
        if self.proposal.trim().is_empty() {
            return Err(DraftError::EmptyProposal);
        }
        if let Some(rate) = self.rate {
            if !is_valid_rate(rate) {
                return Err(DraftError::InvalidRate(rate));
            }
        }
        Ok(())
    }

    /// Trimmed copy with blank optional fields and links dropped.
    pub fn normalized(&self) -> Self {
        Self {
            proposal: self.proposal.trim().to_string(),
            rate: self.rate,
            availability: self
                .availability
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            links: self
                .links
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}
