use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::application::Application;
use crate::identity::{Profile, UserId};
use crate::milestone::Milestone;
use crate::nullable;

/// Unique project identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        ProjectId(s.to_string())
    }
}

/// Project lifecycle. Only `Open` projects accept applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectStatus {
    Open,
    InProgress,
    Completed,
    Other(String),
}

impl ProjectStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProjectStatus::Open => "OPEN",
            ProjectStatus::InProgress => "IN_PROGRESS",
            ProjectStatus::Completed => "COMPLETED",
            ProjectStatus::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ProjectStatus::Open => "Open",
            ProjectStatus::InProgress => "In progress",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Other(s) => s,
        }
    }
}

impl From<String> for ProjectStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => ProjectStatus::Open,
            "IN_PROGRESS" => ProjectStatus::InProgress,
            "COMPLETED" => ProjectStatus::Completed,
            _ => ProjectStatus::Other(s),
        }
    }
}

impl From<ProjectStatus> for String {
    fn from(status: ProjectStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How contributors are paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Compensation {
    Fixed,
    Hourly,
    /// Paid out per completed milestone.
    Milestone,
    Equity,
    Volunteer,
    Other(String),
}

impl Compensation {
    pub fn as_str(&self) -> &str {
        match self {
            Compensation::Fixed => "FIXED",
            Compensation::Hourly => "HOURLY",
            Compensation::Milestone => "MILESTONE",
            Compensation::Equity => "EQUITY",
            Compensation::Volunteer => "VOLUNTEER",
            Compensation::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Compensation::Fixed => "Fixed price",
            Compensation::Hourly => "Hourly",
            Compensation::Milestone => "Per milestone",
            Compensation::Equity => "Equity / co-authorship",
            Compensation::Volunteer => "Volunteer",
            Compensation::Other(s) => s,
        }
    }
}

impl From<String> for Compensation {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "FIXED" => Compensation::Fixed,
            "HOURLY" => Compensation::Hourly,
            "MILESTONE" => Compensation::Milestone,
            "EQUITY" => Compensation::Equity,
            "VOLUNTEER" => Compensation::Volunteer,
            _ => Compensation::Other(s),
        }
    }
}

impl From<Compensation> for String {
    fn from(c: Compensation) -> Self {
        c.as_str().to_string()
    }
}

/// A research project as returned by the backend, with its nested rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default, alias = "compensation_model")]
    pub compensation: Option<Compensation>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Profile>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub milestones: Vec<Milestone>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_open(&self) -> bool {
        self.status == ProjectStatus::Open
    }

    pub fn owner_name(&self) -> &str {
        self.owner
            .as_ref()
            .map(|p| p.display_name())
            .unwrap_or("Unknown owner")
    }

    /// Sum of all milestone amounts.
    pub fn total_budget(&self) -> f64 {
        self.milestones.iter().map(|m| m.amount).sum()
    }

    /// Completed milestones over total, or `None` when there are none.
    pub fn milestone_progress(&self) -> Option<(usize, usize)> {
        if self.milestones.is_empty() {
            return None;
        }
        let done = self
            .milestones
            .iter()
            .filter(|m| m.status.is_completed())
            .count();
        Some((done, self.milestones.len()))
    }
}
