use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::nullable;
use crate::project::ProjectId;

/// Unique milestone identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilestoneId(pub String);

impl fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MilestoneId {
    fn from(s: &str) -> Self {
        MilestoneId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MilestoneStatus {
    Pending,
    Completed,
    Other(String),
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MilestoneStatus::Pending => "PENDING",
            MilestoneStatus::Completed => "COMPLETED",
            MilestoneStatus::Other(s) => s,
        }
    }

    pub fn is_completed(&self) -> bool {
        *self == MilestoneStatus::Completed
    }
}

impl From<String> for MilestoneStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => MilestoneStatus::Pending,
            "COMPLETED" => MilestoneStatus::Completed,
            _ => MilestoneStatus::Other(s),
        }
    }
}

impl From<MilestoneStatus> for String {
    fn from(status: MilestoneStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fundable deliverable checkpoint within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub project_id: ProjectId,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    /// Amount released when the milestone completes.
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub amount: f64,
    pub status: MilestoneStatus,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_round_trips_verbatim() {
        let json = r#"{"id":"m1","project_id":"p1","description":"Pilot","amount":250,"status":"IN_REVIEW"}"#;
        let milestone: Milestone = serde_json::from_str(json).unwrap();
        assert_eq!(milestone.status, MilestoneStatus::Other("IN_REVIEW".into()));
        assert_eq!(milestone.amount, 250.0);

        let value = serde_json::to_value(&milestone).unwrap();
        assert_eq!(value["status"], "IN_REVIEW");
    }

    #[test]
    fn null_amount_defaults_to_zero() {
        let json = r#"{"id":"m1","project_id":"p1","description":null,"amount":null,"status":"completed","due_date":"2025-01-31"}"#;
        let milestone: Milestone = serde_json::from_str(json).unwrap();
        assert!(milestone.status.is_completed());
        assert_eq!(milestone.amount, 0.0);
        assert_eq!(milestone.due_date, NaiveDate::from_ymd_opt(2025, 1, 31));
    }
}
