use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend user identifier (the auth uid).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

/// Role a user signed up with.
///
/// Stored as an uppercase string. Roles this client does not know about are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    /// Posts projects and manages applications.
    Researcher,
    /// Applies to projects.
    Contributor,
    Other(String),
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Researcher => "RESEARCHER",
            UserRole::Contributor => "CONTRIBUTOR",
            UserRole::Other(s) => s,
        }
    }
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "RESEARCHER" => UserRole::Researcher,
            "CONTRIBUTOR" => UserRole::Contributor,
            _ => UserRole::Other(s),
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public profile fields. Embedded as the project owner, the application
/// contributor and the message sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Absent when only the public display fields were selected.
    #[serde(default)]
    pub role: Option<UserRole>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Anonymous",
        }
    }
}

/// The signed-in user looking at the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: UserId,
    pub role: UserRole,
}

impl Viewer {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }

    /// Build a viewer from a fetched profile. Profiles without a role are
    /// treated as `Other("")` and therefore never contributors.
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            role: profile
                .role
                .clone()
                .unwrap_or_else(|| UserRole::Other(String::new())),
        }
    }

    pub fn is_contributor(&self) -> bool {
        self.role == UserRole::Contributor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive_and_keeps_unknowns() {
        assert_eq!(UserRole::from("contributor".to_string()), UserRole::Contributor);
        assert_eq!(UserRole::from("RESEARCHER".to_string()), UserRole::Researcher);
        assert_eq!(
            UserRole::from("ADMIN".to_string()),
            UserRole::Other("ADMIN".into())
        );
        assert_eq!(String::from(UserRole::Other("ADMIN".into())), "ADMIN");
    }

    #[test]
    fn profile_without_role_is_not_a_contributor() {
        let profile: Profile =
            serde_json::from_str(r#"{"id":"u1","full_name":"Ada","avatar_url":null}"#).unwrap();
        let viewer = Viewer::from_profile(&profile);
        assert_eq!(viewer.id, UserId::from("u1"));
        assert!(!viewer.is_contributor());
    }

    #[test]
    fn display_name_falls_back_for_blank_names() {
        let mut profile = Profile {
            id: UserId::from("u1"),
            full_name: Some("  ".into()),
            avatar_url: None,
            role: None,
        };
        assert_eq!(profile.display_name(), "Anonymous");
        profile.full_name = Some("Grace Hopper".into());
        assert_eq!(profile.display_name(), "Grace Hopper");
    }
}
