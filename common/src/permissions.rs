//! Capability resolution for the project-details page.
//!
//! Every flag the page renders from is derived here from raw records, so the
//! rules can be tested without any UI.

use crate::application::{Application, ApplicationStatus};
use crate::identity::Viewer;
use crate::project::Project;

/// What the current viewer may see and do on a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Viewer posted the project.
    pub is_owner: bool,
    /// Viewer has an application with `ACCEPTED` status.
    pub is_accepted_contributor: bool,
    /// Viewer has an application in any status.
    pub has_applied: bool,
    /// Viewer may submit a new application.
    pub can_apply: bool,
    /// Viewer may read and post in the project chat.
    pub can_chat: bool,
    /// Viewer may change application and milestone status.
    pub can_manage: bool,
}

impl Capabilities {
    /// Resolve capabilities for `viewer` on `project`.
    ///
    /// `applications` is the page's current application list, which may have
    /// been patched locally and so is passed separately from the project.
    /// A signed-out viewer (`None`) gets no capabilities.
    pub fn resolve(
        viewer: Option<&Viewer>,
        project: &Project,
        applications: &[Application],
    ) -> Self {
        let Some(viewer) = viewer else {
            return Self::default();
        };

        let is_owner = viewer.id == project.owner_id;
        let own = viewer_application(viewer, applications);
        let has_applied = own.is_some();
        let is_accepted_contributor =
            own.is_some_and(|app| app.status == ApplicationStatus::Accepted);

        Self {
            is_owner,
            is_accepted_contributor,
            has_applied,
            can_apply: viewer.is_contributor() && !is_owner && !has_applied && project.is_open(),
            can_chat: is_owner || is_accepted_contributor,
            can_manage: is_owner,
        }
    }
}

/// The viewer's own application, if any.
///
/// At most one application per viewer is expected. If the backend returns more,
/// an accepted one wins so chat access is not hidden behind a stale row.
pub fn viewer_application<'a>(
    viewer: &Viewer,
    applications: &'a [Application],
) -> Option<&'a Application> {
    let mut own = applications.iter().filter(|a| a.contributor_id == viewer.id);
    let first = own.next()?;
    if first.status == ApplicationStatus::Accepted {
        return Some(first);
    }
    own.find(|a| a.status == ApplicationStatus::Accepted)
        .or(Some(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationId;
    use crate::identity::{UserId, UserRole};
    use crate::project::{ProjectId, ProjectStatus};

    fn project(owner: &str, status: ProjectStatus) -> Project {
        Project {
            id: ProjectId::from("p1"),
            title: "Protein folding benchmarks".into(),
            description: String::new(),
            status,
            compensation: None,
            skills: vec![],
            deliverables: vec![],
            deadline: None,
            owner_id: UserId::from(owner),
            owner: None,
            milestones: vec![],
            applications: vec![],
            created_at: None,
        }
    }

    fn application(contributor: &str, status: ApplicationStatus) -> Application {
        Application {
            id: ApplicationId(format!("a-{contributor}-{status}")),
            project_id: ProjectId::from("p1"),
            contributor_id: UserId::from(contributor),
            status,
            proposal: "proposal".into(),
            rate: None,
            availability: None,
            links: vec![],
            contributor: None,
            created_at: None,
        }
    }

    #[test]
    fn signed_out_viewer_has_nothing() {
        let caps = Capabilities::resolve(None, &project("owner", ProjectStatus::Open), &[]);
        assert_eq!(caps, Capabilities::default());
    }

    #[test]
    fn owner_can_manage_and_chat_but_not_apply() {
        let owner = Viewer::new("owner", UserRole::Contributor);
        let caps = Capabilities::resolve(Some(&owner), &project("owner", ProjectStatus::Open), &[]);
        assert!(caps.is_owner);
        assert!(caps.can_manage);
        assert!(caps.can_chat);
        assert!(!caps.can_apply);
    }

    #[test]
    fn accepted_contributor_can_chat_but_not_manage() {
        let viewer = Viewer::new("c1", UserRole::Contributor);
        let apps = [application("c1", ApplicationStatus::Accepted)];
        let caps = Capabilities::resolve(
            Some(&viewer),
            &project("owner", ProjectStatus::InProgress),
            &apps,
        );
        assert!(caps.is_accepted_contributor);
        assert!(caps.has_applied);
        assert!(caps.can_chat);
        assert!(!caps.can_manage);
        assert!(!caps.can_apply);
    }

    #[test]
    fn pending_contributor_cannot_chat() {
        let viewer = Viewer::new("c1", UserRole::Contributor);
        let apps = [application("c1", ApplicationStatus::Pending)];
        let caps = Capabilities::resolve(Some(&viewer), &project("owner", ProjectStatus::Open), &apps);
        assert!(caps.has_applied);
        assert!(!caps.can_chat);
        assert!(!caps.can_apply);
    }

    #[test]
    fn other_applicants_do_not_affect_viewer() {
        let viewer = Viewer::new("c1", UserRole::Contributor);
        let apps = [application("c2", ApplicationStatus::Accepted)];
        let caps = Capabilities::resolve(Some(&viewer), &project("owner", ProjectStatus::Open), &apps);
        assert!(!caps.has_applied);
        assert!(!caps.can_chat);
        assert!(caps.can_apply);
    }

    #[test]
    fn accepted_row_wins_over_duplicates() {
        let viewer = Viewer::new("c1", UserRole::Contributor);
        let apps = [
            application("c1", ApplicationStatus::Rejected),
            application("c1", ApplicationStatus::Accepted),
        ];
        let own = viewer_application(&viewer, &apps).unwrap();
        assert_eq!(own.status, ApplicationStatus::Accepted);
    }

    /// `can_apply` holds exactly when the role is contributor, the viewer is
    /// not the owner, has no application and the project is open.
    #[test]
    fn can_apply_matches_definition_for_all_combinations() {
        let roles = [
            UserRole::Contributor,
            UserRole::Researcher,
            UserRole::Other("ADMIN".into()),
        ];
        let statuses = [
            ProjectStatus::Open,
            ProjectStatus::InProgress,
            ProjectStatus::Completed,
            ProjectStatus::Other("ARCHIVED".into()),
        ];
        let existing: [Option<ApplicationStatus>; 5] = [
            None,
            Some(ApplicationStatus::Pending),
            Some(ApplicationStatus::Shortlisted),
            Some(ApplicationStatus::Accepted),
            Some(ApplicationStatus::Rejected),
        ];

        for role in &roles {
            for is_owner in [false, true] {
                for status in &statuses {
                    for prior in &existing {
                        let viewer = Viewer::new("v", role.clone());
                        let owner = if is_owner { "v" } else { "someone-else" };
                        let project = project(owner, status.clone());
                        let mut apps = vec![application("bystander", ApplicationStatus::Pending)];
                        if let Some(s) = prior {
                            apps.push(application("v", s.clone()));
                        }

                        let caps = Capabilities::resolve(Some(&viewer), &project, &apps);
                        let expected = *role == UserRole::Contributor
                            && !is_owner
                            && prior.is_none()
                            && *status == ProjectStatus::Open;
                        assert_eq!(
                            caps.can_apply, expected,
                            "role={role} owner={is_owner} status={status} prior={prior:?}"
                        );
                        assert_eq!(caps.can_chat, caps.is_owner || caps.is_accepted_contributor);
                        assert_eq!(caps.can_manage, caps.is_owner);
                    }
                }
            }
        }
    }
}
