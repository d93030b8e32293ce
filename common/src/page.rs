//! View state of the project-details page and the local patches applied
//! after successful mutations.

use crate::application::{Application, ApplicationId, ApplicationStatus};
use crate::chat::{ComposeDraft, MessageLog};
use crate::identity::Viewer;
use crate::milestone::{Milestone, MilestoneId, MilestoneStatus};
use crate::permissions::{self, Capabilities};
use crate::project::{Project, ProjectStatus};

/// Top-level page state. Exactly one of these at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
    Loading,
    /// The project fetch failed or the project does not exist.
    Failed(String),
    Loaded(Box<LoadedPage>),
}

impl PageState {
    pub fn loaded(&self) -> Option<&LoadedPage> {
        match self {
            PageState::Loaded(page) => Some(page),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut LoadedPage> {
        match self {
            PageState::Loaded(page) => Some(page),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PageState::Loading)
    }
}

/// Chat panel availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStatus {
    /// The viewer may not chat on this project.
    Hidden,
    /// History loaded and the live feed is attached.
    Live,
    /// Chat is permitted but history or the live feed failed. The page renders
    /// whatever messages it has.
    Degraded(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    /// The project. Its `applications` are moved into the page's own list.
    pub project: Project,
    pub applications: Vec<Application>,
    pub messages: MessageLog,
    pub chat: ChatStatus,
}

impl LoadedPage {
    pub fn new(mut project: Project) -> Self {
        let applications = std::mem::take(&mut project.applications);
        Self {
            project,
            applications,
            messages: MessageLog::new(),
            chat: ChatStatus::Hidden,
        }
    }

    pub fn capabilities(&self, viewer: Option<&Viewer>) -> Capabilities {
        Capabilities::resolve(viewer, &self.project, &self.applications)
    }

    pub fn viewer_application(&self, viewer: &Viewer) -> Option<&Application> {
        permissions::viewer_application(viewer, &self.applications)
    }

    pub fn application(&self, id: &ApplicationId) -> Option<&Application> {
        self.applications.iter().find(|a| &a.id == id)
    }

    pub fn milestone(&self, id: &MilestoneId) -> Option<&Milestone> {
        self.project.milestones.iter().find(|m| &m.id == id)
    }

    /// Set one application's status. Accepting an application also moves the
    /// project to `IN_PROGRESS`. Returns false if the id is unknown.
    pub fn set_application_status(&mut self, id: &ApplicationId, status: ApplicationStatus) -> bool {
        let Some(app) = self.applications.iter_mut().find(|a| &a.id == id) else {
            return false;
        };
        let accepted = status == ApplicationStatus::Accepted;
        app.status = status;
        if accepted {
            self.project.status = ProjectStatus::InProgress;
        }
        true
    }

    /// Append a newly submitted application, replacing any row with the same id.
    pub fn add_application(&mut self, application: Application) {
        match self.applications.iter_mut().find(|a| a.id == application.id) {
            Some(existing) => *existing = application,
            None => self.applications.push(application),
        }
    }

    /// Swap in the server's copy of a milestone. Returns false if the id is
    /// unknown.
    pub fn replace_milestone(&mut self, milestone: Milestone) -> bool {
        match self.project.milestones.iter_mut().find(|m| m.id == milestone.id) {
            Some(existing) => {
                *existing = milestone;
                true
            }
            None => false,
        }
    }

    /// Patch only the status of a milestone, for when the backend returns no row.
    pub fn set_milestone_status(&mut self, id: &MilestoneId, status: MilestoneStatus) -> bool {
        match self.project.milestones.iter_mut().find(|m| &m.id == id) {
            Some(existing) => {
                existing.status = status;
                true
            }
            None => false,
        }
    }
}

/// Snapshot handed to renderers after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub state: PageState,
    pub viewer: Option<Viewer>,
    pub capabilities: Capabilities,
    pub compose: ComposeDraft,
    /// A mutation is in flight. Renderers disable the matching controls.
    pub busy: bool,
}

impl PageView {
    pub fn loading() -> Self {
        Self {
            state: PageState::Loading,
            viewer: None,
            capabilities: Capabilities::default(),
            compose: ComposeDraft::default(),
            busy: false,
        }
    }

    /// Status of the viewer's own application, for the applied banner.
    pub fn applied_status(&self) -> Option<ApplicationStatus> {
        let viewer = self.viewer.as_ref()?;
        let page = self.state.loaded()?;
        page.viewer_application(viewer).map(|a| a.status.clone())
    }

    pub fn show_apply(&self) -> bool {
        self.capabilities.can_apply
    }
}

impl Default for PageView {
    fn default() -> Self {
        Self::loading()
    }
}
