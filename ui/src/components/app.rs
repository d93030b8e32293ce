use dioxus::prelude::*;

use labmatch_common::page::PageView;
use labmatch_common::project::ProjectId;
use labmatch_gateway::GatewayConfig;

use super::project_details::ProjectDetails;
use super::session_api::use_session_coroutine;
use super::toast::{use_toast_coroutine, ToastStack, Toasts};

/// Launch settings handed in from `main`.
#[derive(Clone, Debug)]
pub struct Settings {
    pub project_id: ProjectId,
    pub config: GatewayConfig,
}

#[component]
pub fn App() -> Element {
    let settings = use_context::<Settings>();
    use_context_provider(|| Signal::new(PageView::loading()));
    use_context_provider(|| Signal::new(Toasts::default()));

    let notices = use_toast_coroutine();
    use_session_coroutine(settings, notices.tx());

    rsx! {
        div { class: "labmatch-app",
            header { class: "app-header",
                h1 { "LabMatch" }
                p { "Research projects, matched with the people who can do them" }
            }
            main {
                ProjectDetails {}
            }
            ToastStack {}
        }
    }
}
