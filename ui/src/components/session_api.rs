use dioxus::prelude::*;
use futures::channel::mpsc::UnboundedSender;

use labmatch_common::backend::ProjectBackend;
use labmatch_common::identity::Viewer;
use labmatch_common::notice::{Notice, Notifier};
use labmatch_common::page::{PageState, PageView};
use labmatch_common::session::{PageCommand, ProjectSession};
use labmatch_gateway::{RealtimeClient, RestBackend};

use super::app::Settings;
use super::page_state::use_page_view;

/// Start the coroutine that owns the page session.
///
/// Every snapshot the session produces is copied into the shared
/// `Signal<PageView>`; components send `PageCommand`s back through
/// [`use_page_action`](super::page_state::use_page_action).
pub fn use_session_coroutine(settings: Settings, notices: UnboundedSender<Notice>) {
    let mut view = use_page_view();

    use_coroutine(move |rx: UnboundedReceiver<PageCommand>| {
        let settings = settings.clone();
        let notices = notices.clone();
        async move {
            let backend = match RestBackend::new(settings.config.clone()) {
                Ok(backend) => backend,
                Err(e) => {
                    tracing::error!("Failed to build HTTP client: {e}");
                    notices.post(Notice::error(format!("Could not start: {e}")));
                    view.set(PageView {
                        state: PageState::Failed(e.to_string()),
                        ..PageView::loading()
                    });
                    return;
                }
            };
            let feed = RealtimeClient::new(settings.config.clone());
            let viewer = resolve_viewer(&backend).await;

            let mut session = ProjectSession::new(
                settings.project_id.clone(),
                viewer,
                backend,
                feed,
                notices,
            )
            .with_attachment_bucket(settings.config.attachment_bucket.clone());

            session.run(rx, |snapshot| view.set(snapshot.clone())).await;
            tracing::debug!("Session for {} closed", settings.project_id);
        }
    });
}

async fn resolve_viewer(backend: &RestBackend) -> Option<Viewer> {
    let user_id = backend.config().user_id.clone()?;
    match backend.get_profile(&user_id).await {
        Ok(profile) => Some(Viewer::from_profile(&profile)),
        Err(e) => {
            tracing::warn!("Could not load profile for {user_id}: {e}");
            None
        }
    }
}
