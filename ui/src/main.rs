mod components;

use tracing_subscriber::EnvFilter;

use labmatch_common::project::ProjectId;
use labmatch_gateway::GatewayConfig;

use components::app::{App, Settings};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Project id from the first argument, else LABMATCH_PROJECT_ID.
    let Some(project_id) = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LABMATCH_PROJECT_ID").ok())
        .filter(|id| !id.trim().is_empty())
    else {
        eprintln!("usage: labmatch-ui <project-id>");
        std::process::exit(2);
    };

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("labmatch-ui: {e}");
            std::process::exit(1);
        }
    };

    dioxus::LaunchBuilder::new()
        .with_context(Settings {
            project_id: ProjectId(project_id),
            config,
        })
        .launch(App);
}
