mod attachment;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::channel::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use labmatch_common::application::{ApplicationDraft, ApplicationId, ApplicationStatus};
use labmatch_common::backend::ProjectBackend;
use labmatch_common::identity::{UserId, Viewer};
use labmatch_common::milestone::MilestoneId;
use labmatch_common::notice::LogNotifier;
use labmatch_common::page::{PageState, PageView};
use labmatch_common::project::ProjectId;
use labmatch_common::session::{PageCommand, ProjectSession};
use labmatch_gateway::{GatewayConfig, RealtimeClient, RestBackend};

type Session<'a> = ProjectSession<&'a RestBackend, &'a RealtimeClient, LogNotifier>;

#[derive(Parser)]
#[command(name = "labmatch-console", about = "View and work on a LabMatch project from the terminal")]
struct Cli {
    /// Backend base URL (defaults to the build-time LABMATCH_URL or the local stack).
    #[arg(long, env = "LABMATCH_URL")]
    url: Option<String>,

    /// Public API key.
    #[arg(long, env = "LABMATCH_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    /// Session token of the signed-in user.
    #[arg(long, env = "LABMATCH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Signed-in user id. Without it the project is shown read-only.
    #[arg(long, env = "LABMATCH_USER_ID")]
    user_id: Option<String>,

    /// Storage bucket for chat attachments.
    #[arg(long, env = "LABMATCH_ATTACHMENT_BUCKET")]
    bucket: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the project page.
    Show { project_id: String },

    /// Follow the project chat. Each line on stdin is sent as a message;
    /// `/attach <path>` stages a file, `/reload` refetches, `/quit` exits.
    Watch { project_id: String },

    /// Send one chat message.
    Send {
        project_id: String,
        text: Option<String>,
        /// File to upload with the message.
        #[arg(long)]
        attach: Option<PathBuf>,
    },

    /// Apply to an open project.
    Apply {
        project_id: String,
        proposal: String,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        availability: Option<String>,
        /// Portfolio or publication link (repeatable).
        #[arg(long = "link")]
        links: Vec<String>,
    },

    /// Change an application's status (project owner only).
    SetStatus {
        project_id: String,
        application_id: String,
        /// PENDING, SHORTLISTED, ACCEPTED or REJECTED.
        status: ApplicationStatus,
    },

    /// Mark a milestone completed (project owner only).
    Complete { project_id: String, milestone_id: String },
}

impl Command {
    fn project_id(&self) -> &str {
        match self {
            Command::Show { project_id }
            | Command::Watch { project_id }
            | Command::Send { project_id, .. }
            | Command::Apply { project_id, .. }
            | Command::SetStatus { project_id, .. }
            | Command::Complete { project_id, .. } => project_id,
        }
    }
}

fn gateway_config(cli: &Cli) -> GatewayConfig {
    let url = cli.url.clone().unwrap_or_else(GatewayConfig::default_url);
    let mut config = GatewayConfig::new(url, cli.anon_key.clone());
    config.access_token = cli.access_token.clone();
    config.user_id = cli.user_id.clone().map(UserId);
    if let Some(bucket) = &cli.bucket {
        config.attachment_bucket = bucket.clone();
    }
    config
}

/// Look up the signed-in user's role. Falls back to read-only on failure.
async fn resolve_viewer(backend: &RestBackend, user_id: Option<&UserId>) -> Option<Viewer> {
    let user_id = user_id?;
    match backend.get_profile(user_id).await {
        Ok(profile) => {
            info!("Signed in as {} ({user_id})", profile.display_name());
            Some(Viewer::from_profile(&profile))
        }
        Err(e) => {
            warn!("Could not load profile for {user_id}: {e}; continuing read-only");
            None
        }
    }
}

async fn execute(session: &mut Session<'_>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Show { .. } | Command::Watch { .. } => {}
        Command::Send { text, attach, .. } => {
            session.edit_message(text.unwrap_or_default());
            if let Some(path) = attach {
                session.attach(attachment::load(&path)?);
            }
            session.send_message().await?;
        }
        Command::Apply {
            proposal,
            rate,
            availability,
            links,
            ..
        } => {
            let mut draft = ApplicationDraft::new(proposal);
            draft.rate = rate;
            draft.availability = availability;
            draft.links = links;
            session.apply(draft).await?;
        }
        Command::SetStatus {
            application_id,
            status,
            ..
        } => {
            session
                .set_application_status(&ApplicationId(application_id), status)
                .await?;
        }
        Command::Complete { milestone_id, .. } => {
            session.complete_milestone(&MilestoneId(milestone_id)).await?;
        }
    }
    print!("{}", render::page(&session.view()));
    Ok(())
}

async fn watch(session: &mut Session<'_>) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::unbounded();
    spawn_stdin_reader(tx).context("Failed to start stdin reader")?;

    let mut printed: Option<usize> = None;
    let observe = |view: &PageView| match &view.state {
        PageState::Loaded(page) => {
            let total = page.messages.len();
            match printed {
                None => print!("{}", render::page(view)),
                Some(seen) => {
                    for message in page.messages.messages().iter().skip(seen) {
                        println!("{}", render::message_line(message));
                    }
                }
            }
            printed = Some(total);
        }
        PageState::Failed(reason) => eprintln!("Error: {reason}"),
        PageState::Loading => {}
    };

    tokio::select! {
        _ = session.run(rx, observe) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    session.close();
    Ok(())
}

/// What one line typed during `watch` asks for.
#[derive(Debug)]
enum LineAction {
    Ignore,
    Quit,
    Send(Vec<PageCommand>),
}

fn interpret(line: &str) -> LineAction {
    let line = line.trim();
    match line {
        "" => LineAction::Ignore,
        "/quit" => LineAction::Quit,
        "/reload" => LineAction::Send(vec![PageCommand::Reload]),
        _ => match line.strip_prefix("/attach ") {
            Some(path) => match attachment::load(Path::new(path.trim())) {
                Ok(file) => LineAction::Send(vec![PageCommand::Attach(file)]),
                Err(e) => {
                    warn!("{e:#}");
                    LineAction::Ignore
                }
            },
            None => LineAction::Send(vec![
                PageCommand::EditMessage(line.to_string()),
                PageCommand::SendMessage,
            ]),
        },
    }
}

/// Read stdin on its own thread. A blocking read there never holds up
/// runtime shutdown. The sender drops when input ends or `/quit` is typed,
/// which ends the session loop.
fn spawn_stdin_reader(commands: mpsc::UnboundedSender<PageCommand>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read stdin: {e}");
                        break;
                    }
                };
                match interpret(&line) {
                    LineAction::Ignore => {}
                    LineAction::Quit => break,
                    LineAction::Send(batch) => {
                        if batch.into_iter().any(|c| commands.unbounded_send(c).is_err()) {
                            break;
                        }
                    }
                }
            }
        })?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = gateway_config(&cli);
    let backend = RestBackend::new(config.clone()).context("Failed to build HTTP client")?;
    let realtime = RealtimeClient::new(config.clone());
    let viewer = resolve_viewer(&backend, config.user_id.as_ref()).await;

    let project_id = ProjectId(cli.command.project_id().to_string());
    let mut session = ProjectSession::new(project_id, viewer, &backend, &realtime, LogNotifier)
        .with_attachment_bucket(config.attachment_bucket.clone());

    if let Command::Watch { .. } = cli.command {
        return watch(&mut session).await;
    }

    session.load().await;
    if let PageState::Failed(reason) = session.state() {
        bail!("{reason}");
    }
    let result = execute(&mut session, cli.command).await;
    session.close();
    result
}
