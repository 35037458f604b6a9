//! HabitQuest watcher: connect to the push server and stream derived
//! notifications and celebration signals to the terminal.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use habitquest_core::{derive_notifications, CelebrationKind, NotificationCategory, SessionToken};
use habitquest_runtime::{PushClient, PushConfig};
use tracing::info;

mod config;

use config::FileConfig;

#[derive(Parser, Debug)]
#[command(name = "habitquest", about = "Watch the HabitQuest real-time event stream")]
struct Cli {
    /// Push server base URL, e.g. ws://localhost:8000
    #[arg(long)]
    url: Option<String>,

    /// Session credential; falls back to `token` in the config file
    #[arg(long, env = "HABITQUEST_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let (mut push_config, file_token) = load_configuration(&cli)?;
    if let Some(url) = &cli.url {
        push_config.base_url = url.clone();
    }

    // Flag and env win over the config file
    let raw_token = cli
        .token
        .clone()
        .or(file_token)
        .context("no session token given (use --token, HABITQUEST_TOKEN, or the config file)")?;
    let session = SessionToken::new(raw_token).context("invalid session token")?;

    let mut client = PushClient::new(push_config)?;
    let mut events = client.subscribe_events();
    let mut celebrations = client.subscribe_celebrations();
    let mut state = client.state();

    client.start(session).await?;
    info!("watching for events, Ctrl-C to exit");

    loop {
        tokio::select! {
            maybe_event = events.receiver.recv() => match maybe_event {
                Some(event) => {
                    for notification in derive_notifications(std::slice::from_ref(&event)) {
                        print_notification(&notification);
                    }
                }
                None => break,
            },
            maybe_kind = celebrations.receiver.recv() => match maybe_kind {
                Some(CelebrationKind::LevelUp) => println!("*** Level up! ***"),
                Some(CelebrationKind::Achievement) => println!("*** Achievement unlocked! ***"),
                None => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(state = %*state.borrow(), "connection state");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    client.stop().await;
    Ok(())
}

fn print_notification(notification: &habitquest_core::Notification) {
    let label = match notification.category {
        NotificationCategory::RiskAlert => "risk",
        NotificationCategory::Nudge => "nudge",
        NotificationCategory::Activity => "activity",
        NotificationCategory::GoalCompleted => "goal",
    };
    match &notification.detail {
        Some(detail) => println!("[{label}] {}: {detail}", notification.headline),
        None => println!("[{label}] {}", notification.headline),
    }
}

/// Load configuration from file or use defaults, keeping any file token
fn load_configuration(cli: &Cli) -> anyhow::Result<(PushConfig, Option<String>)> {
    match &cli.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            let file = FileConfig::load(path)?;
            let token = file.token().map(str::to_string);
            Ok((file.into_push_config(), token))
        }
        None => Ok((PushConfig::default(), None)),
    }
}

fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}
