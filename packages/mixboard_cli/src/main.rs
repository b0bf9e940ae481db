use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use mixboard::{
    Action, Channel, ConnectionStatus, Feedback, KEYER_COUNT, KEYER_LABELS, PlayDirection,
    SessionEvent, SessionHandle, Snapshot, Status, TakeMode,
};

mod config;

use crate::config::{DEFAULT_CONFIG_FILE, FileConfig, Overrides};

/// How long to wait for the initial state refresh after connecting
const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "mixboard")]
#[command(about = "Control and monitor a MixBoard video mixer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./mixboard.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device host name or address
    #[arg(long, global = true)]
    host: Option<String>,

    /// Command channel port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Event channel port
    #[arg(long, global = true)]
    event_port: Option<u16>,

    /// Channel to operate on (CH_0 .. CH_3)
    #[arg(long, global = true)]
    channel: Option<Channel>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Log raw device traffic
    #[arg(long, global = true)]
    protocol_log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream state changes until Ctrl-C
    Watch,

    /// Print the synchronized device state
    State,

    /// Take preview to program
    Take {
        /// Transition (CUT, FADE, TR1 .. TR4); defaults to CUT
        #[arg(long)]
        mode: Option<TakeMode>,
    },

    /// Resume a paused transition
    Resume {
        #[arg(long, default_value = "FORWARD")]
        direction: PlayDirection,
    },

    /// Put an input on preview
    Preview { input: u32 },

    /// Put an input on program
    Program { input: u32 },

    /// Play a stopped keyer or stop a playing one
    Keyer {
        /// Keyer id (0 = BKGD, 1 .. 4 = KEY1 .. KEY4)
        keyer: u32,

        /// Play straight to program instead of preview
        #[arg(long)]
        program: bool,
    },

    /// Toggle whether a keyer follows the transition
    Link { keyer: u32 },

    /// Send a raw command line
    Send {
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,

        /// Wait for the response line and print it
        #[arg(long)]
        reply: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut default_directive = if cli.debug {
        "mixboard=debug,mixboard_cli=debug,warn".to_string()
    } else {
        "mixboard=info,mixboard_cli=info,warn".to_string()
    };
    if cli.protocol_log {
        default_directive.push_str(",mixboard::protocol=debug");
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let overrides = Overrides {
        host: cli.host.clone(),
        port: cli.port,
        event_port: cli.event_port,
        protocol_log: cli.protocol_log.then_some(true),
        channel: cli.channel,
    };
    let file_config = FileConfig::load(&config_path, &overrides)?;
    let session_config = file_config.session_config()?;

    let host = session_config.host.clone();
    let session = SessionHandle::spawn(session_config);
    let mut events = session.subscribe();
    session
        .connect()
        .await
        .with_context(|| format!("Failed to connect to MixBoard at {host}"))?;
    wait_for_sync(&mut events).await;

    let result = run(cli.command, &session, &mut events).await;
    session.shutdown().await?;
    result
}

async fn run(
    command: Commands,
    session: &SessionHandle,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    match command {
        Commands::Watch => watch(session, events).await?,
        Commands::State => print_state(&session.snapshot().await?),
        Commands::Take { mode } => {
            session.perform(Action::Take { channel: None, mode }).await?;
        }
        Commands::Resume { direction } => {
            session
                .perform(Action::Resume {
                    channel: None,
                    direction,
                })
                .await?;
        }
        Commands::Preview { input } => {
            session
                .perform(Action::SetPreview {
                    channel: None,
                    input,
                })
                .await?;
        }
        Commands::Program { input } => {
            session
                .perform(Action::SetProgram {
                    channel: None,
                    input,
                })
                .await?;
        }
        Commands::Keyer { keyer, program } => {
            session
                .perform(Action::ToggleKeyer {
                    channel: None,
                    keyer,
                    play_to_preview: !program,
                })
                .await?;
        }
        Commands::Link { keyer } => {
            session
                .perform(Action::ToggleKeyerLink {
                    channel: None,
                    keyer,
                })
                .await?;
        }
        Commands::Send { command, reply } => {
            let line = command.join(" ");
            if reply {
                let response = session
                    .request(line.as_str())
                    .await
                    .with_context(|| format!("No response to {line:?}"))?;
                println!("{response}");
            } else {
                session.send(line).await?;
            }
        }
    }
    Ok(())
}

/// Wait until the mix-state refresh that follows connect has landed.
async fn wait_for_sync(events: &mut broadcast::Receiver<SessionEvent>) {
    let synced = tokio::time::timeout(SYNC_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Feedback(Feedback::All)) => return true,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await;

    if !matches!(synced, Ok(true)) {
        warn!("Device state not synchronized; keyer toggles may pick the wrong command");
    }
}

async fn watch(
    session: &SessionHandle,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    print_state(&session.snapshot().await?);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Feedback(kind)) => {
                    let snapshot = session.snapshot().await?;
                    println!("[{}] {}", kind.as_str(), summary(&snapshot));
                }
                Ok(SessionEvent::InputsRefreshed(inputs)) => {
                    for (id, name) in inputs {
                        println!("[inputs] {id}: {name}");
                    }
                }
                Ok(SessionEvent::Connection { port, status }) => {
                    println!("[{port}] {}", describe(&status));
                    if port == mixboard::Port::Command
                        && matches!(status, ConnectionStatus::Disconnected(_))
                    {
                        warn!("Command channel lost; stopping watch");
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Dropped {} session events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}

fn describe(status: &ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Connecting => "connecting".to_string(),
        ConnectionStatus::Ok => "ok".to_string(),
        ConnectionStatus::Failed(e) => format!("failed: {e}"),
        ConnectionStatus::Disconnected(Some(e)) => format!("disconnected: {e}"),
        ConnectionStatus::Disconnected(None) => "disconnected".to_string(),
    }
}

fn summary(snapshot: &Snapshot) -> String {
    let find = |status: Status| {
        snapshot
            .state
            .video_inputs()
            .find(|i| i.has_status(status))
            .map(|i| format!("{} ({})", i.id, i.name))
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "{} program={} preview={}",
        snapshot.channel.label(),
        find(Status::Program),
        find(Status::Preview)
    )
}

fn print_state(snapshot: &Snapshot) {
    let view = snapshot.feedback();
    println!(
        "channel {}  take mode {}",
        snapshot.channel.label(),
        snapshot.state.take_mode(snapshot.channel)
    );

    println!("inputs (max {}):", snapshot.max_video_input());
    for input in snapshot.state.video_inputs() {
        let mut tally = String::new();
        if view.program_video_input(input.id) {
            tally.push_str(" PGM");
        }
        if view.preview_video_input(input.id) {
            tally.push_str(" PVW");
        }
        println!("  {:>3}  {:<20}{}", input.id, input.name, tally);
    }

    println!("keyers:");
    for (id, label) in (0..KEYER_COUNT as u32).zip(KEYER_LABELS) {
        let keyer = snapshot.state.keyer(id);
        let status = match keyer.status {
            Status::Stopped => "stopped",
            Status::Preview => "preview",
            Status::Program => "program",
        };
        let link = if keyer.link_enabled { " linked" } else { "" };
        println!("  {label:<5} {status}{link}");
    }
}
