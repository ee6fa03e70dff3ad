//! clipvote daemon: runs the shared-state hub or an interactive observer.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clipvote_node::{
    connect_observer, init_logging, run_hub, NodeConfig, ObserverCommand, ObserverEvent,
    ShutdownController, View,
};
use clipvote_types::CandidateId;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "clipvote-daemon", about = "Clip voting hub and observer")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port the hub listens on.
    #[arg(long, env = "CLIPVOTE_HUB_PORT")]
    hub_port: Option<u16>,

    /// Hub WebSocket URL for observers.
    #[arg(long, env = "CLIPVOTE_HUB_URL")]
    hub_url: Option<String>,

    /// Data directory for the device lock store.
    #[arg(long, env = "CLIPVOTE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Fixed device identifier (generated on first start when absent).
    #[arg(long, env = "CLIPVOTE_DEVICE_ID")]
    device_id: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CLIPVOTE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CLIPVOTE_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the shared-state hub.
    Serve,
    /// Connect to a hub and vote from stdin.
    ///
    /// Commands: a candidate number to vote, "reveal", "new-round", "quit".
    Observe,
}

impl Cli {
    /// File settings first, then CLI flags and env vars on top.
    fn resolve_config(&self) -> anyhow::Result<NodeConfig> {
        let base = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };
        let config = NodeConfig {
            hub_port: self.hub_port.unwrap_or(base.hub_port),
            hub_url: self.hub_url.clone().unwrap_or(base.hub_url),
            data_dir: self.data_dir.clone().unwrap_or(base.data_dir),
            device_id: self.device_id.clone().or(base.device_id),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            log_format: self.log_format.clone().unwrap_or(base.log_format),
            voting: base.voting,
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.log_format()?, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown.clone().shutdown_on_signal());

    match cli.command {
        Command::Serve => {
            tracing::info!(port = config.hub_port, "starting hub");
            run_hub(&config, shutdown.subscribe()).await?;
        }
        Command::Observe => observe(&config, &shutdown).await?,
    }
    Ok(())
}

async fn observe(config: &NodeConfig, shutdown: &ShutdownController) -> anyhow::Result<()> {
    let (observer, mut channels) = connect_observer(config)
        .await
        .with_context(|| format!("connecting to {}", config.hub_url))?;
    let task = tokio::spawn(observer.run(shutdown.subscribe()));
    let mut stop = shutdown.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_view(&channels.view.borrow_and_update());

    loop {
        tokio::select! {
            _ = stop.recv() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    let _ = channels.commands.send(ObserverCommand::Shutdown);
                    break;
                };
                match parse_command(line.trim()) {
                    Some(command) => {
                        let quit = command == ObserverCommand::Shutdown;
                        if channels.commands.send(command).is_err() || quit {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("unknown command: {}", line.trim()),
                }
            }
            changed = channels.view.changed() => {
                if changed.is_err() { break; }
                print_view(&channels.view.borrow_and_update());
            }
            event = channels.events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
            }
        }
    }

    task.await.context("observer task")?;
    Ok(())
}

fn parse_command(input: &str) -> Option<ObserverCommand> {
    match input {
        "reveal" => Some(ObserverCommand::Reveal),
        "new-round" => Some(ObserverCommand::NewRound),
        "quit" => Some(ObserverCommand::Shutdown),
        other => other.parse::<CandidateId>().ok().map(ObserverCommand::Vote),
    }
}

fn print_view(view: &View) {
    let counts: Vec<String> = view
        .tally
        .iter()
        .map(|(candidate, votes)| format!("{candidate}:{votes}"))
        .collect();
    let mut line = format!("[{}] {}", view.round, counts.join(" "));
    if !view.can_vote {
        line.push_str(" (voted)");
    }
    if let Some(secs) = view.countdown_secs {
        line.push_str(&format!(" reveal in {secs}s"));
    }
    if view.revealed {
        line.push_str(" (revealed)");
    }
    println!("{line}");
}

fn print_event(event: &ObserverEvent) {
    match event {
        ObserverEvent::Voted(candidate) => println!("voted for clip {candidate}"),
        ObserverEvent::AlreadyVoted => println!("already voted this round"),
        ObserverEvent::Rejected(reason) => println!("rejected: {reason}"),
        ObserverEvent::RevealArmed { deadline } => println!("reveal armed for {deadline}"),
        ObserverEvent::RoundAdvanced(round) => println!("started {round}"),
        ObserverEvent::ShowWinner(candidate) => println!("winner: clip {candidate}"),
        ObserverEvent::NoWinner => println!("no unique winner"),
    }
}
