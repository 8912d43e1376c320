//! Recplay CLI - Main Entry Point

use clap::{Parser, Subcommand};
use recplay_cli::client::DaemonClient;
use recplay_cli::commands::{ai, record, replay, tests};
use recplay_cli::output::{self, OutputFormat};
use recplay_common::SessionKind;

/// Recplay CLI - record browser sessions and replay them as tests
#[derive(Parser)]
#[command(name = "recplay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Daemon address
    #[arg(long, default_value = "http://127.0.0.1:7070", env = "RECPLAY_DAEMON", global = true)]
    daemon_addr: String,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record browser sessions
    #[command(subcommand)]
    Record(record::RecordCommands),

    /// Replay plan files
    Replay(replay::ReplayArgs),

    /// Manage saved tests
    #[command(subcommand)]
    Tests(tests::TestCommands),

    /// AI-assisted analysis and code generation
    #[command(subcommand)]
    Ai(ai::AiCommands),

    /// List active sessions
    Sessions,

    /// Check daemon status
    Status,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let client = DaemonClient::new(&cli.daemon_addr);

    let ok = match cli.command {
        Commands::Record(cmd) => record::execute(cmd, client?, cli.format).await.map(|_| true),
        Commands::Replay(args) => replay::execute(args, client, cli.format).await,
        Commands::Tests(cmd) => tests::execute(cmd, client?, cli.format).await,
        Commands::Ai(cmd) => ai::execute(cmd, client?, cli.format).await.map(|_| true),
        Commands::Sessions => {
            let sessions = client?.list_sessions().await?;
            let displays: Vec<SessionDisplay> =
                sessions.into_iter().map(SessionDisplay::from).collect();
            output::print_list(&displays, cli.format);
            Ok(true)
        }
        Commands::Status => {
            match client?.health_check().await {
                Ok(health) => {
                    output::print_success(&format!(
                        "Daemon is running at {} (v{}, {} session(s))",
                        cli.daemon_addr,
                        health["version"].as_str().unwrap_or("?"),
                        health["sessions"].as_u64().unwrap_or(0)
                    ));
                    Ok(true)
                }
                Err(e) => {
                    output::print_error(&format!("{}", e));
                    Ok(false)
                }
            }
        }
        Commands::Version => {
            println!("Recplay CLI v{}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    };

    match ok {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

#[derive(serde::Serialize)]
struct SessionDisplay {
    session_id: String,
    kind: &'static str,
    target_url: String,
    started: String,
}

impl From<recplay_common::SessionSummary> for SessionDisplay {
    fn from(s: recplay_common::SessionSummary) -> Self {
        Self {
            session_id: s.session_id,
            kind: match s.kind {
                SessionKind::Recording => "recording",
                SessionKind::Replay => "replay",
            },
            target_url: s.target_url,
            started: output::format_timestamp(s.started_at),
        }
    }
}

impl output::TableDisplay for SessionDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Session", "Kind", "URL", "Started"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.session_id.clone(),
            self.kind.to_string(),
            self.target_url.clone(),
            self.started.clone(),
        ]
    }
}
