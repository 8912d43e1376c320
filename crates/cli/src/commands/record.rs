//! Recording commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use recplay_common::{RecordingStatus, RecordingSummary};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use crate::client::DaemonClient;
use crate::commands::tests::TestDisplay;
use crate::output::{
    format_timestamp, print_info, print_item, print_list, print_success, print_value,
    print_warning, truncate, OutputFormat, TableDisplay,
};

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Start recording a new test against a URL
    Start {
        /// Page to open in the recorder
        url: String,

        /// Name for the resulting test
        #[arg(short, long)]
        name: String,

        /// Follow the generated code until the recorder exits
        #[arg(short, long)]
        watch: bool,

        /// Save the recording once the recorder exits (requires --watch)
        #[arg(long, requires = "watch")]
        save: bool,

        /// Poll interval while watching, in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },

    /// Show a recording session and the code generated so far
    Status {
        /// Session ID
        id: String,
    },

    /// Save a recording session as a test
    Save {
        /// Session ID
        id: String,

        /// Override the test name given at start
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Stop a recording session and discard its output
    Stop {
        /// Session ID
        id: String,
    },

    /// List recording sessions
    List,
}

/// Recording session display wrapper
#[derive(Serialize)]
pub struct RecordingDisplay {
    pub session_id: String,
    pub test_name: String,
    pub target_url: String,
    pub state: String,
    pub started: String,
    pub age_secs: u64,
    pub pid: Option<u32>,
}

impl From<RecordingSummary> for RecordingDisplay {
    fn from(s: RecordingSummary) -> Self {
        Self {
            session_id: s.session_id,
            test_name: s.test_name,
            target_url: s.target_url,
            state: s.state.to_string(),
            started: format_timestamp(s.started_at),
            age_secs: s.age_secs,
            pid: s.pid,
        }
    }
}

impl TableDisplay for RecordingDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Session", "Test", "URL", "State", "Started", "Age", "PID"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.session_id.clone(),
            self.test_name.clone(),
            truncate(&self.target_url, 48),
            self.state.clone(),
            self.started.clone(),
            format!("{}s", self.age_secs),
            self.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
        ]
    }
}

/// Status display wrapper
#[derive(Serialize)]
pub struct StatusDisplay {
    pub session_id: String,
    pub state: String,
    pub running: bool,
    pub exit_code: Option<i32>,
    pub code_lines: usize,
}

impl From<&RecordingStatus> for StatusDisplay {
    fn from(s: &RecordingStatus) -> Self {
        Self {
            session_id: s.session_id.clone(),
            state: s.state.to_string(),
            running: s.running,
            exit_code: s.exit_code,
            code_lines: s.code.lines().count(),
        }
    }
}

impl TableDisplay for StatusDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Session", "State", "Running", "Exit", "Lines"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.session_id.clone(),
            self.state.clone(),
            self.running.to_string(),
            self.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            self.code_lines.to_string(),
        ]
    }
}

pub async fn execute(cmd: RecordCommands, client: DaemonClient, format: OutputFormat) -> Result<()> {
    match cmd {
        RecordCommands::Start {
            url,
            name,
            watch,
            save,
            interval_ms,
        } => {
            let id = client.start_recording(&url, &name).await?;
            if !watch {
                print_value(&serde_json::json!({ "session_id": id }), &id, format);
                return Ok(());
            }

            print_success(&format!("Recording '{}' started as {}", name, id));
            print_info("Interact with the browser window; close it when done");
            let status = follow(&client, &id, Duration::from_millis(interval_ms)).await?;

            match status {
                Some(status) if save => {
                    if status.code.trim().is_empty() {
                        print_warning("Recorder produced no code");
                    }
                    let test = client.save_recording(&id, None).await?;
                    print_success(&format!("Saved test '{}' ({})", test.name, test.id));
                    print_item(&TestDisplay::from(test), format);
                }
                Some(_) => {
                    print_info(&format!(
                        "Recorder exited; run `recplay record save {}` to keep the test",
                        id
                    ));
                }
                None => print_info(&format!("Stopped watching {}; the session is still open", id)),
            }
        }

        RecordCommands::Status { id } => {
            let status = client.recording_status(&id).await?;
            if format.is_human() {
                print_item(&StatusDisplay::from(&status), format);
                print_code(&status.code);
            } else {
                print_value(&status, "", format);
            }
        }

        RecordCommands::Save { id, name } => {
            let test = client.save_recording(&id, name).await?;
            if format.is_human() {
                print_success(&format!("Saved test '{}' ({})", test.name, test.id));
            }
            print_item(&TestDisplay::from(test), format);
        }

        RecordCommands::Stop { id } => {
            client.stop_recording(&id).await?;
            print_success(&format!("Recording {} stopped", id));
        }

        RecordCommands::List => {
            let list = client.list_recordings().await?;
            let displays: Vec<RecordingDisplay> =
                list.into_iter().map(RecordingDisplay::from).collect();
            print_list(&displays, format);
        }
    }

    Ok(())
}

/// Poll a session, echoing newly generated code, until the recorder exits.
/// Returns `None` when interrupted.
async fn follow(
    client: &DaemonClient,
    id: &str,
    interval: Duration,
) -> Result<Option<RecordingStatus>> {
    let mut shown = 0usize;

    loop {
        let status = client.recording_status(id).await?;

        // The artifact is rewritten as a whole; only print what is new
        if status.code.len() < shown || !status.code.is_char_boundary(shown) {
            shown = 0;
        }
        let fresh = &status.code[shown..];
        if !fresh.is_empty() {
            print!("{}", fresh.dimmed());
            let _ = std::io::stdout().flush();
            shown = status.code.len();
        }

        if !status.running {
            println!();
            return Ok(Some(status));
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(None);
            }
        }
    }
}

fn print_code(code: &str) {
    if code.trim().is_empty() {
        println!("{}", "(no code recorded yet)".dimmed());
    } else {
        println!("{}", code.trim_end());
    }
}
