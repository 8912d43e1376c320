//! AI assistance commands

use anyhow::{Context, Result};
use clap::Subcommand;
use recplay_common::{AiRequestKind, AiResponse, AnalysisResult};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::client::DaemonClient;
use crate::output::{print_item, print_value, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum AiCommands {
    /// Extract intent, steps and assertions from a recording
    Analyze {
        /// JSON payload file, or `-` for stdin
        payload: PathBuf,
    },

    /// Generate test code from approved intent
    Generate {
        /// JSON payload file, or `-` for stdin
        payload: PathBuf,
    },
}

#[derive(Serialize)]
struct AnalysisDisplay {
    intent: String,
    steps: usize,
    assertions: usize,
    confidence: f64,
}

impl From<&AnalysisResult> for AnalysisDisplay {
    fn from(a: &AnalysisResult) -> Self {
        Self {
            intent: a.intent.clone(),
            steps: a.steps.len(),
            assertions: a.assertions.len(),
            confidence: a.confidence,
        }
    }
}

impl TableDisplay for AnalysisDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Intent", "Steps", "Assertions", "Confidence"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.intent.clone(),
            self.steps.to_string(),
            self.assertions.to_string(),
            format!("{:.2}", self.confidence),
        ]
    }
}

/// Read a payload; files that are not JSON are sent as a string
pub fn read_payload(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading payload {}", path.display()))?
    };
    Ok(parse_payload(&raw))
}

fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub async fn execute(cmd: AiCommands, client: DaemonClient, format: OutputFormat) -> Result<()> {
    let (kind, path) = match cmd {
        AiCommands::Analyze { payload } => (AiRequestKind::Analyze, payload),
        AiCommands::Generate { payload } => (AiRequestKind::Generate, payload),
    };

    let payload = read_payload(&path)?;
    let response = client.ai(kind, payload).await?;

    match (&response, format.is_human()) {
        (AiResponse::Generate { code }, true) => println!("{}", code),
        (AiResponse::Analyze(analysis), true) => {
            print_item(&AnalysisDisplay::from(analysis), format);
            if !analysis.steps.is_empty() {
                println!("{}", serde_json::to_string_pretty(&analysis.steps)?);
            }
        }
        (_, false) => print_value(&response, "", format),
    }

    Ok(())
}
