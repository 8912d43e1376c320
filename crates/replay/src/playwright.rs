//! Playwright browser automation through a long-lived node bridge
//!
//! The bridge is a small script run with `node -e` from a directory where the
//! `playwright` package resolves. It launches one browser page and then
//! answers line-delimited JSON requests on stdin:
//!
//! ```text
//! <- {"ready": true}
//! -> {"id": 1, "op": "click", "selector": "#go", "timeout": 5000}
//! <- {"id": 1, "ok": true}
//! -> {"id": 2, "op": "fill", "selector": "#q", "value": "x", "timeout": 5000}
//! <- {"id": 2, "ok": false, "error": "locator.fill: Timeout 5000ms exceeded."}
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::driver::{BrowserDriver, DriverFactory};
use crate::error::{DriverResult, ReplayError};

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');
const opts = JSON.parse(process.argv[1] || '{}');
const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const message = (err) => String((err && err.message) || err);

(async () => {
  let browser, page;
  try {
    browser = await playwright[opts.browser || 'chromium'].launch({ headless: opts.headless !== false });
    const context = await browser.newContext({ viewport: { width: opts.width, height: opts.height } });
    page = await context.newPage();
  } catch (err) {
    send({ ready: false, error: message(err) });
    process.exit(1);
  }
  send({ ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (err) {
      send({ id: null, ok: false, error: 'malformed request' });
      continue;
    }
    try {
      switch (req.op) {
        case 'goto': await page.goto(req.url, { timeout: req.timeout }); break;
        case 'click': await page.locator(req.selector).click({ timeout: req.timeout }); break;
        case 'fill': await page.locator(req.selector).fill(req.value, { timeout: req.timeout }); break;
        case 'wait': await page.waitForTimeout(req.ms); break;
        case 'close':
          await browser.close();
          send({ id: req.id, ok: true });
          process.exit(0);
        default: throw new Error('unknown op ' + req.op);
      }
      send({ id: req.id, ok: true });
    } catch (err) {
      send({ id: req.id, ok: false, error: message(err) });
    }
  }
  await browser.close();
})();
"#;

/// Extra time granted on the Rust side beyond the timeout passed to the bridge,
/// so that Playwright's own (more descriptive) timeout error wins.
const RESPONSE_SLACK: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(ReplayError::Launch(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Node executable
    pub node_binary: PathBuf,
    /// Directory the bridge runs in; `playwright` must resolve from here
    pub working_dir: Option<PathBuf>,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How long to wait for the browser to come up
    pub launch_timeout: Duration,
    /// Timeout for page navigations
    pub navigation_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            working_dir: None,
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            launch_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

/// Launches a fresh bridge (and browser) per replay
#[derive(Debug, Clone, Default)]
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
}

impl PlaywrightFactory {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for PlaywrightFactory {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserDriver>> {
        let driver = PlaywrightDriver::launch(self.config.clone()).await?;
        Ok(Box::new(driver))
    }
}

/// A response line from the bridge
#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Playwright browser handle
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    closed: bool,
    config: PlaywrightConfig,
}

impl PlaywrightDriver {
    /// Start the bridge and wait until the browser page is ready
    pub async fn launch(config: PlaywrightConfig) -> DriverResult<Self> {
        let options = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "width": config.viewport_width,
            "height": config.viewport_height,
        });

        let mut cmd = Command::new(&config.node_binary);
        cmd.arg("-e")
            .arg(BRIDGE_SCRIPT)
            .arg(options.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ReplayError::Launch(format!(
                "failed to spawn {}: {}",
                config.node_binary.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReplayError::Launch("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReplayError::Launch("bridge stdout unavailable".into()))?;

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            closed: false,
            config,
        };

        let launch_timeout = driver.config.launch_timeout;
        let ready = timeout(launch_timeout, driver.read_response()).await;
        match ready {
            Ok(Ok(resp)) if resp.ready == Some(true) => {
                info!(
                    "Launched {} (pid: {:?})",
                    driver.config.browser.as_str(),
                    driver.child.id()
                );
                Ok(driver)
            }
            Ok(Ok(resp)) => Err(ReplayError::Launch(
                resp.error.unwrap_or_else(|| "bridge did not report ready".into()),
            )),
            Ok(Err(e)) => Err(ReplayError::Launch(e.to_string())),
            Err(_) => Err(ReplayError::Launch(format!(
                "browser not ready after {} ms",
                launch_timeout.as_millis()
            ))),
        }
    }

    async fn read_response(&mut self) -> DriverResult<BridgeResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| ReplayError::Bridge("bridge exited".into()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<BridgeResponse>(line) {
                Ok(resp) => return Ok(resp),
                // Browsers occasionally write to stdout; skip anything that isn't ours
                Err(_) => debug!("bridge: {}", line),
            }
        }
    }

    /// Send one request and wait for its response
    async fn request(&mut self, op: &str, mut body: Value, wait: Duration) -> DriverResult<()> {
        if self.closed {
            return Err(ReplayError::Bridge("browser already closed".into()));
        }

        self.next_id += 1;
        let id = self.next_id;
        body["id"] = json!(id);
        body["op"] = json!(op);

        let mut line = body.to_string();
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let limit = wait + RESPONSE_SLACK;
        let resp = timeout(limit, async {
            loop {
                let resp = self.read_response().await?;
                if resp.id == Some(id) {
                    return Ok::<_, ReplayError>(resp);
                }
            }
        })
        .await
        .map_err(|_| ReplayError::Timeout {
            op: op.to_string(),
            ms: limit.as_millis() as u64,
        })??;

        into_outcome(resp)
    }
}

fn into_outcome(resp: BridgeResponse) -> DriverResult<()> {
    if resp.ok {
        Ok(())
    } else {
        Err(ReplayError::Driver(
            resp.error.unwrap_or_else(|| "unknown browser error".into()),
        ))
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn goto_url(&mut self, url: &str) -> DriverResult<()> {
        let nav = self.config.navigation_timeout;
        self.request(
            "goto",
            json!({ "url": url, "timeout": nav.as_millis() as u64 }),
            nav,
        )
        .await
    }

    async fn locator_click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.request(
            "click",
            json!({ "selector": selector, "timeout": timeout.as_millis() as u64 }),
            timeout,
        )
        .await
    }

    async fn locator_fill(
        &mut self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.request(
            "fill",
            json!({ "selector": selector, "value": value, "timeout": timeout.as_millis() as u64 }),
            timeout,
        )
        .await
    }

    async fn wait_for(&mut self, duration: Duration) -> DriverResult<()> {
        self.request("wait", json!({ "ms": duration.as_millis() as u64 }), duration)
            .await
    }

    async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }

        let result = self.request("close", json!({}), Duration::from_secs(5)).await;
        self.closed = true;

        if let Err(e) = result {
            warn!("Browser did not close cleanly: {}", e);
            let _ = self.child.start_kill();
        }
        let _ = timeout(Duration::from_secs(5), self.child.wait()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bridge_responses() {
        let ok: BridgeResponse = serde_json::from_str(r#"{"id": 3, "ok": true}"#).unwrap();
        assert_eq!(ok.id, Some(3));
        assert!(into_outcome(ok).is_ok());

        let failed: BridgeResponse = serde_json::from_str(
            r#"{"id": 4, "ok": false, "error": "Timeout 5000ms exceeded."}"#,
        )
        .unwrap();
        let err = into_outcome(failed).unwrap_err();
        assert_eq!(err.to_string(), "Timeout 5000ms exceeded.");

        let ready: BridgeResponse = serde_json::from_str(r#"{"ready": true}"#).unwrap();
        assert_eq!(ready.ready, Some(true));
    }

    #[test]
    fn test_browser_from_str() {
        assert!(matches!("Firefox".parse::<Browser>(), Ok(Browser::Firefox)));
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[tokio::test]
    async fn test_missing_node_is_launch_error() {
        let config = PlaywrightConfig {
            node_binary: PathBuf::from("/nonexistent/recplay-node"),
            ..Default::default()
        };
        let err = PlaywrightDriver::launch(config).await.err().unwrap();
        assert!(matches!(err, ReplayError::Launch(_)));
    }
}
