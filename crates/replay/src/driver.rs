//! Browser-automation capability and the action executor built on it

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use recplay_common::Action;

use crate::error::DriverResult;

/// One live browser page driven step by step
///
/// Every operation may fail with a descriptive message; the runner turns that
/// message into step-level result data.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigate the page to `url`
    async fn goto_url(&mut self, url: &str) -> DriverResult<()>;

    /// Click the element matched by `selector`
    async fn locator_click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Fill the input matched by `selector` with `value`
    async fn locator_fill(
        &mut self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> DriverResult<()>;

    /// Wait for a fixed amount of time
    async fn wait_for(&mut self, duration: Duration) -> DriverResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    /// Release the browser. Must be safe to call more than once.
    async fn close(&mut self) -> DriverResult<()>;
}

/// Launches one fresh driver per replay
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserDriver>>;
}

/// Executes a single typed action against a driver. Holds no state.
pub struct ActionExecutor;

impl ActionExecutor {
    /// Dispatch on the action tag, applying the action's own timeout
    pub async fn execute(driver: &mut dyn BrowserDriver, action: &Action) -> DriverResult<()> {
        debug!("Executing {} action", action.tag());

        match action {
            Action::Navigate { url } => driver.goto_url(url).await,
            Action::Click { selector, .. } => {
                driver.locator_click(selector, action.locator_timeout()).await
            }
            Action::Fill { selector, value, .. } => {
                driver
                    .locator_fill(selector, value, action.locator_timeout())
                    .await
            }
            Action::Wait { .. } => driver.wait_for(action.wait_duration()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        calls: Vec<String>,
    }

    #[async_trait]
    impl BrowserDriver for Recording {
        async fn goto_url(&mut self, url: &str) -> DriverResult<()> {
            self.calls.push(format!("goto {}", url));
            Ok(())
        }

        async fn locator_click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
            self.calls.push(format!("click {} {}", selector, timeout.as_millis()));
            Ok(())
        }

        async fn locator_fill(
            &mut self,
            selector: &str,
            value: &str,
            timeout: Duration,
        ) -> DriverResult<()> {
            self.calls
                .push(format!("fill {} {} {}", selector, value, timeout.as_millis()));
            Ok(())
        }

        async fn wait_for(&mut self, duration: Duration) -> DriverResult<()> {
            self.calls.push(format!("wait {}", duration.as_millis()));
            Ok(())
        }

        async fn close(&mut self) -> DriverResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_applies_defaults() {
        let mut driver = Recording::default();
        let actions = vec![
            Action::Navigate { url: "https://example.com/a".into() },
            Action::Click { selector: "#go".into(), timeout_ms: None },
            Action::Fill { selector: "#q".into(), value: "x".into(), timeout_ms: Some(700) },
            Action::Wait { duration_ms: None },
        ];
        for action in &actions {
            ActionExecutor::execute(&mut driver, action).await.unwrap();
        }
        assert_eq!(
            driver.calls,
            vec![
                "goto https://example.com/a",
                "click #go 5000",
                "fill #q x 700",
                "wait 1000",
            ]
        );
    }
}
