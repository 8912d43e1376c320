//! Session reaper
//!
//! Periodically removes recording sessions whose recorder exited long ago or
//! that nobody has polled within the idle timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::recorder::RecorderSupervisor;

pub struct Reaper {
    recorder: Arc<RecorderSupervisor>,
    interval: Duration,
}

impl Reaper {
    pub fn new(recorder: Arc<RecorderSupervisor>, interval: Duration) -> Self {
        Self { recorder, interval }
    }

    /// Run the reap loop forever
    pub async fn run(&self) {
        info!("Session reaper started (every {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;
            self.tick().await;
        }
    }

    /// One reap pass
    pub async fn tick(&self) -> usize {
        let reaped = self.recorder.reap(Instant::now()).await;
        if reaped > 0 {
            info!("Reaped {} recording session(s)", reaped);
        } else {
            debug!("Reaper: nothing to do");
        }
        reaped
    }
}
