use std::time::Duration;

use tokio::sync::mpsc;

use crate::{error::DexError, types::Quote};

/// Poller settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between the starts of two fetches.
    pub interval: Duration,
    /// Consecutive failures after which the poller stops itself.
    pub error_threshold: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            error_threshold: 5,
        }
    }
}

impl PollerConfig {
    pub fn new(interval: Duration, error_threshold: u32) -> Self {
        Self {
            interval,
            error_threshold,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// [`super::QuotePoller::stop`] was called.
    Manual,
    /// The consecutive error threshold was reached.
    Errors,
}

/// Poller notification.
#[derive(Debug)]
pub enum PollEvent {
    Quote(Quote),
    /// A fetch failed after the client's own retries.
    Error(DexError),
    /// Sent once per started session.
    Stopped(StopReason),
}

/// Receiver for poller events.
#[derive(Debug)]
pub struct PollReceiver {
    inner: mpsc::Receiver<PollEvent>,
}

impl PollReceiver {
    pub(crate) fn new(inner: mpsc::Receiver<PollEvent>) -> Self {
        Self { inner }
    }

    /// Receives the next event, or `None` once the poller is dropped and
    /// all events are consumed.
    pub async fn recv(&mut self) -> Option<PollEvent> {
        self.inner.recv().await
    }

    /// Returns the next event if one is ready.
    pub fn try_recv(&mut self) -> Option<PollEvent> {
        self.inner.try_recv().ok()
    }
}
