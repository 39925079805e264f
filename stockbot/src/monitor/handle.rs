//! Handle for talking to a running [`WatchActor`](super::WatchActor).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

/// Mailbox capacity for the watch actor.
pub const MAILBOX_CAPACITY: usize = 32;

#[derive(Debug)]
pub enum WatchMessage {
    /// Push the mute deadline out; replies with the deadline now in force.
    Mute {
        duration: Duration,
        reply: oneshot::Sender<DateTime<Utc>>,
    },
    GetStatus(oneshot::Sender<StatusReport>),
    Stop,
}

/// Point-in-time view of the poll state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub in_stock: bool,
    pub in_queue: bool,
    pub checks: u64,
    pub last_checked: Option<DateTime<Utc>>,
    pub muted_until: DateTime<Utc>,
    /// Current poll period.
    pub period: Duration,
}

impl StatusReport {
    /// Chat rendering used by `!status`.
    pub fn render(&self) -> String {
        let last = match self.last_checked {
            Some(at) => at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S %Z")
                .to_string(),
            None => "never".to_string(),
        };
        format!(
            "Last: {last}\nIn Stock: {}\nIn Queue: {}\nChecks: {}",
            self.in_stock, self.in_queue, self.checks
        )
    }
}

#[derive(Debug, Clone)]
pub struct WatchHandle {
    sender: mpsc::Sender<WatchMessage>,
}

impl WatchHandle {
    pub(crate) fn new(sender: mpsc::Sender<WatchMessage>) -> Self {
        Self { sender }
    }

    pub async fn mute_for(&self, duration: Duration) -> Result<DateTime<Utc>> {
        let (reply, rx) = oneshot::channel();
        self.send(WatchMessage::Mute { duration, reply }).await?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let (reply, rx) = oneshot::channel();
        self.send(WatchMessage::GetStatus(reply)).await?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(WatchMessage::Stop).await
    }

    async fn send(&self, msg: WatchMessage) -> Result<()> {
        self.sender.send(msg).await.map_err(|_| stopped())
    }
}

fn stopped() -> Error {
    Error::Other("watch actor has stopped".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_status() {
        let report = StatusReport {
            in_stock: true,
            in_queue: false,
            checks: 7,
            last_checked: None,
            muted_until: Utc::now(),
            period: Duration::from_secs(30),
        };
        assert_eq!(
            report.render(),
            "Last: never\nIn Stock: true\nIn Queue: false\nChecks: 7"
        );
    }

    #[tokio::test]
    async fn test_stopped_actor_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = WatchHandle::new(tx);
        assert!(handle.status().await.is_err());
        assert!(handle.stop().await.is_err());
    }
}
