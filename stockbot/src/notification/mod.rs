//! Gated chat announcements.
//!
//! Bot events and mirrored log lines only reach the channel while the gate is
//! open: the mute has lapsed, or the product is in stock. Command replies and GIF
//! decorations are direct and skip the gate.

pub mod events;

pub use events::BotEvent;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;
use crate::chat::ChatSession;
use crate::logging::LogLine;
use crate::media::GifProvider;
use crate::monitor::GateSnapshot;

#[derive(Clone)]
pub struct Notifier {
    session: Arc<dyn ChatSession>,
    gifs: Arc<dyn GifProvider>,
    gate: watch::Receiver<GateSnapshot>,
}

impl Notifier {
    pub fn new(
        session: Arc<dyn ChatSession>,
        gifs: Arc<dyn GifProvider>,
        gate: watch::Receiver<GateSnapshot>,
    ) -> Self {
        Self {
            session,
            gifs,
            gate,
        }
    }

    pub fn is_open(&self) -> bool {
        self.gate.borrow().allows(Utc::now())
    }

    /// Announce `event` if the gate is open. Returns whether it was sent.
    pub async fn notify(&self, event: &BotEvent) -> bool {
        let message = event.message();
        info!(event = event.event_type(), "{}", message);

        if !self.is_open() {
            debug!(event = event.event_type(), "Muted, not announcing");
            return false;
        }
        match self.session.send_text(&message).await {
            Ok(()) => true,
            Err(e) => {
                debug!(event = event.event_type(), error = %e, "Announcement failed");
                false
            }
        }
    }

    /// Mirror a log line into the channel if the gate is open.
    pub async fn forward(&self, line: &LogLine) -> bool {
        if !self.is_open() {
            return false;
        }
        self.session.send_text(&line.to_string()).await.is_ok()
    }

    pub async fn say(&self, text: &str) -> Result<()> {
        self.session.send_text(text).await
    }

    pub async fn say_tts(&self, text: &str) -> Result<()> {
        self.session.send_tts(text).await
    }

    /// Post a GIF for `term`. Lookup or send failures skip the decoration.
    pub async fn gif(&self, term: &str) -> bool {
        let url = match self.gifs.random_gif(term).await {
            Ok(url) => url,
            Err(e) => {
                debug!(term, error = %e, "Skipping gif");
                return false;
            }
        };
        self.session.send_text(&url).await.is_ok()
    }
}

/// Drain mirrored log lines into the chat until cancelled or the logger goes away.
pub fn spawn_log_forwarder(
    notifier: Notifier,
    mut lines: mpsc::Receiver<LogLine>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                line = lines.recv() => {
                    let Some(line) = line else { break };
                    notifier.forward(&line).await;
                }
            }
        }
        debug!("Log forwarder stopped");
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fakes shared by the notifier, actor and command tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::Error;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Text(String),
        Tts(String),
    }

    #[derive(Default)]
    pub struct RecordingSession {
        pub sent: Mutex<Vec<Sent>>,
        pub closed: Mutex<bool>,
    }

    impl RecordingSession {
        pub fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| match s {
                    Sent::Text(t) => Some(t.clone()),
                    Sent::Tts(_) => None,
                })
                .collect()
        }

        pub fn all(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub fn is_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatSession for RecordingSession {
        async fn send_text(&self, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
            Ok(())
        }

        async fn send_tts(&self, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Tts(text.to_string()));
            Ok(())
        }

        async fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    /// Answers every lookup with `gif:<term>`.
    pub struct EchoGifs;

    #[async_trait]
    impl GifProvider for EchoGifs {
        async fn random_gif(&self, term: &str) -> Result<String> {
            Ok(format!("gif:{term}"))
        }
    }

    pub struct FailingGifs;

    #[async_trait]
    impl GifProvider for FailingGifs {
        async fn random_gif(&self, _term: &str) -> Result<String> {
            Err(Error::Other("down".to_string()))
        }
    }

    pub fn notifier(
        session: Arc<RecordingSession>,
        gate: watch::Receiver<GateSnapshot>,
    ) -> Notifier {
        Notifier::new(session, Arc::new(EchoGifs), gate)
    }
}
