//! Wiring: connect the chat session, start the watch actor, and route inbound
//! messages to the command dispatcher until shutdown.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chat::{ChatSession, DiscordConfig, DiscordSession, InboundMessage};
use crate::commands::{CommandDispatcher, Dispatch};
use crate::config::AppConfig;
use crate::logging::LogLine;
use crate::media::{GifProvider, GiphyClient, NoGifs};
use crate::monitor::retry::retry_with_backoff;
use crate::monitor::{PollState, StockChecker, WatchActor, WatchSettings};
use crate::notification::{BotEvent, Notifier, spawn_log_forwarder};
use crate::utils::browser::SystemBrowser;
use crate::{Error, Result};

/// Inbound message queue depth.
const INBOUND_CAPACITY: usize = 64;

/// Why the bot stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// SIGINT or SIGTERM.
    Signal,
    /// `!terminate` from the channel.
    Terminated,
}

/// Run the bot until a signal or `!terminate`.
pub async fn run(config: AppConfig, log_lines: Option<mpsc::Receiver<LogLine>>) -> Result<Shutdown> {
    storefront::install_rustls_provider();

    let cancel = CancellationToken::new();
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_CAPACITY);

    let discord = DiscordConfig {
        token: config.bot_token.clone(),
        channel: config.channel.clone(),
    };
    let session = retry_with_backoff(&config.connect_retry.policy(), "chat connect", || {
        DiscordSession::connect(&discord, inbound_tx.clone())
    })
    .await?;
    drop(inbound_tx);

    let bot_id = if config.bot_id.trim().is_empty() {
        session.bot_id().to_string()
    } else {
        config.bot_id.trim().to_string()
    };
    let session: Arc<dyn ChatSession> = Arc::new(session);

    let gifs: Arc<dyn GifProvider> = if config.giphy_key.trim().is_empty() {
        info!("No giphy_key configured, GIFs disabled");
        Arc::new(NoGifs)
    } else {
        Arc::new(GiphyClient::new(
            config.giphy_key.trim(),
            config.request_timeout(),
        )?)
    };

    let state = PollState::new(Utc::now());
    let (gate_tx, gate_rx) = watch::channel(state.snapshot());
    let notifier = Notifier::new(session.clone(), gifs, gate_rx);

    if let Some(lines) = log_lines {
        spawn_log_forwarder(notifier.clone(), lines, cancel.child_token());
    }

    notifier.notify(&BotEvent::Startup).await;
    notifier.gif("start").await;
    if config.debug_mode {
        warn!("Debug mode: stock and queue flips are simulated");
        notifier.gif("testing").await;
    }

    let storefront = storefront::StorefrontClient::new(config.endpoints(), config.request_timeout())?;
    let checker = StockChecker::new(
        Arc::new(storefront),
        config.product.clone(),
        config.block_status.clone(),
        config.debug_mode,
    );
    let (actor, watch_handle) = WatchActor::new(
        WatchSettings::from_config(&config),
        state,
        gate_tx,
        checker,
        notifier.clone(),
        Arc::new(SystemBrowser),
        cancel.child_token(),
    );
    let mut actor_task = tokio::spawn(actor.run());

    let dispatcher = CommandDispatcher::from_config(&config, bot_id, notifier.clone(), watch_handle)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let reason = loop {
        tokio::select! {
            _ = &mut shutdown => {
                announce_shutdown(&notifier).await;
                break Shutdown::Signal;
            }

            msg = inbound_rx.recv() => {
                let Some(msg) = msg else {
                    cancel.cancel();
                    return Err(Error::chat("chat gateway closed the inbound stream"));
                };
                // A command may wait on the watch actor; a signal still wins.
                tokio::select! {
                    _ = &mut shutdown => {
                        announce_shutdown(&notifier).await;
                        break Shutdown::Signal;
                    }
                    dispatch = dispatcher.dispatch(&msg) => {
                        if dispatch == Dispatch::Terminate {
                            break Shutdown::Terminated;
                        }
                    }
                }
            }

            joined = &mut actor_task => {
                cancel.cancel();
                session.close().await;
                return Err(match joined {
                    Ok(()) => Error::Other("watch actor stopped unexpectedly".to_string()),
                    Err(e) => Error::Other(format!("watch actor crashed: {e}")),
                });
            }
        }
    };

    info!(?reason, "Shutting down");
    cancel.cancel();
    session.close().await;
    Ok(reason)
}

async fn announce_shutdown(notifier: &Notifier) {
    notifier.notify(&BotEvent::Shutdown).await;
    notifier.gif("shut it down").await;
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
