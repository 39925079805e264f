//! Discord session backed by serenity's gateway client.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, Client, Context, CreateMessage, EventHandler, GatewayIntents, Http, Message, Ready,
    ShardManager,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{ChatSession, InboundMessage, truncate_message};
use crate::{Error, Result};

/// Connection settings for [`DiscordSession`].
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    /// Channel id, as a decimal string.
    pub channel: String,
}

impl DiscordConfig {
    fn channel_id(&self) -> Result<ChannelId> {
        let id: u64 = self
            .channel
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("channel is not a Discord id: {}", self.channel)))?;
        if id == 0 {
            return Err(Error::config("channel id must be non-zero"));
        }
        Ok(ChannelId::new(id))
    }
}

/// Forwards gateway messages onto the inbound queue.
struct Relay {
    inbound: mpsc::Sender<InboundMessage>,
}

#[async_trait]
impl EventHandler for Relay {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "Connected to chat gateway");
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        let inbound = InboundMessage {
            author_id: msg.author.id.to_string(),
            channel_id: msg.channel_id.to_string(),
            content: msg.content,
        };
        if self.inbound.send(inbound).await.is_err() {
            debug!("Inbound queue closed, dropping message");
        }
    }
}

pub struct DiscordSession {
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
    channel: ChannelId,
    bot_id: String,
}

impl DiscordSession {
    /// Validate the token, then start the gateway in the background.
    pub async fn connect(
        config: &DiscordConfig,
        inbound: mpsc::Sender<InboundMessage>,
    ) -> Result<Self> {
        let channel = config.channel_id()?;
        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let mut client = Client::builder(&config.token, intents)
            .event_handler(Relay { inbound })
            .await
            .map_err(|e| Error::chat(format!("failed to build client: {e}")))?;

        let me = client
            .http
            .get_current_user()
            .await
            .map_err(|e| Error::chat(format!("failed to authenticate: {e}")))?;

        let http = client.http.clone();
        let shard_manager = client.shard_manager.clone();

        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "Chat gateway stopped");
            }
        });

        Ok(Self {
            http,
            shard_manager,
            channel,
            bot_id: me.id.to_string(),
        })
    }

    /// User id the token authenticated as.
    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    async fn send(&self, builder: CreateMessage) -> Result<()> {
        self.channel
            .send_message(&self.http, builder)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(error = %e, "Failed to send chat message");
                Error::chat(e.to_string())
            })
    }
}

#[async_trait]
impl ChatSession for DiscordSession {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.send(CreateMessage::new().content(truncate_message(text)))
            .await
    }

    async fn send_tts(&self, text: &str) -> Result<()> {
        self.send(
            CreateMessage::new()
                .content(truncate_message(text))
                .tts(true),
        )
        .await
    }

    async fn close(&self) {
        self.shard_manager.shutdown_all().await;
        info!("Chat session closed");
    }
}
