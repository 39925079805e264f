//! Chat command handling.

pub mod mood;
pub mod registry;

pub use mood::{MoodTable, Reaction};
pub use registry::{Action, Command, CommandRegistry};

use rand::random;
use tracing::{debug, error};

use crate::Result;
use crate::chat::InboundMessage;
use crate::config::AppConfig;
use crate::monitor::WatchHandle;
use crate::notification::Notifier;

/// What became of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not for us: our own message, another channel, or no reaction rolled.
    Ignored,
    /// A registered command ran.
    Handled(String),
    /// An unmatched message got a mood reaction.
    Interjected,
    /// `!terminate`: the caller closes the session and exits.
    Terminate,
}

pub struct CommandDispatcher {
    registry: CommandRegistry,
    notifier: Notifier,
    watch: WatchHandle,
    bot_id: String,
    channel: String,
    echo_chance: f64,
    moods: MoodTable,
}

impl CommandDispatcher {
    pub fn new(
        registry: CommandRegistry,
        notifier: Notifier,
        watch: WatchHandle,
        bot_id: impl Into<String>,
        channel: impl Into<String>,
        echo_chance: f64,
        moods: MoodTable,
    ) -> Self {
        Self {
            registry,
            notifier,
            watch,
            bot_id: bot_id.into(),
            channel: channel.into(),
            echo_chance,
            moods,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        bot_id: impl Into<String>,
        notifier: Notifier,
        watch: WatchHandle,
    ) -> Result<Self> {
        Ok(Self::new(
            CommandRegistry::with_custom(&config.commands)?,
            notifier,
            watch,
            bot_id,
            config.channel.trim(),
            config.echo_chance,
            MoodTable::new(&config.moods),
        ))
    }

    pub async fn dispatch(&self, msg: &InboundMessage) -> Dispatch {
        self.dispatch_with_rolls(msg, random::<f64>(), random::<f64>())
            .await
    }

    /// `chance_roll` decides whether an unmatched message gets a reaction,
    /// `mood_roll` which one.
    async fn dispatch_with_rolls(
        &self,
        msg: &InboundMessage,
        chance_roll: f64,
        mood_roll: f64,
    ) -> Dispatch {
        if msg.author_id == self.bot_id || msg.channel_id != self.channel {
            return Dispatch::Ignored;
        }

        let content = msg.content.as_str();
        if let Some(command) = self.registry.get(content) {
            debug!(command = %command.name, "Running command");
            return match self.run(command).await {
                Ok(dispatch) => dispatch,
                Err(e) => {
                    error!(command = %command.name, error = %e, "Command failed");
                    Dispatch::Handled(command.name.clone())
                }
            };
        }

        if content.trim().is_empty() || chance_roll >= self.echo_chance {
            return Dispatch::Ignored;
        }
        match self.moods.react(content, mood_roll) {
            Some(Reaction::Echo(text)) => {
                self.speak(&text).await;
                Dispatch::Interjected
            }
            Some(Reaction::Gif(term)) => {
                self.notifier.gif(&term).await;
                Dispatch::Interjected
            }
            None => Dispatch::Ignored,
        }
    }

    async fn run(&self, command: &Command) -> Result<Dispatch> {
        match &command.action {
            Action::Help => self.say(&self.registry.help_text()).await,
            Action::Status => {
                let status = self.watch.status().await?;
                self.say(&status.render()).await;
            }
            Action::Mute { reply, duration } => {
                self.say(reply).await;
                let until = self.watch.mute_for(*duration).await?;
                debug!(%until, "Muted by command");
            }
            Action::Announce { text, tts, gif } => {
                if let Some(text) = text {
                    self.say(text).await;
                }
                if let Some(tts) = tts {
                    self.speak(tts).await;
                }
                if let Some(term) = gif {
                    self.notifier.gif(term).await;
                }
            }
            Action::Terminate { farewell, gif } => {
                self.say(farewell).await;
                self.notifier.gif(gif).await;
                return Ok(Dispatch::Terminate);
            }
        }
        Ok(Dispatch::Handled(command.name.clone()))
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.notifier.say(text).await {
            debug!(error = %e, "Reply failed");
        }
    }

    async fn speak(&self, text: &str) {
        if let Err(e) = self.notifier.say_tts(text).await {
            debug!(error = %e, "Spoken reply failed");
        }
    }
}
