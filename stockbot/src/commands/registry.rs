//! Command table.

use std::time::Duration;

use crate::config::CustomCommand;
use crate::{Error, Result};

/// How long `!stfu` keeps the bot quiet.
pub const STFU_DURATION: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// List every registered command.
    Help,
    /// Report the last check and the stock/queue flags.
    Status,
    /// Reply, then push the mute deadline out.
    Mute { reply: String, duration: Duration },
    /// Any mix of a text reply, a spoken reply and a GIF, in that order.
    Announce {
        text: Option<String>,
        tts: Option<String>,
        gif: Option<String>,
    },
    /// Say goodbye, then shut the bot down.
    Terminate { farewell: String, gif: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub help: String,
    pub action: Action,
}

impl Command {
    pub fn new(name: impl Into<String>, help: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            action,
        }
    }
}

impl From<&CustomCommand> for Command {
    fn from(custom: &CustomCommand) -> Self {
        Command::new(
            custom.name.clone(),
            custom.help.clone(),
            Action::Announce {
                text: custom.text.clone(),
                tts: custom.tts.clone(),
                gif: custom.gif.clone(),
            },
        )
    }
}

/// Registered commands, in registration order.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn builtin() -> Self {
        let commands = vec![
            Command::new("!help", "this message", Action::Help),
            Command::new(
                "!status",
                "report last check, and status of inventory",
                Action::Status,
            ),
            Command::new(
                "!terminate",
                "shuts down the bot, it's gone crazy",
                Action::Terminate {
                    farewell: "My mind is going... I can feel it.".to_string(),
                    gif: "hal9000".to_string(),
                },
            ),
            Command::new(
                "!stfu",
                "stop checks for 30 minutes",
                Action::Mute {
                    reply: ":face_with_symbols_over_mouth: NO U".to_string(),
                    duration: STFU_DURATION,
                },
            ),
            Command::new(
                "!exterminate",
                "",
                Action::Announce {
                    text: None,
                    tts: Some("EXTERMINATE".to_string()),
                    gif: Some("exterminate".to_string()),
                },
            ),
            Command::new(
                "!firejeffbezosintothesun",
                "",
                Action::Announce {
                    text: None,
                    tts: None,
                    gif: Some("bezos".to_string()),
                },
            ),
        ];
        Self { commands }
    }

    /// Built-ins plus the configured announcements.
    pub fn with_custom(custom: &[CustomCommand]) -> Result<Self> {
        let mut registry = Self::builtin();
        for command in custom {
            registry.register(command.into())?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, command: Command) -> Result<()> {
        if self.get(&command.name).is_some() {
            return Err(Error::config(format!(
                "command {} is already registered",
                command.name
            )));
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// `!help` output. Commands without help text are easter eggs and stay hidden.
    pub fn help_text(&self) -> String {
        let mut help = String::from("How to bot:\n");
        for command in self.commands.iter().filter(|c| !c.help.is_empty()) {
            help.push_str(&format!("{} : {}\n", command.name, command.help));
        }
        help
    }
}
