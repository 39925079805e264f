//! Announcements the bot makes on its own initiative.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotEvent {
    Startup,
    Shutdown,
    /// The product page started redirecting into the queue.
    GoTime { mention: String, status: String },
    TabOpened,
    ClickMe { mention: String, url: String },
    BackInStock,
    OutOfStock,
}

impl BotEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::GoTime { .. } => "go_time",
            Self::TabOpened => "tab_opened",
            Self::ClickMe { .. } => "click_me",
            Self::BackInStock => "back_in_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }

    /// Chat text for the event.
    pub fn message(&self) -> String {
        match self {
            Self::Startup => "Initializing".to_string(),
            Self::Shutdown => "Shutting down".to_string(),
            Self::GoTime { mention, status } => {
                format!("{mention} Got status {status}. It's go time!")
            }
            Self::TabOpened => "Opened a tab!".to_string(),
            Self::ClickMe { mention, url } => {
                format!("{mention} Click me if you want to try! {url}")
            }
            Self::BackInStock => "Seems to be available!".to_string(),
            Self::OutOfStock => "Poo! Looks like it's gone".to_string(),
        }
    }
}
