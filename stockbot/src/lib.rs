//! Storefront restock watcher that reports into a Discord channel.
//!
//! The [`monitor::WatchActor`] polls the storefront on a timer and owns all poll
//! state. Availability changes become [`notification::BotEvent`]s, sent through a
//! [`notification::Notifier`] that stays quiet while the bot is muted unless the
//! product is in stock. Chat commands reach the actor through a
//! [`monitor::WatchHandle`].

pub mod app;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod monitor;
pub mod notification;
pub mod panic_hook;
pub mod utils;

pub use error::{Error, Result};
