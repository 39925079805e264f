//! Logging setup: console output with local timestamps, optional daily log files,
//! and optional mirroring of important lines into the chat channel.

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self as tracing_fmt, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "stockbot=info,storefront=info,serenity=warn";

/// Filter used by `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "stockbot=debug,storefront=debug,serenity=info";

/// Targets whose events may be mirrored into chat.
const FORWARDED_TARGETS: &[&str] = &["stockbot", "storefront"];

/// Targets never mirrored; they talk to the chat themselves.
const SILENT_TARGETS: &[&str] = &["stockbot::notification", "stockbot::chat"];

/// Queue depth for mirrored lines. Lines are dropped while the queue is full.
const FORWARD_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// A log line bound for the chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    pub log_dir: Option<PathBuf>,
    /// Mirror lines at or above this level into chat.
    pub forward_level: Option<Level>,
}

/// Keeps the file writer flushing; hands out the mirrored line stream once.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    lines: Option<mpsc::Receiver<LogLine>>,
}

impl LoggingGuard {
    pub fn take_lines(&mut self) -> Option<mpsc::Receiver<LogLine>> {
        self.lines.take()
    }
}

/// Layer that mirrors application log lines into a bounded queue.
struct ChatForwardLayer {
    max_level: Level,
    tx: mpsc::Sender<LogLine>,
}

impl ChatForwardLayer {
    fn wants(&self, level: &Level, target: &str) -> bool {
        *level <= self.max_level
            && FORWARDED_TARGETS.iter().any(|t| in_target(target, t))
            && !SILENT_TARGETS.iter().any(|t| in_target(target, t))
    }
}

fn in_target(target: &str, prefix: &str) -> bool {
    target == prefix
        || target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<S> Layer<S> for ChatForwardLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        if !self.wants(metadata.level(), metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        // Full queue or no reader: drop the line.
        let _ = self.tx.try_send(LogLine {
            level: *metadata.level(),
            message: visitor.finish(),
        });
    }
}

/// Collects the message plus any structured fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        let fields = self.fields.join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

/// Install the global subscriber.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = options.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
            EnvFilter::try_new(directive)
                .map_err(|e| Error::config(format!("invalid log filter '{directive}': {e}")))?
        }
    };

    let (file_layer, file_guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "stockbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (forward_layer, lines) = match options.forward_level {
        Some(max_level) => {
            let (tx, rx) = mpsc::channel(FORWARD_CAPACITY);
            (Some(ChatForwardLayer { max_level, tx }), Some(rx))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .with(forward_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        lines,
    })
}
