//! Stock watching: the check against the storefront, the state it folds into, and
//! the actor that runs it on a timer.

pub mod actor;
pub mod check;
pub mod handle;
pub mod retry;
pub mod state;

pub use actor::{WatchActor, WatchSettings};
pub use check::{CheckOutcome, SoftMuteReason, StockChecker};
pub use handle::{StatusReport, WatchHandle, WatchMessage};
pub use state::{GateSnapshot, IntervalSwitch, Observation, PollState, Transition};

use thiserror::Error;

/// Why a check attempt failed. Every variant is retried.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("storefront request failed: {0}")]
    Storefront(#[from] storefront::StorefrontError),

    #[error("couldn't open a tab: {0}")]
    OpenBrowser(#[source] std::io::Error),
}

/// How one tick of the watch loop ended.
#[derive(Debug)]
pub enum TickOutcome {
    /// Muted; no check was made.
    Muted,
    /// The check ran and its observation (if any) was applied.
    Completed {
        transitions: Vec<Transition>,
        switch: Option<IntervalSwitch>,
    },
    /// Retries were exhausted.
    Failed(CheckError),
    /// The check panicked; the payload message is kept.
    Panicked(String),
}
