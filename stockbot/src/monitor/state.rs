//! Poll state tracking.
//!
//! `PollState` is owned by the watch actor and is the only place the stock/queue flags
//! and the mute deadline are mutated. Readers elsewhere (notifier, log forwarder) see
//! it through [`GateSnapshot`]s published on a watch channel.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What one check saw on the storefront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub would_enqueue: bool,
    pub out_of_stock: bool,
    /// Raw stock level status of the first listed product.
    pub stock_status: String,
}

/// A flag flip produced by applying an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    EnteredQueue,
    LeftQueue,
    BackInStock,
    OutOfStock,
}

/// Poll cadence change requested after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalSwitch {
    /// Stocked or queued: poll at the slow recheck interval.
    SlowDown,
    /// Back to neither: poll at the fast interval.
    SpeedUp,
}

/// Decide the cadence change between two activity levels.
///
/// "Active" means stocked or queued. Only edges switch, so a steady state never
/// re-creates the ticker.
pub fn interval_switch(was_active: bool, is_active: bool) -> Option<IntervalSwitch> {
    match (was_active, is_active) {
        (false, true) => Some(IntervalSwitch::SlowDown),
        (true, false) => Some(IntervalSwitch::SpeedUp),
        _ => None,
    }
}

/// The bits of state the chat gate needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateSnapshot {
    pub muted_until: DateTime<Utc>,
    pub in_stock: bool,
}

impl GateSnapshot {
    /// Chatter goes out once the mute has lapsed, or any time the product is in stock.
    pub fn allows(&self, now: DateTime<Utc>) -> bool {
        now > self.muted_until || self.in_stock
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollState {
    pub in_stock: bool,
    pub in_queue: bool,
    pub checks: u64,
    pub last_checked: Option<DateTime<Utc>>,
    muted_until: DateTime<Utc>,
}

impl PollState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            in_stock: false,
            in_queue: false,
            checks: 0,
            last_checked: None,
            muted_until: now,
        }
    }

    pub fn muted_until(&self) -> DateTime<Utc> {
        self.muted_until
    }

    pub fn is_active(&self) -> bool {
        self.in_stock || self.in_queue
    }

    pub fn is_muted(&self, now: DateTime<Utc>) -> bool {
        now < self.muted_until
    }

    /// Push the mute deadline out to `until`. Earlier deadlines are ignored so the
    /// deadline never moves backwards. Returns whether it moved.
    pub fn mute_until(&mut self, until: DateTime<Utc>) -> bool {
        if until > self.muted_until {
            self.muted_until = until;
            true
        } else {
            false
        }
    }

    pub fn mute_for(&mut self, now: DateTime<Utc>, duration: Duration) -> bool {
        let duration = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let until = now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.mute_until(until)
    }

    /// Clear any mute accumulated while announcing readiness. This is the single
    /// place the deadline may move backwards.
    pub fn unmute_after_startup(&mut self, now: DateTime<Utc>) {
        self.muted_until = now;
    }

    /// Fold one observation into the flags and return the flips, queue first.
    /// The check counter is left alone; see [`PollState::record_check`].
    pub fn apply(&mut self, observation: &Observation) -> Vec<Transition> {
        let mut transitions = Vec::with_capacity(2);

        if observation.would_enqueue != self.in_queue {
            self.in_queue = observation.would_enqueue;
            transitions.push(if self.in_queue {
                Transition::EnteredQueue
            } else {
                Transition::LeftQueue
            });
        }

        let available = !observation.out_of_stock;
        if available != self.in_stock {
            self.in_stock = available;
            transitions.push(if self.in_stock {
                Transition::BackInStock
            } else {
                Transition::OutOfStock
            });
        }

        transitions
    }

    /// Count a check whose side effects all went through.
    pub fn record_check(&mut self, now: DateTime<Utc>) {
        self.checks += 1;
        self.last_checked = Some(now);
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            muted_until: self.muted_until,
            in_stock: self.in_stock,
        }
    }
}
