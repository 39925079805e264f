//! The watch actor.
//!
//! Owns [`PollState`] and runs the stock check on a timer. Everything that mutates
//! the state happens inside this task: ticks, and mute requests arriving through the
//! mailbox. After each mutation the gate-relevant part of the state is published on
//! a watch channel for the notifier.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::check::{CheckOutcome, StockChecker};
use super::handle::{MAILBOX_CAPACITY, StatusReport, WatchHandle, WatchMessage};
use super::retry::RetryPolicy;
use super::state::{
    GateSnapshot, IntervalSwitch, Observation, PollState, Transition, interval_switch,
};
use super::{CheckError, TickOutcome};
use crate::config::AppConfig;
use crate::notification::{BotEvent, Notifier};
use crate::panic_hook::payload_message;
use crate::utils::browser::BrowserOpener;

/// How long to hold off after a check that had nothing to go on.
pub const SOFT_MUTE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub interval: Duration,
    pub recheck_interval: Duration,
    pub check_retry: RetryPolicy,
    /// Mention prepended to go-time announcements.
    pub mention: String,
}

impl WatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.interval(),
            recheck_interval: config.recheck_interval(),
            check_retry: config.check_retry.policy(),
            mention: config.notify.clone(),
        }
    }
}

pub struct WatchActor {
    settings: WatchSettings,
    state: PollState,
    period: Duration,
    mailbox: mpsc::Receiver<WatchMessage>,
    gate: watch::Sender<GateSnapshot>,
    checker: StockChecker,
    notifier: Notifier,
    browser: Arc<dyn BrowserOpener>,
    cancel: CancellationToken,
    /// Set when a stop arrives while a retry is waiting.
    stopping: bool,
}

impl WatchActor {
    pub fn new(
        settings: WatchSettings,
        state: PollState,
        gate: watch::Sender<GateSnapshot>,
        checker: StockChecker,
        notifier: Notifier,
        browser: Arc<dyn BrowserOpener>,
        cancel: CancellationToken,
    ) -> (Self, WatchHandle) {
        let (tx, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let period = settings.interval;
        let actor = Self {
            settings,
            state,
            period,
            mailbox,
            gate,
            checker,
            notifier,
            browser,
            cancel,
            stopping: false,
        };
        (actor, WatchHandle::new(tx))
    }

    /// Run until stopped, cancelled, or every handle is dropped.
    pub async fn run(mut self) {
        self.state.unmute_after_startup(Utc::now());
        self.publish();
        info!(period = ?self.period, "Watching {}", self.checker.product_url());

        let mut ticker = new_ticker(self.period);
        loop {
            let mut reschedule = false;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Watch actor cancelled");
                    break;
                }

                msg = self.mailbox.recv() => {
                    let Some(msg) = msg else { break };
                    if self.handle_message(msg) {
                        debug!("Watch actor received stop signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let period = self.period;
                    let outcome = self.tick().await;
                    if self.stopping {
                        debug!("Watch actor stopped during a retry");
                        break;
                    }
                    report(&outcome);
                    reschedule = self.period != period;
                }
            }

            if reschedule {
                ticker = new_ticker(self.period);
            }
        }
    }

    /// Returns true when the actor should stop.
    fn handle_message(&mut self, msg: WatchMessage) -> bool {
        match msg {
            WatchMessage::Mute { duration, reply } => {
                if self.state.mute_for(Utc::now(), duration) {
                    self.publish();
                }
                info!(until = %self.state.muted_until(), "Muted");
                let _ = reply.send(self.state.muted_until());
                false
            }
            WatchMessage::GetStatus(reply) => {
                let _ = reply.send(self.status());
                false
            }
            WatchMessage::Stop => true,
        }
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            in_stock: self.state.in_stock,
            in_queue: self.state.in_queue,
            checks: self.state.checks,
            last_checked: self.state.last_checked,
            muted_until: self.state.muted_until(),
            period: self.period,
        }
    }

    fn publish(&self) {
        self.gate.send_replace(self.state.snapshot());
    }

    /// One pass of the watch loop: skip while muted, otherwise check with retries
    /// and re-pick the poll period.
    pub(crate) async fn tick(&mut self) -> TickOutcome {
        if self.state.is_muted(Utc::now()) {
            return TickOutcome::Muted;
        }

        let was_active = self.state.is_active();
        let result = AssertUnwindSafe(self.check_with_retry())
            .catch_unwind()
            .await;

        let switch = interval_switch(was_active, self.state.is_active());
        self.apply_switch(switch);

        match result {
            Ok(Ok(transitions)) => TickOutcome::Completed {
                transitions,
                switch,
            },
            Ok(Err(e)) => TickOutcome::Failed(e),
            Err(payload) => TickOutcome::Panicked(payload_message(payload.as_ref())),
        }
    }

    fn apply_switch(&mut self, switch: Option<IntervalSwitch>) {
        match switch {
            Some(IntervalSwitch::SlowDown) => {
                info!("In queue, slowing down");
                self.period = self.settings.recheck_interval;
            }
            Some(IntervalSwitch::SpeedUp) => {
                info!("Gone again, speeding up");
                self.period = self.settings.interval;
            }
            None => {}
        }
    }

    /// Every attempt re-runs the whole check.
    async fn check_with_retry(&mut self) -> Result<Vec<Transition>, CheckError> {
        let policy = self.settings.check_retry.clone();
        let mut backoff = policy.start();

        loop {
            match self.check_once().await {
                Ok(transitions) => return Ok(transitions),
                Err(e) => match backoff.next_delay() {
                    Some(delay) => {
                        debug!(
                            error = %e,
                            attempt = backoff.attempts(),
                            "Check failed, retrying in {:?}",
                            delay
                        );
                        if !self.wait_for_retry(delay).await {
                            return Err(e);
                        }
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// Sit out a retry delay while still serving the mailbox, so status and mute
    /// requests don't queue behind a long retry sequence. Returns false once the
    /// actor has been told to stop.
    async fn wait_for_retry(&mut self, delay: Duration) -> bool {
        let deadline = sleep(delay);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    self.stopping = true;
                    return false;
                }

                msg = self.mailbox.recv() => {
                    let stop = match msg {
                        Some(msg) => self.handle_message(msg),
                        None => true,
                    };
                    if stop {
                        self.stopping = true;
                        return false;
                    }
                }

                _ = &mut deadline => return true,
            }
        }
    }

    async fn check_once(&mut self) -> Result<Vec<Transition>, CheckError> {
        match self.checker.check(self.state.checks).await? {
            CheckOutcome::SoftMuted(reason) => {
                debug!(?reason, "Nothing to go on, holding off");
                self.state.mute_for(Utc::now(), SOFT_MUTE);
                self.publish();
                Ok(Vec::new())
            }
            CheckOutcome::Observed(observation) => self.apply_observation(observation).await,
        }
    }

    async fn apply_observation(
        &mut self,
        observation: Observation,
    ) -> Result<Vec<Transition>, CheckError> {
        debug!(
            out_of_stock = observation.out_of_stock,
            would_enqueue = observation.would_enqueue,
            "Observed"
        );
        let transitions = self.state.apply(&observation);
        self.publish();

        let mut browser_error = None;
        for transition in &transitions {
            match transition {
                Transition::EnteredQueue => {
                    if let Err(e) = self.enter_queue(&observation.stock_status).await {
                        browser_error = Some(e);
                    }
                }
                Transition::LeftQueue => info!("No longer doing redirect"),
                Transition::BackInStock => {
                    self.notifier.notify(&BotEvent::BackInStock).await;
                }
                Transition::OutOfStock => {
                    self.notifier.notify(&BotEvent::OutOfStock).await;
                }
            }
        }

        if let Some(e) = browser_error {
            return Err(e);
        }
        self.state.record_check(Utc::now());
        Ok(transitions)
    }

    async fn enter_queue(&self, stock_status: &str) -> Result<(), CheckError> {
        let mention = self.settings.mention.clone();
        let url = self.checker.product_url().to_string();

        self.notifier.gif("lets do this").await;
        self.notifier
            .notify(&BotEvent::GoTime {
                mention: mention.clone(),
                status: stock_status.to_string(),
            })
            .await;

        if let Err(e) = self.browser.open(&url).await {
            error!(error = %e, "Couldn't open a tab!");
            return Err(CheckError::OpenBrowser(e));
        }

        self.notifier.notify(&BotEvent::TabOpened).await;
        self.notifier
            .notify(&BotEvent::ClickMe { mention, url })
            .await;
        Ok(())
    }
}

fn new_ticker(period: Duration) -> Interval {
    let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn report(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Muted => debug!("Muted, skipped check"),
        TickOutcome::Completed {
            transitions,
            switch,
        } => debug!(?transitions, ?switch, "Check complete"),
        TickOutcome::Failed(e) => error!(error = %e, "Stock check failed"),
        TickOutcome::Panicked(message) => error!("OOPS! It exploded! {}", message),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use storefront::{ProductListResponse, StorefrontApi};

    use super::*;
    use crate::monitor::check::testing::*;
    use crate::notification::testing::*;

    #[derive(Default)]
    struct FakeBrowser {
        opened: Mutex<Vec<String>>,
        failures: Mutex<u32>,
    }

    impl FakeBrowser {
        fn failing(times: u32) -> Self {
            Self {
                failures: Mutex::new(times),
                ..Default::default()
            }
        }

        fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserOpener for FakeBrowser {
        async fn open(&self, url: &str) -> io::Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(io::Error::new(io::ErrorKind::NotFound, "no launcher"));
            }
            Ok(())
        }
    }

    struct ExplodingStorefront;

    #[async_trait]
    impl StorefrontApi for ExplodingStorefront {
        fn product_url(&self) -> &str {
            "https://shop.example/product"
        }

        async fn would_enqueue(&self) -> storefront::Result<bool> {
            panic!("storefront exploded");
        }

        async fn product_list(&self, _code: &str) -> storefront::Result<ProductListResponse> {
            Ok(listing("outOfStock"))
        }
    }

    struct Harness {
        actor: WatchActor,
        handle: WatchHandle,
        session: Arc<RecordingSession>,
        browser: Arc<FakeBrowser>,
        cancel: CancellationToken,
    }

    fn settings() -> WatchSettings {
        WatchSettings {
            interval: Duration::from_secs(30),
            recheck_interval: Duration::from_secs(300),
            check_retry: RetryPolicy {
                initial_delay: Duration::from_millis(10),
                multiplier: 2.0,
                max_delay: Duration::from_millis(100),
                max_elapsed: None,
                max_attempts: Some(3),
            },
            mention: "@here".to_string(),
        }
    }

    fn harness(api: Arc<dyn StorefrontApi>, browser: FakeBrowser) -> Harness {
        let state = PollState::new(Utc::now() - chrono::Duration::seconds(1));
        let (gate_tx, gate_rx) = watch::channel(state.snapshot());
        let session = Arc::new(RecordingSession::default());
        let browser = Arc::new(browser);
        let cancel = CancellationToken::new();
        let (actor, handle) = WatchActor::new(
            settings(),
            state,
            gate_tx,
            StockChecker::new(api, "3005816", "outOfStock", false),
            notifier(session.clone(), gate_rx),
            browser.clone(),
            cancel.clone(),
        );
        Harness {
            actor,
            handle,
            session,
            browser,
            cancel,
        }
    }

    fn scripted(pages: &[bool], statuses: &[&str]) -> Arc<FakeStorefront> {
        let fake = FakeStorefront::default();
        for page in pages {
            fake.push_page(Ok(*page));
        }
        for status in statuses {
            fake.push_listing(Ok(listing(status)));
        }
        Arc::new(fake)
    }

    #[tokio::test]
    async fn test_blocked_then_restock_with_redirect() {
        let mut h = harness(
            scripted(&[false, true], &["outOfStock", "inStock"]),
            FakeBrowser::default(),
        );

        let first = h.actor.tick().await;
        assert!(matches!(
            first,
            TickOutcome::Completed { ref transitions, switch: None } if transitions.is_empty()
        ));
        assert!(!h.actor.state.in_stock);
        assert!(!h.actor.state.in_queue);
        assert!(h.session.all().is_empty());

        let second = h.actor.tick().await;
        let TickOutcome::Completed {
            transitions,
            switch,
        } = second
        else {
            panic!("expected a completed tick, got {second:?}");
        };
        assert_eq!(
            transitions,
            vec![Transition::EnteredQueue, Transition::BackInStock]
        );
        assert_eq!(switch, Some(IntervalSwitch::SlowDown));
        assert!(h.actor.state.in_stock);
        assert!(h.actor.state.in_queue);
        assert_eq!(h.actor.period, Duration::from_secs(300));
        assert_eq!(h.browser.opened(), vec!["https://shop.example/product"]);

        let texts = h.session.texts();
        assert!(texts.contains(&"@here Got status inStock. It's go time!".to_string()));
        assert!(texts.contains(&"Seems to be available!".to_string()));
        assert!(texts.contains(&"gif:lets do this".to_string()));
        assert_eq!(h.actor.state.checks, 2);
    }

    #[tokio::test]
    async fn test_speeds_up_when_gone_again() {
        let mut h = harness(
            scripted(&[false, false], &["inStock", "outOfStock"]),
            FakeBrowser::default(),
        );

        h.actor.tick().await;
        assert_eq!(h.actor.period, Duration::from_secs(300));

        let outcome = h.actor.tick().await;
        assert!(matches!(
            outcome,
            TickOutcome::Completed {
                switch: Some(IntervalSwitch::SpeedUp),
                ..
            }
        ));
        assert_eq!(h.actor.period, Duration::from_secs(30));
        assert!(
            h.session
                .texts()
                .contains(&"Poo! Looks like it's gone".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_listing_soft_mutes_for_a_minute() {
        let fake = FakeStorefront::default();
        fake.push_listing(Ok(empty_listing()));
        let mut h = harness(Arc::new(fake), FakeBrowser::default());

        let before = Utc::now();
        let outcome = h.actor.tick().await;
        assert!(matches!(outcome, TickOutcome::Completed { ref transitions, .. } if transitions.is_empty()));
        assert!(h.actor.state.muted_until() >= before + chrono::Duration::minutes(1));
        assert_eq!(h.actor.state.checks, 0);

        assert!(matches!(h.actor.tick().await, TickOutcome::Muted));
    }

    #[tokio::test]
    async fn test_unreachable_page_soft_mutes() {
        let fake = FakeStorefront::default();
        fake.push_page(Err(parse_error()));
        let mut h = harness(Arc::new(fake), FakeBrowser::default());

        assert!(matches!(h.actor.tick().await, TickOutcome::Completed { .. }));
        assert!(h.actor.state.is_muted(Utc::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_failures_exhaust_retries() {
        let fake = FakeStorefront::default();
        for _ in 0..3 {
            fake.push_listing(Err(parse_error()));
        }
        let fake = Arc::new(fake);
        let mut h = harness(fake.clone(), FakeBrowser::default());

        let outcome = h.actor.tick().await;
        assert!(matches!(
            outcome,
            TickOutcome::Failed(CheckError::Storefront(_))
        ));
        assert!(fake.listings.lock().unwrap().is_empty());
        assert_eq!(h.actor.state.checks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_listing_failure_is_retried() {
        let fake = FakeStorefront::default();
        fake.push_listing(Err(parse_error()));
        fake.push_listing(Ok(listing("inStock")));
        let mut h = harness(Arc::new(fake), FakeBrowser::default());

        let outcome = h.actor.tick().await;
        assert!(matches!(outcome, TickOutcome::Completed { .. }));
        assert!(h.actor.state.in_stock);
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_failure_reruns_check_without_reopening() {
        let mut h = harness(scripted(&[true, true], &["outOfStock"]), FakeBrowser::failing(1));

        let outcome = h.actor.tick().await;
        assert!(matches!(outcome, TickOutcome::Completed { .. }));
        assert!(h.actor.state.in_queue);
        assert_eq!(h.browser.opened().len(), 1);
        assert!(!h.session.texts().contains(&"Opened a tab!".to_string()));
        // Only the attempt that went through counts.
        assert_eq!(h.actor.state.checks, 1);
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_contained() {
        let mut h = harness(Arc::new(ExplodingStorefront), FakeBrowser::default());

        let outcome = h.actor.tick().await;
        let TickOutcome::Panicked(message) = outcome else {
            panic!("expected a panic outcome, got {outcome:?}");
        };
        assert_eq!(message, "storefront exploded");

        // The actor is still usable afterwards.
        assert!(matches!(h.actor.tick().await, TickOutcome::Panicked(_)));
    }

    #[tokio::test]
    async fn test_muted_ticks_skip_the_check() {
        let mut h = harness(
            scripted(&[false, false], &["inStock", "outOfStock"]),
            FakeBrowser::default(),
        );

        h.actor.tick().await;
        assert_eq!(h.session.texts(), vec!["Seems to be available!"]);

        h.actor.state.mute_for(Utc::now(), Duration::from_secs(1800));
        h.actor.publish();
        // Muted ticks skip the check entirely.
        assert!(matches!(h.actor.tick().await, TickOutcome::Muted));
        assert_eq!(h.session.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_mailbox_mute_status_and_stop() {
        let h = harness(scripted(&[], &[]), FakeBrowser::default());
        let handle = h.handle.clone();
        let task = tokio::spawn(h.actor.run());

        let until = handle.mute_for(Duration::from_secs(1800)).await.unwrap();
        assert!(until > Utc::now() + chrono::Duration::minutes(29));

        // A shorter mute never pulls the deadline in.
        let again = handle.mute_for(Duration::from_secs(60)).await.unwrap();
        assert_eq!(again, until);

        let status = handle.status().await.unwrap();
        assert_eq!(status.checks, 0);
        assert_eq!(status.muted_until, until);
        assert_eq!(status.period, Duration::from_secs(30));

        handle.stop().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    fn failing_forever() -> Arc<FakeStorefront> {
        let fake = FakeStorefront::default();
        for _ in 0..200 {
            fake.push_listing(Err(parse_error()));
        }
        Arc::new(fake)
    }

    fn patient_retries(h: &mut Harness) {
        h.actor.settings.check_retry = RetryPolicy::default();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_answers_while_a_check_is_retrying() {
        let mut h = harness(failing_forever(), FakeBrowser::default());
        patient_retries(&mut h);
        let handle = h.handle.clone();
        let task = tokio::spawn(h.actor.run());

        // First tick fires at 30s and keeps failing for up to five minutes.
        tokio::time::sleep(Duration::from_secs(31)).await;

        let status = tokio::time::timeout(Duration::from_secs(5), handle.status())
            .await
            .expect("status should not wait for the retry sequence")
            .unwrap();
        assert_eq!(status.checks, 0);

        let mute = handle.mute_for(Duration::from_secs(1800));
        let until = tokio::time::timeout(Duration::from_secs(5), mute)
            .await
            .expect("mute should not wait for the retry sequence")
            .unwrap();
        assert!(until > Utc::now() + chrono::Duration::minutes(29));

        handle.stop().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_a_retry() {
        let mut h = harness(failing_forever(), FakeBrowser::default());
        patient_retries(&mut h);
        let cancel = h.cancel.clone();
        let task = tokio::spawn(h.actor.run());

        tokio::time::sleep(Duration::from_secs(31)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_loop() {
        let h = harness(scripted(&[], &[]), FakeBrowser::default());
        let task = tokio::spawn(h.actor.run());

        h.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
