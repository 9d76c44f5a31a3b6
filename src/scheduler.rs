//! Daily auto-send loop.
//!
//! A fixed-interval timer asks the dispatch gate whether the configured
//! minute has come. When it has, the day is marked as dispatched and saved
//! before anyone is greeted, so a restart halfway through never sends twice
//! on the same day.

use chrono::{Local, NaiveDateTime};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::contacts::ContactStore;
use crate::dispatch::{DispatchReport, send_each};
use crate::gate::{mark_dispatched, should_auto_dispatch};
use crate::matcher::match_birthdays;
use crate::models::Contact;
use crate::sink::SendSink;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(1000);

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate closed; nothing to do this time.
    Idle,
    /// A previous check is still dispatching.
    Skipped,
    /// The gate opened and the day's greetings were handed off.
    Dispatched(DispatchReport),
    /// The gate opened but the dispatch record could not be saved.
    Failed,
}

/// Result of checking the gate under the store lock.
enum Claim {
    NotDue,
    Due {
        recipients: Vec<Contact>,
        template: String,
    },
    /// The store could not be locked or the record could not be saved.
    Unavailable,
}

/// Clears the in-progress flag when the check ends, however it ends.
struct CheckGuard(Arc<AtomicBool>);

impl CheckGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for CheckGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    store: Arc<Mutex<ContactStore>>,
    sink: Arc<dyn SendSink>,
    clock: Arc<dyn Clock>,
    check_interval: Duration,
    send_delay: Duration,
    in_progress: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(store: Arc<Mutex<ContactStore>>, sink: Arc<dyn SendSink>) -> Self {
        Self {
            store,
            sink,
            clock: Arc::new(SystemClock),
            check_interval: DEFAULT_CHECK_INTERVAL,
            send_delay: DEFAULT_SEND_DELAY,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Opens the gate for `now` if it should open, persisting the new record,
    /// and returns the day's recipients and template. Reads the stored
    /// configuration first so edits saved elsewhere are honored.
    fn claim_today(&self, now: NaiveDateTime) -> Claim {
        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(_) => {
                error!("contact store lock poisoned, skipping check");
                return Claim::Unavailable;
            }
        };
        store.reload();
        let cfg = store.configuration();
        if !should_auto_dispatch(&cfg.dispatch, now, &cfg.auto_send) {
            return Claim::NotDue;
        }
        if let Err(e) = store.record_dispatch(mark_dispatched(now)) {
            error!("cannot save dispatch record, not sending today's greetings: {e}");
            return Claim::Unavailable;
        }
        let cfg = store.configuration();
        Claim::Due {
            recipients: match_birthdays(&cfg.contacts, now.date())
                .into_iter()
                .cloned()
                .collect(),
            template: cfg.message_template.clone(),
        }
    }

    /// One check. Never overlaps with another check on the same scheduler.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = CheckGuard::acquire(&self.in_progress) else {
            warn!("previous check still dispatching, skipping this tick");
            return TickOutcome::Skipped;
        };
        let now = self.clock.now();
        let (recipients, template) = match self.claim_today(now) {
            Claim::Due {
                recipients,
                template,
            } => (recipients, template),
            Claim::NotDue => {
                debug!("auto-send check at {now}: nothing due");
                return TickOutcome::Idle;
            }
            Claim::Unavailable => return TickOutcome::Failed,
        };

        info!(
            "auto-send for {}: {} birthday(s)",
            now.date(),
            recipients.len()
        );
        let refs: Vec<&Contact> = recipients.iter().collect();
        let report = send_each(&refs, &template, self.sink.as_ref(), self.send_delay).await;
        info!(
            "auto-send finished: {} sent, {} skipped, {} failed",
            report.sent, report.skipped, report.failed
        );
        TickOutcome::Dispatched(report)
    }

    /// Starts the recurring check. The first check runs immediately.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let this = Arc::new(self);
        let join = tokio::spawn(async move {
            info!(
                "scheduler started, checking every {}s",
                this.check_interval.as_secs_f32()
            );
            let mut interval = tokio::time::interval(this.check_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // A started dispatch runs to completion even if the
                        // scheduler is stopped meanwhile.
                        let check = this.clone();
                        tokio::spawn(async move {
                            check.tick().await;
                        });
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("scheduler stopped");
        });
        SchedulerHandle { stop_tx, join }
    }
}

/// Dropping the handle also stops the timer.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join.await {
            error!("scheduler task ended abnormally: {e}");
        }
    }
}
