use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::{debug, warn};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{AutoSendConfig, DispatchRecord};
use crate::storage::KeyValueStore;
use crate::utils::parse_time_of_day;

/// True when an automatic dispatch should run at `now`: auto-send is on, the
/// configured hour and minute equal the current ones, and nothing was sent
/// yet today. A missed minute is not caught up later the same day.
pub fn should_auto_dispatch(
    record: &DispatchRecord,
    now: NaiveDateTime,
    config: &AutoSendConfig,
) -> bool {
    if !config.enabled {
        return false;
    }
    let target = match parse_time_of_day(&config.time_of_day) {
        Ok(t) => t,
        Err(e) => {
            warn!("auto-send disabled for this check: {e}");
            return false;
        }
    };
    if now.hour() != target.hour() || now.minute() != target.minute() {
        return false;
    }
    let today = now.date();
    if record.last_auto_send_date == Some(today) {
        debug!("auto-send already done for {today}");
        return false;
    }
    true
}

pub fn mark_dispatched(now: NaiveDateTime) -> DispatchRecord {
    DispatchRecord {
        last_auto_send_date: Some(now.date()),
    }
}

/// Per-day "birthday alert dismissed" flags. UI state only; automatic sends
/// never consult it.
pub struct AlertDismissals {
    store: Arc<dyn KeyValueStore>,
}

impl AlertDismissals {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(date: NaiveDate) -> String {
        format!("alert_dismissed_{}", date.format("%Y-%m-%d"))
    }

    pub fn is_dismissed(&self, date: NaiveDate) -> bool {
        match self.store.get(&Self::key(date)) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!("cannot read alert state for {date}: {e}");
                false
            }
        }
    }

    pub fn dismiss(&self, date: NaiveDate) -> Result<()> {
        self.store.set(&Self::key(date), "true")?;
        Ok(())
    }

    pub fn reset(&self, date: NaiveDate) -> Result<()> {
        self.store.remove(&Self::key(date))?;
        Ok(())
    }
}
