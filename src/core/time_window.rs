use crate::types::{SarError, SarResult, TimeWindow};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Default lookback for imagery searches
pub const LOOKBACK_DAYS: i64 = 365;

/// Computes the search interval ending at the acquisition instant
pub struct TimeWindowSelector;

impl TimeWindowSelector {
    /// Window `[now - lookback, now]`, normalized to UTC
    pub fn window<Tz: TimeZone>(now: &DateTime<Tz>, lookback: Duration) -> SarResult<TimeWindow> {
        if lookback <= Duration::zero() {
            return Err(SarError::Validation(format!(
                "lookback must be positive, got {} seconds",
                lookback.num_seconds()
            )));
        }

        let to = now.with_timezone(&Utc);
        let from = to.checked_sub_signed(lookback).ok_or_else(|| {
            SarError::Validation("lookback reaches before the representable time range".to_string())
        })?;

        Ok(TimeWindow { from, to })
    }

    /// Window with the standard 365-day lookback
    pub fn default_window<Tz: TimeZone>(now: &DateTime<Tz>) -> SarResult<TimeWindow> {
        Self::window(now, Duration::days(LOOKBACK_DAYS))
    }
}
