//! Fetch window computation from a sync cursor.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The date range still missing for a symbol.
///
/// `start` is inclusive. `end` is the calendar date of the sync run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    /// First date to request.
    pub start: NaiveDate,
    /// Last date to request.
    pub end: NaiveDate,
}

impl FetchWindow {
    /// Computes the window for a symbol given its cursor (latest persisted date).
    ///
    /// - no cursor: `[now - lookback, now]`, starting at [`NaiveDate::MIN`]
    ///   when the lookback reaches past the calendar range
    /// - cursor: `[cursor + 1 day, now]`
    ///
    /// Returns `None` when the window start (midnight UTC of the start date)
    /// is not strictly before `now`; there is nothing to fetch.
    #[must_use]
    pub fn compute(cursor: Option<NaiveDate>, now: DateTime<Utc>, lookback: Duration) -> Option<Self> {
        let start = match cursor {
            Some(last) => last.succ_opt()?,
            None => now
                .checked_sub_signed(lookback)
                .map_or(NaiveDate::MIN, |start| start.date_naive()),
        };
        let start_instant = start.and_hms_opt(0, 0, 0)?.and_utc();
        if start_instant >= now {
            return None;
        }
        Some(Self {
            start,
            end: now.date_naive(),
        })
    }

    /// Number of calendar days covered, inclusive of both ends.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}
