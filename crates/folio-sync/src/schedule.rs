//! Weekly wall-clock gate for scheduled refreshes.

use chrono::{DateTime, Datelike, LocalResult, TimeDelta, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use folio_core::{DataError, Result};

/// A weekly trigger instant, e.g. Friday 17:00 US/Eastern.
///
/// The schedule only answers "has a refresh been missed"; it never runs one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshSchedule {
    weekday: Weekday,
    hour: u32,
    timezone: Tz,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            weekday: Weekday::Fri,
            hour: 17,
            timezone: chrono_tz::US::Eastern,
        }
    }
}

impl RefreshSchedule {
    /// Creates a schedule firing every `weekday` at `hour:00` in `timezone`.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if `hour` is not in `0..24`.
    pub fn new(weekday: Weekday, hour: u32, timezone: Tz) -> Result<Self> {
        if hour >= 24 {
            return Err(DataError::InvalidParameter(format!(
                "Refresh hour must be below 24, got {hour}"
            )));
        }
        Ok(Self {
            weekday,
            hour,
            timezone,
        })
    }

    /// Replaces the time zone by IANA name (e.g. `"US/Eastern"`).
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] for an unknown zone name.
    pub fn with_timezone_name(mut self, name: &str) -> Result<Self> {
        self.timezone = name
            .parse()
            .map_err(|e| DataError::InvalidParameter(format!("Unknown time zone '{name}': {e}")))?;
        Ok(self)
    }

    /// Trigger weekday.
    #[must_use]
    pub const fn weekday(&self) -> Weekday {
        self.weekday
    }

    /// Trigger hour in local time.
    #[must_use]
    pub const fn hour(&self) -> u32 {
        self.hour
    }

    /// Trigger time zone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The most recent trigger instant at or before `now`.
    #[must_use]
    pub fn last_trigger_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.timezone);
        let days_back = (7 + local.weekday().num_days_from_monday()
            - self.weekday.num_days_from_monday())
            % 7;
        let date = local.date_naive() - TimeDelta::days(i64::from(days_back));

        let trigger = self.trigger_on(date);
        if trigger <= now {
            trigger
        } else {
            self.trigger_on(date - TimeDelta::weeks(1))
        }
    }

    /// True when a trigger has passed since `last_updated` (or nothing was
    /// ever written).
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>, last_updated: Option<DateTime<Utc>>) -> bool {
        let trigger = self.last_trigger_before(now);
        last_updated.is_none_or(|written| written < trigger)
    }

    fn trigger_on(&self, date: chrono::NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(chrono::NaiveTime::MIN) + TimeDelta::hours(i64::from(self.hour));
        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
            // Spring-forward gap.
            LocalResult::None => self.timezone.from_utc_datetime(&naive).with_timezone(&Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_friday_evening_winter() {
        // 2024-01-05 is a Friday; 17:00 EST is 22:00 UTC.
        let schedule = RefreshSchedule::default();
        assert_eq!(schedule.last_trigger_before(utc(1, 5, 22, 30)), utc(1, 5, 22, 0));
        assert_eq!(schedule.last_trigger_before(utc(1, 5, 22, 0)), utc(1, 5, 22, 0));
    }

    #[test]
    fn test_before_trigger_falls_back_a_week() {
        let schedule = RefreshSchedule::default();
        let previous = Utc.with_ymd_and_hms(2023, 12, 29, 22, 0, 0).unwrap();
        assert_eq!(schedule.last_trigger_before(utc(1, 5, 21, 59)), previous);
    }

    #[test]
    fn test_summer_offset() {
        // 2024-07-05 is a Friday; 17:00 EDT is 21:00 UTC.
        let schedule = RefreshSchedule::default();
        assert_eq!(schedule.last_trigger_before(utc(7, 8, 12, 0)), utc(7, 5, 21, 0));
    }

    #[test]
    fn test_is_due_around_boundary() {
        let schedule = RefreshSchedule::default();
        let after = utc(1, 5, 22, 30);
        assert!(schedule.is_due(after, Some(utc(1, 5, 21, 0))));
        assert!(!schedule.is_due(after, Some(utc(1, 5, 22, 15))));
        assert!(schedule.is_due(after, None));

        let before = utc(1, 5, 21, 30);
        assert!(!schedule.is_due(before, Some(utc(1, 1, 12, 0))));
    }

    #[test]
    fn test_custom_schedule() {
        let schedule = RefreshSchedule::new(Weekday::Mon, 9, Tz::UTC).unwrap();
        // 2024-01-10 is a Wednesday.
        assert_eq!(schedule.last_trigger_before(utc(1, 10, 0, 0)), utc(1, 8, 9, 0));
        assert!(RefreshSchedule::new(Weekday::Mon, 24, Tz::UTC).is_err());
    }

    #[test]
    fn test_timezone_by_name() {
        let schedule = RefreshSchedule::default().with_timezone_name("Europe/London").unwrap();
        assert_eq!(schedule.timezone(), chrono_tz::Europe::London);
        assert!(RefreshSchedule::default().with_timezone_name("Mars/Olympus").is_err());
    }
}
