use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::CoreError;

/// Clock abstracts access to the current timestamp so services remain deterministic in tests.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current UTC date. Defaults to `now().date_naive()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Reads the operating system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The kiosk's local calendar day, expressed as a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDay {
    offset: FixedOffset,
}

impl LocalDay {
    /// Western Indonesia Time (UTC+07:00).
    pub const WIB_OFFSET_MINUTES: i32 = 7 * 60;

    pub fn from_offset_minutes(minutes: i32) -> Result<Self, CoreError> {
        FixedOffset::east_opt(minutes * 60)
            .map(|offset| Self { offset })
            .ok_or_else(|| CoreError::Validation(format!("invalid UTC offset: {minutes} minutes")))
    }

    pub fn wib() -> Self {
        Self {
            offset: FixedOffset::east_opt(Self::WIB_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local calendar date of `instant`.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant of local midnight at the start of `date`.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::default());
        let utc = local_midnight - Duration::seconds(self.offset.local_minus_utc() as i64);
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }

    /// Most recent local midnight at or before `instant`.
    pub fn midnight_before(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of(self.date_of(instant))
    }

    /// Half-open UTC bounds `[start, end)` of the local `date`.
    pub fn bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_of(date);
        (start, start + Duration::days(1))
    }
}

impl Default for LocalDay {
    fn default() -> Self {
        Self::wib()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn midnight_follows_local_offset() {
        let day = LocalDay::wib();
        // 2025-03-01 18:30 UTC is 2025-03-02 01:30 WIB.
        let instant = Utc.with_ymd_and_hms(2025, 3, 1, 18, 30, 0).unwrap();
        assert_eq!(day.date_of(instant), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(
            day.midnight_before(instant),
            Utc.with_ymd_and_hms(2025, 3, 1, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        assert!(LocalDay::from_offset_minutes(25 * 60).is_err());
        assert!(LocalDay::from_offset_minutes(-3 * 60).is_ok());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        clock.advance(Duration::hours(30));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
    }
}
