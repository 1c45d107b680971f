use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc, Weekday};

// ── Domain constants ─────────────────────────────────────────────
// Named in one place instead of scattered literals.

/// Maximum non-cancelled bookings per day unless overridden.
pub const DEFAULT_CAPACITY: u32 = 2;

/// Lead-time window: dates within `today..today+BUFFER_DAYS` are
/// presumptively unavailable unless explicitly marked `Open`.
pub const BUFFER_DAYS: i64 = 10;

/// Weekdays the bakery does not take orders on.
pub const CLOSED_WEEKDAYS: [Weekday; 3] = [Weekday::Sun, Weekday::Mon, Weekday::Tue];

/// Largest preset offered by the bulk capacity action.
pub const MAX_BULK_CAPACITY: u32 = 5;

// ── Service limits ───────────────────────────────────────────────

/// Widest date range a single availability/booking query may scan.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Most dates one bulk action may touch.
pub const MAX_BULK_DATES: usize = 100;

pub const MAX_STORES: usize = 16;
pub const MAX_STORE_NAME_LEN: usize = 64;

/// Ceiling on a single store round-trip before a timeout error surfaces.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn is_closed_weekday(date: NaiveDate) -> bool {
    CLOSED_WEEKDAYS.contains(&date.weekday())
}

// ── Runtime configuration ────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: String,
    pub admin_token: String,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    /// Fixed offset from UTC for the business's local calendar, in minutes.
    pub tz_offset_minutes: i32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind: std::env::var("OVENBOOK_BIND").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("OVENBOOK_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            data_dir: std::env::var("OVENBOOK_DATA_DIR").unwrap_or_else(|_| "./data".into()),
            admin_token: std::env::var("OVENBOOK_ADMIN_TOKEN")
                .unwrap_or_else(|_| "ovenbook".into()),
            metrics_port: std::env::var("OVENBOOK_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            compact_threshold: std::env::var("OVENBOOK_COMPACT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
            tz_offset_minutes: std::env::var("OVENBOOK_TZ_OFFSET_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Today's calendar date in the business's local timezone. Comparisons
    /// elsewhere only ever see calendar dates, so timezone drift cannot
    /// shift a date by a day past this point.
    pub fn today(&self) -> NaiveDate {
        (Utc::now() + chrono::Duration::minutes(self.tz_offset_minutes as i64)).date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_weekdays_are_sun_mon_tue() {
        // 2025-06-01 is a Sunday.
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(is_closed_weekday(sunday));
        assert!(is_closed_weekday(sunday + chrono::Duration::days(1))); // Mon
        assert!(is_closed_weekday(sunday + chrono::Duration::days(2))); // Tue
        assert!(!is_closed_weekday(sunday + chrono::Duration::days(3))); // Wed
        assert!(!is_closed_weekday(sunday + chrono::Duration::days(6))); // Sat
    }

    #[test]
    fn weekday_sanity() {
        assert_eq!(
            NaiveDate::from_ymd_opt(2025, 7, 2).unwrap().weekday(),
            Weekday::Wed
        );
    }
}
