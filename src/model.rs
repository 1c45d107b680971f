use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// Manual override of a date's default availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideReason {
    /// Force the date open: bypasses the buffer window and closed weekdays.
    Open,
    /// Vacation — the bakery is away.
    Away,
    /// Explicitly closed.
    Closed,
}

/// Persisted override record. At most one per calendar date; absence means
/// the default rules apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedDate {
    pub date: NaiveDate,
    pub reason: OverrideReason,
    /// Overrides the default daily capacity when set.
    pub capacity: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Cancelled bookings stay on record but never consume capacity.
    pub fn counts_against_capacity(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Denormalized snapshot of what was ordered — not a live product reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CakeDetails {
    pub name: String,
    pub size: String,
    pub flavor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    /// The calendar date the order is scheduled for (business-local).
    pub order_date: NaiveDate,
    pub customer_info: CustomerInfo,
    pub cake_details: CakeDetails,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Derived per-date status. Never persisted — computed per query from
/// today's date, the override record, and the booking count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Past,
    Available,
    Full,
    Buffer,
    Closed,
    Away,
}

impl DayStatus {
    /// True for every status the customer-facing date picker must disable.
    /// `Past` is excluded — the picker already floors at today.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DayStatus::Full | DayStatus::Buffer | DayStatus::Closed | DayStatus::Away
        )
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    OverrideSet {
        date: NaiveDate,
        reason: OverrideReason,
        capacity: Option<u32>,
        created_at: DateTime<Utc>,
    },
    OverrideCleared {
        date: NaiveDate,
    },
    BookingCreated {
        id: Ulid,
        order_date: NaiveDate,
        customer_info: CustomerInfo,
        cake_details: CakeDetails,
        status: BookingStatus,
        created_at: DateTime<Utc>,
    },
    BookingStatusChanged {
        id: Ulid,
        status: BookingStatus,
    },
}

// ── Date parsing at the I/O boundary ─────────────────────────────

/// Parse a strict ISO `YYYY-MM-DD` calendar date. Malformed input is an
/// error, never a silent default.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| EngineError::InvalidDate(raw.to_string()))
}

/// Normalize an order date that may arrive as either a plain calendar date
/// or a full RFC 3339 timestamp — both forms appear historically. A plain
/// date is taken as already business-local; a timestamp is converted to the
/// business offset before truncating, so the embedded offset never shifts
/// the booking to a neighboring day.
pub fn normalize_order_date(raw: &str, tz_offset_minutes: i32) -> Result<NaiveDate, EngineError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            (dt.with_timezone(&Utc) + chrono::Duration::minutes(tz_offset_minutes as i64))
                .date_naive()
        })
        .map_err(|_| EngineError::InvalidDate(raw.to_string()))
}

/// Parse a `YYYY-MM` month selector, returning the first day of that month.
pub fn parse_iso_month(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .map_err(|_| EngineError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_iso_date() {
        let d = parse_iso_date("2025-06-05").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 6, 5).unwrap());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_iso_date("2025-6-5").is_err());
        assert!(parse_iso_date("06/05/2025").is_err());
        assert!(parse_iso_date("2025-13-01").is_err());
        assert!(parse_iso_date("").is_err());
    }

    #[test]
    fn parse_rejects_datetime_for_plain_date() {
        // Strict: a timestamp is not a calendar date.
        assert!(parse_iso_date("2025-06-05T10:00:00Z").is_err());
    }

    #[test]
    fn normalize_accepts_both_historical_forms() {
        let plain = normalize_order_date("2025-07-02", 0).unwrap();
        let stamped = normalize_order_date("2025-07-02T15:30:00+00:00", 0).unwrap();
        assert_eq!(plain, stamped);
    }

    #[test]
    fn normalize_truncates_in_business_timezone() {
        // 23:30 UTC is already the next day for a business two hours east.
        let east = normalize_order_date("2025-07-02T23:30:00Z", 120).unwrap();
        assert_eq!(east, NaiveDate::from_ymd_opt(2025, 7, 3).unwrap());
        let utc = normalize_order_date("2025-07-02T23:30:00Z", 0).unwrap();
        assert_eq!(utc, NaiveDate::from_ymd_opt(2025, 7, 2).unwrap());

        // The embedded offset names the same instant; the business offset
        // decides the calendar date.
        let shifted = normalize_order_date("2025-07-03T01:30:00+02:00", 0).unwrap();
        assert_eq!(shifted, NaiveDate::from_ymd_opt(2025, 7, 2).unwrap());
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize_order_date("next tuesday", 0).is_err());
    }

    #[test]
    fn month_selector_parses() {
        let first = parse_iso_month("2025-06").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(parse_iso_month("2025").is_err());
        assert!(parse_iso_month("2025-00").is_err());
    }

    #[test]
    fn cancelled_does_not_count() {
        assert!(BookingStatus::Pending.counts_against_capacity());
        assert!(BookingStatus::Confirmed.counts_against_capacity());
        assert!(!BookingStatus::Cancelled.counts_against_capacity());
    }

    #[test]
    fn day_status_unavailable_set() {
        assert!(DayStatus::Full.is_unavailable());
        assert!(DayStatus::Buffer.is_unavailable());
        assert!(DayStatus::Closed.is_unavailable());
        assert!(DayStatus::Away.is_unavailable());
        assert!(!DayStatus::Available.is_unavailable());
        assert!(!DayStatus::Past.is_unavailable());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::OverrideSet {
            date: NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(),
            reason: OverrideReason::Open,
            capacity: Some(3),
            created_at: Utc::now(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn booking_event_roundtrip() {
        let event = Event::BookingCreated {
            id: Ulid::new(),
            order_date: NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            customer_info: CustomerInfo {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                phone: None,
            },
            cake_details: CakeDetails {
                name: "Chocolate Fudge".into(),
                size: "8 inch".into(),
                flavor: "chocolate".into(),
            },
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn status_wire_format_is_lowercase() {
        let s = serde_json::to_string(&BookingStatus::Cancelled).unwrap();
        assert_eq!(s, "\"cancelled\"");
        let d = serde_json::to_string(&DayStatus::Buffer).unwrap();
        assert_eq!(d, "\"buffer\"");
    }

    #[test]
    fn reason_wire_format_is_capitalized() {
        // Matches the historical records: "Open" / "Closed" / "Away".
        let s = serde_json::to_string(&OverrideReason::Away).unwrap();
        assert_eq!(s, "\"Away\"");
    }
}
