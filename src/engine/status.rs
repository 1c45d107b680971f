use chrono::{Duration, NaiveDate};

use crate::config::{is_closed_weekday, BUFFER_DAYS, DEFAULT_CAPACITY};
use crate::model::{BlockedDate, DayStatus, OverrideReason};

// ── Date-status rules ─────────────────────────────────────────────
//
// Ordered rule evaluator for a single calendar date. Priority:
//   1. past          (strictly before today)
//   2. Open override (bypasses buffer + closed weekdays; capacity still applies)
//   3. Away override
//   4. Closed override, or closed weekday
//   5. buffer window (today <= date < today + buffer_days)
//   6. capacity      (available vs full)

/// Capacity actually applied to a date: the override if set, else the default.
pub fn effective_capacity(record: Option<&BlockedDate>, default_capacity: u32) -> u32 {
    record
        .and_then(|r| r.capacity)
        .unwrap_or(default_capacity)
}

/// Slots left on a date, floored at zero.
pub fn remaining_slots(capacity: u32, booking_count: u32) -> u32 {
    capacity.saturating_sub(booking_count)
}

pub fn in_buffer_window(date: NaiveDate, today: NaiveDate, buffer_days: i64) -> bool {
    date >= today && date < today + Duration::days(buffer_days)
}

/// Full-parameter form of the rule evaluator; `compute_status` applies the
/// configured defaults.
pub fn compute_status_with(
    date: NaiveDate,
    today: NaiveDate,
    record: Option<&BlockedDate>,
    booking_count: u32,
    default_capacity: u32,
    buffer_days: i64,
) -> DayStatus {
    if date < today {
        return DayStatus::Past;
    }

    let capacity = effective_capacity(record, default_capacity);
    match record.map(|r| r.reason) {
        Some(OverrideReason::Open) => {
            // An Open override supersedes the buffer window and closed
            // weekdays, but a fully booked day still reads full — capacity
            // overrides are stored with reason Open, so skipping the check
            // here would make every capped day oversellable.
            if booking_count < capacity {
                return DayStatus::Available;
            }
            return DayStatus::Full;
        }
        Some(OverrideReason::Away) => return DayStatus::Away,
        Some(OverrideReason::Closed) => return DayStatus::Closed,
        None => {}
    }

    if is_closed_weekday(date) {
        return DayStatus::Closed;
    }
    if in_buffer_window(date, today, buffer_days) {
        return DayStatus::Buffer;
    }
    if booking_count < capacity {
        DayStatus::Available
    } else {
        DayStatus::Full
    }
}

pub fn compute_status(
    date: NaiveDate,
    today: NaiveDate,
    record: Option<&BlockedDate>,
    booking_count: u32,
) -> DayStatus {
    compute_status_with(date, today, record, booking_count, DEFAULT_CAPACITY, BUFFER_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(date: NaiveDate, reason: OverrideReason, capacity: Option<u32>) -> BlockedDate {
        BlockedDate {
            date,
            reason,
            capacity,
            created_at: Utc::now(),
        }
    }

    // today = Sunday 2025-06-01 in most tests below.
    const TODAY: (i32, u32, u32) = (2025, 6, 1);

    fn today() -> NaiveDate {
        d(TODAY.0, TODAY.1, TODAY.2)
    }

    // ── priority 1: past ──────────────────────────────────

    #[test]
    fn past_dates_are_past() {
        assert_eq!(compute_status(d(2025, 5, 31), today(), None, 0), DayStatus::Past);
        assert_eq!(compute_status(d(2024, 12, 25), today(), None, 0), DayStatus::Past);
    }

    #[test]
    fn past_beats_open_override() {
        let date = d(2025, 5, 28);
        let rec = record(date, OverrideReason::Open, None);
        assert_eq!(compute_status(date, today(), Some(&rec), 0), DayStatus::Past);
    }

    // ── priority 2: open override ─────────────────────────

    #[test]
    fn open_override_beats_buffer_window() {
        // Spec scenario: today = 2025-06-01, date = 2025-06-05 marked Open.
        let date = d(2025, 6, 5);
        let rec = record(date, OverrideReason::Open, None);
        assert_eq!(
            compute_status(date, today(), Some(&rec), 0),
            DayStatus::Available
        );
    }

    #[test]
    fn open_override_beats_closed_weekday() {
        // 2025-06-16 is a Monday, normally closed, well outside the buffer.
        let date = d(2025, 6, 16);
        let rec = record(date, OverrideReason::Open, None);
        assert_eq!(
            compute_status(date, today(), Some(&rec), 0),
            DayStatus::Available
        );
    }

    #[test]
    fn open_override_still_fills_up() {
        let date = d(2025, 6, 18);
        let rec = record(date, OverrideReason::Open, Some(3));
        assert_eq!(compute_status(date, today(), Some(&rec), 2), DayStatus::Available);
        assert_eq!(compute_status(date, today(), Some(&rec), 3), DayStatus::Full);
    }

    // ── priority 3/4: away and closed ─────────────────────

    #[test]
    fn away_override_wins_over_weekday_rules() {
        // A Wednesday outside the buffer, marked Away.
        let date = d(2025, 6, 18);
        let rec = record(date, OverrideReason::Away, None);
        assert_eq!(compute_status(date, today(), Some(&rec), 0), DayStatus::Away);
    }

    #[test]
    fn closed_override_on_open_weekday() {
        let date = d(2025, 6, 18);
        let rec = record(date, OverrideReason::Closed, None);
        assert_eq!(compute_status(date, today(), Some(&rec), 0), DayStatus::Closed);
    }

    #[test]
    fn closed_weekdays_without_override() {
        // Sun/Mon/Tue 2025-06-15..17, outside the 10-day buffer.
        assert_eq!(compute_status(d(2025, 6, 15), today(), None, 0), DayStatus::Closed);
        assert_eq!(compute_status(d(2025, 6, 16), today(), None, 0), DayStatus::Closed);
        assert_eq!(compute_status(d(2025, 6, 17), today(), None, 0), DayStatus::Closed);
    }

    #[test]
    fn closed_weekday_beats_buffer() {
        // 2025-06-02 is a Monday inside the buffer window: closed, not buffer.
        assert_eq!(compute_status(d(2025, 6, 2), today(), None, 0), DayStatus::Closed);
    }

    // ── priority 5: buffer window ─────────────────────────

    #[test]
    fn default_buffer_scenario() {
        // Spec scenario: today = 2025-06-01, date = 2025-06-05 (Thursday, no
        // override) → buffer.
        assert_eq!(compute_status(d(2025, 6, 5), today(), None, 0), DayStatus::Buffer);
    }

    #[test]
    fn buffer_window_boundaries() {
        // today = Wednesday 2025-06-04: today itself is in the window,
        // today+9 (Friday) is the last buffered day, today+10 (Saturday) is out.
        let today = d(2025, 6, 4);
        assert_eq!(compute_status(today, today, None, 0), DayStatus::Buffer);
        assert_eq!(compute_status(d(2025, 6, 13), today, None, 0), DayStatus::Buffer);
        assert_eq!(compute_status(d(2025, 6, 14), today, None, 0), DayStatus::Available);
    }

    // ── priority 6: capacity ──────────────────────────────

    #[test]
    fn full_day_scenario() {
        // Spec scenario: Wednesday 2025-07-02, default capacity 2, two
        // non-cancelled bookings → full.
        let date = d(2025, 7, 2);
        assert_eq!(compute_status(date, today(), None, 1), DayStatus::Available);
        assert_eq!(compute_status(date, today(), None, 2), DayStatus::Full);
    }

    #[test]
    fn capacity_override_applies() {
        let date = d(2025, 7, 2);
        let rec = record(date, OverrideReason::Open, Some(5));
        assert_eq!(compute_status(date, today(), Some(&rec), 4), DayStatus::Available);
        assert_eq!(compute_status(date, today(), Some(&rec), 5), DayStatus::Full);
    }

    #[test]
    fn zero_capacity_is_always_full() {
        let date = d(2025, 7, 2);
        let rec = record(date, OverrideReason::Open, Some(0));
        assert_eq!(compute_status(date, today(), Some(&rec), 0), DayStatus::Full);
    }

    // ── helpers ───────────────────────────────────────────

    #[test]
    fn effective_capacity_default_and_override() {
        assert_eq!(effective_capacity(None, DEFAULT_CAPACITY), 2);
        let rec = record(d(2025, 7, 2), OverrideReason::Open, Some(4));
        assert_eq!(effective_capacity(Some(&rec), DEFAULT_CAPACITY), 4);
        // Override record without a capacity falls back to the default.
        let rec = record(d(2025, 7, 2), OverrideReason::Closed, None);
        assert_eq!(effective_capacity(Some(&rec), DEFAULT_CAPACITY), 2);
    }

    #[test]
    fn remaining_slots_floors_at_zero() {
        assert_eq!(remaining_slots(2, 0), 2);
        assert_eq!(remaining_slots(2, 2), 0);
        assert_eq!(remaining_slots(2, 5), 0);
    }

    #[test]
    fn custom_buffer_width() {
        // A 3-day buffer: today+3 (Thursday 2025-06-05 from Monday 06-02) is out.
        let today = d(2025, 6, 2);
        assert_eq!(
            compute_status_with(d(2025, 6, 4), today, None, 0, 2, 3),
            DayStatus::Buffer
        );
        assert_eq!(
            compute_status_with(d(2025, 6, 5), today, None, 0, 2, 3),
            DayStatus::Available
        );
    }
}
