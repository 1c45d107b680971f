use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use ulid::Ulid;

use crate::config::MAX_RANGE_DAYS;
use crate::model::{BlockedDate, Booking, DayStatus};

use super::status::{compute_status, effective_capacity, remaining_slots};
use super::{Engine, EngineError};

// ── Query result types ───────────────────────────────────────────

/// What the admin calendar needs to paint one booking entry in a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEntry {
    pub id: Ulid,
    pub customer: String,
    pub product: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub date: NaiveDate,
    /// Day of month, 1-based.
    pub day: u32,
    pub status: DayStatus,
    pub booking_count: u32,
    pub remaining_slots: u32,
    pub bookings: Vec<BookingEntry>,
}

/// One month of cells plus the blank-cell count that aligns day 1 to its
/// weekday column in a Sunday-first grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGrid {
    pub month: String,
    pub leading_blanks: u32,
    pub cells: Vec<DayCell>,
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), EngineError> {
    if start > end {
        return Err(EngineError::InvalidRange { start, end });
    }
    if (end - start).num_days() >= MAX_RANGE_DAYS {
        return Err(EngineError::LimitExceeded("date range too wide"));
    }
    Ok(())
}

impl Engine {
    /// Override records, optionally limited to an inclusive date range,
    /// ordered by date.
    pub async fn list_overrides(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<BlockedDate>, EngineError> {
        let state = self.state.read().await;
        match range {
            Some((start, end)) => {
                validate_range(start, end)?;
                Ok(state.overrides.range(start..=end).map(|(_, r)| r.clone()).collect())
            }
            None => Ok(state.overrides.values().cloned().collect()),
        }
    }

    pub async fn get_override(&self, date: NaiveDate) -> Option<BlockedDate> {
        self.state.read().await.overrides.get(&date).cloned()
    }

    /// Bookings whose order date falls in the inclusive range, ordered by
    /// date. Cancelled bookings are kept for the audit variant only.
    pub async fn bookings_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_cancelled: bool,
    ) -> Result<Vec<Booking>, EngineError> {
        validate_range(start, end)?;
        let state = self.state.read().await;
        let mut out = Vec::new();
        for ids in state.by_date.range(start..=end).map(|(_, ids)| ids) {
            for id in ids {
                if let Some(booking) = state.bookings.get(id)
                    && (include_cancelled || booking.status.counts_against_capacity()) {
                        out.push(booking.clone());
                    }
            }
        }
        Ok(out)
    }

    /// Non-cancelled booking counts grouped by calendar date. Dates with no
    /// bookings are absent from the map.
    pub async fn count_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, u32>, EngineError> {
        validate_range(start, end)?;
        let state = self.state.read().await;
        let mut counts = BTreeMap::new();
        for (date, _) in state.by_date.range(start..=end) {
            let n = state.booking_count(*date);
            if n > 0 {
                counts.insert(*date, n);
            }
        }
        Ok(counts)
    }

    /// Every date in the inclusive range the customer-facing picker must
    /// disable: closed, away, buffered, or fully booked. Past dates are not
    /// reported (the picker floors at today).
    pub async fn unavailable_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        validate_range(start, end)?;
        let state = self.state.read().await;
        let mut out = Vec::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            let record = state.overrides.get(&date);
            let count = state.booking_count(date);
            if compute_status(date, today, record, count).is_unavailable() {
                out.push(date);
            }
        }
        Ok(out)
    }

    /// Derived state for one month of the admin calendar.
    pub async fn month_grid(
        &self,
        first_of_month: NaiveDate,
        today: NaiveDate,
    ) -> Result<MonthGrid, EngineError> {
        let next_month = first_of_month + Months::new(1);
        let state = self.state.read().await;

        let mut cells = Vec::with_capacity(31);
        for date in first_of_month.iter_days().take_while(|d| *d < next_month) {
            let record = state.overrides.get(&date);
            let count = state.booking_count(date);
            let capacity = effective_capacity(record, crate::config::DEFAULT_CAPACITY);
            let bookings = state
                .by_date
                .get(&date)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| state.bookings.get(id))
                        .filter(|b| b.status.counts_against_capacity())
                        .map(|b| BookingEntry {
                            id: b.id,
                            customer: b.customer_info.name.clone(),
                            product: b.cake_details.name.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            cells.push(DayCell {
                date,
                day: date.day(),
                status: compute_status(date, today, record, count),
                booking_count: count,
                remaining_slots: remaining_slots(capacity, count),
                bookings,
            });
        }

        Ok(MonthGrid {
            month: first_of_month.format("%Y-%m").to_string(),
            leading_blanks: first_of_month.weekday().num_days_from_sunday(),
            cells,
        })
    }
}
