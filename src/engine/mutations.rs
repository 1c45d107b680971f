use chrono::{NaiveDate, Utc};
use ulid::Ulid;

use crate::model::{
    BlockedDate, Booking, BookingStatus, CakeDetails, CustomerInfo, Event, OverrideReason,
};

use super::status::compute_status;
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Insert or replace the override for a date. Idempotent: replaying the
    /// same arguments yields the same single record. An existing record
    /// keeps its original `created_at`.
    pub async fn upsert_override(
        &self,
        date: NaiveDate,
        reason: OverrideReason,
        capacity: Option<u32>,
        today: NaiveDate,
    ) -> Result<BlockedDate, EngineError> {
        if date < today {
            return Err(EngineError::PastDate(date));
        }
        let created_at = {
            let state = self.state.read().await;
            state
                .overrides
                .get(&date)
                .map(|r| r.created_at)
                .unwrap_or_else(Utc::now)
        };
        let event = Event::OverrideSet {
            date,
            reason,
            capacity,
            created_at,
        };
        self.persist_and_apply(event).await?;
        Ok(BlockedDate {
            date,
            reason,
            capacity,
            created_at,
        })
    }

    /// Remove the override, reverting the date to the default rules as if
    /// it was never set. Rejects past dates like every other mutation.
    /// No-op (and no WAL write) when absent.
    pub async fn clear_override(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), EngineError> {
        if date < today {
            return Err(EngineError::PastDate(date));
        }
        {
            let state = self.state.read().await;
            if !state.overrides.contains_key(&date) {
                return Ok(());
            }
        }
        self.persist_and_apply(Event::OverrideCleared { date }).await
    }

    /// Nudge a date's capacity by `delta`, clamped at zero, unbounded above.
    /// Preserves the existing reason; a date without a record becomes `Open`.
    pub async fn adjust_capacity(
        &self,
        date: NaiveDate,
        delta: i64,
        today: NaiveDate,
    ) -> Result<BlockedDate, EngineError> {
        if date < today {
            return Err(EngineError::PastDate(date));
        }
        let (reason, current) = {
            let state = self.state.read().await;
            match state.overrides.get(&date) {
                Some(r) => (
                    r.reason,
                    r.capacity.unwrap_or(crate::config::DEFAULT_CAPACITY),
                ),
                None => (OverrideReason::Open, crate::config::DEFAULT_CAPACITY),
            }
        };
        let adjusted = (current as i64 + delta).max(0) as u32;
        self.upsert_override(date, reason, Some(adjusted), today)
            .await
    }

    /// Record a booking created by checkout completion. Capacity is not
    /// enforced here — the booking flow is expected to have consulted the
    /// availability query first; we log when that evidently did not happen.
    pub async fn create_booking(
        &self,
        order_date: NaiveDate,
        customer_info: CustomerInfo,
        cake_details: CakeDetails,
        status: BookingStatus,
        today: NaiveDate,
    ) -> Result<Booking, EngineError> {
        {
            let state = self.state.read().await;
            let record = state.overrides.get(&order_date);
            let count = state.booking_count(order_date);
            let day = compute_status(order_date, today, record, count);
            if day == crate::model::DayStatus::Full {
                tracing::warn!("booking landed on a full day: {order_date}");
            }
        }

        let booking = Booking {
            id: Ulid::new(),
            order_date,
            customer_info,
            cake_details,
            status,
            created_at: Utc::now(),
        };
        let event = Event::BookingCreated {
            id: booking.id,
            order_date: booking.order_date,
            customer_info: booking.customer_info.clone(),
            cake_details: booking.cake_details.clone(),
            status: booking.status,
            created_at: booking.created_at,
        };
        self.persist_and_apply(event).await?;
        Ok(booking)
    }

    /// Admin lifecycle transition. Cancelled bookings stay on record; they
    /// simply stop counting against capacity.
    pub async fn set_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<Booking, EngineError> {
        {
            let state = self.state.read().await;
            if !state.bookings.contains_key(&id) {
                return Err(EngineError::BookingNotFound(id));
            }
        }
        self.persist_and_apply(Event::BookingStatusChanged { id, status })
            .await?;
        let state = self.state.read().await;
        state
            .bookings
            .get(&id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))
    }

    /// Rewrite the WAL with the minimal event set that recreates the
    /// current state: one OverrideSet per override, one BookingCreated per
    /// booking at its current status.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let events: Vec<Event> = {
            let state = self.state.read().await;
            let overrides = state.overrides.values().map(|r| Event::OverrideSet {
                date: r.date,
                reason: r.reason,
                capacity: r.capacity,
                created_at: r.created_at,
            });
            let bookings = state.bookings.values().map(|b| Event::BookingCreated {
                id: b.id,
                order_date: b.order_date,
                customer_info: b.customer_info.clone(),
                cake_details: b.cake_details.clone(),
                status: b.status,
                created_at: b.created_at,
            });
            overrides.chain(bookings).collect()
        };

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }
}
