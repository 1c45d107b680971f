mod bulk;
mod error;
mod mutations;
mod queries;
mod status;

pub use bulk::{BulkAction, BulkFailure, BulkReport};
pub use error::EngineError;
pub use queries::{DayCell, MonthGrid};
pub use status::{compute_status, compute_status_with, effective_capacity, remaining_slots};

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::config::STORE_TIMEOUT;
use crate::model::{BlockedDate, Booking, Event};
use crate::wal::Wal;

// ── In-memory schedule state ─────────────────────────────────────

/// The live schedule for one storefront. Ordered by date so range scans are
/// a `BTreeMap::range` away.
#[derive(Default)]
pub(crate) struct ScheduleState {
    pub overrides: BTreeMap<NaiveDate, BlockedDate>,
    pub bookings: HashMap<Ulid, Booking>,
    /// Date index over bookings, cancelled ones included (queries filter).
    pub by_date: BTreeMap<NaiveDate, Vec<Ulid>>,
}

impl ScheduleState {
    /// Non-cancelled bookings on a date.
    pub fn booking_count(&self, date: NaiveDate) -> u32 {
        self.by_date
            .get(&date)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        self.bookings
                            .get(id)
                            .is_some_and(|b| b.status.counts_against_capacity())
                    })
                    .count() as u32
            })
            .unwrap_or(0)
    }

    fn apply(&mut self, event: &Event) {
        match event {
            Event::OverrideSet {
                date,
                reason,
                capacity,
                created_at,
            } => {
                self.overrides.insert(
                    *date,
                    BlockedDate {
                        date: *date,
                        reason: *reason,
                        capacity: *capacity,
                        created_at: *created_at,
                    },
                );
            }
            Event::OverrideCleared { date } => {
                self.overrides.remove(date);
            }
            Event::BookingCreated {
                id,
                order_date,
                customer_info,
                cake_details,
                status,
                created_at,
            } => {
                self.bookings.insert(
                    *id,
                    Booking {
                        id: *id,
                        order_date: *order_date,
                        customer_info: customer_info.clone(),
                        cake_details: cake_details.clone(),
                        status: *status,
                        created_at: *created_at,
                    },
                );
                self.by_date.entry(*order_date).or_default().push(*id);
            }
            Event::BookingStatusChanged { id, status } => {
                if let Some(booking) = self.bookings.get_mut(id) {
                    booking.status = *status;
                }
            }
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// block for the first append, drain whatever else is immediately queued,
/// flush and fsync once, then answer every sender in the batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Finish the batch first, then the odd one out.
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel drained
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());

                for (_, tx) in batch {
                    let r = match &result {
                        Ok(()) => Ok(()),
                        Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
                    };
                    let _ = tx.send(r);
                }
                if let Some(cmd) = deferred {
                    handle_non_append(&mut wal, cmd);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even on append error so partially buffered bytes don't leak
    // into the next batch (these callers were told the batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────────────

/// One storefront's schedule: replayed state plus the WAL writer handle.
pub struct Engine {
    pub(crate) state: RwLock<ScheduleState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut state = ScheduleState::default();
        for event in &events {
            state.apply(event);
        }

        Ok(Self {
            state: RwLock::new(state),
            wal_tx,
        })
    }

    /// Write an event through the group-commit writer, bounded by the store
    /// timeout so a stuck disk surfaces as an error instead of a hang.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        let send = self.wal_tx.send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        });
        tokio::time::timeout(STORE_TIMEOUT, send)
            .await
            .map_err(|_| EngineError::Timeout("wal append"))?
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        tokio::time::timeout(STORE_TIMEOUT, rx)
            .await
            .map_err(|_| EngineError::Timeout("wal flush"))?
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// WAL-append then apply under the write lock. Write-ahead: state never
    /// reflects an event the log might not have.
    pub(super) async fn persist_and_apply(&self, event: Event) -> Result<(), EngineError> {
        self.wal_append(&event).await?;
        self.state.write().await.apply(&event);
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
