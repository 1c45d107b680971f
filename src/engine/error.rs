use chrono::NaiveDate;
use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Input that failed to parse as a calendar date.
    InvalidDate(String),
    /// Range where the start falls after the end.
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// Mutation aimed at a date strictly before today.
    PastDate(NaiveDate),
    BookingNotFound(Ulid),
    LimitExceeded(&'static str),
    /// A store round-trip exceeded its deadline.
    Timeout(&'static str),
    /// Persistence failure (WAL append, flush, or compaction).
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidDate(raw) => write!(f, "invalid date: {raw:?}"),
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: {start} is after {end}")
            }
            EngineError::PastDate(date) => write!(f, "date is in the past: {date}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Timeout(op) => write!(f, "store timeout during {op}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
