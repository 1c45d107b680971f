use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_BULK_CAPACITY, MAX_BULK_DATES};
use crate::model::OverrideReason;

use super::{Engine, EngineError};

/// One admin action applied to a selected set of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BulkAction {
    /// Mark every date Open/Closed/Away (replaces capacity with none set).
    SetStatus { reason: OverrideReason },
    /// Set a capacity preset, preserving each date's existing reason
    /// (dates without a record become Open).
    SetCapacity { capacity: u32 },
    /// Drop the overrides, reverting the dates to default rules.
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub date: NaiveDate,
    pub error: String,
}

/// Outcome of a bulk action: per-date results settled without
/// short-circuiting, so one bad date never aborts the rest. Partial
/// success is not rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BulkFailure>,
}

impl Engine {
    /// Apply `action` to every date concurrently and settle all results.
    /// Errors returned here are whole-request validation failures only;
    /// per-date failures (past dates, storage errors) land in the report.
    pub async fn apply_bulk(
        &self,
        dates: &[NaiveDate],
        action: BulkAction,
        today: NaiveDate,
    ) -> Result<BulkReport, EngineError> {
        if dates.is_empty() {
            return Err(EngineError::LimitExceeded("no dates selected"));
        }
        if dates.len() > MAX_BULK_DATES {
            return Err(EngineError::LimitExceeded("too many dates in one bulk action"));
        }
        if let BulkAction::SetCapacity { capacity } = action
            && capacity > MAX_BULK_CAPACITY {
                return Err(EngineError::LimitExceeded("capacity preset out of range"));
            }

        let ops = dates.iter().map(|&date| async move {
            let result = match action {
                BulkAction::SetStatus { reason } => self
                    .upsert_override(date, reason, None, today)
                    .await
                    .map(|_| ()),
                BulkAction::SetCapacity { capacity } => {
                    let reason = self
                        .get_override(date)
                        .await
                        .map(|r| r.reason)
                        .unwrap_or(OverrideReason::Open);
                    self.upsert_override(date, reason, Some(capacity), today)
                        .await
                        .map(|_| ())
                }
                BulkAction::Clear => self.clear_override(date, today).await,
            };
            (date, result)
        });

        let mut report = BulkReport {
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
        };
        for (date, result) in join_all(ops).await {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    report.failures.push(BulkFailure {
                        date,
                        error: e.to_string(),
                    });
                }
            }
        }

        metrics::counter!(crate::observability::BULK_DATES_OK_TOTAL)
            .increment(report.succeeded as u64);
        metrics::counter!(crate::observability::BULK_DATES_FAILED_TOTAL)
            .increment(report.failed as u64);
        Ok(report)
    }
}
