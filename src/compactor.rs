use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::engine::Engine;

/// Background task that rewrites a store's WAL once enough appends have
/// accumulated since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => debug!("compaction skipped: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::engine::Engine;
    use crate::model::OverrideReason;

    #[tokio::test]
    async fn append_counter_drives_compaction() {
        let dir = std::env::temp_dir().join("ovenbook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("counter.wal");
        let _ = std::fs::remove_file(&path);

        let engine = Engine::new(path).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        for day in 10..20 {
            engine
                .upsert_override(
                    NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
                    OverrideReason::Closed,
                    None,
                    today,
                )
                .await
                .unwrap();
        }
        assert_eq!(engine.wal_appends_since_compact().await, 10);

        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
    }
}
