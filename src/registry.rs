use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::compactor;
use crate::config::{MAX_STORES, MAX_STORE_NAME_LEN};
use crate::engine::Engine;

/// The storefront served when a request names none.
pub const DEFAULT_STORE: &str = "bakery";

/// Per-storefront schedule engines. Each storefront (the bakery and the
/// streetwear side shop) gets an isolated Engine + WAL + compactor, created
/// lazily on first use.
pub struct StoreRegistry {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl StoreRegistry {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily create the engine for a storefront. The map is keyed
    /// by the sanitized name — every raw name that collapses to the same
    /// WAL filename must share one engine, or two writer tasks end up
    /// appending to (and compacting) the same file.
    pub fn get_or_create(&self, store: &str) -> io::Result<Arc<Engine>> {
        if store.len() > MAX_STORE_NAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "store name too long",
            ));
        }

        // Sanitize the name to prevent path traversal via the WAL filename.
        let safe_name: String = store
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty store name",
            ));
        }

        if let Some(engine) = self.engines.get(&safe_name) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= MAX_STORES {
            return Err(io::Error::other("too many stores"));
        }

        // Entry holds the shard lock, so two concurrent first requests for
        // the same store cannot both create an engine for one file.
        let engine = match self.engines.entry(safe_name.clone()) {
            Entry::Occupied(occupied) => return Ok(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let engine = Arc::new(Engine::new(wal_path)?);

                let compactor_engine = engine.clone();
                let threshold = self.compact_threshold;
                tokio::spawn(async move {
                    compactor::run_compactor(compactor_engine, threshold).await;
                });

                vacant.insert(engine.clone());
                engine
            }
        };
        metrics::gauge!(crate::observability::STORES_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::model::OverrideReason;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("ovenbook_test_registry").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn store_isolation() {
        let registry = StoreRegistry::new(test_data_dir("isolation"), 1000);
        let bakery = registry.get_or_create("bakery").unwrap();
        let street = registry.get_or_create("streetwear").unwrap();

        let today = d(2025, 6, 1);
        bakery
            .upsert_override(d(2025, 6, 20), OverrideReason::Away, None, today)
            .await
            .unwrap();

        assert_eq!(bakery.list_overrides(None).await.unwrap().len(), 1);
        assert!(street.list_overrides(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lazy_wal_creation() {
        let dir = test_data_dir("lazy");
        let registry = StoreRegistry::new(dir.clone(), 1000);
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());

        let _ = registry.get_or_create("bakery").unwrap();
        assert!(dir.join("bakery.wal").exists());
    }

    #[tokio::test]
    async fn same_engine_returned() {
        let registry = StoreRegistry::new(test_data_dir("same"), 1000);
        let a = registry.get_or_create("bakery").unwrap();
        let b = registry.get_or_create("bakery").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn store_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let registry = StoreRegistry::new(dir.clone(), 1000);

        let traversal = registry.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());
        // The traversal spelling and the plain one are the same store.
        let plain = registry.get_or_create("evil").unwrap();
        assert!(Arc::ptr_eq(&traversal, &plain));

        assert!(registry.get_or_create("../..").is_err());
    }

    #[tokio::test]
    async fn name_variants_share_one_engine() {
        let dir = test_data_dir("alias");
        let registry = StoreRegistry::new(dir.clone(), 1000);

        let shop = registry.get_or_create("shop").unwrap();
        let aliased = registry.get_or_create("shop!").unwrap();
        assert!(Arc::ptr_eq(&shop, &aliased));

        // An override written through one spelling survives a compaction
        // issued through the other.
        let today = d(2025, 6, 1);
        shop.upsert_override(d(2025, 6, 20), OverrideReason::Closed, None, today)
            .await
            .unwrap();
        aliased.compact_wal().await.unwrap();

        let replayed = crate::wal::Wal::replay(&dir.join("shop.wal")).unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(shop.list_overrides(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_count_limit() {
        let registry = StoreRegistry::new(test_data_dir("limit"), 1000);
        for i in 0..MAX_STORES {
            registry.get_or_create(&format!("s{i}")).unwrap();
        }
        assert!(registry.get_or_create("one_more").is_err());
    }

    #[tokio::test]
    async fn store_name_too_long() {
        let registry = StoreRegistry::new(test_data_dir("too_long"), 1000);
        let long = "x".repeat(MAX_STORE_NAME_LEN + 1);
        assert!(registry.get_or_create(&long).is_err());
    }
}
