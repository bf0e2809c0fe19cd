//! Short-lived cache of catalog display data for cart rendering.
//!
//! Cart lines store only item references; showing a cart means resolving
//! names and images for every line. This cache absorbs that lookup so a
//! busy cart page does not hammer the catalog tables. Stock and pricing
//! are never served from here: quotes and reservations always read the
//! live catalog.

use std::time::Duration;

use marram_goods_core::ItemRef;
use moka::future::Cache;
use tracing::debug;

use crate::db::{CatalogStore, RepositoryError};

const DISPLAY_TTL: Duration = Duration::from_secs(300); // 5 minutes
const DISPLAY_CAPACITY: u64 = 10_000;

/// Display attributes of a catalog item, as shown on cart lines.
#[derive(Debug, Clone)]
pub struct DisplayInfo {
    pub display_name: String,
    pub image_url: Option<String>,
}

/// Cache of display info keyed by item reference.
///
/// The short TTL means renames and image swaps propagate on their own;
/// nothing invalidates this cache explicitly.
#[derive(Clone)]
pub struct DisplayCache {
    cache: Cache<ItemRef, DisplayInfo>,
}

impl std::fmt::Debug for DisplayCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayCache")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl Default for DisplayCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(DISPLAY_CAPACITY)
            .time_to_live(DISPLAY_TTL)
            .build();
        Self { cache }
    }

    /// Look up display info for an item, hitting the catalog on a miss.
    ///
    /// Returns `None` for items that no longer exist in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the catalog lookup fails.
    pub async fn get<S: CatalogStore>(
        &self,
        store: &S,
        item: ItemRef,
    ) -> Result<Option<DisplayInfo>, RepositoryError> {
        if let Some(info) = self.cache.get(&item).await {
            debug!(item = %item, "Cache hit for item display info");
            return Ok(Some(info));
        }

        let Some(resolved) = store.resolve_item(item).await? else {
            return Ok(None);
        };

        let info = DisplayInfo {
            display_name: resolved.display_name,
            image_url: resolved.image_url,
        };
        self.cache.insert(item, info.clone()).await;

        Ok(Some(info))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_caches_display_info_across_catalog_changes() {
        let store = MemoryStore::new();
        let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 5);
        let cache = DisplayCache::new();

        let info = cache
            .get(&store, ItemRef::Simple(tee))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.display_name, "Dune Tee");

        // The cached name survives until the TTL expires even though the
        // catalog row is gone.
        store.remove_product(tee);
        let info = cache
            .get(&store, ItemRef::Simple(tee))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.display_name, "Dune Tee");
    }

    #[tokio::test]
    async fn test_unknown_item_is_none_and_not_cached() {
        let store = MemoryStore::new();
        let cache = DisplayCache::new();

        // The store assigns ids starting at 1, so probe the id the first
        // seed will take.
        let probe = ItemRef::Simple(marram_goods_core::ProductId::new(1));
        let missing = cache.get(&store, probe).await.unwrap();
        assert!(missing.is_none());

        // A later seed under that id becomes visible: misses are not
        // negatively cached.
        let tee = store.seed_product("Late Tee", Decimal::new(5000, 2), 1);
        assert_eq!(ItemRef::Simple(tee), probe);
        let info = cache.get(&store, probe).await.unwrap().unwrap();
        assert_eq!(info.display_name, "Late Tee");
    }
}
