//! Stock reservation: all-or-nothing decrements across cart lines.
//!
//! Each line is reserved with the single conditional decrement the
//! catalog store provides. If any line cannot be satisfied, every
//! decrement already applied is released before the failure is reported,
//! so a multi-line checkout never holds partial stock.

use marram_goods_core::ItemRef;

use super::checkout::CheckoutError;
use crate::db::CommerceStore;
use crate::models::quote::PricedLine;

/// Reserve stock for every line, in order.
///
/// # Errors
///
/// Returns [`CheckoutError::OutOfStock`] naming the first line that could
/// not be satisfied and how many units remain, with all prior decrements
/// rolled back. Returns [`CheckoutError::Store`] if a query fails.
pub async fn commit_lines<S: CommerceStore>(
    store: &S,
    lines: &[PricedLine],
) -> Result<(), CheckoutError> {
    let mut committed: Vec<(ItemRef, i32)> = Vec::with_capacity(lines.len());

    for line in lines {
        match store.try_decrement_stock(line.item, line.quantity).await {
            Ok(true) => committed.push((line.item, line.quantity)),
            Ok(false) => {
                let available = store.available_stock(line.item).await.unwrap_or(0);
                release_pairs(store, &committed).await;
                return Err(CheckoutError::OutOfStock {
                    item: line.item,
                    available,
                });
            }
            Err(e) => {
                release_pairs(store, &committed).await;
                return Err(CheckoutError::Store(e));
            }
        }
    }

    Ok(())
}

/// Release a full reservation previously taken by [`commit_lines`].
pub async fn release_lines<S: CommerceStore>(store: &S, lines: &[PricedLine]) {
    let pairs: Vec<(ItemRef, i32)> = lines.iter().map(|l| (l.item, l.quantity)).collect();
    release_pairs(store, &pairs).await;
}

/// Best-effort compensating increments. A failed release leaves stock
/// undercounted, never oversold, so this logs and keeps going rather
/// than failing the caller.
async fn release_pairs<S: CommerceStore>(store: &S, committed: &[(ItemRef, i32)]) {
    for &(item, quantity) in committed {
        if let Err(e) = store.increment_stock(item, quantity).await {
            tracing::error!(
                error = %e,
                item = %item,
                quantity,
                "Failed to release reserved stock"
            );
            sentry::capture_error(&e);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::MemoryStore;

    fn line(item: ItemRef, quantity: i32) -> PricedLine {
        PricedLine {
            item,
            display_name: "Test".to_string(),
            image_url: None,
            unit_price: Decimal::new(10000, 2),
            quantity,
            line_total: Decimal::new(10000, 2) * Decimal::from(quantity),
        }
    }

    #[tokio::test]
    async fn test_commit_decrements_every_line() {
        let store = MemoryStore::new();
        let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 5);
        let parent = store.seed_product("Marram Hoodie", Decimal::new(9000, 2), 9);
        let hoodie_m = store.seed_variant(parent, "M", "Sand", Decimal::new(5000, 2), 2);

        let lines = [
            line(ItemRef::Simple(tee), 1),
            line(ItemRef::Variant(hoodie_m), 2),
        ];
        commit_lines(&store, &lines).await.unwrap();

        assert_eq!(store.stock_of(ItemRef::Simple(tee)), Some(4));
        assert_eq!(store.stock_of(ItemRef::Variant(hoodie_m)), Some(0));
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_earlier_lines() {
        let store = MemoryStore::new();
        let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 5);
        let scarce = store.seed_product("Last One", Decimal::new(2000, 2), 1);

        let lines = [line(ItemRef::Simple(tee), 2), line(ItemRef::Simple(scarce), 3)];
        let result = commit_lines(&store, &lines).await;

        match result {
            Err(CheckoutError::OutOfStock { item, available }) => {
                assert_eq!(item, ItemRef::Simple(scarce));
                assert_eq!(available, 1);
            }
            other => panic!("expected OutOfStock, got {other:?}"),
        }

        // The first line's decrement was compensated.
        assert_eq!(store.stock_of(ItemRef::Simple(tee)), Some(5));
        assert_eq!(store.stock_of(ItemRef::Simple(scarce)), Some(1));
    }

    #[tokio::test]
    async fn test_release_restores_full_reservation() {
        let store = MemoryStore::new();
        let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 5);

        let lines = [line(ItemRef::Simple(tee), 3)];
        commit_lines(&store, &lines).await.unwrap();
        assert_eq!(store.stock_of(ItemRef::Simple(tee)), Some(2));

        release_lines(&store, &lines).await;
        assert_eq!(store.stock_of(ItemRef::Simple(tee)), Some(5));
    }
}
