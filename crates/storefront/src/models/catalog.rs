//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use marram_goods_core::{ItemRef, ProductId, VariantId};

/// A simple product sold without options.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    /// Units on hand. Never negative; the schema enforces it too.
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A concrete option row (size, color) under a parent product.
///
/// `name` and `image_url` are optional; display falls back to the parent
/// product's data when absent.
#[derive(Debug, Clone)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable item resolved for pricing, regardless of kind.
///
/// This is the uniform view the cart aggregator and stock engine work
/// with: variant fallbacks are already applied.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub item: ItemRef,
    pub display_name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub stock: i32,
}

impl CatalogItem {
    /// Display name for a variant: its own name if set, otherwise the
    /// parent name qualified by size and color.
    #[must_use]
    pub fn variant_display_name(variant: &ProductVariant, parent_name: &str) -> String {
        variant.name.clone().unwrap_or_else(|| {
            format!("{parent_name} ({} / {})", variant.size, variant.color)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(name: Option<&str>) -> ProductVariant {
        ProductVariant {
            id: VariantId::new(1),
            product_id: ProductId::new(1),
            size: "M".to_string(),
            color: "Sand".to_string(),
            name: name.map(String::from),
            image_url: None,
            price: Decimal::new(5000, 2),
            stock: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_variant_display_name_falls_back_to_parent() {
        let display = CatalogItem::variant_display_name(&variant(None), "Dune Tee");
        assert_eq!(display, "Dune Tee (M / Sand)");
    }

    #[test]
    fn test_variant_display_name_prefers_own_name() {
        let display = CatalogItem::variant_display_name(&variant(Some("Dune Tee Medium")), "Dune Tee");
        assert_eq!(display, "Dune Tee Medium");
    }
}
