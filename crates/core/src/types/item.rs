//! References to sellable catalog items.

use serde::{Deserialize, Serialize};

use crate::types::id::{ProductId, VariantId};

/// Discriminates the two sellable shapes in the catalog.
///
/// Stock, pricing, and reservation logic treat both kinds uniformly; the
/// kind only selects which table a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A product sold without options.
    Simple,
    /// A concrete option row (size, color) under a parent product.
    Variant,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Variant => write!(f, "variant"),
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "variant" => Ok(Self::Variant),
            _ => Err(format!("invalid item kind: {s}")),
        }
    }
}

/// A typed pointer to one sellable item.
///
/// Serialized as `{"kind": "simple", "id": 7}` so cart lines and order
/// lines carry an unambiguous reference even after catalog edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ItemRef {
    Simple(ProductId),
    Variant(VariantId),
}

impl ItemRef {
    /// The kind discriminant of this reference.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Simple(_) => ItemKind::Simple,
            Self::Variant(_) => ItemKind::Variant,
        }
    }

    /// The raw row id, regardless of kind.
    #[must_use]
    pub const fn raw_id(&self) -> i32 {
        match self {
            Self::Simple(id) => id.as_i32(),
            Self::Variant(id) => id.as_i32(),
        }
    }

    /// Rebuild a reference from its stored `(kind, id)` pair.
    #[must_use]
    pub const fn from_parts(kind: ItemKind, id: i32) -> Self {
        match kind {
            ItemKind::Simple => Self::Simple(ProductId::new(id)),
            ItemKind::Variant => Self::Variant(VariantId::new(id)),
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.raw_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ref_parts_roundtrip() {
        let simple = ItemRef::Simple(ProductId::new(7));
        let variant = ItemRef::Variant(VariantId::new(12));

        assert_eq!(ItemRef::from_parts(simple.kind(), simple.raw_id()), simple);
        assert_eq!(
            ItemRef::from_parts(variant.kind(), variant.raw_id()),
            variant
        );
    }

    #[test]
    fn test_same_raw_id_different_kinds_are_distinct() {
        let simple = ItemRef::Simple(ProductId::new(3));
        let variant = ItemRef::Variant(VariantId::new(3));
        assert_ne!(simple, variant);
    }

    #[test]
    fn test_item_ref_json_shape() {
        let json = serde_json::to_string(&ItemRef::Variant(VariantId::new(9))).expect("serialize");
        assert_eq!(json, r#"{"kind":"variant","id":9}"#);
        let back: ItemRef = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ItemRef::Variant(VariantId::new(9)));
    }

    #[test]
    fn test_item_ref_display() {
        assert_eq!(ItemRef::Simple(ProductId::new(5)).to_string(), "simple:5");
    }
}
