//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database
//! row types. Repositories convert rows into these at the query boundary.

pub mod cart;
pub mod catalog;
pub mod incident;
pub mod intent;
pub mod order;
pub mod quote;

pub use cart::CartLine;
pub use catalog::{CatalogItem, Product, ProductVariant};
pub use incident::{IncidentReason, NewIncident, PaymentIncident};
pub use intent::PaymentIntent;
pub use order::{NewOrder, NewOrderLine, Order, OrderLine};
pub use quote::{PricedLine, Quote};
