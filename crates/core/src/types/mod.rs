//! Core types for Marram Goods.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coupon;
pub mod email;
pub mod id;
pub mod item;
pub mod price;
pub mod status;

pub use coupon::{Coupon, CouponError};
pub use email::{Email, EmailError};
pub use id::*;
pub use item::{ItemKind, ItemRef};
pub use price::{CurrencyCode, Price, round_to_cents};
pub use status::*;
