//! Marram Goods Core - Shared types library.
//!
//! This crate provides common types used across all Marram Goods components:
//! - `storefront` - Public-facing shop and checkout pipeline
//! - `admin` - Internal operations panel (order fulfillment, incident queue)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, item references, coupon validation,
//!   and the fulfillment state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
