//! Marram Goods admin library.
//!
//! Backs the internal operations console: order listing, fulfillment
//! transitions, and the payment incident queue. Serves JSON only; the
//! console frontend lives elsewhere.
//!
//! # Security
//!
//! This binary can move orders through fulfillment and close payment
//! incidents. Deploy it on the private network only and keep
//! `ADMIN_API_TOKEN` out of the storefront's environment; every route
//! requires that token as a bearer credential.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
