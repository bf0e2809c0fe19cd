//! Domain models for the admin console.

pub mod incident;
pub mod order;
