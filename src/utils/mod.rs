//! Shared helpers.

pub mod availability;
