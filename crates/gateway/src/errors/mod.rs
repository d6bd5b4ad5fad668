//! Centralized error handling for the gateway.

pub mod types;

pub use types::*;
