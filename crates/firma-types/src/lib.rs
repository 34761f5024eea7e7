//! Shared domain types for the signature kiosk.

pub mod config;
pub mod diagnostic;
pub mod environment;
pub mod geometry;
pub mod image;
pub mod naming;
pub mod status;

mod errors;

pub use errors::{FirmaError, Result};
