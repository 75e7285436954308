//! # Domain Layer
//!
//! Source descriptors, per-query authorization and dispatch types, and the error
//! taxonomy. Independent of storage, models and transports.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
