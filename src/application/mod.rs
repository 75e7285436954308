//! # Application Layer
//!
//! Collaborator interfaces and the registry, guard and orchestrator use cases.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
