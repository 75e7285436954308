//! # Connector Layer
//!
//! Concrete collaborators behind the application interfaces:
//! - Embedding providers (deterministic mock, ONNX Runtime)
//! - Descriptor stores (in-memory, DuckDB)
//! - Policy evaluators (attribute expressions, OPA/Rego) and the language router
//! - Remote source clients (SSE over HTTP), audit sinks and lineage stamping
//!
//! `api` wires them into the CLI and HTTP front doors.

pub mod adapter;
pub mod api;

pub use adapter::*;
