mod federation_orchestrator;
mod list_sources;
mod semantic_registry;
mod sovereignty_guard;

pub use federation_orchestrator::*;
pub use list_sources::*;
pub use semantic_registry::*;
pub use sovereignty_guard::*;
