pub mod deregister_controller;
pub mod list_sources_controller;
pub mod query_controller;
pub mod register_controller;

pub use deregister_controller::DeregisterController;
pub use list_sources_controller::ListSourcesController;
pub use query_controller::{build_context, QueryController, QueryRequest};
pub use register_controller::{parse_manifest, RegisterController};
