mod attribute_rule_evaluator;
mod audit_sinks;
mod duckdb_descriptor_store;
mod in_memory_descriptor_store;
mod mock_embedding;
mod opa_policy_evaluator;
mod ort_embedding;
mod policy_router;
mod prov_lineage_stamper;
mod sse_source_client;
mod static_source_clients;

pub use attribute_rule_evaluator::*;
pub use audit_sinks::*;
pub use duckdb_descriptor_store::*;
pub use in_memory_descriptor_store::*;
pub use mock_embedding::*;
pub use opa_policy_evaluator::*;
pub use ort_embedding::*;
pub use policy_router::*;
pub use prov_lineage_stamper::*;
pub use sse_source_client::*;
pub use static_source_clients::*;
