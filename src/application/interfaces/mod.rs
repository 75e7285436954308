mod audit_sink;
mod descriptor_store;
mod embedding_provider;
mod lineage_stamper;
mod policy_evaluator;
mod source_client;

pub use audit_sink::*;
pub use descriptor_store::*;
pub use embedding_provider::*;
pub use lineage_stamper::*;
pub use policy_evaluator::*;
pub use source_client::*;
