mod audit;
mod authorization;
mod candidate;
mod dispatch;
mod embedding;
mod lineage;
mod query;
mod source_descriptor;
mod source_result;

pub use audit::*;
pub use authorization::*;
pub use candidate::*;
pub use dispatch::*;
pub use embedding::*;
pub use lineage::*;
pub use query::*;
pub use source_descriptor::*;
pub use source_result::*;
