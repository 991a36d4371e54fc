pub mod assigner;
pub mod distribution;
pub mod divergence;
pub mod materializer;
pub mod similarity;
pub mod stratify;
pub mod validator;

pub use assigner::{SplitAssignment, Subset, SubsetAssigner};
pub use materializer::materialize_subset;
pub use similarity::group_by_similarity;
pub use validator::validate;
