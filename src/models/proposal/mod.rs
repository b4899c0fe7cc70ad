pub mod queries;
pub mod status;
pub mod types;
pub mod validate;

pub use status::ProposalStatus;
pub use types::*;
