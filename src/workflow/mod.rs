pub mod engine;
pub mod memory;
pub mod pg;
pub mod rules;
pub mod store;

pub use engine::WorkflowEngine;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::{ProposalFilter, ProposalStore, StoreTx};
