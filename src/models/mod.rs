pub mod audit;
pub mod proposal;
pub mod role;
