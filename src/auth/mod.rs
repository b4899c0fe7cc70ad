pub mod context;
pub mod directory;
pub mod middleware;
pub mod session;
