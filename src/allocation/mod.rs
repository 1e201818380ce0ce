mod engine;
mod schema;
mod server;
mod sqlite;
mod store;

pub mod dto;

pub use engine::AllocationEngine;
pub use server::{AllocationState, allocation_router};
pub use sqlite::SqliteAllocationStore;
pub use store::AllocationStore;
