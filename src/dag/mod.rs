mod schema;
mod server;
mod service;
mod sqlite;
mod store;

pub mod dto;

pub use server::{StorageState, storage_router};
pub use service::DagService;
pub use sqlite::SqliteDagStore;
pub use store::DagStore;
