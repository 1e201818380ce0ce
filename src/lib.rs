//! # Mergebay
//!
//! A team-scoped code hosting backend built from three cooperating
//! services: a commit DAG storage engine, a PR reviewer-allocation
//! service, and a user-facing gateway that binds names to DAG identifiers
//! and sequences approve-and-merge across the other two.
//!
//! Each service ships as a subcommand of the `mergebay` binary and as a
//! library router, so embedders and tests can serve them in-process:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mergebay::dag::{DagService, SqliteDagStore, StorageState, storage_router};
//! use mergebay::dag::DagStore;
//!
//! let store = SqliteDagStore::new("./data/storage.db").unwrap();
//! store.initialize().unwrap();
//! let state = Arc::new(StorageState {
//!     service: DagService::new(Arc::new(store)),
//! });
//! let router = storage_router(state);
//! // Serve with axum...
//! ```

pub mod allocation;
pub mod config;
pub mod dag;
pub mod error;
pub mod gateway;
pub mod response;
pub mod types;
