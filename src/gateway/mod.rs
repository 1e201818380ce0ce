mod client;
mod registry;
mod server;
mod service;

pub mod dto;

pub use client::{AllocationClient, StorageClient};
pub use registry::{PrMetadata, PrRegistry, RepoRegistry};
pub use server::{GatewayState, gateway_router};
pub use service::GatewayService;
