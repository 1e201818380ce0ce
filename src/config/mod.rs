mod service;

pub use service::{AllocationConfig, GatewayConfig, StorageConfig};
