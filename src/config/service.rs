use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_storage_port() -> u16 {
    8081
}

fn default_allocation_port() -> u16 {
    8082
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_storage_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_allocation_url() -> String {
    "http://127.0.0.1:8082".to_string()
}

fn default_reviewer_target() -> usize {
    1
}

fn default_json_timeout_secs() -> u64 {
    30
}

fn default_file_timeout_secs() -> u64 {
    60
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address: {e}")))
}

fn load_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

/// Configuration for the commit DAG storage service.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_storage_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_storage_port(),
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.host, self.port)
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("storage.db")
    }
}

/// Configuration for the PR allocation service.
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_allocation_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// How many reviewers a fresh PR is assigned (capped by candidate count).
    #[serde(default = "default_reviewer_target")]
    pub reviewer_target: usize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_allocation_port(),
            data_dir: default_data_dir(),
            reviewer_target: default_reviewer_target(),
        }
    }
}

impl AllocationConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.host, self.port)
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("allocation.db")
    }
}

/// Configuration for the user-facing gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_storage_url")]
    pub storage_url: String,
    #[serde(default = "default_allocation_url")]
    pub allocation_url: String,
    /// Outbound timeout for JSON endpoints, in seconds.
    #[serde(default = "default_json_timeout_secs")]
    pub json_timeout_secs: u64,
    /// Outbound timeout for file-bearing endpoints, in seconds.
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_gateway_port(),
            storage_url: default_storage_url(),
            allocation_url: default_allocation_url(),
            json_timeout_secs: default_json_timeout_secs(),
            file_timeout_secs: default_file_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.json_timeout_secs, 30);
        assert_eq!(cfg.file_timeout_secs, 60);
        assert!(cfg.socket_addr().is_ok());
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allocation.toml");
        std::fs::write(&path, "port = 9000\nreviewer_target = 2\n").unwrap();

        let cfg = AllocationConfig::load(&path).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.reviewer_target, 2);
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(matches!(
            StorageConfig::load(&path),
            Err(Error::Config(_))
        ));
    }
}
