use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mergebay::allocation::{
    AllocationEngine, AllocationState, AllocationStore, SqliteAllocationStore, allocation_router,
};
use mergebay::config::{AllocationConfig, GatewayConfig, StorageConfig};
use mergebay::dag::{DagService, DagStore, SqliteDagStore, StorageState, storage_router};
use mergebay::gateway::{
    AllocationClient, GatewayService, GatewayState, StorageClient, gateway_router,
};

#[derive(Parser)]
#[command(name = "mergebay")]
#[command(about = "Team-scoped code hosting backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the commit DAG storage service
    Storage {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Start the PR allocation service
    Allocation {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Reviewers assigned per fresh PR
        #[arg(long)]
        reviewer_target: Option<usize>,
    },

    /// Start the user-facing gateway
    Gateway {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Base URL of the storage service
        #[arg(long)]
        storage_url: Option<String>,

        /// Base URL of the allocation service
        #[arg(long)]
        allocation_url: Option<String>,
    },
}

async fn serve(router: axum::Router, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

async fn run_storage(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut cfg = match config {
        Some(path) => StorageConfig::load(&path)?,
        None => StorageConfig::default(),
    };
    if let Some(host) = host {
        cfg.host = host;
    }
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(data_dir) = data_dir {
        cfg.data_dir = data_dir;
    }

    fs::create_dir_all(&cfg.data_dir)?;
    let store = SqliteDagStore::new(cfg.db_path())?;
    store.initialize()?;

    let state = Arc::new(StorageState {
        service: DagService::new(Arc::new(store)),
    });
    serve(storage_router(state), cfg.socket_addr()?).await
}

async fn run_allocation(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    reviewer_target: Option<usize>,
) -> anyhow::Result<()> {
    let mut cfg = match config {
        Some(path) => AllocationConfig::load(&path)?,
        None => AllocationConfig::default(),
    };
    if let Some(host) = host {
        cfg.host = host;
    }
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(data_dir) = data_dir {
        cfg.data_dir = data_dir;
    }
    if let Some(target) = reviewer_target {
        cfg.reviewer_target = target;
    }

    fs::create_dir_all(&cfg.data_dir)?;
    let store = SqliteAllocationStore::new(cfg.db_path())?;
    store.initialize()?;

    info!("Assigning {} reviewer(s) per pull request", cfg.reviewer_target);
    let state = Arc::new(AllocationState {
        engine: AllocationEngine::new(Arc::new(store), cfg.reviewer_target),
    });
    serve(allocation_router(state), cfg.socket_addr()?).await
}

async fn run_gateway(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    storage_url: Option<String>,
    allocation_url: Option<String>,
) -> anyhow::Result<()> {
    let mut cfg = match config {
        Some(path) => GatewayConfig::load(&path)?,
        None => GatewayConfig::default(),
    };
    if let Some(host) = host {
        cfg.host = host;
    }
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(url) = storage_url {
        cfg.storage_url = url;
    }
    if let Some(url) = allocation_url {
        cfg.allocation_url = url;
    }

    let allocation = AllocationClient::new(
        cfg.allocation_url.clone(),
        Duration::from_secs(cfg.json_timeout_secs),
    )?;
    let storage = StorageClient::new(
        cfg.storage_url.clone(),
        Duration::from_secs(cfg.json_timeout_secs),
        Duration::from_secs(cfg.file_timeout_secs),
    )?;

    info!(
        "Gateway routing to storage={} allocation={}",
        cfg.storage_url, cfg.allocation_url
    );
    let state = Arc::new(GatewayState {
        service: GatewayService::new(allocation, storage),
    });
    serve(gateway_router(state), cfg.socket_addr()?).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mergebay=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Storage {
            config,
            host,
            port,
            data_dir,
        } => run_storage(config, host, port, data_dir).await,
        Commands::Allocation {
            config,
            host,
            port,
            data_dir,
            reviewer_target,
        } => run_allocation(config, host, port, data_dir, reviewer_target).await,
        Commands::Gateway {
            config,
            host,
            port,
            storage_url,
            allocation_url,
        } => run_gateway(config, host, port, storage_url, allocation_url).await,
    }
}
