//! Downline Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with one RocksDB attribute store
//! - One registry lock serializing every hierarchy operation
//! - Unix admin socket for gateway events and admin commands (downline-admin CLI)
//! - HTTP API serving tree snapshots and leaderboards

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::error::{Error, Result};
use crate::storage::Storage;
use downline_tree::Registry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Configuration for a Downline node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for downline-admin CLI)
    pub admin_socket: PathBuf,

    /// Rebuild the hierarchy before serving
    pub refresh_on_start: bool,
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let data_dir = PathBuf::from(
            std::env::var("DOWNLINE_DATA_DIR").unwrap_or_else(|_| "./downline-data".to_string()),
        );

        let api_addr = std::env::var("DOWNLINE_API_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("DOWNLINE_API_ADDR: {}", e)))?;

        let admin_socket = std::env::var("DOWNLINE_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("admin.sock"));

        let refresh_on_start = match std::env::var("DOWNLINE_REFRESH_ON_START") {
            Ok(value) => parse_flag(&value)
                .ok_or_else(|| Error::Config(format!("DOWNLINE_REFRESH_ON_START: {}", value)))?,
            Err(_) => true,
        };

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            refresh_on_start,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Shared hierarchy state. Every operation takes the lock for its whole
/// duration.
pub type SharedRegistry = Arc<Mutex<Registry<Storage>>>;

/// A Downline node instance.
pub struct DownlineNode {
    registry: SharedRegistry,
    config: NodeConfig,
}

impl DownlineNode {
    /// Create a new node, opening storage under the data directory.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = Storage::open(&config.data_dir)?;
        let registry = Arc::new(Mutex::new(Registry::new(storage)));

        Ok(Self { registry, config })
    }

    /// Get the shared registry (for API handlers and the admin socket).
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Run the node (optional startup refresh, admin socket, HTTP server).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Downline node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        if self.config.refresh_on_start {
            let mut registry = self.registry.lock().await;
            match registry.refresh(None) {
                Ok(summary) => tracing::info!("Startup refresh: {} members", summary.members),
                // An empty community has no root yet; seed it via the admin socket.
                Err(e) => tracing::warn!("Startup refresh failed: {}", e),
            }
        }

        let admin_socket = AdminSocket::new(self.registry(), &self.config.admin_socket);
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let app = api::build_router(self.registry());

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" OFF "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[tokio::test]
    async fn new_node_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let config = NodeConfig {
            data_dir: data_dir.clone(),
            api_addr: "127.0.0.1:0".parse().unwrap(),
            admin_socket: data_dir.join("admin.sock"),
            refresh_on_start: false,
        };

        let node = DownlineNode::new(config).await.unwrap();
        assert!(data_dir.exists());
        assert!(node.registry().lock().await.tree().is_none());
    }
}
