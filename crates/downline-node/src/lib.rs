//! Downline Node - Sponsorship Hierarchy Service
//!
//! Hosts a [`downline_tree::Registry`] over a RocksDB attribute store and
//! exposes it to the outside world.
//!
//! # Architecture
//!
//! - **Storage**: RocksDB-backed attribute store (members, buckets)
//! - **Node**: configuration and the single registry lock
//! - **Admin Socket**: Unix socket for gateway events and admin commands (downline-admin CLI)
//! - **API**: HTTP endpoints for tree snapshots and leaderboards
//!
//! # Example
//!
//! ```no_run
//! use downline_node::{DownlineNode, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = DownlineNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod error;
pub mod node;
pub mod storage;

pub use error::{Error, Result};
pub use node::{DownlineNode, NodeConfig, SharedRegistry};
pub use storage::{Storage, StoredMember};
