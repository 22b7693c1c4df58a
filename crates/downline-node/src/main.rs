//! Downline Node binary
//!
//! Tracks the sponsorship hierarchy of a community.

use downline_node::{DownlineNode, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "downline_node=info,downline_tree=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Downline Node");

    let config = NodeConfig::from_env()?;

    let node = DownlineNode::new(config).await?;
    node.run().await?;

    Ok(())
}
