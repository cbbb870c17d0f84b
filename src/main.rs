//! Chat Relay - Entry Point
//!
//! Binds the listening socket and runs the accept loop.

use std::env;

use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::ChatServer;

/// Default server address
const DEFAULT_ADDR: &str = "0.0.0.0:2000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Get bind address from command line or use default
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let server = ChatServer::bind(&addr).await?;
    info!("Chat relay listening on {}", server.local_addr()?);

    server.run().await;

    Ok(())
}
