//! dictwire-server: a line-protocol dictionary server
//!
//! Accepts TCP connections and speaks the dictwire command protocol:
//! space-separated command lines in, prefix-marked replies out.
//!
//! Features:
//! - Key-value storage across named, capacity-bounded dictionaries
//! - Pub/sub with out-of-band pushes to subscriber connections
//! - Configuration via CLI arguments or TOML file

use dictwire::config::Config;
use dictwire::server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        dictionaries = config.dictionaries.len(),
        "Starting dictwire server"
    );

    let server = Server::new(config);
    server.run().await
}
