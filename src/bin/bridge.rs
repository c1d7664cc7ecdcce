//! Bridge process entry point.
//!
//! Launched by the EDA tool as a co-process: the tool owns this process's
//! standard streams, so stdout carries interpreter commands, stdin carries
//! the tool's counted replies, and stderr carries diagnostics. Logging
//! therefore goes to stderr as well, keeping the command channel clean.

use simbridge::bridge::Bridge;
use simbridge::config::BridgeConfig;
use simbridge::tool::ToolChannel;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "simbridge=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    tracing::info!("Starting simbridge bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("configuration error: {err:#}");
            std::process::exit(simbridge::bridge::EXIT_SOCKET_SETUP);
        }
    };

    let bridge = Bridge::new(ToolChannel::from_stdio(), config);
    let code = bridge.run().await;

    tracing::info!("bridge exited with code {code}");
    std::process::exit(code);
}
