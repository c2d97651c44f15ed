//! draftsync relay — broadcasts each client's document to every other client.
//!
//! Configure with `DRAFTSYNC_HOST`, `DRAFTSYNC_PORT` and
//! `DRAFTSYNC_COMMAND_BUFFER` (or a `.env` file); `RUST_LOG` sets verbosity.

mod config;

use draftsync_collab::RelayServer;
use log::{error, info};

use config::RelayConfig;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match RelayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    info!("Starting draftsync relay");
    let server = RelayServer::new(config.into_server_config());
    if let Err(e) = server.run().await {
        error!("Relay stopped: {e}");
        std::process::exit(1);
    }
}
