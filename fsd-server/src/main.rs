use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fsd_server::auth::MemoryDirectory;
use fsd_server::config::ServerConfig;
use fsd_server::server::Server;
use fsd_server::session::connection;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();

    let filter = EnvFilter::from_default_env().add_directive("fsd_server=info".parse()?);
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if config.always_immediate {
        connection::set_always_immediate(true);
    }

    let directory = match config.users_file {
        Some(ref path) => MemoryDirectory::load(path)?,
        None => MemoryDirectory::default(),
    };
    if directory.is_empty() {
        let password = directory.bootstrap_admin();
        tracing::warn!("user directory is empty, bootstrapped CID 1 with password {password}");
    }

    let server = Server::bind(config, Arc::new(directory)).await?;
    let shutdown = server.state().shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            shutdown.cancel();
        }
    });
    server.run().await
}
