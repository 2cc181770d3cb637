#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use poem::listener::TcpListener;
use poem::Server;

use result_cache::config::RuntimeConfig;
use result_cache::routes::{self, ApiState};
use result_cache::ResultCache;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct ServerConfig {
    #[clap(long, default_value = "127.0.0.1", env = "HOST")]
    /// The binding host address of the server.
    host: String,

    #[clap(long, default_value = "8000", env = "PORT")]
    /// The port to bind the server to.
    port: u16,

    #[clap(long, env = "CONFIG_FILE")]
    /// The file path to a given config file.
    ///
    /// This file sets the storage backend and how results are
    /// laid out and expired.
    config_file: PathBuf,

    #[clap(long, default_value = "info", env = "LOG_LEVEL")]
    /// The log level filter, any logs that are above this level won't
    /// be displayed.
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: ServerConfig = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let cfg = RuntimeConfig::from_file(&args.config_file).await?;

    let storage = cfg.backend.connect().await?;
    let cache = ResultCache::new(&cfg.result_storage, storage);
    let state = Arc::new(ApiState::new(cache, cfg.max_upload_size));

    let bind = format!("{}:{}", args.host, args.port);
    info!("Serving results on http://{}{}", &bind, routes::RESULTS_PREFIX);

    Server::new(TcpListener::bind(bind))
        .run(routes::app(state))
        .await?;

    Ok(())
}
