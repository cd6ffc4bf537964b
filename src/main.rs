//! stowage daemon
//!
//! A minimal HTTP blob store: `PUT` a payload, get back a time-sharded
//! location, `GET` or `DELETE` it later.
//!
//! ## Usage
//!
//! ```bash
//! # Serve blobs out of ./data on the default port
//! stowage ./data
//!
//! # Custom port
//! stowage --port 8091 /var/lib/stowage
//!
//! # From a config file (CLI flags win)
//! stowage --config /etc/stowage.toml
//! ```
//!
//! ## HTTP API
//!
//! - `PUT /name.ext` - store a blob, `Location` header points at it
//! - `GET /<location>` - retrieve a blob
//! - `DELETE /<location>` - remove a blob
//! - `GET /health` - liveness check

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage::{BlobStore, Config, HttpServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "Time-sharded blob storage daemon")]
struct Args {
    /// Store root directory (created if missing)
    directory: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port
    #[arg(long, env = "STOWAGE_PORT")]
    port: Option<u16>,

    /// Host to bind
    #[arg(long, env = "STOWAGE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("stowage=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.directory {
        config.store_root = dir;
    }
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_host = bind;
    }

    let root = prepare_store_root(&config.store_root).await?;

    info!(
        store_root = %root.display(),
        port = config.http_port,
        "starting stowage"
    );

    let store = Arc::new(BlobStore::new(root));
    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.http_port)
        .parse()
        .context("invalid bind address")?;
    let server = Arc::new(HttpServer::new(store, addr));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    Ok(())
}

/// Make sure the store root exists and is writable before serving
/// anything: create it if missing, then prove writability by opening a
/// scratch file inside it. Returns the canonical absolute path, fixed for
/// the process lifetime.
async fn prepare_store_root(path: &Path) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("cannot create store root {}", path.display()))?;

    tempfile::tempfile_in(path)
        .with_context(|| format!("store root {} is not writable", path.display()))?;

    tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("cannot resolve store root {}", path.display()))
}
