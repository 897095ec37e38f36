//! # tg-daemon
//!
//! The toolgate gateway daemon.
//!
//! Default mode serves the JSON-RPC endpoint, approval callbacks, and
//! admin API over HTTP. `--stdio` serves the line-oriented JSON-RPC
//! transport instead (for local agent clients); logs always go to
//! stderr so stdout stays clean for the protocol.
//!
//! Configuration comes from the environment (`TOOLGATE_*`, `OIDC_*`,
//! `DEV_*`); see `Settings::from_env`.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tg_gateway::{http, stdio, Gateway, Settings};
use tg_kv::{KvStore, RedisKv};
use tg_store::SqlStore;

/// toolgate policy-mediated tool-call gateway.
#[derive(Parser)]
#[command(name = "tg-daemon", about = "toolgate tool-call gateway")]
struct Cli {
    /// Serve JSON-RPC over stdio instead of HTTP.
    #[arg(long)]
    stdio: bool,

    /// Override the HTTP bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }

    let kv: Arc<dyn KvStore> = Arc::new(
        RedisKv::connect(&settings.kv_url)
            .await
            .with_context(|| format!("connecting to KV store at {}", settings.kv_url))?,
    );
    let store = Arc::new(
        SqlStore::open(&settings.db_path)
            .with_context(|| format!("opening database at {}", settings.db_path.display()))?,
    );

    let bind_addr = settings.bind_addr.clone();
    let gateway = Arc::new(Gateway::new(settings, kv, store).context("initializing gateway")?);

    if cli.stdio {
        tracing::info!("serving JSON-RPC on stdio");
        stdio::run(gateway).await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, http::build_router(gateway))
        .await
        .context("http server")?;
    Ok(())
}
