//! Upload Gatekeeper
//!
//! Accepts untrusted file uploads and decides, through a sequence of
//! independent checks, whether each file is kept or isolated.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                  UPLOAD GATEKEEPER                   │
//!                    │                                                      │
//!   POST /upload     │  ┌────────┐   ┌──────────┐   ┌───────────────────┐   │
//!   ─────────────────┼─▶│  net   │──▶│   http   │──▶│      intake       │   │
//!                    │  │listener│   │ multipart│   │ extension gate    │   │
//!                    │  └────────┘   └──────────┘   │ identifier        │   │
//!                    │                              │ persist ─────────────┼──▶ uploads/
//!                    │                              │ sniff + mime check│   │
//!                    │                              │ signature scan    │   │
//!                    │                              │ quarantine ──────────┼──▶ quarantine/
//!                    │                              └─────────┬─────────┘   │
//!                    │                                        ▼             │
//!                    │                              ┌───────────────────┐   │
//!                    │                              │       audit       │──────▶ logs/security.log
//!                    │                              └───────────────────┘   │
//!                    │  ┌────────────────────────────────────────────────┐  │
//!                    │  │ config · signatures · observability · lifecycle│  │
//!                    │  └────────────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use upload_gatekeeper::config::load_or_default;
use upload_gatekeeper::http::HttpServer;
use upload_gatekeeper::lifecycle::{bootstrap, load_rules, wait_for_signal, Shutdown};
use upload_gatekeeper::net::{bind, load_tls_config};
use upload_gatekeeper::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "upload-gatekeeper", version)]
#[command(about = "Validating intake gatekeeper for untrusted file uploads", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "GATEKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Validate configuration and compile rules, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upload-gatekeeper starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_upload_bytes = config.limits.max_upload_bytes,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if args.check {
        let rules = load_rules(&config)?;
        println!("configuration ok, {} signature rules", rules.len());
        return Ok(());
    }

    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let pipeline = bootstrap(&config).await?;
    let tls = match &config.listener.tls {
        Some(tls) => Some(load_tls_config(tls).await?),
        None => None,
    };

    let listener = bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let server = HttpServer::new(config, pipeline);
    match tls {
        Some(tls) => server.run_tls(listener, tls, server_shutdown).await?,
        None => server.run(listener, server_shutdown).await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
