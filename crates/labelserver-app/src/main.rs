// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelserver: accepts label print jobs over HTTP and feeds them to
// networked or serial label printers.
//
// Entry point. Initialises logging, loads the configuration, starts one print
// worker per printer, and serves the JSON API until Ctrl-C.

mod api;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use labelserver_core::Config;
use labelserver_print::Registry;

#[derive(Debug, Parser)]
#[command(name = "labelserver", version, about = "Label printer job server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the print workers and the HTTP API.
    Serve {
        /// Configuration file.
        #[arg(short, long, default_value = "labelserver.toml")]
        config: PathBuf,
        /// Listen address, overriding `[server].host`.
        #[arg(long)]
        host: Option<String>,
        /// Listen port, overriding `[server].port`.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Load the configuration, list printers and label types, and exit.
    Check {
        #[arg(short, long, default_value = "labelserver.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { config, host, port } => serve(config, host, port).await,
        Command::Check { config } => check(config),
    }
}

async fn serve(path: PathBuf, host: Option<String>, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    let config = Config::load(&path)?;
    let registry = Arc::new(Registry::from_config(&config)?);
    registry.start_all()?;

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!(addr = %listener.local_addr()?, printers = registry.len(), "labelserver listening");

    let served = axum::serve(listener, api::router(Arc::clone(&registry)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    registry.stop_all().await;
    served?;
    info!("labelserver stopped");
    Ok(())
}

fn check(path: PathBuf) -> Result<(), Box<dyn Error>> {
    let config = Config::load(&path)?;
    let registry = Registry::from_config(&config)?;
    for printer in registry.printers() {
        println!("{} ({})", printer.id(), printer.name());
        for label_type in printer.label_types() {
            println!("  {} ({})", label_type.id, label_type.name);
        }
    }
    println!("{}: {} printer(s) OK", path.display(), registry.len());
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
