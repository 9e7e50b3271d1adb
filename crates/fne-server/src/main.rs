// SPDX-License-Identifier: Apache-2.0 OR MIT

//! FNE server binary.
//!
//! ```bash
//! fne-server --port 62031 --config fne-server.yaml
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fne_server::{FneServer, ServerConfig};

/// FNE call-routing server for DMR/P25 repeater peers.
#[derive(Parser, Debug)]
#[command(name = "fne-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (0.0.0.0 for all interfaces).
    #[arg(short, long)]
    bind: Option<String>,

    /// Configuration file (YAML format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repeater login password.
    #[arg(long)]
    password: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = if let Some(path) = &args.config {
        info!("loading config from {:?}", path);
        ServerConfig::from_file(path)?
    } else {
        ServerConfig::default()
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(password) = args.password {
        config.password = password;
    }
    config.validate()?;

    info!("starting fne-server on {}:{}", config.bind_address, config.port);

    let server = FneServer::bind(config)?;
    server.run()?;

    info!("fne-server stopped");
    Ok(())
}
