//! llrp-emu command line
//!
//! ```bash
//! # Serve tags from a CSV file on the default LLRP port
//! llrp-emu server --file tags.csv
//!
//! # Replay event-cycle files, one per report interval
//! llrp-emu simulator ./cycles --report-interval 500
//!
//! # Connect to a reader and log what it reports
//! llrp-emu --ip 127.0.0.1 client
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use llrp_emu::management::ManagementServer;
use llrp_emu::simulation::{EventCycleSource, Simulator};
use llrp_emu::tag::store;
use llrp_emu::{EmulatorConfig, LlrpServer, TagRegistry, client};
use std::net::IpAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A mock LLRP logical reader for RFID tags
#[derive(Parser, Debug)]
#[command(name = "llrp-emu", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long, global = true)]
    debug: bool,

    /// YAML configuration file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// LLRP listening (or connecting) address
    #[arg(short = 'a', long, global = true)]
    ip: Option<IpAddr>,

    /// LLRP port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Maximum LLRP PDU size in bytes (0 = unbounded)
    #[arg(short = 'm', long = "pdu", global = true)]
    max_pdu: Option<usize>,

    /// Keepalive interval in seconds (0 = disabled)
    #[arg(short = 'k', long = "keepalive", global = true)]
    keepalive_interval_secs: Option<u64>,

    /// First message ID to use
    #[arg(long, global = true)]
    initial_message_id: Option<u32>,

    /// First keepalive ID to use
    #[arg(long, global = true)]
    initial_keepalive_id: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run as a tag stream server
    Server(ServeArgs),
    /// Run as an LLRP client
    Client,
    /// Run as a server replaying event-cycle files from a directory
    Simulator {
        /// Directory of binary event-cycle files (*.bin)
        dir: PathBuf,
        #[command(flatten)]
        serve: ServeArgs,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// CSV or binary file containing tag data
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// RO_ACCESS_REPORT interval in milliseconds
    #[arg(short = 'i', long)]
    report_interval: Option<u64>,

    /// Management channel port (0 = disabled)
    #[arg(short = 'w', long)]
    management_port: Option<u16>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<EmulatorConfig> {
        let mut config = match &self.config {
            Some(path) => EmulatorConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EmulatorConfig::default(),
        };

        if let Some(ip) = self.ip {
            config.ip = ip;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max_pdu) = self.max_pdu {
            config.max_pdu = max_pdu;
        }
        if let Some(secs) = self.keepalive_interval_secs {
            config.keepalive_interval_secs = secs;
        }
        if let Some(id) = self.initial_message_id {
            config.initial_message_id = id;
        }
        if let Some(id) = self.initial_keepalive_id {
            config.initial_keepalive_id = id;
        }

        let serve = match &self.command {
            Command::Server(serve) | Command::Simulator { serve, .. } => Some(serve),
            Command::Client => None,
        };
        if let Some(serve) = serve {
            if let Some(file) = &serve.file {
                config.tag_file = Some(file.clone());
            }
            if let Some(ms) = serve.report_interval {
                config.report_interval_ms = ms;
            }
            if let Some(port) = serve.management_port {
                config.management_port = port;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(true)
        .init();

    let config = cli.load_config()?;
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_cancel.cancel();
    });

    match cli.command {
        Command::Server(_) => run_server(config, None, cancel).await,
        Command::Simulator { dir, .. } => run_server(config, Some(dir), cancel).await,
        Command::Client => {
            let settings = client::ClientSettings {
                keepalive_interval_ms: config.keepalive_interval_secs.saturating_mul(1000).try_into().unwrap_or(u32::MAX),
                max_inbound_message: config.max_inbound_message,
            };
            let stats =
                client::run_client(config.llrp_addr(), config.session().message_ids, settings, cancel).await?;
            info!(reports = stats.reports, tags = stats.tags, keepalives = stats.keepalives, "Client finished");
            Ok(())
        }
    }
}

async fn run_server(
    config: EmulatorConfig,
    cycles: Option<PathBuf>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let tags = match &config.tag_file {
        Some(path) if path.exists() => {
            info!(file = %path.display(), "Loading virtual tags");
            store::load_tags_cached(path)?
        }
        Some(path) => {
            warn!(file = %path.display(), "Tag file not found, starting with no tags");
            Vec::new()
        }
        None => Vec::new(),
    };

    // Validate the simulation input before anything starts listening
    let source = cycles.map(EventCycleSource::from_dir).transpose()?;

    let registry = TagRegistry::spawn(tags, cancel.clone());
    let server =
        LlrpServer::bind(config.llrp_addr(), config.session(), registry.clone(), config.connection_settings())
            .await?;

    if let Some(addr) = config.management_addr() {
        let management = ManagementServer::bind(addr, registry.clone()).await?;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = management.run(cancel).await {
                warn!("Management listener failed: {}", e);
            }
        });
    }

    if let Some(source) = source {
        Simulator::spawn(source, registry, config.report_interval(), cancel.clone());
    }

    server.run(cancel).await?;
    info!("llrp-emu stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
