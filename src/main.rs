//! vnet-sync: administrative CLI for the control-plane consistency engine.
//!
//! Wires the engine against a controller admin API and an orchestrator REST
//! endpoint, runs one administrative operation, prints its report as JSON and
//! exits nonzero when the operation failed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vnet_sync::clients::{Collaborators, HttpControllerAdmin, HttpOrchestrator};
use vnet_sync::engine::ArpMode;
use vnet_sync::{EngineConfig, SyncEngine};

#[derive(Parser)]
#[command(name = "vnet-sync", version)]
#[command(about = "Consistency engine for SDN network virtualization control planes")]
struct Cli {
    /// Orchestrator REST endpoint
    #[arg(long, default_value = "http://127.0.0.1:9696/v2.0")]
    orchestrator: String,

    /// Controller admin REST endpoint
    #[arg(long, default_value = "http://127.0.0.1:8181/admin")]
    controller: String,

    /// Path to an engine config file (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full reconciliation pass across all resource kinds
    Reconcile,

    /// Purge all application flow rules and verify removal converges
    PurgeRules {
        /// Purge deadline in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Purge rules, then force every COMPLETE node through a resync
    Resync {
        /// Purge deadline in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Recreate dataplane ports missing from integration bridges
    RecoverPorts {
        /// Limit recovery to one node
        #[arg(long)]
        node: Option<String>,
    },

    /// Switch the ARP handling mode and resync the dataplane
    ArpMode {
        /// proxy or broadcast
        mode: ArpModeArg,
    },

    /// Toggle stateful SNAT on gateway nodes and resync the dataplane
    Snat {
        /// on or off
        state: Toggle,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ArpModeArg {
    Proxy,
    Broadcast,
}

impl From<ArpModeArg> for ArpMode {
    fn from(arg: ArpModeArg) -> Self {
        match arg {
            ArpModeArg::Proxy => ArpMode::Proxy,
            ArpModeArg::Broadcast => ArpMode::Broadcast,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "vnet_sync=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let orchestrator = Arc::new(HttpOrchestrator::new(&cli.orchestrator)?);
    let controller = Arc::new(HttpControllerAdmin::new(&cli.controller)?);
    let collaborators = Collaborators {
        orchestrator,
        flow_rules: Arc::clone(&controller) as _,
        nodes: Arc::clone(&controller) as _,
        port_inspector: Arc::clone(&controller) as _,
        switch_admin: Arc::clone(&controller) as _,
        config_admin: controller,
    };

    let engine = Arc::new(SyncEngine::new(cfg, collaborators));

    // Ctrl-C interrupts in-flight convergence waits instead of abandoning
    // them mid-poll.
    {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling in-flight waits");
                engine.shutdown();
            }
        });
    }

    let outcome = run(&cli.command, &engine).await;
    if let Err(e) = &outcome {
        error!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: &Commands, engine: &SyncEngine) -> Result<()> {
    match command {
        Commands::Reconcile => {
            let report = engine.reconcile().await;
            print_report(&report)?;
        }
        Commands::PurgeRules { timeout } => {
            // Purge without the resync half: operators use this to verify
            // rule removal before a maintenance window.
            engine.purge_rules(Duration::from_secs(*timeout)).await?;
            println!("{}", serde_json::json!({ "purged": true }));
        }
        Commands::Resync { timeout } => {
            let report = engine
                .purge_and_resync(Duration::from_secs(*timeout))
                .await?;
            print_report(&report)?;
        }
        Commands::RecoverPorts { node } => {
            let report = engine.recover_ports(node.as_deref()).await?;
            print_report(&report)?;
        }
        Commands::ArpMode { mode } => {
            let report = engine.set_arp_mode((*mode).into()).await?;
            print_report(&report)?;
        }
        Commands::Snat { state } => {
            let enabled = matches!(state, Toggle::On);
            let report = engine.set_stateful_snat(enabled).await?;
            print_report(&report)?;
        }
    }
    Ok(())
}
