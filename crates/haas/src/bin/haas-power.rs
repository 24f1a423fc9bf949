//! HaaS power CLI - drive node power through a HaaS controller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use haas_power::inventory::Inventory;
use haas_power::providers::haas::{HaasConfig, HaasPower, DEFAULT_TIMEOUT_SECS};
use haas_power::providers::{NodeTask, PowerError, PowerInterface, PowerState};

/// HaaS power CLI.
#[derive(Parser)]
#[command(name = "haas-power")]
#[command(about = "Power on, power off and reboot nodes through HaaS")]
struct Cli {
    /// Node inventory file (or set `HAAS_NODE_FILE` env var).
    #[arg(long, env = "HAAS_NODE_FILE", default_value = "haas-nodes.yaml")]
    node_file: PathBuf,

    /// Request timeout in seconds (or set `HAAS_TIMEOUT_SECS` env var).
    #[arg(long, env = "HAAS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Send HaaS username/password as HTTP basic auth.
    #[arg(long, env = "HAAS_BASIC_AUTH", default_value = "false")]
    basic_auth: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the driver-info keys the driver understands.
    Properties {
        /// Print as JSON.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Check a node's driver-info.
    Validate {
        /// Node name in the inventory.
        #[arg(long)]
        node: String,
    },

    /// Show a node's recorded power state.
    State {
        /// Node name in the inventory.
        #[arg(long)]
        node: String,
    },

    /// Power a node on.
    On {
        /// Node name in the inventory.
        #[arg(long)]
        node: String,
    },

    /// Power a node off.
    Off {
        /// Node name in the inventory.
        #[arg(long)]
        node: String,
    },

    /// Set a node's power state ("power on" or "power off").
    Set {
        /// Node name in the inventory.
        #[arg(long)]
        node: String,

        /// Target power state.
        #[arg(long)]
        state: String,
    },

    /// Power cycle a node.
    Reboot {
        /// Node name in the inventory.
        #[arg(long)]
        node: String,
    },
}

/// Record a power operation's outcome in the inventory, then pass it on.
async fn record(
    inventory: &mut Inventory,
    path: &Path,
    name: &str,
    target: PowerState,
    outcome: Result<(), PowerError>,
) -> Result<()> {
    if inventory.record_outcome(name, target, &outcome)? {
        inventory
            .save(path)
            .await
            .context("Failed to update inventory")?;
    }
    outcome.map_err(anyhow::Error::from)
}

/// Set a node's power state and record it in the inventory.
async fn set_power(
    driver: &HaasPower,
    inventory: &mut Inventory,
    path: &Path,
    name: &str,
    state: PowerState,
) -> Result<()> {
    let node = inventory.node(name)?.clone();
    info!("Setting {name} to {state}");

    let outcome = driver
        .set_power_state(&NodeTask::exclusive(&node), state)
        .await;
    record(inventory, path, name, state, outcome)
        .await
        .with_context(|| format!("Failed to set power state of {name}"))?;

    println!("\n✅ {name}: {state}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let driver = HaasPower::with_config(HaasConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
        basic_auth: cli.basic_auth,
    })
    .context("Failed to create HaaS driver")?;

    let mut inventory = Inventory::load(&cli.node_file)
        .await
        .with_context(|| format!("Failed to load {}", cli.node_file.display()))?;

    match cli.command {
        Commands::Properties { json: true } => {
            println!("{}", serde_json::to_string_pretty(driver.properties())?);
        }

        Commands::Properties { json: false } => {
            println!("\n{:<20} {:<10} DESCRIPTION", "KEY", "REQUIRED");
            println!("{}", "-".repeat(70));
            for property in driver.properties() {
                println!(
                    "{:<20} {:<10} {}",
                    property.name,
                    if property.required { "yes" } else { "no" },
                    property.description
                );
            }
        }

        Commands::Validate { node } => {
            driver.validate(inventory.node(&node)?)?;
            println!("\n✅ {node}: driver-info is valid");
        }

        Commands::State { node } => {
            let state = driver.get_power_state(inventory.node(&node)?).await?;
            println!("\n{node}: {state} (last recorded)");
        }

        Commands::On { node } => {
            set_power(&driver, &mut inventory, &cli.node_file, &node, PowerState::On).await?;
        }

        Commands::Off { node } => {
            set_power(&driver, &mut inventory, &cli.node_file, &node, PowerState::Off).await?;
        }

        Commands::Set { node, state } => {
            let state: PowerState = state.parse()?;
            set_power(&driver, &mut inventory, &cli.node_file, &node, state).await?;
        }

        Commands::Reboot { node } => {
            let target = inventory.node(&node)?.clone();
            info!("Rebooting {node}");

            let outcome = driver.reboot(&NodeTask::exclusive(&target)).await;
            record(&mut inventory, &cli.node_file, &node, PowerState::On, outcome)
                .await
                .with_context(|| format!("Failed to reboot {node}"))?;

            println!("\n✅ {node} rebooted");
        }
    }

    Ok(())
}
