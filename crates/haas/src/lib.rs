//! HaaS power driver for bare metal provisioning.
//!
//! Translates a provisioning host's abstract power operations (power on,
//! power off, reboot, state query) into HTTP calls against a
//! Hardware-as-a-Service controller.
//!
//! # Example
//!
//! ```rust,ignore
//! use haas_power::providers::haas::HaasPower;
//! use haas_power::providers::{Node, NodeTask, PowerInterface, PowerState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let driver = HaasPower::new()?;
//!     let node: Node = load_node("node-01")?;
//!
//!     // Validate driver-info before scheduling anything
//!     driver.validate(&node)?;
//!
//!     // The host holds the node lock for the duration of the call
//!     driver
//!         .set_power_state(&NodeTask::exclusive(&node), PowerState::On)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod inventory;
pub mod providers;

pub use providers::haas::{HaasConfig, HaasPower, NodeCredentials};
pub use providers::{Node, NodeTask, PowerError, PowerInterface, PowerState};
