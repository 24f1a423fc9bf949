//! HaaS (Hardware-as-a-Service) power driver.
//!
//! Implements the [`PowerInterface`](crate::providers::PowerInterface) trait
//! by POSTing `power_off` / `power_cycle` actions to a HaaS controller.
//!
//! ## Driver-info
//!
//! - `haas_endpoint` (required): HaaS API base URL
//! - `haas_nodename` (required): node name as registered with HaaS
//! - `haas_username`, `haas_password`, `haas_projectname` (optional)
//!
//! ## Limitations
//!
//! HaaS exposes no power query call, so `get_power_state` reports what the
//! host last recorded rather than asking the controller.

mod client;
mod models;

pub use client::{HaasConfig, HaasPower, DEFAULT_TIMEOUT_SECS};
pub use models::*;
