//! Power interface trait and common types shared with the host framework.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during power operations.
#[derive(Error, Debug)]
pub enum PowerError {
    /// One or more required driver-info keys are absent or empty.
    #[error("Missing the following haas_power credentials in node's driver_info: {0:?}")]
    MissingConfiguration(Vec<String>),

    /// Requested target state is not one the driver can set.
    #[error("set_power_state called with invalid power state {0}")]
    InvalidPowerState(String),

    /// The remote controller did not bring the node to the requested state.
    #[error("Failed to set node power state to {0}")]
    PowerStateFailure(PowerState),

    /// HTTP request never produced a response (DNS, connect, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// `haas_endpoint` is present but unusable as a base URL.
    #[error("Invalid HaaS endpoint: {0}")]
    InvalidEndpoint(String),

    /// A mutating operation was called without an exclusive node lock.
    #[error("An exclusive lock is required on node {0}")]
    ExclusiveLockRequired(String),
}

/// Node power state, in the host framework's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    /// Node is powered on.
    #[serde(rename = "power on")]
    On,
    /// Node is powered off.
    #[serde(rename = "power off")]
    Off,
    /// Node is in an error state.
    #[serde(rename = "error")]
    Error,
    /// Power state has never been recorded.
    #[serde(rename = "unknown", alias = "None")]
    Unknown,
}

impl PowerState {
    /// Host vocabulary string for this state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "power on",
            Self::Off => "power off",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "power on" => Ok(Self::On),
            "power off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "unknown" | "None" => Ok(Self::Unknown),
            other => Err(PowerError::InvalidPowerState(other.to_string())),
        }
    }
}

/// Opaque per-node driver configuration, as stored by the host.
pub type DriverInfo = BTreeMap<String, serde_json::Value>;

/// Node record handed to the driver by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node name in the host registry.
    pub name: String,
    /// Last power state recorded by the host.
    #[serde(default = "default_power_state")]
    pub power_state: PowerState,
    /// Driver-specific configuration.
    #[serde(default)]
    pub driver_info: DriverInfo,
}

fn default_power_state() -> PowerState {
    PowerState::Unknown
}

impl Node {
    /// Create a node with no recorded power state.
    pub fn new(name: impl Into<String>, driver_info: DriverInfo) -> Self {
        Self {
            name: name.into(),
            power_state: PowerState::Unknown,
            driver_info,
        }
    }
}

/// Kind of lock the host holds on a node for the current task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Read-only access; other tasks may hold the node concurrently.
    Shared,
    /// Sole access for the duration of the task.
    Exclusive,
}

/// A node together with the lock the host acquired for it.
///
/// Locks are acquired and released by the host. The driver only checks
/// which kind was taken before mutating power.
#[derive(Debug, Clone, Copy)]
pub struct NodeTask<'a> {
    /// Node being acted on.
    pub node: &'a Node,
    /// Lock held by the caller.
    pub lock: LockMode,
}

impl<'a> NodeTask<'a> {
    /// Task under a shared lock.
    #[must_use]
    pub fn shared(node: &'a Node) -> Self {
        Self {
            node,
            lock: LockMode::Shared,
        }
    }

    /// Task under an exclusive lock.
    #[must_use]
    pub fn exclusive(node: &'a Node) -> Self {
        Self {
            node,
            lock: LockMode::Exclusive,
        }
    }

    /// Fail unless the caller holds an exclusive lock.
    ///
    /// # Errors
    /// Returns [`PowerError::ExclusiveLockRequired`] for shared tasks.
    pub fn require_exclusive(&self) -> Result<(), PowerError> {
        match self.lock {
            LockMode::Exclusive => Ok(()),
            LockMode::Shared => Err(PowerError::ExclusiveLockRequired(self.node.name.clone())),
        }
    }
}

/// A driver-info key the power interface understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Property {
    /// Key in the node's driver-info.
    pub name: &'static str,
    /// Human-readable description for docs and UIs.
    pub description: &'static str,
    /// Whether validation fails without it.
    pub required: bool,
}

/// Power interface a host framework drives for each node.
#[async_trait]
pub trait PowerInterface: Send + Sync {
    /// Driver-info keys this interface reads, required ones first.
    fn properties(&self) -> &'static [Property];

    /// Check the node's driver-info without touching the hardware.
    fn validate(&self, node: &Node) -> Result<(), PowerError>;

    /// Current power state of the node.
    async fn get_power_state(&self, node: &Node) -> Result<PowerState, PowerError>;

    /// Turn the node on or off. Requires an exclusive lock.
    async fn set_power_state(
        &self,
        task: &NodeTask<'_>,
        state: PowerState,
    ) -> Result<(), PowerError>;

    /// Power cycle the node, ending powered on. Requires an exclusive lock.
    async fn reboot(&self, task: &NodeTask<'_>) -> Result<(), PowerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_display() {
        assert_eq!(PowerState::On.to_string(), "power on");
        assert_eq!(PowerState::Off.to_string(), "power off");
        assert_eq!(PowerState::Error.to_string(), "error");
        assert_eq!(PowerState::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_power_state_parse() {
        assert_eq!("power on".parse::<PowerState>().unwrap(), PowerState::On);
        assert_eq!("power off".parse::<PowerState>().unwrap(), PowerState::Off);
        assert_eq!("None".parse::<PowerState>().unwrap(), PowerState::Unknown);

        let err = "bogus".parse::<PowerState>().unwrap_err();
        assert!(matches!(err, PowerError::InvalidPowerState(ref s) if s == "bogus"));
    }

    #[test]
    fn test_power_state_serde_uses_host_vocabulary() {
        let json = serde_json::to_string(&PowerState::Off).unwrap();
        assert_eq!(json, "\"power off\"");

        let state: PowerState = serde_json::from_str("\"None\"").unwrap();
        assert_eq!(state, PowerState::Unknown);
    }

    #[test]
    fn test_require_exclusive() {
        let node = Node::new("node-01", DriverInfo::new());

        assert!(NodeTask::exclusive(&node).require_exclusive().is_ok());

        let err = NodeTask::shared(&node).require_exclusive().unwrap_err();
        assert!(matches!(err, PowerError::ExclusiveLockRequired(ref n) if n == "node-01"));
    }

    #[test]
    fn test_error_display() {
        let err = PowerError::MissingConfiguration(vec![
            "haas_endpoint".to_string(),
            "haas_nodename".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing the following haas_power credentials in node's driver_info: \
             [\"haas_endpoint\", \"haas_nodename\"]"
        );

        let err = PowerError::PowerStateFailure(PowerState::On);
        assert_eq!(err.to_string(), "Failed to set node power state to power on");
    }
}
