//! HaaS power driver implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use super::models::{self, NodeCredentials, COMMON_PROPERTIES};
use crate::providers::traits::{
    Node, NodeTask, PowerError, PowerInterface, PowerState, Property,
};

/// Default timeout for HaaS requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Action that powers a node (back) on.
const ACTION_POWER_CYCLE: &str = "power_cycle";

/// Action that powers a node off.
const ACTION_POWER_OFF: &str = "power_off";

/// Driver settings shared by every node.
#[derive(Debug, Clone)]
pub struct HaasConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Send `haas_username`/`haas_password` as HTTP basic auth.
    ///
    /// Off by default: HaaS power calls are sent without credentials.
    pub basic_auth: bool,
}

impl Default for HaasConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            basic_auth: false,
        }
    }
}

/// Power interface backed by a HaaS controller.
#[derive(Clone)]
pub struct HaasPower {
    /// HTTP client.
    client: Client,
    /// Driver settings.
    config: HaasConfig,
}

impl HaasPower {
    /// Create a driver with default settings.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new() -> Result<Self, PowerError> {
        Self::with_config(HaasConfig::default())
    }

    /// Create a driver with explicit settings.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn with_config(config: HaasConfig) -> Result<Self, PowerError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    /// Build `{endpoint}/node/{node_name}/{action}`.
    fn action_url(creds: &NodeCredentials, action: &str) -> Result<Url, PowerError> {
        let mut url = Url::parse(&creds.endpoint)
            .map_err(|e| PowerError::InvalidEndpoint(format!("{}: {e}", creds.endpoint)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(PowerError::InvalidEndpoint(format!(
                "{}: unsupported scheme '{}'",
                creds.endpoint,
                url.scheme()
            )));
        }

        // `extend` drops dot segments
        if matches!(creds.node_name.as_str(), "." | "..") {
            return Err(PowerError::InvalidEndpoint(format!(
                "node name '{}' cannot be used as a path segment",
                creds.node_name
            )));
        }

        url.path_segments_mut()
            .map_err(|()| PowerError::InvalidEndpoint(creds.endpoint.clone()))?
            .pop_if_empty()
            .extend(["node", creds.node_name.as_str(), action]);

        Ok(url)
    }

    /// POST an action for a node and return the response status.
    async fn post_action(
        &self,
        creds: &NodeCredentials,
        action: &str,
    ) -> Result<StatusCode, PowerError> {
        let url = Self::action_url(creds, action)?;
        debug!(url = %url, node = %creds.node_name, action, "POST request");

        let mut request = self.client.post(url.clone());
        if self.config.basic_auth {
            if let Some(username) = &creds.username {
                request = request.basic_auth(username, creds.password.as_ref());
            }
        }

        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            warn!(
                url = %url,
                node = %creds.node_name,
                status = status.as_u16(),
                "HaaS rejected power action"
            );
        }

        Ok(status)
    }

    /// Run one action and map the response to the state it should produce.
    ///
    /// Anything but 200 means the node did not reach `target`.
    async fn apply(
        &self,
        creds: &NodeCredentials,
        action: &str,
        target: PowerState,
    ) -> Result<Option<PowerState>, PowerError> {
        let status = self.post_action(creds, action).await?;
        Ok((status == StatusCode::OK).then_some(target))
    }
}

#[async_trait]
impl PowerInterface for HaasPower {
    fn properties(&self) -> &'static [Property] {
        COMMON_PROPERTIES
    }

    fn validate(&self, node: &Node) -> Result<(), PowerError> {
        models::resolve(&node.driver_info)?;
        Ok(())
    }

    /// Returns the state the host last recorded for the node.
    ///
    /// HaaS has no power query call, so this is not authoritative: it is
    /// only as fresh as the host's last successful power operation.
    async fn get_power_state(&self, node: &Node) -> Result<PowerState, PowerError> {
        models::resolve(&node.driver_info)?;
        Ok(node.power_state)
    }

    async fn set_power_state(
        &self,
        task: &NodeTask<'_>,
        state: PowerState,
    ) -> Result<(), PowerError> {
        task.require_exclusive()?;
        let creds = models::resolve(&task.node.driver_info)?;

        let action = match state {
            PowerState::On => ACTION_POWER_CYCLE,
            PowerState::Off => ACTION_POWER_OFF,
            PowerState::Error | PowerState::Unknown => {
                return Err(PowerError::InvalidPowerState(state.to_string()));
            }
        };

        info!(node = %task.node.name, desired = %state, action, "Setting power state");

        let reached = self.apply(&creds, action, state).await?;
        if reached != Some(state) {
            return Err(PowerError::PowerStateFailure(state));
        }

        info!(node = %task.node.name, state = %state, "Power state set");
        Ok(())
    }

    async fn reboot(&self, task: &NodeTask<'_>) -> Result<(), PowerError> {
        task.require_exclusive()?;
        let creds = models::resolve(&task.node.driver_info)?;

        info!(node = %task.node.name, "Rebooting node");

        let mut reached = None;
        if self.apply(&creds, ACTION_POWER_OFF, PowerState::Off).await? == Some(PowerState::Off) {
            reached = self
                .apply(&creds, ACTION_POWER_CYCLE, PowerState::On)
                .await?;
        } else {
            warn!(node = %task.node.name, "power_off failed, not attempting power_cycle");
        }

        if reached != Some(PowerState::On) {
            return Err(PowerError::PowerStateFailure(PowerState::On));
        }

        info!(node = %task.node.name, "Node rebooted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(endpoint: &str, node_name: &str) -> NodeCredentials {
        NodeCredentials {
            endpoint: endpoint.to_string(),
            node_name: node_name.to_string(),
            username: None,
            password: None,
            project_name: None,
        }
    }

    #[test]
    fn test_action_url() {
        let url = HaasPower::action_url(&creds("http://haas.local:5000", "node-01"), "power_off")
            .unwrap();
        assert_eq!(url.as_str(), "http://haas.local:5000/node/node-01/power_off");
    }

    #[test]
    fn test_action_url_keeps_base_path() {
        let url = HaasPower::action_url(&creds("https://haas.local/api/", "n1"), "power_cycle")
            .unwrap();
        assert_eq!(url.as_str(), "https://haas.local/api/node/n1/power_cycle");
    }

    #[test]
    fn test_action_url_encodes_node_name() {
        let url = HaasPower::action_url(&creds("http://haas.local", "rack 1/node"), "power_off")
            .unwrap();
        assert_eq!(url.as_str(), "http://haas.local/node/rack%201%2Fnode/power_off");
    }

    #[test]
    fn test_action_url_rejects_bad_endpoint() {
        let err = HaasPower::action_url(&creds("haas.local", "n1"), "power_off").unwrap_err();
        assert!(matches!(err, PowerError::InvalidEndpoint(_)));

        let err = HaasPower::action_url(&creds("ftp://haas.local", "n1"), "power_off").unwrap_err();
        assert!(matches!(err, PowerError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_action_url_rejects_dot_node_names() {
        for name in [".", ".."] {
            let err = HaasPower::action_url(&creds("http://haas.local/api", name), "power_off")
                .unwrap_err();
            assert!(matches!(err, PowerError::InvalidEndpoint(ref m) if m.contains(name)));
        }

        let url = HaasPower::action_url(&creds("http://haas.local/api", "...node"), "power_off")
            .unwrap();
        assert_eq!(url.as_str(), "http://haas.local/api/node/...node/power_off");
    }

    #[test]
    fn test_default_config() {
        let config = HaasConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(!config.basic_auth);
    }
}
