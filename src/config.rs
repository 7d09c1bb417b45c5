use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default wall-clock ceiling for the delivery verifier's polling loop.
pub const DEFAULT_RECEIVE_WINDOW_SECS: u64 = 5;

/// Suite-wide hub configuration, loaded once by the fixture manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub connection_string: String,
    pub host_name: String,
    pub device_id_prefix: String,
    pub receive_window_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            host_name: String::new(),
            device_id_prefix: "e2e-device".to_string(),
            receive_window_secs: DEFAULT_RECEIVE_WINDOW_SECS,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = HubConfig::default();

        config.connection_string = env::var("HUB_CONNECTION_STRING")
            .context("HUB_CONNECTION_STRING must be set")?;

        config.host_name = match env::var("HUB_HOST_NAME") {
            Ok(host) if !host.trim().is_empty() => host,
            _ => host_name_from_connection_string(&config.connection_string)?,
        };

        if let Ok(prefix) = env::var("DEVICE_ID_PREFIX") {
            if !prefix.trim().is_empty() {
                config.device_id_prefix = prefix;
            }
        }

        if let Ok(window) = env::var("RECEIVE_WINDOW_SECS") {
            config.receive_window_secs = window
                .parse::<u64>()
                .context("failed to parse RECEIVE_WINDOW_SECS as u64")?;
        }

        config.validate()?;

        info!(
            host_name = %config.host_name,
            device_id_prefix = %config.device_id_prefix,
            "Hub configuration resolved"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(anyhow!("connection string must not be empty"));
        }
        if self.host_name.trim().is_empty() {
            return Err(anyhow!("host name must not be empty"));
        }
        if self.device_id_prefix.trim().is_empty() {
            return Err(anyhow!("device id prefix must not be empty"));
        }
        if self.receive_window_secs == 0 {
            return Err(anyhow!("receive window must be at least one second"));
        }
        Ok(())
    }

    pub fn receive_window(&self) -> Duration {
        Duration::from_secs(self.receive_window_secs)
    }
}

/// Pulls the `HostName=` segment out of a hub connection string of the form
/// `HostName=<host>;SharedAccessKeyName=<name>;SharedAccessKey=<key>`.
pub fn host_name_from_connection_string(connection_string: &str) -> Result<String> {
    connection_string
        .split(';')
        .find_map(|segment| segment.trim().strip_prefix("HostName="))
        .map(str::to_string)
        .filter(|host| !host.is_empty())
        .ok_or_else(|| anyhow!("connection string has no HostName= segment"))
}
