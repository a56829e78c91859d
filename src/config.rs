use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::membership::policy::PolicyKind;

#[derive(Debug, Deserialize, Clone)]
pub struct RingSettings {
    pub slots: u32,
    pub virtual_nodes: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorSettings {
    pub interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Consecutive missed probes before a node is declared failed.
    pub failure_threshold: u32,
}

impl DetectorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvisionerSettings {
    /// Base URL of a node, `{name}` is replaced with the node name.
    pub address_template: String,
    /// argv run to start a node, `{name}` is substituted in every argument.
    #[serde(default)]
    pub spawn_command: Option<Vec<String>>,
    #[serde(default)]
    pub stop_command: Option<Vec<String>>,
    pub timeout_ms: u64,
}

impl ProvisionerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub http_addr: String,
    pub log_level: String,
    #[serde(default)]
    pub initial_nodes: Vec<String>,
    pub forward_timeout_ms: u64,
    #[serde(default)]
    pub removal_policy: PolicyKind,
    pub ring: RingSettings,
    pub detector: DetectorSettings,
    pub provisioner: ProvisionerSettings,
}

impl Settings {
    /// Defaults, then the optional file at `path`, then `RING_LB_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("http_addr", "0.0.0.0:5000")?
            .set_default("log_level", "info")?
            .set_default("forward_timeout_ms", 5000)?
            .set_default("removal_policy", "random")?
            .set_default("ring.slots", 512)?
            .set_default("ring.virtual_nodes", 9)?
            .set_default("detector.interval_ms", 5000)?
            .set_default("detector.probe_timeout_ms", 2000)?
            .set_default("detector.failure_threshold", 1)?
            .set_default("provisioner.address_template", "http://{name}:8000")?
            .set_default("provisioner.timeout_ms", 30000)?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("RING_LB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("initial_nodes")
                    .with_list_parse_key("provisioner.spawn_command")
                    .with_list_parse_key("provisioner.stop_command"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring.virtual_nodes == 0 {
            return Err(ConfigError::Message(
                "ring.virtual_nodes must be positive".to_string(),
            ));
        }
        if self.ring.slots <= self.ring.virtual_nodes {
            return Err(ConfigError::Message(format!(
                "ring.slots ({}) must exceed ring.virtual_nodes ({})",
                self.ring.slots, self.ring.virtual_nodes
            )));
        }
        if self.detector.interval_ms == 0 || self.detector.probe_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "detector intervals must be positive".to_string(),
            ));
        }
        if self.detector.failure_threshold == 0 {
            return Err(ConfigError::Message(
                "detector.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.forward_timeout_ms == 0 || self.provisioner.timeout_ms == 0 {
            return Err(ConfigError::Message("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}
