//! Kernel configuration.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable selecting the rollback order.
pub const ENV_ROLLBACK_ORDER: &str = "LINEFLOW_ROLLBACK_ORDER";
/// Environment variable selecting the eviction policy.
pub const ENV_EVICTION: &str = "LINEFLOW_EVICTION";
/// Environment variable setting the per-subscriber broadcast buffer.
pub const ENV_BROADCAST_BUFFER: &str = "LINEFLOW_BROADCAST_BUFFER";

/// Order in which completed sequential stages are rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackOrder {
    /// Reverse completion order; each stage sees its own input and output.
    #[default]
    Reverse,
    /// Insertion order; every stage sees the last successful output as both
    /// input and output.
    Forward,
}

impl FromStr for RollbackOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reverse" => Ok(Self::Reverse),
            "forward" => Ok(Self::Forward),
            other => anyhow::bail!("unknown rollback order: {other}"),
        }
    }
}

impl fmt::Display for RollbackOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reverse => write!(f, "reverse"),
            Self::Forward => write!(f, "forward"),
        }
    }
}

/// When orchestrators are removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Keep every orchestrator for the lifetime of the service.
    #[default]
    Retain,
    /// Remove an orchestrator once its run reaches a terminal status.
    OnTerminal,
}

impl FromStr for EvictionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(Self::Retain),
            "on_terminal" | "on-terminal" => Ok(Self::OnTerminal),
            other => anyhow::bail!("unknown eviction policy: {other}"),
        }
    }
}

/// Configuration for the pipeline service and its orchestrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Rollback order for sequential pipelines.
    #[serde(default)]
    pub rollback_order: RollbackOrder,
    /// Registry eviction policy.
    #[serde(default)]
    pub eviction: EvictionPolicy,
    /// Per-subscriber buffer of channel broadcasters.
    #[serde(default = "default_broadcast_buffer")]
    pub broadcast_buffer: usize,
    /// Whether runs observe the cancellation token: sequential runs check it
    /// between stages, parallel runs race it against in-flight stages.
    #[serde(default = "default_check_cancellation")]
    pub check_cancellation: bool,
}

fn default_broadcast_buffer() -> usize {
    10
}

fn default_check_cancellation() -> bool {
    true
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            rollback_order: RollbackOrder::default(),
            eviction: EvictionPolicy::default(),
            broadcast_buffer: default_broadcast_buffer(),
            check_cancellation: default_check_cancellation(),
        }
    }
}

impl KernelConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rollback order.
    #[must_use]
    pub fn with_rollback_order(mut self, order: RollbackOrder) -> Self {
        self.rollback_order = order;
        self
    }

    /// Sets the eviction policy.
    #[must_use]
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Sets the broadcast buffer.
    #[must_use]
    pub fn with_broadcast_buffer(mut self, buffer: usize) -> Self {
        self.broadcast_buffer = buffer;
        self
    }

    /// Enables or disables cancellation checks inside running pipelines.
    #[must_use]
    pub fn with_check_cancellation(mut self, check: bool) -> Self {
        self.check_cancellation = check;
        self
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is invalid.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid kernel configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_ROLLBACK_ORDER) {
            config.rollback_order = value
                .parse()
                .with_context(|| format!("{ENV_ROLLBACK_ORDER}={value}"))?;
        }
        if let Some(value) = lookup(ENV_EVICTION) {
            config.eviction = value
                .parse()
                .with_context(|| format!("{ENV_EVICTION}={value}"))?;
        }
        if let Some(value) = lookup(ENV_BROADCAST_BUFFER) {
            config.broadcast_buffer = value
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BROADCAST_BUFFER}={value}"))?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.broadcast_buffer > 0, "broadcast_buffer must be at least 1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.rollback_order, RollbackOrder::Reverse);
        assert_eq!(config.eviction, EvictionPolicy::Retain);
        assert_eq!(config.broadcast_buffer, 10);
        assert!(config.check_cancellation);
    }

    #[test]
    fn test_from_json_partial() {
        let config = KernelConfig::from_json_str(r#"{"rollback_order": "forward"}"#).unwrap();
        assert_eq!(config.rollback_order, RollbackOrder::Forward);
        assert_eq!(config.broadcast_buffer, 10);

        let config =
            KernelConfig::from_json_str(r#"{"eviction": "on_terminal", "broadcast_buffer": 3}"#)
                .unwrap();
        assert_eq!(config.eviction, EvictionPolicy::OnTerminal);
        assert_eq!(config.broadcast_buffer, 3);
    }

    #[test]
    fn test_from_json_rejects_zero_buffer() {
        assert!(KernelConfig::from_json_str(r#"{"broadcast_buffer": 0}"#).is_err());
        assert!(KernelConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ROLLBACK_ORDER, "Forward"),
            (ENV_EVICTION, "on-terminal"),
            (ENV_BROADCAST_BUFFER, " 32 "),
        ]);
        let config = KernelConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();

        assert_eq!(
            config,
            KernelConfig::new()
                .with_rollback_order(RollbackOrder::Forward)
                .with_eviction(EvictionPolicy::OnTerminal)
                .with_broadcast_buffer(32)
        );
    }

    #[test]
    fn test_from_lookup_invalid() {
        let err = KernelConfig::from_lookup(|k| (k == ENV_EVICTION).then(|| "sometimes".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_EVICTION));
    }

    #[test]
    fn test_rollback_order_display() {
        assert_eq!(RollbackOrder::Reverse.to_string(), "reverse");
        assert_eq!("forward".parse::<RollbackOrder>().unwrap(), RollbackOrder::Forward);
    }
}
