// src/config/models.rs
use crate::health::Metadata;
use crate::server::DEFAULT_HEALTHCHECK_PATH;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub probes: Vec<ProbeConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    pub url: Url,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one probe must be configured")]
    NoProbes,

    #[error("probe #{0} has an empty name")]
    EmptyProbeName(usize),

    #[error("probe {0} must have a non-zero timeout")]
    ZeroTimeout(String),

    #[error("{0} path must start with '/': {1:?}")]
    InvalidPath(&'static str, String),

    #[error("metrics must be served on a different port than the health check ({0})")]
    PortCollision(u16),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probes.is_empty() {
            return Err(ConfigError::NoProbes);
        }

        for (index, probe) in self.probes.iter().enumerate() {
            if probe.name.is_empty() {
                return Err(ConfigError::EmptyProbeName(index));
            }
            if probe.timeout_secs == 0 {
                return Err(ConfigError::ZeroTimeout(probe.name.clone()));
            }
        }

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::InvalidPath("health check", self.server.path.clone()));
        }

        if self.metrics.enabled {
            if !self.metrics.path.starts_with('/') {
                return Err(ConfigError::InvalidPath("metrics", self.metrics.path.clone()));
            }
            if self.metrics.port == self.server.bind_addr.port() {
                return Err(ConfigError::PortCollision(self.metrics.port));
            }
        }

        Ok(())
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            path: default_path(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_path() -> String {
    DEFAULT_HEALTHCHECK_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(probes: Vec<ProbeConfig>) -> Config {
        Config {
            server: ServerConfig::default(),
            probes,
            metrics: MetricsConfig::default(),
        }
    }

    fn probe(name: &str) -> ProbeConfig {
        ProbeConfig {
            name: name.to_string(),
            url: Url::parse("http://localhost/health").unwrap(),
            timeout_secs: 5,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_requires_probes() {
        assert!(matches!(config(vec![]).validate(), Err(ConfigError::NoProbes)));
    }

    #[test]
    fn test_rejects_empty_probe_name() {
        let err = config(vec![probe("db"), probe("")]).validate().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyProbeName(1)));
    }

    #[test]
    fn test_rejects_relative_path() {
        let mut cfg = config(vec![probe("db")]);
        cfg.server.path = "healthcheck".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPath(..))));
    }

    #[test]
    fn test_rejects_metrics_collision() {
        let mut cfg = config(vec![probe("db")]);
        cfg.metrics.enabled = true;
        cfg.metrics.port = 8080;
        assert!(matches!(cfg.validate(), Err(ConfigError::PortCollision(8080))));
    }
}
