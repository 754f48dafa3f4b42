// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, is_yaml(path))?;
    config.validate()?;
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn parse_config(contents: &str, yaml: bool) -> Result<Config> {
    let config = if yaml {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
server:
  bind_addr: "127.0.0.1:8081"
probes:
  - name: orders-db
    url: "http://orders-db:8080/ping"
    timeout_secs: 2
    metadata:
      team: storage
  - name: broker
    url: "http://broker:15672/api/healthchecks/node"
metrics:
  enabled: true
"#;

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config = parse_config(YAML, true).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.bind_addr.port(), 8081);
        assert_eq!(config.server.path, "/healthcheck");
        assert_eq!(config.probes.len(), 2);
        assert_eq!(config.probes[0].timeout().as_secs(), 2);
        assert_eq!(config.probes[1].timeout().as_secs(), 5);
        assert_eq!(config.probes[0].metadata.get("team"), Some("storage"));
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"probes":[{"name":"api","url":"http://api/health"}]}"#;
        let config = parse_config(json, false).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.bind_addr.port(), 8080);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_extension_detection() {
        assert!(is_yaml(Path::new("health.yml")));
        assert!(is_yaml(Path::new("health.yaml")));
        assert!(!is_yaml(Path::new("health.json")));
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let err = load_config("/nonexistent/health.yaml").await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/health.yaml"));
    }
}
