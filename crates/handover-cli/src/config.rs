//! Host configuration, read from an optional TOML file and `HANDOVER_*`
//! environment variables.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use handover_core::config::WorkflowConfig;
use serde::Deserialize;

/// Connection settings for the HTTP gateway fronting the three backends.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
  pub base_url:     String,
  /// Sent as a bearer token when set.
  pub token:        Option<String>,
  pub timeout_secs: u64,
}

impl Default for GatewayConfig {
  fn default() -> Self {
    Self {
      base_url:     "http://localhost:8000".to_owned(),
      token:        None,
      timeout_secs: 30,
    }
  }
}

/// Everything the `handover` binary is configured with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
  pub host:        String,
  pub port:        u16,
  pub ledger_path: PathBuf,
  pub gateway:     GatewayConfig,
  pub workflow:    WorkflowConfig,
}

impl Default for HostConfig {
  fn default() -> Self {
    Self {
      host:        "127.0.0.1".to_owned(),
      port:        8080,
      ledger_path: PathBuf::from("~/.local/share/handover/ledger.sqlite"),
      gateway:     GatewayConfig::default(),
      workflow:    WorkflowConfig::default(),
    }
  }
}

impl HostConfig {
  /// Layer `path` (if it exists) and the environment over the defaults.
  ///
  /// Nested keys use a double underscore, e.g.
  /// `HANDOVER_WORKFLOW__READ_ONLY=true`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("HANDOVER")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let host: HostConfig = settings
      .try_deserialize()
      .context("failed to deserialise HostConfig")?;
    host.workflow.validate()?;
    Ok(host)
  }

  pub fn address(&self) -> anyhow::Result<SocketAddr> {
    format!("{}:{}", self.host, self.port)
      .parse()
      .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use handover_core::config::ExtensionRange;

  use super::*;

  fn write_config(contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("handover-config-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("handover.toml");
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn missing_file_yields_defaults() {
    let config = HostConfig::load(Path::new("/nonexistent/handover.toml")).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.gateway.timeout_secs, 30);
    assert_eq!(config.workflow, WorkflowConfig::default());
  }

  #[test]
  fn file_overrides_nested_sections() {
    let path = write_config(
      r#"
port = 9090
ledger_path = "/var/lib/handover/ledger.sqlite"

[gateway]
base_url = "https://gateway.internal"
token = "s3cret"

[workflow]
read_only = true
hardphone_prefix = "ATA"

[workflow.parked_extensions]
lower = 100
upper = 199
"#,
    );

    let config = HostConfig::load(&path).unwrap();
    assert_eq!(config.port, 9090);
    assert_eq!(config.gateway.base_url, "https://gateway.internal");
    assert_eq!(config.gateway.token.as_deref(), Some("s3cret"));
    assert!(config.workflow.read_only);
    assert_eq!(config.workflow.hardphone_prefix, "ATA");
    assert_eq!(config.workflow.parked_extensions, ExtensionRange::new(100, 199));
    assert_eq!(config.workflow.systems.voicemail, "CiscoUnity");

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
  }

  #[test]
  fn invalid_workflow_settings_are_refused() {
    let path = write_config(
      r#"
[workflow.parked_extensions]
lower = 200
upper = 100
"#,
    );

    assert!(HostConfig::load(&path).is_err());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/ledger.sqlite")), PathBuf::from(home).join("ledger.sqlite"));
    assert_eq!(expand_tilde(Path::new("/abs/ledger.sqlite")), PathBuf::from("/abs/ledger.sqlite"));
  }
}
