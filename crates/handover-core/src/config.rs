//! Workflow configuration.
//!
//! Configuration is an explicit value handed to the workflow at
//! construction; there is no process-wide state, so runs with different
//! settings can coexist in one process.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The backend systems an action can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum System {
  Directory,
  CallManager,
  Voicemail,
  /// Internal pseudo-system holding the parked-extension audit trail.
  Audit,
}

/// The identifiers the action collaborator knows each system by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemNames {
  pub directory:    String,
  pub call_manager: String,
  pub voicemail:    String,
  pub audit:        String,
}

impl Default for SystemNames {
  fn default() -> Self {
    Self {
      directory:    "AD".to_owned(),
      call_manager: "CiscoUCM".to_owned(),
      voicemail:    "CiscoUnity".to_owned(),
      audit:        "internal".to_owned(),
    }
  }
}

impl SystemNames {
  pub fn name(&self, system: System) -> &str {
    match system {
      System::Directory => &self.directory,
      System::CallManager => &self.call_manager,
      System::Voicemail => &self.voicemail,
      System::Audit => &self.audit,
    }
  }
}

/// An inclusive numeric range of extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRange {
  pub lower: u32,
  pub upper: u32,
}

impl ExtensionRange {
  pub const fn new(lower: u32, upper: u32) -> Self { Self { lower, upper } }

  /// Number of extensions in the range; zero if the bounds are inverted.
  pub fn len(&self) -> u64 {
    if self.lower > self.upper {
      0
    } else {
      u64::from(self.upper - self.lower) + 1
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Whether `extension` is the decimal spelling of a value in the range.
  pub fn contains(&self, extension: &str) -> bool {
    extension
      .parse::<u32>()
      .is_ok_and(|n| (self.lower..=self.upper).contains(&n) && n.to_string() == extension)
  }
}

impl fmt::Display for ExtensionRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..={}", self.lower, self.upper)
  }
}

/// Everything a reassignment run needs to know about its deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
  /// Perform every lookup and decision but suppress every mutating call.
  pub read_only:                    bool,
  pub systems:                      SystemNames,
  /// Pool parked extensions are drawn from.
  pub parked_extensions:            ExtensionRange,
  /// Attempts allowed to commit a parked extension before giving up.
  pub parking_attempts:             u32,
  /// Devices whose name starts with this prefix are never deleted.
  pub hardphone_prefix:             String,
  /// Link newly created voicemail accounts to the directory.
  pub ldap_linked:                  bool,
  pub add_smtp_proxy:               bool,
  pub attach_unified_messaging:     bool,
  pub unified_messaging_service_id: String,
}

impl Default for WorkflowConfig {
  fn default() -> Self {
    Self {
      read_only:                    false,
      systems:                      SystemNames::default(),
      parked_extensions:            ExtensionRange::new(9000, 9999),
      parking_attempts:             10,
      hardphone_prefix:             "SEP".to_owned(),
      ldap_linked:                  true,
      add_smtp_proxy:               true,
      attach_unified_messaging:     false,
      unified_messaging_service_id: String::new(),
    }
  }
}

impl WorkflowConfig {
  /// Reject settings no run could succeed with.
  pub fn validate(&self) -> Result<()> {
    if self.parked_extensions.is_empty() {
      return Err(Error::Config(format!(
        "parked extension range {} is empty",
        self.parked_extensions
      )));
    }
    if self.parking_attempts == 0 {
      return Err(Error::Config("parking_attempts must be at least 1".to_owned()));
    }
    if self.attach_unified_messaging && self.unified_messaging_service_id.trim().is_empty() {
      return Err(Error::Config(
        "attach_unified_messaging requires unified_messaging_service_id".to_owned(),
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() { WorkflowConfig::default().validate().unwrap(); }

  #[test]
  fn inverted_range_is_rejected() {
    let config = WorkflowConfig {
      parked_extensions: ExtensionRange::new(9999, 9000),
      ..WorkflowConfig::default()
    };
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn unified_messaging_needs_a_service() {
    let config = WorkflowConfig {
      attach_unified_messaging: true,
      ..WorkflowConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn partial_config_fills_defaults() {
    let config: WorkflowConfig = serde_json::from_value(serde_json::json!({
      "read_only": true,
      "parked_extensions": { "lower": 100, "upper": 199 },
    }))
    .unwrap();
    assert!(config.read_only);
    assert_eq!(config.parked_extensions.len(), 100);
    assert_eq!(config.systems.voicemail, "CiscoUnity");
    assert_eq!(config.parking_attempts, 10);
  }

  #[test]
  fn range_membership_requires_canonical_spelling() {
    let range = ExtensionRange::new(9000, 9999);
    assert!(range.contains("9000"));
    assert!(range.contains("9999"));
    assert!(!range.contains("8999"));
    assert!(!range.contains("09000"));
    assert!(!range.contains("abc"));
  }
}
