//! Records read from the directory, call-manager and voicemail systems.
//!
//! Every record is a transient, request-scoped snapshot: it is fetched once
//! at the start of a run and threaded through the remaining phases. Field
//! names on the wire are the backends' own; serde renames map them onto
//! Rust names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::{
  audit_timestamp, digit_bool, flexible_bool, flexible_i64, flexible_opt_i64,
  flexible_string,
};

/// Case-insensitive account comparison.
///
/// Both sides are plain strings, so the comparison is total: an empty alias
/// simply never matches a non-empty account name.
pub fn same_account(a: &str, b: &str) -> bool {
  a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Treat whitespace-only values the same as absent ones.
fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// A person's directory account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryIdentity {
  #[serde(rename = "objectGUID")]
  pub object_guid:      String,
  #[serde(rename = "sAMAccountName")]
  pub account_name:     String,
  #[serde(rename = "givenName", default)]
  pub given_name:       Option<String>,
  #[serde(rename = "sn", default)]
  pub surname:          Option<String>,
  #[serde(rename = "displayName", default)]
  pub display_name:     Option<String>,
  #[serde(default)]
  pub mail:             Option<String>,
  #[serde(default)]
  pub department:       Option<String>,
  #[serde(rename = "ipPhone", default)]
  pub ip_phone:         Option<String>,
  #[serde(rename = "telephoneNumber", default)]
  pub telephone_number: Option<String>,
}

impl DirectoryIdentity {
  /// The mail address, if one is set.
  pub fn mail(&self) -> Option<&str> { non_empty(&self.mail) }
}

// ─── Call manager ────────────────────────────────────────────────────────────

/// A directory number as it appears on one device.
///
/// `uuid` identifies the device-line association; `dirn_uuid` the directory
/// number itself. The dialable `pattern` never changes during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
  pub uuid:           String,
  pub dirn_uuid:      String,
  #[serde(deserialize_with = "flexible_string")]
  pub index:          String,
  #[serde(rename = "dirn_pattern")]
  pub pattern:        String,
  #[serde(rename = "dirn_routePartitionName", default)]
  pub partition:      Option<String>,
  #[serde(rename = "dirn_routePartitionName_text", default)]
  pub partition_text: Option<String>,
  pub device_pkid:    String,
}

/// A physical or soft endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
  #[serde(alias = "uuid")]
  pub pkid:  String,
  pub name:  String,
  #[serde(rename = "ownerUserName", default)]
  pub owner: Option<String>,
}

impl Device {
  /// Hardphones are recognised by their name prefix (`SEP…` by default) and
  /// are never deleted.
  pub fn is_hardphone(&self, prefix: &str) -> bool {
    !prefix.is_empty()
      && self
        .name
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
  }

  /// Whether `id` refers to this device. The call manager spells the same
  /// id with or without braces and in either case depending on the table.
  pub fn has_id(&self, id: &str) -> bool { normalise_id(&self.pkid) == normalise_id(id) }
}

fn normalise_id(id: &str) -> String {
  id.trim()
    .trim_start_matches('{')
    .trim_end_matches('}')
    .to_ascii_lowercase()
}

/// An end-user account in the call manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallManagerUser {
  pub pkid:   String,
  #[serde(default)]
  pub userid: Option<String>,
}

/// A soft-phone template row attached to a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneTemplate {
  #[serde(rename = "ID", deserialize_with = "flexible_string")]
  pub id:                      String,
  #[serde(rename = "BuildingID", deserialize_with = "flexible_i64")]
  pub building_id:             i64,
  #[serde(rename = "UniversalDeviceTemplateUuid", default)]
  pub universal_template_uuid: Option<String>,
  #[serde(rename = "ProductEnum", default)]
  pub product_enum:            Option<String>,
}

// ─── Voicemail ───────────────────────────────────────────────────────────────

/// A voicemail / unified-messaging identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicemailAccount {
  #[serde(rename = "ObjectId")]
  pub object_id:    String,
  #[serde(rename = "Alias", default)]
  pub alias:        String,
  #[serde(rename = "DtmfAccessId", default)]
  pub extension:    Option<String>,
  #[serde(rename = "CallHandlerObjectId", default)]
  pub call_handler: Option<String>,
}

impl VoicemailAccount {
  pub fn call_handler(&self) -> Option<&str> { non_empty(&self.call_handler) }
}

/// The three transfer-option records on a call handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOption {
  Standard,
  #[serde(rename = "Off Hours")]
  OffHours,
  Alternate,
}

impl TransferOption {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Standard => "Standard",
      Self::OffHours => "Off Hours",
      Self::Alternate => "Alternate",
    }
  }
}

/// Action/enabled pair a building prescribes for one transfer option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferRule {
  pub action:  i64,
  pub enabled: bool,
}

// ─── Building ────────────────────────────────────────────────────────────────

/// Site-level configuration. Read-only input.
///
/// Every field other than the id is optional; absent transfer actions
/// default to `0` and absent flags to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingPolicy {
  #[serde(rename = "BuildingID", deserialize_with = "flexible_i64")]
  pub building_id:                i64,
  #[serde(rename = "UnityUserTemplateName", default)]
  pub voicemail_template:         Option<String>,
  #[serde(rename = "UnityUserCallScheduleObjectId", default)]
  pub call_schedule:              Option<String>,
  #[serde(
    rename = "UnityUserTransferRulesEnabled",
    deserialize_with = "flexible_bool",
    default
  )]
  pub transfer_rules_enabled:     bool,
  #[serde(
    rename = "UnityUserStandardTransferAction",
    deserialize_with = "flexible_opt_i64",
    default
  )]
  pub standard_transfer_action:   Option<i64>,
  #[serde(
    rename = "UnityUserStandardTransferEnabled",
    deserialize_with = "flexible_bool",
    default
  )]
  pub standard_transfer_enabled:  bool,
  #[serde(
    rename = "UnityUserClosedTransferAction",
    deserialize_with = "flexible_opt_i64",
    default
  )]
  pub closed_transfer_action:     Option<i64>,
  #[serde(
    rename = "UnityUserClosedTransferEnabled",
    deserialize_with = "flexible_bool",
    default
  )]
  pub closed_transfer_enabled:    bool,
  #[serde(
    rename = "UnityUserAlternateTransferAction",
    deserialize_with = "flexible_opt_i64",
    default
  )]
  pub alternate_transfer_action:  Option<i64>,
  #[serde(
    rename = "UnityUserAlternateTransferEnabled",
    deserialize_with = "flexible_bool",
    default
  )]
  pub alternate_transfer_enabled: bool,
}

impl BuildingPolicy {
  pub fn voicemail_template(&self) -> Option<&str> { non_empty(&self.voicemail_template) }

  pub fn call_schedule(&self) -> Option<&str> { non_empty(&self.call_schedule) }

  /// Rules in the order they are written: Standard, Off Hours, Alternate.
  pub fn transfer_rules(&self) -> [(TransferOption, TransferRule); 3] {
    [
      (TransferOption::Standard, TransferRule {
        action:  self.standard_transfer_action.unwrap_or_default(),
        enabled: self.standard_transfer_enabled,
      }),
      (TransferOption::OffHours, TransferRule {
        action:  self.closed_transfer_action.unwrap_or_default(),
        enabled: self.closed_transfer_enabled,
      }),
      (TransferOption::Alternate, TransferRule {
        action:  self.alternate_transfer_action.unwrap_or_default(),
        enabled: self.alternate_transfer_enabled,
      }),
    ]
  }
}

// ─── Audit ───────────────────────────────────────────────────────────────────

/// An extension vacated by conflict resolution. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkedExtensionRecord {
  #[serde(rename = "UnityUserObjectId", default)]
  pub object_id:  String,
  #[serde(rename = "UnityUserAlias", default)]
  pub alias:      String,
  #[serde(rename = "UnityUserExtension", deserialize_with = "flexible_string")]
  pub extension:  String,
  #[serde(rename = "DateCreated", with = "audit_timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(
    rename = "Deleted",
    serialize_with = "digit_bool",
    deserialize_with = "flexible_bool",
    default
  )]
  pub deleted:    bool,
}

/// The part of a parked roster row that seeds the exclusion pool.
///
/// Rows are read leniently: everything but the extension may be missing or
/// malformed without failing the roster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParkedRosterEntry {
  #[serde(rename = "UnityUserExtension", deserialize_with = "flexible_string")]
  pub extension: String,
  #[serde(rename = "Deleted", deserialize_with = "flexible_bool", default)]
  pub deleted:   bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn account_comparison_ignores_case_and_padding() {
    assert!(same_account("Bob", "bob"));
    assert!(same_account(" carol ", "CAROL"));
    assert!(!same_account("", "bob"));
    assert!(!same_account("bob", "bobby"));
  }

  #[test]
  fn hardphone_prefix_is_case_insensitive() {
    let device = |name: &str| Device { pkid: "p".into(), name: name.into(), owner: None };
    assert!(device("SEP001122").is_hardphone("SEP"));
    assert!(device("sep001122").is_hardphone("SEP"));
    assert!(!device("CSF-ALICE").is_hardphone("SEP"));
    assert!(!device("SE").is_hardphone("SEP"));
    assert!(!device("SEP001122").is_hardphone(""));
  }

  #[test]
  fn device_ids_match_across_spellings() {
    let device = Device { pkid: "{ABCD-1234}".into(), name: "CSF".into(), owner: None };
    assert!(device.has_id("abcd-1234"));
    assert!(!device.has_id("abcd-9999"));
  }

  #[test]
  fn roster_rows_need_only_the_extension() {
    let rows = serde_json::json!([
      { "UnityUserExtension": "9001", "DateCreated": "not a date", "Deleted": "0" },
      { "UnityUserExtension": 9002 },
      { "UnityUserExtension": "9003", "Deleted": "1" },
    ]);
    let entries: Vec<ParkedRosterEntry> = serde_json::from_value(rows).unwrap();

    assert_eq!(entries[0], ParkedRosterEntry { extension: "9001".into(), deleted: false });
    assert_eq!(entries[1], ParkedRosterEntry { extension: "9002".into(), deleted: false });
    assert!(entries[2].deleted);
  }

  #[test]
  fn building_rows_decode_loose_values() {
    let building: BuildingPolicy = serde_json::from_value(serde_json::json!({
      "BuildingID": "12",
      "UnityUserCallScheduleObjectId": "sched-1",
      "UnityUserTransferRulesEnabled": 1,
      "UnityUserStandardTransferAction": "1",
      "UnityUserStandardTransferEnabled": "True",
      "UnityUserClosedTransferAction": 2,
    }))
    .unwrap();

    assert_eq!(building.building_id, 12);
    assert!(building.transfer_rules_enabled);
    let rules = building.transfer_rules();
    assert_eq!(rules[0].1, TransferRule { action: 1, enabled: true });
    assert_eq!(rules[1].1, TransferRule { action: 2, enabled: false });
    assert_eq!(rules[2].1, TransferRule { action: 0, enabled: false });
    assert_eq!(building.voicemail_template(), None);
  }
}
