//! What a reassignment run did.

use chrono::{DateTime, Utc};
use handover_core::model::ParkedExtensionRecord;
use serde::Serialize;
use uuid::Uuid;

use crate::resolver::Resolution;

/// How the new owner's call-manager account was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum AccountStep {
  Reused { pkid: String },
  Created { pkid: String },
}

impl AccountStep {
  pub fn pkid(&self) -> &str {
    match self {
      Self::Reused { pkid } | Self::Created { pkid } => pkid,
    }
  }
}

/// What happened to the new owner's voicemail account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum VoicemailStep {
  Created { object_id: String },
  ExtensionUpdated { object_id: String },
  /// Conflict resolution found the account already on the extension.
  AlreadyAssigned { object_id: String },
}

/// Summary of one run, returned by [`Reassigner::run`](crate::Reassigner::run).
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
  pub run_id:                Uuid,
  pub dry_run:               bool,
  pub started_at:            DateTime<Utc>,
  pub line_pattern:          String,
  /// Names of devices deleted (or, in a dry run, that would have been).
  pub deleted_devices:       Vec<String>,
  pub skipped_hardphones:    Vec<String>,
  pub call_manager_user:     Option<AccountStep>,
  /// `None` when there was no current owner and resolution did not run.
  pub resolution:            Option<Resolution>,
  pub voicemail:             Option<VoicemailStep>,
  pub call_schedule_synced:  bool,
  pub transfer_rules_synced: bool,
  pub actions_issued:        usize,
  pub actions_suppressed:    usize,
  /// Best-effort steps that failed without aborting the run.
  pub warnings:              Vec<String>,
}

impl Outcome {
  pub(crate) fn new(run_id: Uuid, dry_run: bool) -> Self {
    Self {
      run_id,
      dry_run,
      started_at: Utc::now(),
      line_pattern: String::new(),
      deleted_devices: Vec::new(),
      skipped_hardphones: Vec::new(),
      call_manager_user: None,
      resolution: None,
      voicemail: None,
      call_schedule_synced: false,
      transfer_rules_synced: false,
      actions_issued: 0,
      actions_suppressed: 0,
      warnings: Vec::new(),
    }
  }

  /// The parked-extension record this run appended, if any.
  pub fn parked(&self) -> Option<&ParkedExtensionRecord> {
    match &self.resolution {
      Some(Resolution::Parked { record }) => Some(record),
      _ => None,
    }
  }
}
