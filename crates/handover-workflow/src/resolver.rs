//! Extension conflict resolution.
//!
//! Before the incoming owner can take the line's extension in the voicemail
//! system, whoever holds it now has to move. A claimant other than the
//! incoming owner gets a freshly generated parked extension: the extension
//! is first reserved in the audit trail, then the claimant is moved onto it,
//! and the claimant's directory phone attributes follow. A claimant that
//! already is the incoming owner is left alone, which makes resolution
//! idempotent.
//!
//! Reserving before moving means a claimant is never left on an extension
//! the audit trail refused. A move that is rejected after a successful
//! reservation releases the reservation before the next candidate is tried.

use chrono::Utc;
use handover_core::{
  Result,
  collab::{Action, Lookup},
  config::WorkflowConfig,
  model::{DirectoryIdentity, ParkedExtensionRecord, VoicemailAccount, same_account},
  query::{DirectoryUserByAccount, VoicemailByExtension},
  request::{
    RecordParkedMailbox, ReleaseParkedMailbox, UpdateDirectoryPhone, UpdateVoicemailExtension,
  },
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  dispatch::Dispatcher,
  extension::{ExtensionGenerator, ParkedPool, retry_bounded},
  fetch::at_most_one,
};

/// What resolution found and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
  /// Nobody holds the extension.
  Vacant,
  /// The incoming owner already holds it; reassignment can be skipped.
  AlreadyAssigned { account: VoicemailAccount },
  /// Another identity held it and was moved to a parked extension.
  Parked { record: ParkedExtensionRecord },
}

impl Resolution {
  pub fn skips_reassignment(&self) -> bool { matches!(self, Self::AlreadyAssigned { .. }) }
}

pub struct ConflictResolver<'a, L, A> {
  lookup:     &'a L,
  dispatcher: &'a Dispatcher<'a, A>,
  config:     &'a WorkflowConfig,
}

impl<'a, L: Lookup, A: Action> ConflictResolver<'a, L, A> {
  pub fn new(lookup: &'a L, dispatcher: &'a Dispatcher<'a, A>, config: &'a WorkflowConfig) -> Self {
    Self { lookup, dispatcher, config }
  }

  /// Make sure nobody but `incoming` holds `extension`.
  ///
  /// `known` is a directory identity the caller already holds (the previous
  /// owner); it is reused when it turns out to be the claimant. Candidates
  /// are drawn from `generator` and excluded via `pool`, which keeps every
  /// candidate tried so a later resolution in the same run never reuses one.
  pub async fn resolve(
    &self,
    extension: &str,
    incoming: &str,
    known: Option<&DirectoryIdentity>,
    generator: &mut ExtensionGenerator,
    pool: &mut ParkedPool,
  ) -> Result<Resolution> {
    info!(extension, "checking whether the target extension is taken in voicemail");

    let Some(claimant) = at_most_one(self.lookup, &VoicemailByExtension::new(extension)).await?
    else {
      info!(extension, "extension is free");
      return Ok(Resolution::Vacant);
    };

    if same_account(&claimant.alias, incoming) {
      info!(
        extension,
        alias = %claimant.alias,
        "extension already assigned to the incoming owner, skipping reassignment"
      );
      return Ok(Resolution::AlreadyAssigned { account: claimant });
    }

    info!(
      extension,
      claimant = %claimant.alias,
      object_id = %claimant.object_id,
      "extension held by another identity, parking it"
    );

    let record = self.park(&claimant, generator, pool).await?;
    self.mirror_to_directory(&claimant, &record.extension, known).await?;

    Ok(Resolution::Parked { record })
  }

  /// Reserve a parked extension for the claimant and move the claimant onto
  /// it, retrying with a fresh candidate when either step is refused.
  async fn park(
    &self,
    claimant: &VoicemailAccount,
    generator: &mut ExtensionGenerator,
    pool: &mut ParkedPool,
  ) -> Result<ParkedExtensionRecord> {
    let dispatcher = self.dispatcher;
    let range = generator.range();

    info!(%range, excluded = pool.len(), "generating parked mailbox extension");

    retry_bounded(self.config.parking_attempts, |attempt| {
      let Some(candidate) = generator.generate(pool) else {
        warn!(%range, attempt, "no free extension left in the parked range");
        return Ok(None);
      };
      pool.insert(candidate.clone());

      let record = ParkedExtensionRecord {
        object_id:  claimant.object_id.clone(),
        alias:      claimant.alias.clone(),
        extension:  candidate,
        created_at: Utc::now(),
        deleted:    false,
      };

      Ok(Some(commit(dispatcher, record, attempt)))
    })
    .await
  }

  async fn mirror_to_directory(
    &self,
    claimant: &VoicemailAccount,
    parked: &str,
    known: Option<&DirectoryIdentity>,
  ) -> Result<()> {
    if claimant.alias.trim().is_empty() {
      info!("claimant has no alias, directory left unchanged");
      return Ok(());
    }

    let identity = match known.filter(|id| same_account(&id.account_name, &claimant.alias)) {
      Some(identity) => Some(identity.clone()),
      None => {
        at_most_one(self.lookup, &DirectoryUserByAccount::new(claimant.alias.clone())).await?
      }
    };

    match identity {
      Some(identity) => {
        info!(
          object_guid = %identity.object_guid,
          extension = parked,
          "updating claimant ipPhone and telephoneNumber"
        );
        self
          .dispatcher
          .submit(&UpdateDirectoryPhone::new(&identity, parked))
          .await?;
      }
      None => info!(alias = %claimant.alias, "claimant has no directory account, directory left unchanged"),
    }

    Ok(())
  }
}

/// Reserve `record` in the audit trail, then move its claimant onto the
/// reserved extension.
async fn commit<A: Action>(
  dispatcher: &Dispatcher<'_, A>,
  record: ParkedExtensionRecord,
  attempt: u32,
) -> Result<ParkedExtensionRecord> {
  info!(attempt, extension = %record.extension, "reserving parked extension");
  dispatcher.submit(&RecordParkedMailbox(record.clone())).await?;

  info!(
    attempt,
    object_id = %record.object_id,
    extension = %record.extension,
    "moving voicemail user to parked extension"
  );
  let request = UpdateVoicemailExtension {
    object_id: record.object_id.clone(),
    extension: record.extension.clone(),
  };
  if let Err(e) = dispatcher.submit(&request).await {
    release(dispatcher, &record.extension).await;
    return Err(e);
  }

  Ok(record)
}

/// Give back a reservation whose move was rejected. A failure leaves the
/// extension blocked for later runs but never double-booked, so it is
/// logged rather than raised.
async fn release<A: Action>(dispatcher: &Dispatcher<'_, A>, extension: &str) {
  info!(extension, "releasing parked extension reservation");
  let request = ReleaseParkedMailbox { extension: extension.to_owned() };
  if let Err(e) = dispatcher.submit(&request).await {
    warn!(extension, error = %e, "could not release parked extension reservation");
  }
}
