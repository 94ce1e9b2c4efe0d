//! Routes collaborator calls between the remote gateway and the local
//! parked-extension ledger.

use handover_core::{
  collab::{Action, Lookup, Params, Row},
  query::{ParkedMailboxes, Query as _},
};
use handover_store_sqlite::SqliteLedger;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError<E: std::error::Error + 'static> {
  #[error(transparent)]
  Remote(E),

  #[error("parked-extension ledger: {0}")]
  Ledger(#[from] handover_store_sqlite::Error),
}

/// Serves the audit system and the parked roster from `ledger`, everything
/// else from `remote`.
#[derive(Clone)]
pub struct Routed<R> {
  remote:       R,
  ledger:       SqliteLedger,
  audit_system: String,
}

impl<R> Routed<R> {
  pub fn new(remote: R, ledger: SqliteLedger, audit_system: impl Into<String>) -> Self {
    Self { remote, ledger, audit_system: audit_system.into() }
  }

  pub fn ledger(&self) -> &SqliteLedger { &self.ledger }
}

impl<R: Lookup> Lookup for Routed<R> {
  type Error = RouteError<R::Error>;

  async fn lookup<'a>(&'a self, query: &'a str, params: Params) -> Result<Vec<Row>, Self::Error> {
    if query == ParkedMailboxes::NAME {
      return Ok(self.ledger.lookup(query, params).await?);
    }
    self.remote.lookup(query, params).await.map_err(RouteError::Remote)
  }
}

impl<R: Action> Action for Routed<R> {
  type Error = RouteError<R::Error>;

  async fn run<'a>(&'a self, system: &'a str, action: &'a str, params: Params) -> Result<Row, Self::Error> {
    if system == self.audit_system {
      return Ok(self.ledger.run(system, action, params).await?);
    }
    self.remote.run(system, action, params).await.map_err(RouteError::Remote)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use handover_core::{
    Error,
    config::{ExtensionRange, WorkflowConfig},
    model::ParkedExtensionRecord,
  };
  use handover_store_sqlite::LedgerEntry;
  use handover_workflow::{
    Outcome, ReassignmentRequest, Reassigner,
    testing::{FakeBackend, building, device, identity, line, template, voicemail},
  };
  use serde_json::json;

  use super::*;

  async fn routed(remote: &FakeBackend) -> Routed<FakeBackend> {
    let ledger = SqliteLedger::open_in_memory().await.unwrap();
    Routed::new(remote.clone(), ledger, "internal")
  }

  fn parked(extension: &str) -> ParkedExtensionRecord {
    ParkedExtensionRecord {
      object_id:  "vm-old".into(),
      alias:      "former".into(),
      extension:  extension.into(),
      created_at: Utc::now(),
      deleted:    false,
    }
  }

  #[tokio::test]
  async fn parked_roster_comes_from_the_ledger() {
    let remote = FakeBackend::new();
    remote.seed(|s| s.parked = vec![parked("9500")]);
    let backend = routed(&remote).await;
    backend.ledger().record(&parked("9001")).await.unwrap();

    let rows = backend.lookup("GetParkedMailboxes", Params::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["UnityUserExtension"], "9001");
    assert!(remote.lookups().is_empty());
  }

  #[tokio::test]
  async fn other_lookups_go_to_the_remote() {
    let remote = FakeBackend::new();
    remote.seed(|s| s.lines = vec![line("line-1", "4155", "dev-1")]);
    let backend = routed(&remote).await;

    let mut params = Params::new();
    params.insert("UUID".into(), json!("line-1"));
    let rows = backend.lookup("GetCallManagerLine", params).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(remote.lookups(), ["GetCallManagerLine"]);
  }

  #[tokio::test]
  async fn remote_failures_keep_their_source() {
    let remote = FakeBackend::new();
    remote.reject("userUpdate", "extension in use");
    let backend = routed(&remote).await;

    let err = backend.run("CiscoUnity", "userUpdate", Params::new()).await.unwrap_err();
    assert!(matches!(err, RouteError::Remote(_)));
    assert!(err.to_string().contains("extension in use"));
  }

  #[tokio::test]
  async fn audit_actions_are_recorded_locally() {
    let remote = FakeBackend::new();
    let backend = routed(&remote).await;

    let err = backend.run("internal", "userUpdate", Params::new()).await.unwrap_err();
    assert!(matches!(err, RouteError::Ledger(_)));
    assert!(remote.calls().is_empty());
  }

  /// carol's voicemail holds 4155, the line being handed to bob.
  fn conflicting_world() -> FakeBackend {
    let remote = FakeBackend::new();
    remote.seed(|s| {
      s.directory = vec![identity("alice"), identity("bob"), identity("carol")];
      s.lines = vec![line("line-1", "4155", "dev-1")];
      s.phones = vec![device("dev-1", "SEP001122", Some("alice"))];
      s.buildings = vec![building(7)];
      s.templates = vec![template("t-1", 7)];
      s.voicemail = vec![voicemail("vm-carol", "carol", "4155")];
    });
    remote
  }

  fn request() -> ReassignmentRequest {
    serde_json::from_value(json!({
      "line_id":       "line-1",
      "device_id":     "dev-1",
      "building_id":   7,
      "external_mask": "555555XXXX",
      "current_owner": "alice",
      "new_owner":     "bob",
      "label":         "Reception",
      "display_name":  "Bob Example",
    }))
    .unwrap()
  }

  /// A run whose roster was read before another run parked 9000: the roster
  /// comes from an empty ledger, parkings go to one already holding 9000.
  async fn raced(remote: &FakeBackend, upper: u32) -> (Result<Outcome, Error>, SqliteLedger) {
    let reader = routed(remote).await;
    let writer = routed(remote).await;
    writer.ledger().record(&parked("9000")).await.unwrap();

    let config = WorkflowConfig {
      parked_extensions: ExtensionRange::new(9000, upper),
      ..WorkflowConfig::default()
    };
    let reassigner = Reassigner::new(reader, writer.clone(), config).unwrap().with_seed(3);
    (reassigner.run(&request()).await, writer.ledger().clone())
  }

  fn holdings(entries: Vec<LedgerEntry>) -> Vec<(String, String)> {
    entries
      .into_iter()
      .map(|e| (e.record.alias, e.record.extension))
      .collect()
  }

  #[tokio::test]
  async fn extension_parked_by_another_run_is_skipped() {
    let remote = conflicting_world();

    let (result, ledger) = raced(&remote, 9001).await;

    let outcome = result.unwrap();
    assert_eq!(outcome.parked().map(|r| r.extension.as_str()), Some("9001"));
    let carol = remote.voicemail_by_alias("carol").unwrap();
    assert_eq!(carol.extension.as_deref(), Some("9001"));
    assert_eq!(
      holdings(ledger.active().await.unwrap()),
      [("former".to_owned(), "9000".to_owned()), ("carol".to_owned(), "9001".to_owned())]
    );
  }

  #[tokio::test]
  async fn claimant_is_not_moved_onto_an_extension_parked_by_another_run() {
    let remote = conflicting_world();

    let (result, ledger) = raced(&remote, 9000).await;

    assert!(matches!(result, Err(Error::ExhaustedRetry { attempts: 1, .. })));
    let carol = remote.voicemail_by_alias("carol").unwrap();
    assert_eq!(carol.extension.as_deref(), Some("4155"));
    assert_eq!(
      holdings(ledger.active().await.unwrap()),
      [("former".to_owned(), "9000".to_owned())]
    );
  }

  #[tokio::test]
  async fn a_conflicting_run_parks_into_the_ledger() {
    let remote = conflicting_world();
    let backend = routed(&remote).await;
    let reassigner = Reassigner::new(backend.clone(), backend.clone(), WorkflowConfig::default())
      .unwrap()
      .with_seed(3);

    let outcome = reassigner.run(&request()).await.unwrap();

    let parked = outcome.parked().unwrap();
    let active = backend.ledger().active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].record.extension, parked.extension);
    assert_eq!(active[0].record.alias, "carol");
    assert!(remote.calls_to("MailboxParkingCreate").is_empty());
  }
}
