//! The gate every mutation passes through.
//!
//! In read-only mode the dispatcher logs the payload it would have sent and
//! returns `None` without calling the action collaborator, so the rest of
//! the workflow runs its lookups and decisions unchanged.

use std::sync::atomic::{AtomicUsize, Ordering};

use handover_core::{
  Error, Result,
  collab::{Action, decode, to_params},
  config::WorkflowConfig,
  request::ActionRequest,
};
use tracing::{debug, info};

/// Placeholder for ids a suppressed create would have returned.
pub const PENDING: &str = "(pending)";

pub struct Dispatcher<'a, A> {
  action:     &'a A,
  config:     &'a WorkflowConfig,
  issued:     AtomicUsize,
  suppressed: AtomicUsize,
}

impl<'a, A: Action> Dispatcher<'a, A> {
  pub fn new(action: &'a A, config: &'a WorkflowConfig) -> Self {
    Self {
      action,
      config,
      issued: AtomicUsize::new(0),
      suppressed: AtomicUsize::new(0),
    }
  }

  pub fn read_only(&self) -> bool { self.config.read_only }

  /// Send `request` to its system. `Ok(None)` means the call was suppressed.
  pub async fn submit<R: ActionRequest>(&self, request: &R) -> Result<Option<R::Output>> {
    let system = self.config.systems.name(R::SYSTEM);
    let params = to_params(request, R::NAME)?;

    if self.config.read_only {
      self.suppressed.fetch_add(1, Ordering::Relaxed);
      info!(system, action = R::NAME, ?params, "dry run: action suppressed");
      return Ok(None);
    }

    debug!(system, action = R::NAME, ?params, "submitting action");
    self.issued.fetch_add(1, Ordering::Relaxed);

    let result = self
      .action
      .run(system, R::NAME, params)
      .await
      .map_err(|e| Error::RemoteRejection {
        system: system.to_owned(),
        action: R::NAME,
        source: Box::new(e),
      })?;

    decode(result, R::NAME).map(Some)
  }

  /// Actions that reached the collaborator, including rejected ones.
  pub fn issued(&self) -> usize { self.issued.load(Ordering::Relaxed) }

  /// Actions withheld because the run is read-only.
  pub fn suppressed(&self) -> usize { self.suppressed.load(Ordering::Relaxed) }
}
