//! Handlers for `/reassignments`.

use std::sync::Arc;

use axum::{Json, extract::State};
use handover_core::collab::{Action, Lookup};
use handover_workflow::{Outcome, ReassignmentRequest, Reassigner};
use tracing::info;

use crate::ApiError;

/// `POST /reassignments`
///
/// Runs one reassignment to completion and returns its outcome. The request
/// is held open for the whole run.
pub async fn create<L, A>(
  State(reassigner): State<Arc<Reassigner<L, A>>>,
  Json(request): Json<ReassignmentRequest>,
) -> Result<Json<Outcome>, ApiError>
where
  L: Lookup + 'static,
  A: Action + 'static,
{
  if request.line_id.trim().is_empty() {
    return Err(ApiError::BadRequest("line_id must not be empty".to_owned()));
  }

  info!(line = %request.line_id, new_owner = %request.new_owner, "reassignment requested");
  let outcome = reassigner.run(&request).await?;
  Ok(Json(outcome))
}
