//! JSON REST API for line handover.
//!
//! Exposes an axum [`Router`] backed by any [`Reassigner`]. Auth, TLS, and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", handover_api::api_router(reassigner.clone()))
//! ```

pub mod error;
pub mod reassignments;

use std::sync::Arc;

use axum::{Router, routing::post};
use handover_core::collab::{Action, Lookup};
use handover_workflow::Reassigner;

pub use error::ApiError;

/// Build a fully-materialised API router for `reassigner`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<L, A>(reassigner: Arc<Reassigner<L, A>>) -> Router<()>
where
  L: Lookup + 'static,
  A: Action + 'static,
{
  Router::new()
    .route("/reassignments", post(reassignments::create::<L, A>))
    .with_state(reassigner)
}
