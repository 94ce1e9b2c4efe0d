//! Core types and trait definitions for line handover.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the records read from the three backend systems, the typed
//! queries and action payloads exchanged with them, and the two collaborator
//! traits every backend adapter implements.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod collab;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod request;
pub mod wire;

pub use error::{Error, ErrorKind, Result};
