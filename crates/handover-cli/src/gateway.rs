//! [`HttpGateway`], the collaborator adapter for the directory, call-manager
//! and voicemail systems.
//!
//! The gateway speaks the collaborators' dialect over JSON:
//!
//! - `POST {base}/lookups/{query}` with the parameters as the body returns
//!   an array of rows;
//! - `POST {base}/systems/{system}/actions/{action}` returns the action's
//!   result object, or `null`.

use std::time::Duration;

use handover_core::collab::{Action, Lookup, Params, Row};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("HTTP client error: {0}")]
  Client(#[from] reqwest::Error),

  /// The gateway answered with a non-success status.
  #[error("{path} returned {status}: {body}")]
  Status {
    path:   String,
    status: StatusCode,
    body:   String,
  },

  #[error("{path} returned {found} where a list of rows was expected")]
  NotRows { path: String, found: &'static str },
}

/// Async HTTP client for the collaborator gateway.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpGateway {
  client:   Client,
  base_url: String,
  token:    Option<String>,
}

impl HttpGateway {
  pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      token: config.token.clone().filter(|t| !t.is_empty()),
    })
  }

  fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  async fn post(&self, path: String, params: Params) -> Result<Value, GatewayError> {
    debug!(%path, "gateway request");
    let resp = self
      .auth(self.client.post(self.url(&path)))
      .json(&params)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(GatewayError::Status { path, status, body });
    }

    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
      return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Status {
      path,
      status,
      body: format!("undecodable body: {e}"),
    })
  }
}

fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

impl Lookup for HttpGateway {
  type Error = GatewayError;

  async fn lookup<'a>(&'a self, query: &'a str, params: Params) -> Result<Vec<Row>, GatewayError> {
    let path = format!("/lookups/{query}");
    match self.post(path.clone(), params).await? {
      Value::Array(rows) => Ok(rows),
      Value::Null => Ok(Vec::new()),
      other => Err(GatewayError::NotRows { path, found: kind_of(&other) }),
    }
  }
}

impl Action for HttpGateway {
  type Error = GatewayError;

  async fn run<'a>(&'a self, system: &'a str, action: &'a str, params: Params) -> Result<Row, GatewayError> {
    self
      .post(format!("/systems/{system}/actions/{action}"), params)
      .await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode as AxumStatus, header},
    response::{IntoResponse, Response},
    routing::post,
  };
  use serde_json::json;
  use tokio::net::TcpListener;

  use super::*;

  /// Requests the stub saw: path, authorization header, body.
  type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

  async fn stub_lookup(
    State(seen): State<Seen>,
    Path(query): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
  ) -> Response {
    let auth = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned);
    seen.lock().unwrap().push((format!("/lookups/{query}"), auth, body.clone()));

    match query.as_str() {
      "GetCallManagerLine" => Json(json!([{ "uuid": body["UUID"], "pattern": "4155" }])).into_response(),
      "GetNothing" => Json(json!([])).into_response(),
      "GetScalar" => Json(json!(42)).into_response(),
      _ => (AxumStatus::NOT_FOUND, "unknown query").into_response(),
    }
  }

  async fn stub_action(
    State(seen): State<Seen>,
    Path((system, action)): Path<(String, String)>,
    Json(body): Json<Value>,
  ) -> Response {
    seen.lock().unwrap().push((format!("/systems/{system}/actions/{action}"), None, body));

    match action.as_str() {
      "userCreate" => Json(json!({ "ObjectId": "vm-1" })).into_response(),
      "userUpdate" => AxumStatus::NO_CONTENT.into_response(),
      _ => (AxumStatus::UNPROCESSABLE_ENTITY, "extension already in use").into_response(),
    }
  }

  async fn serve_stub() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
      .route("/lookups/{query}", post(stub_lookup))
      .route("/systems/{system}/actions/{action}", post(stub_action))
      .with_state(seen.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}/"), seen)
  }

  fn gateway(base_url: &str, token: Option<&str>) -> HttpGateway {
    HttpGateway::new(&GatewayConfig {
      base_url:     base_url.to_owned(),
      token:        token.map(str::to_owned),
      timeout_secs: 5,
    })
    .unwrap()
  }

  fn params(value: Value) -> Params {
    match value {
      Value::Object(map) => map,
      _ => Params::new(),
    }
  }

  #[tokio::test]
  async fn lookup_posts_params_and_returns_rows() {
    let (base, seen) = serve_stub().await;
    let gw = gateway(&base, Some("s3cret"));

    let rows = gw
      .lookup("GetCallManagerLine", params(json!({ "UUID": "line-1" })))
      .await
      .unwrap();
    assert_eq!(rows, [json!({ "uuid": "line-1", "pattern": "4155" })]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "/lookups/GetCallManagerLine");
    assert_eq!(seen[0].1.as_deref(), Some("Bearer s3cret"));
    assert_eq!(seen[0].2, json!({ "UUID": "line-1" }));
  }

  #[tokio::test]
  async fn empty_result_is_zero_rows() {
    let (base, _) = serve_stub().await;
    let rows = gateway(&base, None).lookup("GetNothing", Params::new()).await.unwrap();
    assert!(rows.is_empty());
  }

  #[tokio::test]
  async fn non_array_lookup_result_is_refused() {
    let (base, _) = serve_stub().await;
    let err = gateway(&base, None).lookup("GetScalar", Params::new()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotRows { found: "a number", .. }));
  }

  #[tokio::test]
  async fn error_status_carries_status_and_body() {
    let (base, _) = serve_stub().await;
    let err = gateway(&base, None)
      .run("CiscoUnity", "callhandlertransferoptionsUpdate", Params::new())
      .await
      .unwrap_err();

    match err {
      GatewayError::Status { status, body, .. } => {
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, "extension already in use");
      }
      other => panic!("expected a status error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn action_results_and_empty_bodies() {
    let (base, seen) = serve_stub().await;
    let gw = gateway(&base, None);

    let created = gw
      .run("CiscoUnity", "userCreate", params(json!({ "Alias": "bob" })))
      .await
      .unwrap();
    assert_eq!(created["ObjectId"], "vm-1");

    let updated = gw.run("CiscoUnity", "userUpdate", Params::new()).await.unwrap();
    assert_eq!(updated, Value::Null);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "/systems/CiscoUnity/actions/userCreate");
    assert_eq!(seen[0].2, json!({ "Alias": "bob" }));
    assert!(seen[0].1.is_none());
  }
}
