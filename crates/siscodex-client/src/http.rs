//! HTTP implementation of the repository traits.
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `GET`    | `/groups` | [`GroupRepository::fetch_all`] |
//! | `POST`   | `/groups/{parent}/term-groups` | [`GroupRepository::create_term_group`] |
//! | `POST`   | `/groups/{id}/archived` | [`GroupRepository::set_archived`] |
//! | `POST`   | `/groups/{id}/attributes` | [`GroupRepository::add_attribute`] |
//! | `DELETE` | `/groups/{id}/attributes` | [`GroupRepository::remove_attribute`] |
//! | `POST`   | `/groups/{id}/bind/{eventId}` | [`GroupRepository::bind_group`] |
//! | `DELETE` | `/groups/{id}/bind/{eventId}` | [`GroupRepository::unbind_group`] |
//! | `POST`   | `/groups/{id}/join` | [`GroupRepository::join_group`] |
//! | `GET`    | `/terms` | [`TermRepository::fetch_all_terms`] |

use anyhow::Context as _;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use siscodex_core::{
  group::{AttributeKey, Group, GroupId},
  store::{GroupRepository, NewTermGroup, TermRepository},
  term::Term,
};

use crate::settings::ClientConfig;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  /// Non-success status; `message` is the backend's `error` field when the
  /// body carries one, the raw body otherwise.
  #[error("{method} {path} → {status}: {message}")]
  Status {
    method:  Method,
    path:    String,
    status:  StatusCode,
    message: String,
  },

  #[error("base URL {0} cannot carry a path")]
  InvalidBaseUrl(Url),
}

/// Talks to the CodEx JSON API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpRepository {
  client:   Client,
  base_url: Url,
  token:    Option<String>,
}

impl HttpRepository {
  pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .with_context(|| format!("invalid base URL {:?}", config.base_url))?;
    if base_url.cannot_be_a_base() {
      return Err(HttpError::InvalidBaseUrl(base_url).into());
    }
    let client = Client::builder()
      .timeout(config.timeout())
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url, token: config.token.clone() })
  }

  /// `base_url` extended by `segments`, each percent-encoded.
  pub fn url(&self, segments: &[&str]) -> Result<Url, HttpError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|()| HttpError::InvalidBaseUrl(self.base_url.clone()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, HttpError> {
    let req = self.client.request(method, self.url(segments)?);
    Ok(match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    })
  }

  async fn send(&self, req: RequestBuilder) -> Result<Response, HttpError> {
    let req = req.build()?;
    let method = req.method().clone();
    let path = req.url().path().to_owned();
    let resp = self.client.execute(req).await?;

    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(%method, %path, %status, %body, "request rejected");
    Err(HttpError::Status { method, path, status, message: error_message(&body) })
  }

  async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, HttpError> {
    let resp = self.send(self.request(Method::GET, segments)?).await?;
    Ok(resp.json().await?)
  }

  async fn send_json<B: Serialize + ?Sized>(
    &self,
    method: Method,
    segments: &[&str],
    body: &B,
  ) -> Result<Response, HttpError> {
    self.send(self.request(method, segments)?.json(body)).await
  }
}

/// The `error` field of a JSON error body, or the trimmed body itself.
fn error_message(body: &str) -> String {
  serde_json::from_str::<serde_json::Value>(body)
    .ok()
    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
    .unwrap_or_else(|| body.trim().to_owned())
}

impl GroupRepository for HttpRepository {
  type Error = HttpError;

  async fn fetch_all(&self) -> Result<Vec<Group>, HttpError> {
    let groups: Vec<Group> = self.get_json(&["groups"]).await?;
    tracing::debug!(count = groups.len(), "fetched groups");
    Ok(groups)
  }

  async fn create_term_group(&self, request: NewTermGroup) -> Result<Group, HttpError> {
    let req = self
      .request(Method::POST, &["groups", request.parent_id.as_str(), "term-groups"])?
      .header(IDEMPOTENCY_HEADER, request.idempotency_key.to_string())
      .json(&request);
    let resp = self.send(req).await?;
    Ok(resp.json().await?)
  }

  async fn set_archived(&self, id: GroupId, archived: bool) -> Result<(), HttpError> {
    self
      .send_json(Method::POST, &["groups", id.as_str(), "archived"], &json!({ "archived": archived }))
      .await?;
    Ok(())
  }

  async fn add_attribute(
    &self,
    id: GroupId,
    key: AttributeKey,
    value: String,
  ) -> Result<(), HttpError> {
    self
      .send_json(
        Method::POST,
        &["groups", id.as_str(), "attributes"],
        &json!({ "key": key.as_str(), "value": value }),
      )
      .await?;
    Ok(())
  }

  async fn remove_attribute(
    &self,
    id: GroupId,
    key: AttributeKey,
    value: String,
  ) -> Result<(), HttpError> {
    self
      .send_json(
        Method::DELETE,
        &["groups", id.as_str(), "attributes"],
        &json!({ "key": key.as_str(), "value": value }),
      )
      .await?;
    Ok(())
  }

  async fn bind_group(&self, id: GroupId, sis_id: String) -> Result<(), HttpError> {
    let req = self.request(Method::POST, &["groups", id.as_str(), "bind", &sis_id])?;
    self.send(req).await?;
    Ok(())
  }

  async fn unbind_group(&self, id: GroupId, sis_id: String) -> Result<(), HttpError> {
    let req = self.request(Method::DELETE, &["groups", id.as_str(), "bind", &sis_id])?;
    self.send(req).await?;
    Ok(())
  }

  async fn join_group(&self, id: GroupId) -> Result<(), HttpError> {
    self.send(self.request(Method::POST, &["groups", id.as_str(), "join"])?).await?;
    Ok(())
  }
}

impl TermRepository for HttpRepository {
  type Error = HttpError;

  async fn fetch_all_terms(&self) -> Result<Vec<Term>, HttpError> {
    self.get_json(&["terms"]).await
  }
}
