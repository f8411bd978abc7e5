//! REST account service.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET types` returns a JSON array of type labels
//! - `GET accounts?type=<label>` returns a JSON array of accounts; the
//!   parameter is omitted for the unfiltered view
//! - `PATCH accounts/<id>` takes a JSON object of field values
//!
//! Error responses carry `{"message": "..."}`, which is passed through so the
//! UI can show it as-is.

use color_eyre::{eyre::eyre, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

use super::service::AccountService;
use super::types::{Account, RecordId};
use crate::config::Config;
use crate::filter::FilterKey;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  message: String,
}

/// Account service talking to a REST backend
#[derive(Clone)]
pub struct HttpService {
  client: Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpService {
  pub fn new(base_url: &str) -> Result<Self> {
    let base_url = parse_base_url(base_url)?;
    let client = Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token: Config::get_api_token(),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  async fn send(&self, request: RequestBuilder) -> Result<Response> {
    let response = self
      .authorized(request)
      .send()
      .await
      .map_err(|e| eyre!("Request failed: {}", e))?;

    if response.status().is_success() {
      return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(eyre!("{}", error_message(status.as_u16(), &body)))
  }
}

/// Make sure the base URL ends with `/` so relative joins keep its path.
fn parse_base_url(raw: &str) -> Result<Url> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };
  Url::parse(&normalized).map_err(|e| eyre!("Invalid backend URL {}: {}", raw, e))
}

/// Extract the human-readable message from an error response.
fn error_message(status: u16, body: &str) -> String {
  match serde_json::from_str::<ApiErrorBody>(body) {
    Ok(err) => err.message,
    Err(_) if body.trim().is_empty() => format!("Request failed with status {}", status),
    Err(_) => body.trim().to_string(),
  }
}

impl AccountService for HttpService {
  async fn list_types(&self) -> Result<Vec<String>> {
    let url = self.endpoint("types")?;
    let response = self.send(self.client.get(url)).await?;
    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse account types: {}", e))
  }

  async fn query_accounts(&self, key: &FilterKey) -> Result<Vec<Account>> {
    let mut url = self.endpoint("accounts")?;
    if !key.is_all() {
      url.query_pairs_mut().append_pair("type", key.label());
    }
    debug!(%url, "querying accounts");

    let response = self.send(self.client.get(url)).await?;
    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse accounts: {}", e))
  }

  async fn update_record(&self, id: &RecordId, fields: &BTreeMap<String, String>) -> Result<()> {
    let mut url = self.endpoint("accounts/")?;
    url
      .path_segments_mut()
      .map_err(|_| eyre!("Backend URL cannot be a base: {}", self.base_url))?
      .pop_if_empty()
      .push(id.as_str());

    self.send(self.client.patch(url).json(fields)).await?;
    Ok(())
  }
}
