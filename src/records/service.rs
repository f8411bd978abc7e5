use color_eyre::Result;
use std::collections::BTreeMap;
use std::future::Future;

use super::http::HttpService;
use super::sqlite::SqliteService;
use super::types::{Account, RecordId};
use crate::config::{BackendConfig, Config};
use crate::filter::FilterKey;

/// Backend collaborator serving account data.
pub trait AccountService: Clone + Send + Sync + 'static {
  /// List every account type label, in display order
  fn list_types(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

  /// Query the accounts of one type; the unfiltered key returns all accounts.
  /// Safe to repeat.
  fn query_accounts(&self, key: &FilterKey) -> impl Future<Output = Result<Vec<Account>>> + Send;

  /// Apply field changes to one account
  fn update_record(
    &self,
    id: &RecordId,
    fields: &BTreeMap<String, String>,
  ) -> impl Future<Output = Result<()>> + Send;
}

/// The configured backend
#[derive(Clone)]
pub enum Backend {
  Sqlite(SqliteService),
  Http(HttpService),
}

impl Backend {
  pub fn from_config(config: &Config) -> Result<Self> {
    match &config.backend {
      BackendConfig::Sqlite { path } => {
        let service = match path {
          Some(p) => SqliteService::open_at(p)?,
          None => SqliteService::open()?,
        };
        Ok(Backend::Sqlite(service))
      }
      BackendConfig::Http { url } => Ok(Backend::Http(HttpService::new(url)?)),
    }
  }

  /// Short description for the header
  pub fn describe(&self) -> String {
    match self {
      Backend::Sqlite(s) => format!("sqlite:{}", s.location()),
      Backend::Http(h) => h.base_url().to_string(),
    }
  }
}

impl AccountService for Backend {
  async fn list_types(&self) -> Result<Vec<String>> {
    match self {
      Backend::Sqlite(s) => s.list_types().await,
      Backend::Http(h) => h.list_types().await,
    }
  }

  async fn query_accounts(&self, key: &FilterKey) -> Result<Vec<Account>> {
    match self {
      Backend::Sqlite(s) => s.query_accounts(key).await,
      Backend::Http(h) => h.query_accounts(key).await,
    }
  }

  async fn update_record(&self, id: &RecordId, fields: &BTreeMap<String, String>) -> Result<()> {
    match self {
      Backend::Sqlite(s) => s.update_record(id, fields).await,
      Backend::Http(h) => h.update_record(id, fields).await,
    }
  }
}
