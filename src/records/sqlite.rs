//! Local SQLite account store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::service::AccountService;
use super::types::{Account, RecordId, FIELD_NAME, FIELD_TYPE};
use crate::filter::FilterKey;

/// Account service backed by a SQLite database.
#[derive(Clone)]
pub struct SqliteService {
  conn: Arc<Mutex<Connection>>,
  location: String,
}

impl SqliteService {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::with_connection(conn, path.display().to_string())
  }

  /// Open a throwaway in-memory store.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn, ":memory:".to_string())
  }

  fn with_connection(conn: Connection, location: String) -> Result<Self> {
    let service = Self {
      conn: Arc::new(Mutex::new(conn)),
      location,
    };
    service.run_migrations()?;
    Ok(service)
  }

  /// Get the default database path
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("acctview").join("accounts.db"))
  }

  pub fn location(&self) -> &str {
    &self.location
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Insert the demo accounts if the store is empty. Returns how many rows
  /// were inserted.
  pub fn seed_demo(&self) -> Result<usize> {
    let mut conn = self.lock()?;

    let existing: i64 = conn
      .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count accounts: {}", e))?;
    if existing > 0 {
      debug!(existing, "store already has accounts, skipping seed");
      return Ok(0);
    }

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for (n, (name, account_type)) in DEMO_ACCOUNTS.iter().enumerate() {
      tx.execute(
        "INSERT INTO accounts (id, name, type) VALUES (?, ?, ?)",
        params![format!("001{:012}", n + 1), name, account_type],
      )
      .map_err(|e| eyre!("Failed to insert demo account: {}", e))?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    info!(count = DEMO_ACCOUNTS.len(), "seeded demo accounts");
    Ok(DEMO_ACCOUNTS.len())
  }

  /// Insert a single account. Used to set up fixtures.
  #[cfg(test)]
  pub fn insert(&self, account: &Account) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO accounts (id, name, type) VALUES (?, ?, ?)",
        params![account.id.as_str(), account.name, account.account_type],
      )
      .map_err(|e| eyre!("Failed to insert account {}: {}", account.id, e))?;
    Ok(())
  }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    type TEXT,
    last_modified TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_accounts_type ON accounts(type);
"#;

const DEMO_ACCOUNTS: &[(&str, &str)] = &[
  ("Burlington Textiles Corp of America", "Customer - Direct"),
  ("Dickenson plc", "Customer - Channel"),
  ("Edge Communications", "Customer - Direct"),
  ("Express Logistics and Transport", "Customer - Channel"),
  ("GenePoint", "Customer - Channel"),
  ("Grand Hotels & Resorts Ltd", "Customer - Direct"),
  ("Pyramid Construction Inc.", "Customer - Channel"),
  ("United Oil & Gas Corp.", "Customer - Direct"),
  ("University of Arizona", "Customer - Direct"),
  ("sForce", "Technology Partner"),
  ("Global Media", "Prospect"),
  ("Acme", "Prospect"),
];

/// Map a grid field name to its column
fn column_for(field: &str) -> Result<&'static str> {
  match field {
    FIELD_NAME => Ok("name"),
    FIELD_TYPE => Ok("type"),
    other => Err(eyre!("No such column '{}' on entity 'Account'", other)),
  }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, Option<String>, String)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

impl AccountService for SqliteService {
  async fn list_types(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT DISTINCT type FROM accounts
         WHERE type IS NOT NULL AND type != ''
         ORDER BY type",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let types = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list account types: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read account type: {}", e))?;

    Ok(types)
  }

  async fn query_accounts(&self, key: &FilterKey) -> Result<Vec<Account>> {
    let conn = self.lock()?;

    let rows: rusqlite::Result<Vec<_>> = if key.is_all() {
      let mut stmt = conn
        .prepare("SELECT id, name, type, last_modified FROM accounts ORDER BY name")
        .map_err(|e| eyre!("Failed to prepare query: {}", e))?;
      let rows = stmt
        .query_map([], row_to_account)
        .map_err(|e| eyre!("Failed to query accounts: {}", e))?
        .collect::<rusqlite::Result<Vec<_>>>();
      rows
    } else {
      let mut stmt = conn
        .prepare(
          "SELECT id, name, type, last_modified FROM accounts
           WHERE type = ?
           ORDER BY name",
        )
        .map_err(|e| eyre!("Failed to prepare query: {}", e))?;
      let rows = stmt
        .query_map(params![key.label()], row_to_account)
        .map_err(|e| eyre!("Failed to query accounts: {}", e))?
        .collect::<rusqlite::Result<Vec<_>>>();
      rows
    };
    let rows = rows.map_err(|e| eyre!("Failed to read account: {}", e))?;

    rows
      .into_iter()
      .map(|(id, name, account_type, last_modified)| {
        Ok(Account {
          id: RecordId::new(id),
          name,
          account_type,
          last_modified: Some(parse_datetime(&last_modified)?),
        })
      })
      .collect()
  }

  async fn update_record(&self, id: &RecordId, fields: &BTreeMap<String, String>) -> Result<()> {
    if fields.is_empty() {
      return Ok(());
    }

    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let exists = tx
      .query_row("SELECT 1 FROM accounts WHERE id = ?", params![id.as_str()], |_| Ok(()))
      .optional()
      .map_err(|e| eyre!("Failed to look up account {}: {}", id, e))?;
    if exists.is_none() {
      return Err(eyre!("Record not found: {}", id));
    }

    for (field, value) in fields {
      let column = column_for(field)?;
      if column == "name" && value.trim().is_empty() {
        return Err(eyre!("Required fields are missing: [{}]", FIELD_NAME));
      }

      // Column names come from the fixed mapping above, never from input
      let sql = format!(
        "UPDATE accounts SET {} = ?, last_modified = datetime('now') WHERE id = ?",
        column
      );
      tx.execute(&sql, params![value, id.as_str()])
        .map_err(|e| eyre!("Failed to update account {}: {}", id, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    debug!(record = %id, fields = fields.len(), "account updated");
    Ok(())
  }
}
