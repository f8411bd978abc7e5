//! In-memory account service for tests.

use color_eyre::{eyre::eyre, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use super::service::AccountService;
use super::types::{Account, RecordId, FIELD_NAME};
use crate::filter::FilterKey;

#[derive(Default)]
struct State {
  accounts: Vec<Account>,
  failing: HashSet<RecordId>,
  types_error: Option<String>,
  query_error: Option<String>,
  queries: Vec<FilterKey>,
  updates: Vec<RecordId>,
}

#[derive(Clone, Default)]
pub struct FakeService {
  state: Arc<Mutex<State>>,
}

impl FakeService {
  pub fn with_accounts(accounts: &[(&str, &str, &str)]) -> Self {
    let service = Self::default();
    service.state.lock().unwrap().accounts = accounts
      .iter()
      .map(|(id, name, account_type)| Account {
        id: RecordId::new(*id),
        name: name.to_string(),
        account_type: Some(account_type.to_string()),
        last_modified: None,
      })
      .collect();
    service
  }

  /// Make updates to `id` fail with a validation message
  pub fn fail_updates_to(&self, id: &str) {
    self.state.lock().unwrap().failing.insert(RecordId::new(id));
  }

  pub fn fail_type_listing(&self, message: &str) {
    self.state.lock().unwrap().types_error = Some(message.to_string());
  }

  /// Make every record query fail until `restore_queries`
  pub fn fail_queries(&self, message: &str) {
    self.state.lock().unwrap().query_error = Some(message.to_string());
  }

  pub fn restore_queries(&self) {
    self.state.lock().unwrap().query_error = None;
  }

  pub fn query_count(&self, key: &FilterKey) -> usize {
    let state = self.state.lock().unwrap();
    state.queries.iter().filter(|k| *k == key).count()
  }

  pub fn updated(&self) -> Vec<RecordId> {
    self.state.lock().unwrap().updates.clone()
  }

  pub fn name_of(&self, id: &str) -> Option<String> {
    let state = self.state.lock().unwrap();
    state
      .accounts
      .iter()
      .find(|a| a.id.as_str() == id)
      .map(|a| a.name.clone())
  }
}

impl AccountService for FakeService {
  async fn list_types(&self) -> Result<Vec<String>> {
    let state = self.state.lock().unwrap();
    if let Some(message) = &state.types_error {
      return Err(eyre!("{}", message));
    }
    let mut types: Vec<String> = state
      .accounts
      .iter()
      .filter_map(|a| a.account_type.clone())
      .collect();
    types.sort();
    types.dedup();
    Ok(types)
  }

  async fn query_accounts(&self, key: &FilterKey) -> Result<Vec<Account>> {
    let mut state = self.state.lock().unwrap();
    state.queries.push(key.clone());
    if let Some(message) = &state.query_error {
      return Err(eyre!("{}", message));
    }
    Ok(
      state
        .accounts
        .iter()
        .filter(|a| key.is_all() || a.account_type.as_deref() == Some(key.label()))
        .cloned()
        .collect(),
    )
  }

  async fn update_record(&self, id: &RecordId, fields: &BTreeMap<String, String>) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    if state.failing.contains(id) {
      return Err(eyre!("Required fields are missing: [Name]"));
    }
    let account = state
      .accounts
      .iter_mut()
      .find(|a| &a.id == id)
      .ok_or_else(|| eyre!("Record not found: {}", id))?;
    if let Some(name) = fields.get(FIELD_NAME) {
      account.name = name.clone();
    }
    state.updates.push(id.clone());
    Ok(())
  }
}
