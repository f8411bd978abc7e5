use crate::cache::{plan_refreshes, FilteredViewCache, PendingRefresh};
use crate::event::{AppEvent, Event, EventHandler};
use crate::filter::FilterKey;
use crate::notify::Toast;
use crate::query::{QueryState, ViewHandle};
use crate::records::types::{Account, RecordId, TypeOption, FIELD_NAME};
use crate::records::AccountService;
use crate::save::{save_batch, DraftEdits};
use crate::ui;
use crate::ui::components::{InputResult, TextInput};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::stdout;
use std::num::NonZeroUsize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Input mode
#[derive(Debug)]
pub enum Mode {
  Normal,
  /// Editing the Name cell of a record
  Editing { id: RecordId, input: TextInput },
}

/// Startup options that do not come from the backend
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
  pub title: String,
  pub initial_type: Option<String>,
  pub cache_capacity: Option<NonZeroUsize>,
}

/// First fetch of a filter that has not been recorded yet
struct InFlightFetch {
  seq: u64,
  handle: ViewHandle<Vec<Account>>,
  task: JoinHandle<()>,
}

/// Account search component: type selector, editable grid and the
/// per-filter view cache behind them.
pub struct App<S: AccountService> {
  service: S,
  title: String,

  /// Recorded views, one per visited filter
  cache: FilteredViewCache<Account>,
  /// Handle shown in the grid; cached or still in flight
  current: Option<ViewHandle<Vec<Account>>>,
  selected_key: FilterKey,
  in_flight: HashMap<FilterKey, InFlightFetch>,
  fetch_seq: u64,
  refreshing: usize,

  type_options: Vec<TypeOption>,
  types_error: Option<String>,
  types_loading: bool,

  selected_row: usize,
  drafts: DraftEdits,
  saving: bool,
  toast: Option<Toast>,
  mode: Mode,

  event_tx: mpsc::UnboundedSender<Event>,
  should_quit: bool,
}

impl<S: AccountService> App<S> {
  pub fn new(service: S, options: AppOptions, event_tx: mpsc::UnboundedSender<Event>) -> Self {
    let cache = match options.cache_capacity {
      Some(capacity) => FilteredViewCache::with_capacity(capacity),
      None => FilteredViewCache::new(),
    };
    let selected_key = options
      .initial_type
      .map(FilterKey::from_label)
      .unwrap_or_else(FilterKey::all);

    Self {
      service,
      title: options.title,
      cache,
      current: None,
      selected_key,
      in_flight: HashMap::new(),
      fetch_seq: 0,
      refreshing: 0,
      type_options: Vec::new(),
      types_error: None,
      types_loading: false,
      selected_row: 0,
      drafts: DraftEdits::new(),
      saving: false,
      toast: None,
      mode: Mode::Normal,
      event_tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    self.start();
    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      // Observe the view on screen so its reloads redraw without waiting
      // for the next tick
      let observer = self.current.as_ref().map(ViewHandle::subscribe);
      terminal.draw(|frame| ui::draw(frame, self))?;

      tokio::select! {
        event = events.next() => {
          if let Some(event) = event {
            self.handle_event(event)?;
          }
        }
        _ = view_changed(observer) => {}
      }
    }
    Ok(())
  }

  /// Kick off the category listing and the first view fetch.
  pub fn start(&mut self) {
    self.load_types();
    let key = self.selected_key.clone();
    self.select_key(key);
  }

  fn load_types(&mut self) {
    self.types_loading = true;
    let service = self.service.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let result = service.list_types().await.map_err(|e| e.to_string());
      let _ = tx.send(Event::App(AppEvent::TypesLoaded(result)));
    });
  }

  /// Show the view for `key`, fetching it only when it is not cached.
  fn select_key(&mut self, key: FilterKey) {
    self.selected_key = key.clone();
    self.selected_row = 0;

    for evicted in self.cache.pin(key.clone()) {
      debug!(filter = %evicted, "view evicted");
    }

    if self.cache.touch(&key) {
      debug!(filter = %key, "serving cached view");
      self.current = self.cache.handle(&key).cloned();
      let failed = self.current.as_ref().is_some_and(|h| h.state().is_error());
      if failed {
        // Last refresh failed; try again rather than keep showing the error
        let pending = PendingRefresh::request(&mut self.cache, key);
        self.spawn_refresh(pending);
      }
      return;
    }

    if let Some(pending) = self.in_flight.get(&key) {
      debug!(filter = %key, seq = pending.seq, "fetch already in flight");
      self.current = Some(pending.handle.clone());
      return;
    }

    self.fetch_view(key);
  }

  /// Start a first fetch for `key`, aborting any earlier one for the same key.
  fn fetch_view(&mut self, key: FilterKey) {
    if let Some(previous) = self.in_flight.remove(&key) {
      debug!(filter = %key, seq = previous.seq, "aborting superseded fetch");
      previous.task.abort();
    }

    self.fetch_seq += 1;
    let seq = self.fetch_seq;
    let handle = view_handle(&self.service, &key);
    self.current = Some(handle.clone());

    info!(filter = %key, seq, "fetching view");
    let tx = self.event_tx.clone();
    let task_key = key.clone();
    let task_handle = handle.clone();
    let task = tokio::spawn(async move {
      let result = task_handle.refetch().await.map_err(|e| e.to_string());
      let _ = tx.send(Event::App(AppEvent::ViewFetched {
        key: task_key,
        seq,
        handle: task_handle,
        result,
      }));
    });

    self
      .in_flight
      .insert(key, InFlightFetch { seq, handle, task });
  }

  /// Re-fetch the selected view on demand.
  fn reload_selected(&mut self) {
    let key = self.selected_key.clone();
    if self.cache.contains(&key) {
      let pending = PendingRefresh::request(&mut self.cache, key);
      self.spawn_refresh(pending);
    } else {
      self.fetch_view(key);
    }
  }

  pub fn handle_event(&mut self, event: Event) -> Result<()> {
    match event {
      Event::InputError(e) => return Err(eyre!("Terminal input failed: {}", e)),
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if self.toast.as_ref().is_some_and(Toast::is_expired) {
          self.toast = None;
        }
      }
      Event::App(app_event) => self.handle_app_event(app_event),
    }
    Ok(())
  }

  fn handle_app_event(&mut self, event: AppEvent) {
    match event {
      AppEvent::TypesLoaded(Ok(labels)) => {
        self.types_loading = false;
        self.types_error = None;
        self.type_options = TypeOption::from_labels(&labels);
      }
      AppEvent::TypesLoaded(Err(e)) => {
        warn!(error = %e, "failed to load account types");
        self.types_loading = false;
        self.type_options.clear();
        self.types_error = Some(e);
      }
      AppEvent::ViewFetched {
        key,
        seq,
        handle,
        result,
      } => {
        let current = self.in_flight.get(&key).map(|f| f.seq) == Some(seq);
        if !current {
          debug!(filter = %key, seq, "ignoring superseded fetch result");
          return;
        }
        self.in_flight.remove(&key);

        match result {
          Ok(records) => {
            if let Some(evicted) = self.cache.record_records(key, &records, handle) {
              debug!(filter = %evicted, "view evicted");
            }
          }
          Err(e) => warn!(filter = %key, error = %e, "view fetch failed"),
        }
      }
      AppEvent::Saved(Ok(mutated)) => {
        self.saving = false;
        self.drafts.clear();
        self.toast = Some(Toast::saved());
        self.invalidate(&mutated);
      }
      AppEvent::Saved(Err(e)) => {
        self.saving = false;
        self.toast = Some(Toast::error(e.to_string()));
      }
      AppEvent::Refreshed(outcome) => {
        self.refreshing = self.refreshing.saturating_sub(1);
        self.cache.apply_refresh(&outcome);
      }
    }
  }

  /// Refresh every cached view holding one of the mutated records.
  fn invalidate(&mut self, mutated: &HashSet<RecordId>) {
    for pending in plan_refreshes(&mut self.cache, mutated) {
      self.spawn_refresh(pending);
    }
  }

  fn spawn_refresh(&mut self, pending: PendingRefresh<Account>) {
    debug!(filter = %pending.key(), "spawning refresh");
    self.refreshing += 1;
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let outcome = pending.run().await;
      let _ = tx.send(Event::App(AppEvent::Refreshed(outcome)));
    });
  }

  fn save(&mut self) {
    if self.saving || self.drafts.is_empty() {
      return;
    }

    let batch = self.drafts.to_batch();
    info!(records = batch.len(), "saving draft edits");
    self.saving = true;
    let service = self.service.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let result = save_batch(&service, &batch).await;
      let _ = tx.send(Event::App(AppEvent::Saved(result)));
    });
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if let Mode::Editing { id, input } = &mut self.mode {
      match input.handle_key(key) {
        InputResult::Submitted(value) => {
          let id = id.clone();
          self.drafts.set(id, FIELD_NAME, value);
          self.mode = Mode::Normal;
        }
        InputResult::Cancelled => self.mode = Mode::Normal,
        InputResult::Consumed | InputResult::NotHandled => {}
      }
      return;
    }

    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      KeyCode::Char('s') => self.save(),

      // Rows
      KeyCode::Up | KeyCode::Char('k') => self.move_row(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_row(1),

      // Type selector
      KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => self.move_type(-1),
      KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => self.move_type(1),

      KeyCode::Enter | KeyCode::Char('e') => self.begin_edit(),
      KeyCode::Char('r') => self.reload_selected(),
      KeyCode::Esc => self.drafts.clear(),
      _ => {}
    }
  }

  fn move_row(&mut self, delta: i32) {
    let len = self.rows().len();
    if len > 0 {
      self.selected_row = (self.selected_row as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn move_type(&mut self, delta: i32) {
    let len = self.type_options.len();
    if len == 0 {
      return;
    }
    let index = (self.selected_type_index() as i32 + delta).rem_euclid(len as i32) as usize;
    self.select_type(index);
  }

  /// Select the type option at `index`.
  pub fn select_type(&mut self, index: usize) {
    if let Some(option) = self.type_options.get(index) {
      let key = FilterKey::from_option_value(&option.value);
      self.select_key(key);
    }
  }

  fn begin_edit(&mut self) {
    let rows = self.rows();
    if let Some(account) = rows.get(self.selected_row) {
      let value = self
        .drafts
        .get(&account.id, FIELD_NAME)
        .unwrap_or(&account.name);
      self.mode = Mode::Editing {
        id: account.id.clone(),
        input: TextInput::with_value(value),
      };
    }
  }

  // Accessors for UI rendering and tests

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn selected_key(&self) -> &FilterKey {
    &self.selected_key
  }

  pub fn type_options(&self) -> &[TypeOption] {
    &self.type_options
  }

  pub fn types_error(&self) -> Option<&str> {
    self.types_error.as_deref()
  }

  /// Index of the option matching the selected filter
  pub fn selected_type_index(&self) -> usize {
    let value = self.selected_key.option_value();
    self
      .type_options
      .iter()
      .position(|o| o.value == value)
      .unwrap_or(0)
  }

  pub fn view_state(&self) -> QueryState<Vec<Account>> {
    self
      .current
      .as_ref()
      .map(|h| h.state())
      .unwrap_or(QueryState::Idle)
  }

  /// Records of the selected view
  pub fn rows(&self) -> Vec<Account> {
    self
      .current
      .as_ref()
      .and_then(|h| h.data())
      .unwrap_or_default()
  }

  pub fn selected_row(&self) -> usize {
    self.selected_row
  }

  pub fn drafts(&self) -> &DraftEdits {
    &self.drafts
  }

  pub fn cache(&self) -> &FilteredViewCache<Account> {
    &self.cache
  }

  pub fn toast(&self) -> Option<&Toast> {
    self.toast.as_ref()
  }

  pub fn is_saving(&self) -> bool {
    self.saving
  }

  /// Any fetch, refresh or listing still outstanding
  pub fn is_loading(&self) -> bool {
    self.types_loading || !self.in_flight.is_empty() || self.refreshing > 0
  }

  pub fn is_busy(&self) -> bool {
    self.is_loading() || self.saving
  }
}

/// Resolves when the observed view changes; never resolves without one.
async fn view_changed<T>(observer: Option<watch::Receiver<T>>) {
  match observer {
    Some(mut observer) => {
      if observer.changed().await.is_err() {
        std::future::pending::<()>().await;
      }
    }
    None => std::future::pending::<()>().await,
  }
}

/// Build the live handle for one filtered view.
fn view_handle<S: AccountService>(service: &S, key: &FilterKey) -> ViewHandle<Vec<Account>> {
  let service = service.clone();
  let key = key.clone();
  ViewHandle::new(move || {
    let service = service.clone();
    let key = key.clone();
    async move { service.query_accounts(&key).await.map_err(|e| e.to_string()) }
  })
}
