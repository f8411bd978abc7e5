mod app;
mod cache;
mod config;
mod error;
mod event;
mod filter;
mod logging;
mod notify;
mod query;
mod records;
mod save;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use records::Backend;

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "acctview")]
#[command(about = "Search and edit accounts by type from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/acctview/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Account type selected on startup
  #[arg(short = 't', long = "type")]
  account_type: Option<String>,

  /// Fill an empty local store with demo accounts
  #[arg(long)]
  seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(config.log_level.as_deref())?;

  let backend = Backend::from_config(&config)?;
  info!(backend = %backend.describe(), "starting");

  if args.seed {
    match &backend {
      Backend::Sqlite(store) => {
        let inserted = store.seed_demo()?;
        info!(inserted, "seeded demo accounts");
      }
      Backend::Http(_) => {
        return Err(color_eyre::eyre::eyre!(
          "--seed only applies to the sqlite backend"
        ));
      }
    }
  }

  let options = app::AppOptions {
    title: config.title.clone().unwrap_or_else(|| backend.describe()),
    initial_type: args.account_type.or(config.default_type),
    cache_capacity: config.cache.capacity,
  };

  // Initialize and run the app
  let events = event::EventHandler::new(TICK_RATE);
  let mut app = app::App::new(backend, options, events.sender());
  app.run(events).await?;

  info!("exiting");
  Ok(())
}
