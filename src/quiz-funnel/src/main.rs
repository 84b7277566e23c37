//! Quiz Funnel — terminal quiz runner and funnel analytics tool.
//!
//! Walks a visitor through the step catalog, tracks each step entered, and
//! reports per-step drop-off from the remote statistics service.

mod play;
mod report;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use funnel_core::{AppConfig, DateFilter, SessionContext, StepCatalog, StepDefinition};
use funnel_journey::store::{self, LocalStore};
use funnel_journey::{reorder, resolve_order, FileStore};
use funnel_reporting::{FunnelDashboard, LabelTable, StatsSource};
use funnel_web_sdk::{ResetClient, StatsClient};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "quiz-funnel")]
#[command(about = "Quiz funnel runner and drop-off analytics")]
#[command(version)]
struct Cli {
    /// Step catalog JSON file (overrides config, defaults to the built-in quiz)
    #[arg(long, global = true, env = "QUIZ_FUNNEL__QUIZ__CATALOG_PATH")]
    catalog: Option<String>,

    /// Analytics service base URL (overrides config)
    #[arg(long, global = true, env = "QUIZ_FUNNEL__TRACKING__BASE_URL")]
    base_url: Option<String>,

    /// Local storage file (overrides config)
    #[arg(long, global = true, env = "QUIZ_FUNNEL__STORE__PATH")]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk the funnel in the terminal
    Play {
        /// URL the visitor landed on; UTM parameters are read from it
        #[arg(long)]
        landing_url: Option<String>,

        /// Referring page
        #[arg(long)]
        referrer: Option<String>,

        /// Ignore saved progress and start from the first step
        #[arg(long, default_value_t = false)]
        fresh: bool,
    },

    /// Print the funnel table and summary
    Stats {
        /// Single day (YYYY-MM-DD)
        #[arg(long, conflicts_with_all = ["start_date", "end_date"])]
        date: Option<NaiveDate>,

        /// Range start (YYYY-MM-DD)
        #[arg(long, requires = "end_date")]
        start_date: Option<NaiveDate>,

        /// Range end (YYYY-MM-DD)
        #[arg(long, requires = "start_date")]
        end_date: Option<NaiveDate>,

        /// Keep refreshing every dashboard.refresh_interval_ms
        #[arg(long, default_value_t = false)]
        watch: bool,
    },

    /// Inspect or edit the persisted step order
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },

    /// Purge remote analytics and clear local quiz state
    Reset,
}

#[derive(Subcommand, Debug)]
enum OrderAction {
    /// Show the effective step order
    Show,

    /// Save a custom order; unlisted steps follow in catalog order
    Save {
        /// Step ids, in the desired order
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Move the step at position FROM to position TO (0-based)
    Move { from: usize, to: usize },

    /// Restore the catalog order
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quiz_funnel=info,funnel_core=info,funnel_journey=info,funnel_reporting=info,funnel_web_sdk=info"
                    .into()
            }),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(path) = cli.catalog {
        config.quiz.catalog_path = Some(path);
    }
    if let Some(base_url) = cli.base_url {
        config.tracking.base_url = base_url;
    }
    if let Some(path) = cli.store {
        config.store.path = path;
    }

    info!(
        quiz = %config.quiz.name,
        base_url = %config.tracking.base_url,
        store = %config.store.path,
        "Configuration loaded"
    );

    let catalog = load_catalog(&config)?;
    let store = FileStore::new(&config.store.path);

    match cli.command {
        Commands::Play {
            landing_url,
            referrer,
            fresh,
        } => {
            let mut session = SessionContext::new(&config.quiz.name, &config.tracking.user_agent);
            if let Some(referrer) = referrer {
                session = session.with_referrer(referrer);
            }
            if let Some(url) = landing_url.as_deref() {
                session.capture_landing_url(url);
            }
            play::run(&config, &catalog, &store, Arc::new(session), fresh).await
        }
        Commands::Stats {
            date,
            start_date,
            end_date,
            watch,
        } => {
            let filter = match (date, start_date, end_date) {
                (Some(date), _, _) => DateFilter::Day { date },
                (None, Some(start_date), Some(end_date)) => DateFilter::Range {
                    start_date,
                    end_date,
                },
                _ => DateFilter::AllTime,
            };
            cmd_stats(&config, &catalog, &store, filter, watch).await
        }
        Commands::Order { action } => cmd_order(&catalog, &store, action),
        Commands::Reset => cmd_reset(&config, &store).await,
    }
}

fn load_catalog(config: &AppConfig) -> anyhow::Result<StepCatalog> {
    let catalog = match config.quiz.catalog_path.as_deref() {
        Some(path) => StepCatalog::from_file(path)
            .with_context(|| format!("loading step catalog from {}", path))?,
        None => StepCatalog::builtin().context("loading built-in step catalog")?,
    };
    info!(steps = catalog.len(), "Step catalog loaded");
    Ok(catalog)
}

fn effective_order(catalog: &StepCatalog, store: &dyn LocalStore) -> Vec<StepDefinition> {
    let persisted = store::load_order(store);
    resolve_order(catalog.steps(), persisted.as_deref())
}

/// Picks up an order saved by `order` while the dashboard is running.
fn sync_order<S: StatsSource>(
    dashboard: &FunnelDashboard<S>,
    catalog: &StepCatalog,
    store: &dyn LocalStore,
) {
    dashboard.set_order(effective_order(catalog, store));
}

async fn cmd_stats(
    config: &AppConfig,
    catalog: &StepCatalog,
    store: &dyn LocalStore,
    filter: DateFilter,
    watch: bool,
) -> anyhow::Result<()> {
    let client = Arc::new(StatsClient::new(&config.tracking, &config.quiz.name)?);
    let labels = LabelTable::from_catalog(catalog.steps());
    let dashboard = Arc::new(FunnelDashboard::new(
        client,
        effective_order(catalog, store),
        labels,
    ));

    let report = dashboard.refresh(filter).await;
    report::print_report(&report);

    if !watch {
        return Ok(());
    }

    let period = Duration::from_millis(config.dashboard.refresh_interval_ms.max(1));
    let refresher = Arc::clone(&dashboard).spawn_auto_refresh(filter, period);
    let mut last_shown = report.generated_at;
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sync_order(&dashboard, catalog, store);
                if let Some(latest) = dashboard.latest() {
                    if latest.generated_at > last_shown {
                        last_shown = latest.generated_at;
                        report::print_report(&latest);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping dashboard refresh");
                refresher.abort();
                return Ok(());
            }
        }
    }
}

fn cmd_order(
    catalog: &StepCatalog,
    store: &dyn LocalStore,
    action: OrderAction,
) -> anyhow::Result<()> {
    match action {
        OrderAction::Show => {}
        OrderAction::Save { ids } => {
            for id in ids.iter().filter(|id| catalog.get(id).is_none()) {
                eprintln!("Warning: unknown step '{id}' ignored");
            }
            let ordered = resolve_order(catalog.steps(), Some(ids.as_slice()));
            let ids: Vec<String> = ordered.iter().map(|s| s.id.clone()).collect();
            store::save_order(store, &ids)?;
            println!("Custom order saved.");
        }
        OrderAction::Move { from, to } => {
            let current: Vec<String> = effective_order(catalog, store)
                .iter()
                .map(|s| s.id.clone())
                .collect();
            let ids = reorder(&current, from, to);
            store::save_order(store, &ids)?;
            println!("Custom order saved.");
        }
        OrderAction::Reset => {
            store::clear_order(store)?;
            println!("Catalog order restored.");
        }
    }

    let ordered = effective_order(catalog, store);
    println!();
    for (i, step) in ordered.iter().enumerate() {
        println!("  {:>3}  {:<32} {}", i, step.id, step.step_type);
    }
    println!();
    Ok(())
}

async fn cmd_reset(config: &AppConfig, store: &dyn LocalStore) -> anyhow::Result<()> {
    if let Err(e) = store::clear_local_state(store) {
        warn!(error = %e, "Failed to clear local quiz state");
    }

    let session = SessionContext::new(&config.quiz.name, &config.tracking.user_agent);
    let client = ResetClient::new(&config.tracking)?;
    if client.reset(&session).await {
        println!("Analytics reset for quiz '{}'.", config.quiz.name);
    } else {
        println!(
            "Local data cleared, but the remote reset failed for quiz '{}'.",
            config.quiz.name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_journey::MemoryStore;

    #[tokio::test]
    async fn test_watch_picks_up_saved_order() {
        let catalog = StepCatalog::builtin().unwrap();
        let store = MemoryStore::new();
        let mut config = AppConfig::default();
        config.tracking.base_url = "http://127.0.0.1:9".into();
        config.tracking.timeout_ms = 500;

        let client = Arc::new(StatsClient::new(&config.tracking, "quiz").unwrap());
        let labels = LabelTable::from_catalog(catalog.steps());
        let dashboard = FunnelDashboard::new(client, effective_order(&catalog, &store), labels);
        let first = catalog.steps()[0].id.clone();
        assert_eq!(dashboard.refresh(DateFilter::AllTime).await.stats[0].id, first);

        let last = catalog.steps()[catalog.len() - 1].id.clone();
        store::save_order(&store, &[last.clone()]).unwrap();
        sync_order(&dashboard, &catalog, &store);

        let report = dashboard.refresh(DateFilter::AllTime).await;
        assert_eq!(report.stats[0].id, last);
        assert_eq!(report.stats[1].id, first);
        assert_eq!(report.stats.len(), catalog.len());
    }
}
