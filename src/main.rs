use chartsync::chart::{ChartCall, MockChart};
use chartsync::cli::{Cli, Commands};
use chartsync::config::Config;
use chartsync::init_logging;
use chartsync::overlay::persistence::{DRAWINGS_KEY, is_position_label};
use chartsync::overlay::{DrawingStore, FileDrawingStore, NotifyOutcome, SavedShape};
use chartsync::session::{Scenario, SessionManager, SessionSummary};
use chartsync::trading::same_symbol;
use chartsync::AppResult;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse_args();

    // Load configuration
    let config = Config::load_or_default(&cli.config_file);

    // Initialize logging
    let _log_guard = init_logging(&cli.effective_log_level(&config.log_level), Some(Path::new(&config.log.file_path)))?;

    tracing::info!("chartsync starting...");
    tracing::debug!("CLI arguments: {:?}", cli);

    match cli.command() {
        Commands::Config { action } => {
            Config::handle_command(&action, &cli.config_file)?;
        }
        Commands::Demo => {
            run_scenario(&Scenario::demo(), &config).await?;
        }
        Commands::Run { scenario, symbol } => {
            let mut scenario = Scenario::load_from_file(&scenario)?;
            if let Some(symbol) = symbol {
                scenario.symbol = Some(symbol);
            }
            run_scenario(&scenario, &config).await?;
        }
        Commands::Drawings { symbol } => {
            let symbol = symbol.unwrap_or_else(|| config.chart.default_symbol.clone());
            preview_drawings(&config, &symbol)?;
        }
    }

    Ok(())
}

async fn run_scenario(scenario: &Scenario, config: &Config) -> AppResult<()> {
    let store = FileDrawingStore::new(&config.storage.drawings_path);
    let mut session = SessionManager::new(config, Box::new(store));

    println!("{} {}", "▶ Scenario".bold(), scenario.name.cyan());
    let summary = session.play(scenario).await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    for step in &summary.steps {
        let outcome = match &step.outcome {
            Some(NotifyOutcome::Reconciled(report)) if report.is_noop() => "no-op".dimmed().to_string(),
            Some(NotifyOutcome::Reconciled(report)) => format!(
                "+{} -{} (stale {}, unchanged {})",
                report.created, report.deleted, report.stale_deletes, report.unchanged
            )
            .green()
            .to_string(),
            Some(NotifyOutcome::Deferred) => "deferred".yellow().to_string(),
            Some(NotifyOutcome::CacheCleared { forgotten }) => {
                format!("cache cleared ({} handles)", forgotten).yellow().to_string()
            }
            Some(NotifyOutcome::Failed(err)) => format!("failed: {}", err).red().to_string(),
            None => "armed".dimmed().to_string(),
        };
        println!("{:>3}. {:<40} {}", step.index + 1, step.description, outcome);

        for call in &step.calls {
            match call {
                ChartCall::CreateLine { handle, anchor, label } => {
                    println!("       {} {:<8} {:>12.4}  {}", "create".green(), handle, anchor.price, label);
                }
                ChartCall::CreateShape { handle, name } => {
                    println!("       {} {:<8} {}", "replay".blue(), handle, name);
                }
                ChartCall::Delete { handle } => {
                    println!("       {} {:<8}", "delete".red(), handle);
                }
            }
        }
    }

    println!();
    println!("{}", "Summary".bold());
    println!("   Passes: {} ({} failed, {} no-op)", summary.metrics.passes, summary.metrics.failed_passes, summary.metrics.noop_passes);
    println!("   Lines created: {}", summary.metrics.lines_created);
    println!("   Lines deleted: {}", summary.metrics.lines_deleted + summary.metrics.stale_deletes);
    println!("   Drawing errors: {} (resyncs: {})", summary.stats.drawing_errors, summary.stats.resyncs);
    println!("   Cached lines: {} / drawn lines: {}", summary.cached_lines, summary.drawn_lines);
    if let Some(restore) = summary.last_restore {
        println!(
            "   Drawings restored: {} ({} suppressed{})",
            restore.replayed,
            restore.suppressed,
            if restore.reset { ", entry reset" } else { "" }
        );
    }
}

fn preview_drawings(config: &Config, symbol: &str) -> AppResult<()> {
    let store = FileDrawingStore::new(&config.storage.drawings_path);
    let Some(raw) = store.read(DRAWINGS_KEY)? else {
        println!("No saved drawings in {}", store.path().display());
        return Ok(());
    };

    let document: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)?;
    let Some((key, entry)) = document.iter().find(|(k, _)| same_symbol(k, symbol)) else {
        println!("No saved drawings for {}", symbol);
        return Ok(());
    };

    // A corrupted entry lists nothing; the restore below reports the reset
    let shapes: Vec<SavedShape> = serde_json::from_value(entry.clone()).unwrap_or_default();
    println!("📋 Saved drawings for {}:", key);
    for (i, shape) in shapes.iter().enumerate() {
        let text = shape.options.text.as_deref().unwrap_or("");
        let status = if is_position_label(text) {
            "suppressed".yellow()
        } else {
            "restore".green()
        };
        println!("   {}. {:<20} {:<10} {}", i + 1, shape.name, status, text);
    }

    // Confirm the replay path accepts them
    let mut chart = MockChart::new(symbol);
    let mut scratch = chartsync::overlay::MemoryDrawingStore::new().with_entry(DRAWINGS_KEY, raw);
    let report = chartsync::overlay::persistence::restore_drawings(&mut chart, &mut scratch, symbol);
    println!(
        "   Would replay {} and suppress {}{}",
        report.replayed,
        report.suppressed,
        if report.reset { " (entry is corrupted and would be reset)" } else { "" }
    );
    Ok(())
}
