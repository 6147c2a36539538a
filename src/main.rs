//! spend-forecast - categorize transactions and forecast monthly spend
//!
//! Usage:
//!   spend-forecast categorize --input clean.csv --output categorized.csv
//!   spend-forecast forecast --input clean.csv --months 3
//!   spend-forecast summary --input clean.csv
//!   spend-forecast top --input clean.csv --category Dining
//!   spend-forecast override merchant "blue bottle" Dining

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spend_forecast::{
    forecast_report, load_batch, sort_by_avg_spend, summarize, top_transactions,
    write_categorized, CategorizedTransaction, Categorizer, CategorizerConfig, ForecastParams,
    ForecastResult, RuleStore, TopQuery, YearMonth,
};
use spend_forecast::report::money;

#[derive(Parser)]
#[command(name = "spend-forecast", version, about = "Transaction categorization and spend forecasting")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Categorizer config JSON (built-in tables when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Merchant override JSON
    #[arg(long, global = true, default_value = "data/config/overrides.json")]
    overrides: PathBuf,

    /// One-off override CSV
    #[arg(long = "one-off", global = true, default_value = "data/config/one_off_overrides.csv")]
    one_off: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Categorize a cleaned batch and write it out
    Categorize {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Worker threads (0 = one per core)
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },
    /// Forecast next month's spend
    Forecast {
        #[arg(short, long)]
        input: PathBuf,
        /// Trailing months to consider
        #[arg(long, default_value_t = 3)]
        months: usize,
        /// Anomaly month to leave out (YYYY-MM), repeatable
        #[arg(long = "exclude-month")]
        exclude_months: Vec<YearMonth>,
        /// Category to leave out, repeatable
        #[arg(long = "exclude-category")]
        exclude_categories: Vec<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Totals by category and month
    Summary {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Largest transactions matching filters
    Top {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        category: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,
        /// YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
        /// Text to find in description or merchant
        #[arg(long)]
        search: Option<String>,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Edit the override stores
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
}

#[derive(Subcommand)]
enum OverrideAction {
    /// Map every merchant containing MERCHANT to CATEGORY
    Merchant {
        merchant: String,
        #[arg(required_unless_present = "remove")]
        category: Option<String>,
        /// Delete the rule instead
        #[arg(long)]
        remove: bool,
    },
    /// Pin a single transaction id to CATEGORY
    OneOff {
        txn_id: String,
        #[arg(required_unless_present = "remove")]
        category: Option<String>,
        #[arg(long)]
        remove: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let store = RuleStore::new(&cli.overrides, &cli.one_off);

    match cli.command {
        Commands::Categorize {
            input,
            output,
            workers,
        } => cmd_categorize(&cli.config, &store, &input, &output, workers),
        Commands::Forecast {
            input,
            months,
            exclude_months,
            exclude_categories,
            json,
        } => {
            let params = ForecastParams {
                months_lookback: months,
                exclude_months,
                exclude_categories,
            };
            cmd_forecast(&cli.config, &store, &input, &params, json)
        }
        Commands::Summary { input, json } => cmd_summary(&cli.config, &store, &input, json),
        Commands::Top {
            input,
            category,
            start,
            end,
            min,
            max,
            search,
            limit,
        } => {
            let query = TopQuery {
                category,
                start,
                end,
                min_spend: min,
                max_spend: max,
                search,
                limit,
            };
            cmd_top(&cli.config, &store, &input, &query)
        }
        Commands::Override { action } => cmd_override(&store, action),
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn categorizer(config: &Option<PathBuf>) -> Result<Categorizer> {
    let config = match config {
        Some(path) => CategorizerConfig::from_file(path)?,
        None => CategorizerConfig::default(),
    };
    Ok(Categorizer::new(&config))
}

fn load_categorized(
    config: &Option<PathBuf>,
    store: &RuleStore,
    input: &Path,
) -> Result<Vec<CategorizedTransaction>> {
    let categorizer = categorizer(config)?;
    let txns = load_batch(input).with_context(|| format!("Failed to load batch: {:?}", input))?;
    info!(rows = txns.len(), "Loaded batch");
    Ok(categorizer.run(txns, store))
}

fn cmd_categorize(
    config: &Option<PathBuf>,
    store: &RuleStore,
    input: &Path,
    output: &Path,
    workers: usize,
) -> Result<()> {
    let categorizer = categorizer(config)?;
    let txns = load_batch(input).with_context(|| format!("Failed to load batch: {:?}", input))?;
    let rules = store.snapshot();
    let rows = categorizer.categorize_batch_parallel(txns, &rules, workers);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    write_categorized(file, &rows).context("Failed to write categorized batch")?;

    println!("✓ Categorized {} transactions → {}", rows.len(), output.display());
    Ok(())
}

fn cmd_forecast(
    config: &Option<PathBuf>,
    store: &RuleStore,
    input: &Path,
    params: &ForecastParams,
    json: bool,
) -> Result<()> {
    let rows = load_categorized(config, store, input)?;
    let (total, mut by_category) = forecast_report(&rows, params)?;
    sort_by_avg_spend(&mut by_category);

    if json {
        let out = serde_json::json!({
            "months_lookback": params.months_lookback,
            "total": total,
            "by_category": by_category,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("📈 Spend forecast (last {} months)", params.months_lookback);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match &total {
        Some(f) => println!("Total: {}", describe(f)),
        None => println!("Total: no spending history"),
    }
    if !by_category.is_empty() {
        println!("\nBy category:");
        for c in &by_category {
            println!("  - {}: {}", c.category, describe(&c.forecast));
        }
    }
    Ok(())
}

fn describe(f: &ForecastResult) -> String {
    format!(
        "{} (range {} to {}, ±{}, {} months)",
        money(f.avg_spend),
        money(f.confidence_low),
        money(f.confidence_high),
        money(f.std_dev),
        f.num_months
    )
}

fn cmd_summary(
    config: &Option<PathBuf>,
    store: &RuleStore,
    input: &Path,
    json: bool,
) -> Result<()> {
    let rows = load_categorized(config, store, input)?;
    let summary = summarize(&rows);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

fn cmd_top(
    config: &Option<PathBuf>,
    store: &RuleStore,
    input: &Path,
    query: &TopQuery,
) -> Result<()> {
    let rows = load_categorized(config, store, input)?;
    let top = top_transactions(&rows, query);
    if top.is_empty() {
        println!("No transactions match.");
        return Ok(());
    }

    for r in top {
        println!(
            "{}  {:>12}  {:<14} {:<10} {}  [{}]",
            r.date(),
            money(r.amount_spend()),
            r.category,
            r.category_source.as_str(),
            r.row.txn.description,
            r.row.txn_id.get(..12).unwrap_or(&r.row.txn_id)
        );
    }
    Ok(())
}

fn cmd_override(store: &RuleStore, action: OverrideAction) -> Result<()> {
    match action {
        OverrideAction::Merchant {
            merchant,
            category,
            remove,
        } => {
            if remove {
                let removed = store
                    .remove_merchant_override(&merchant)
                    .context("Failed to update merchant overrides")?;
                if removed {
                    println!("✓ Removed merchant rule '{}'", merchant);
                } else {
                    println!("No merchant rule '{}'", merchant);
                }
            } else {
                let category = category.context("Category is required")?;
                store
                    .set_merchant_override(&merchant, &category)
                    .context("Failed to update merchant overrides")?;
                println!("✓ '{}' → {}", merchant, category);
            }
        }
        OverrideAction::OneOff {
            txn_id,
            category,
            remove,
        } => {
            if remove {
                let removed = store
                    .remove_one_off_override(&txn_id)
                    .context("Failed to update one-off overrides")?;
                if removed {
                    println!("✓ Removed one-off override for {}", txn_id);
                } else {
                    println!("No one-off override for {}", txn_id);
                }
            } else {
                let category = category.context("Category is required")?;
                store
                    .set_one_off_override(&txn_id, &category)
                    .context("Failed to update one-off overrides")?;
                println!("✓ {} → {}", txn_id, category);
            }
        }
    }
    Ok(())
}
