// Spend Forecast - Core Library
// Categorize cleaned transaction batches and forecast monthly spend.
// Exposes all modules for use in the CLI and tests.

pub mod bank_category;
pub mod categorize;
pub mod config;
pub mod error;
pub mod forecast;
pub mod fuzzy;
pub mod merchant;
pub mod normalize;
pub mod report;
pub mod rules;
pub mod transaction;

// Re-export commonly used types
pub use bank_category::BankCategoryMapper;
pub use categorize::{
    CategoryAssignment, CategorySource, Categorizer, DEFAULT_CATEGORY, EXCLUDE_CATEGORY,
};
pub use config::{BankLabelRule, CategorizerConfig, KeywordRule};
pub use error::{Error, Result};
pub use forecast::{
    apply_exclusions, forecast_by_category, forecast_report, forecast_total, monthly_totals,
    monthly_totals_by_category, remove_outliers, CategoryForecast, ForecastParams,
    ForecastResult, YearMonth,
};
pub use merchant::{extractor_for, BasicExtractor, MerchantExtractor, StrictExtractor};
pub use normalize::normalize_text;
pub use report::{sort_by_avg_spend, summarize, top_transactions, SpendSummary, TopQuery};
pub use rules::{MerchantOverrides, OneOffOverrides, RuleSnapshot, RuleStore};
pub use transaction::{
    compute_txn_id, load_batch, read_batch, write_categorized, CategorizedTransaction,
    NormalizedTransaction, Transaction,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
