// ⚙️ Categorizer Configuration - Rules as Data
// Keyword table, bank label table and fuzzy settings travel together in one
// explicit object so different rule sets can be tested side by side.

use crate::normalize::normalize_text;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default minimum partial-ratio score (0-100) for a fuzzy keyword hit
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 90.0;

// ============================================================================
// RULE ENTRIES
// ============================================================================

/// Description keyword → category. Matched in list order, first hit wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub category: String,
}

/// Bank-supplied label → canonical category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankLabelRule {
    pub label: String,
    pub category: String,
}

// ============================================================================
// CONFIGURATION OBJECT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    /// Ordered keyword table (exact substring layer + fuzzy layer)
    pub keyword_rules: Vec<KeywordRule>,

    /// Ordered bank label table
    pub bank_category_map: Vec<BankLabelRule>,

    /// Labels meaning "the bank didn't categorize this"
    pub bank_unknown_labels: Vec<String>,

    /// Fuzzy layer on/off
    pub fuzzy_enabled: bool,

    /// Minimum score (0-100) for a fuzzy hit
    pub fuzzy_threshold: f64,

    /// Strip digits inside merchant tokens
    pub strict_merchant: bool,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        CategorizerConfig {
            keyword_rules: default_keyword_rules(),
            bank_category_map: default_bank_category_map(),
            bank_unknown_labels: default_bank_unknown_labels(),
            fuzzy_enabled: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            strict_merchant: false,
        }
    }
}

impl CategorizerConfig {
    /// Load configuration from a JSON file. Fields left out keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: CategorizerConfig =
            serde_json::from_str(&content).context("Failed to parse categorizer config JSON")?;

        Ok(config)
    }

    /// Same tables, custom keyword list
    pub fn with_keywords(mut self, rules: &[(&str, &str)]) -> Self {
        self.keyword_rules = pairs(rules)
            .into_iter()
            .map(|(keyword, category)| KeywordRule { keyword, category })
            .collect();
        self
    }

    /// Add or replace one bank label mapping (e.g. "health" → "Groceries")
    ///
    /// Labels compare after normalization, so "Health" replaces "health".
    pub fn with_bank_label(mut self, label: &str, category: &str) -> Self {
        let key = normalize_text(label);
        if let Some(existing) = self
            .bank_category_map
            .iter_mut()
            .find(|r| normalize_text(&r.label) == key)
        {
            existing.category = category.to_string();
        } else {
            self.bank_category_map.push(BankLabelRule {
                label: label.to_string(),
                category: category.to_string(),
            });
        }
        self
    }
}

// ============================================================================
// DEFAULT TABLES
// ============================================================================

fn default_keyword_rules() -> Vec<KeywordRule> {
    pairs(&[
        // groceries
        ("whole foods", "Groceries"),
        ("trader joe", "Groceries"),
        ("aldi", "Groceries"),
        ("kroger", "Groceries"),
        ("instacart", "Groceries"),
        // dining / coffee
        ("starbucks", "Dining"),
        ("dunkin", "Dining"),
        ("chipotle", "Dining"),
        ("ubereats", "Dining"),
        ("doordash", "Dining"),
        // transport
        ("uber", "Transport"),
        ("lyft", "Transport"),
        ("shell", "Transport"),
        ("chevron", "Transport"),
        ("exxon", "Transport"),
        ("bp", "Transport"),
        // shopping
        ("amazon", "Shopping"),
        ("target", "Shopping"),
        ("walmart", "Shopping"),
        ("ikea", "Shopping"),
        // entertainment
        ("netflix", "Entertainment"),
        ("spotify", "Entertainment"),
        ("hulu", "Entertainment"),
    ])
    .into_iter()
    .map(|(keyword, category)| KeywordRule { keyword, category })
    .collect()
}

fn default_bank_category_map() -> Vec<BankLabelRule> {
    pairs(&[
        ("food & drink", "Dining"),
        ("restaurants", "Dining"),
        ("dining out", "Dining"),
        ("coffee", "Dining"),
        ("groceries", "Groceries"),
        ("supermarkets", "Groceries"),
        ("bills & utilities", "Bills"),
        ("utilities", "Bills"),
        ("internet", "Bills"),
        ("mobile", "Bills"),
        ("transportation", "Transport"),
        ("transport", "Transport"),
        ("gas", "Transport"),
        ("fuel", "Transport"),
        ("rideshare", "Transport"),
        ("entertainment", "Entertainment"),
        ("subscriptions", "Entertainment"),
        ("streaming", "Entertainment"),
        ("shopping", "Shopping"),
        ("retail", "Shopping"),
        ("electronics", "Shopping"),
        ("health & wellness", "Health"),
        ("health", "Health"),
        ("pharmacy", "Health"),
        ("home", "Home"),
        ("rent", "Home"),
        ("education", "Education"),
        ("professional services", "Services"),
        ("personal", "Personal"),
        ("gifts & donations", "Gifts"),
        ("finance", "Finance"),
        ("fees", "Finance"),
        ("travel", "Travel"),
    ])
    .into_iter()
    .map(|(label, category)| BankLabelRule { label, category })
    .collect()
}

fn default_bank_unknown_labels() -> Vec<String> {
    [
        "", "nan", "none", "uncategorized", "unknown", "other", "misc", "miscellaneous",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
