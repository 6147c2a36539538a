// 🧭 Categorization Engine
// Layered decision cascade. Each layer either decides or passes; the first
// layer that decides wins, and its source is recorded for auditing.
//
//   1. credit    - money in is never spending
//   2. one_off   - user fix for exactly this transaction
//   3. merchant  - user rule for every transaction of a merchant
//   4. bank      - bank-supplied category
//   5. rule      - keyword contained in description + merchant
//   6. fuzzy     - keyword nearly contained (partial ratio ≥ threshold)
//   7. other     - default

use crate::bank_category::BankCategoryMapper;
use crate::config::CategorizerConfig;
use crate::fuzzy::partial_ratio;
use crate::merchant::{extractor_for, MerchantExtractor};
use crate::normalize::normalize_text;
use crate::rules::{RuleSnapshot, RuleStore};
use crate::transaction::{CategorizedTransaction, NormalizedTransaction, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

/// Category given to credits; dropped from spending views
pub const EXCLUDE_CATEGORY: &str = "EXCLUDE";

/// Category when no layer decides
pub const DEFAULT_CATEGORY: &str = "Other";

// ============================================================================
// DECISION RESULT
// ============================================================================

/// Which layer produced a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Credit,
    OneOff,
    Merchant,
    Bank,
    Rule,
    Fuzzy,
    Other,
}

impl CategorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategorySource::Credit => "credit",
            CategorySource::OneOff => "one_off",
            CategorySource::Merchant => "merchant",
            CategorySource::Bank => "bank",
            CategorySource::Rule => "rule",
            CategorySource::Fuzzy => "fuzzy",
            CategorySource::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub category: String,
    pub source: CategorySource,
}

impl CategoryAssignment {
    fn new(category: impl Into<String>, source: CategorySource) -> Self {
        CategoryAssignment {
            category: category.into(),
            source,
        }
    }
}

// ============================================================================
// LAYERS
// ============================================================================

type Layer = fn(&Categorizer, &NormalizedTransaction, &RuleSnapshot) -> Option<String>;

/// Evaluated top to bottom, short-circuit on first hit
const LAYERS: &[(CategorySource, Layer)] = &[
    (CategorySource::Credit, credit_layer),
    (CategorySource::OneOff, one_off_layer),
    (CategorySource::Merchant, merchant_layer),
    (CategorySource::Bank, bank_layer),
    (CategorySource::Rule, keyword_layer),
    (CategorySource::Fuzzy, fuzzy_layer),
];

fn credit_layer(_: &Categorizer, row: &NormalizedTransaction, _: &RuleSnapshot) -> Option<String> {
    row.txn.is_credit().then(|| EXCLUDE_CATEGORY.to_string())
}

fn one_off_layer(_: &Categorizer, row: &NormalizedTransaction, rules: &RuleSnapshot) -> Option<String> {
    rules.one_off.get(&row.txn_id).map(|c| c.to_string())
}

fn merchant_layer(_: &Categorizer, row: &NormalizedTransaction, rules: &RuleSnapshot) -> Option<String> {
    rules.merchant.find(&row.merchant).map(|c| c.to_string())
}

fn bank_layer(_: &Categorizer, row: &NormalizedTransaction, _: &RuleSnapshot) -> Option<String> {
    (!row.bank_category_clean.is_empty()).then(|| row.bank_category_clean.clone())
}

fn keyword_layer(c: &Categorizer, row: &NormalizedTransaction, _: &RuleSnapshot) -> Option<String> {
    let hay = haystack(row);
    c.keywords
        .iter()
        .find(|(kw, _)| hay.contains(kw.as_str()))
        .map(|(_, category)| category.clone())
}

fn fuzzy_layer(c: &Categorizer, row: &NormalizedTransaction, _: &RuleSnapshot) -> Option<String> {
    if !c.fuzzy_enabled {
        return None;
    }
    let hay = haystack(row);
    if hay.is_empty() {
        return None;
    }

    // Strictly-greater keeps the earliest keyword on ties
    let mut best: Option<(f64, &String)> = None;
    for (kw, category) in &c.keywords {
        let score = partial_ratio(&hay, kw);
        if best.map_or(true, |(b, _)| score > b) {
            best = Some((score, category));
        }
    }

    match best {
        Some((score, category)) if score >= c.fuzzy_threshold => {
            debug!(haystack = %hay, score, category = %category, "Fuzzy keyword match");
            Some(category.clone())
        }
        _ => None,
    }
}

fn haystack(row: &NormalizedTransaction) -> String {
    normalize_text(&format!("{} {}", row.description_norm, row.merchant))
}

// ============================================================================
// CATEGORIZER
// ============================================================================

/// Categorization engine built from one configuration
///
/// Holds no per-run state; every call is a pure function of the input rows
/// and the rule snapshot passed in.
pub struct Categorizer {
    keywords: Vec<(String, String)>,
    fuzzy_enabled: bool,
    fuzzy_threshold: f64,
    extractor: Box<dyn MerchantExtractor>,
    bank_mapper: BankCategoryMapper,
}

impl Categorizer {
    pub fn new(config: &CategorizerConfig) -> Self {
        // Empty keywords would match every description
        let keywords = config
            .keyword_rules
            .iter()
            .map(|r| (normalize_text(&r.keyword), r.category.trim().to_string()))
            .filter(|(kw, _)| !kw.is_empty())
            .collect();

        Categorizer {
            keywords,
            fuzzy_enabled: config.fuzzy_enabled,
            fuzzy_threshold: config.fuzzy_threshold,
            extractor: extractor_for(config.strict_merchant),
            bank_mapper: BankCategoryMapper::from_config(config),
        }
    }

    /// Derive description_norm, merchant, bank_category_clean and txn_id
    pub fn normalize(&self, txn: Transaction) -> NormalizedTransaction {
        NormalizedTransaction::from_transaction(txn, self.extractor.as_ref(), &self.bank_mapper)
    }

    /// Run the layer cascade for one transaction
    pub fn decide(&self, row: &NormalizedTransaction, rules: &RuleSnapshot) -> CategoryAssignment {
        for (source, layer) in LAYERS {
            if let Some(category) = layer(self, row, rules) {
                return CategoryAssignment::new(category, *source);
            }
        }
        CategoryAssignment::new(DEFAULT_CATEGORY, CategorySource::Other)
    }

    pub fn categorize(&self, txn: Transaction, rules: &RuleSnapshot) -> CategorizedTransaction {
        let row = self.normalize(txn);
        let assignment = self.decide(&row, rules);
        CategorizedTransaction::new(row, assignment)
    }

    /// Categorize a whole batch against one rule snapshot
    pub fn categorize_batch(
        &self,
        txns: Vec<Transaction>,
        rules: &RuleSnapshot,
    ) -> Vec<CategorizedTransaction> {
        let out: Vec<_> = txns.into_iter().map(|t| self.categorize(t, rules)).collect();
        log_sources(&out);
        out
    }

    /// Same result as [`categorize_batch`](Self::categorize_batch), rows
    /// spread over a rayon pool. Output keeps input order.
    ///
    /// `workers == 0` uses the global pool (one thread per core), `1` stays
    /// on the calling thread.
    pub fn categorize_batch_parallel(
        &self,
        txns: Vec<Transaction>,
        rules: &RuleSnapshot,
        workers: usize,
    ) -> Vec<CategorizedTransaction> {
        if workers == 1 || txns.len() < 2 {
            return self.categorize_batch(txns, rules);
        }

        let categorize_all = || -> Vec<CategorizedTransaction> {
            txns.into_par_iter()
                .map(|t| self.categorize(t, rules))
                .collect()
        };

        let out = if workers == 0 {
            categorize_all()
        } else {
            match ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(categorize_all),
                Err(e) => {
                    warn!(error = %e, workers, "Could not build worker pool, using global pool");
                    categorize_all()
                }
            }
        };

        log_sources(&out);
        out
    }

    /// Load a fresh snapshot from the store, then categorize
    ///
    /// Rules edited between runs take effect on the next call.
    pub fn run(&self, txns: Vec<Transaction>, store: &RuleStore) -> Vec<CategorizedTransaction> {
        let rules = store.snapshot();
        debug!(
            merchant_rules = rules.merchant.len(),
            one_off_rules = rules.one_off.len(),
            "Loaded rule snapshot"
        );
        self.categorize_batch(txns, &rules)
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Categorizer::new(&CategorizerConfig::default())
    }
}

fn log_sources(rows: &[CategorizedTransaction]) {
    let mut by_source: BTreeMap<CategorySource, usize> = BTreeMap::new();
    for r in rows {
        *by_source.entry(r.category_source).or_insert(0) += 1;
    }
    let breakdown = by_source
        .iter()
        .map(|(s, n)| format!("{}={}", s.as_str(), n))
        .collect::<Vec<_>>()
        .join(" ");
    info!(rows = rows.len(), sources = %breakdown, "Categorized batch");
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{MerchantOverrides, OneOffOverrides};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn starbucks() -> Transaction {
        Transaction::new(date(2024, 3, 5), "STARBUCKS STORE 123", -5.75)
    }

    fn snapshot(merchant: &[(&str, &str)], one_off: &[(&str, &str)]) -> RuleSnapshot {
        let mut m = MerchantOverrides::new();
        for (k, v) in merchant {
            m.insert(k, v);
        }
        let mut o = OneOffOverrides::new();
        for (k, v) in one_off {
            o.insert(k, v);
        }
        RuleSnapshot::new(m, o)
    }

    #[test]
    fn test_starbucks_scenario() {
        let c = Categorizer::default();
        let out = c.categorize(starbucks(), &RuleSnapshot::empty());

        assert_eq!(out.amount_spend(), 5.75);
        assert!(out.row.merchant.contains("starbucks"));
        assert_eq!(out.category, "Dining");
        assert_eq!(out.category_source, CategorySource::Rule);
    }

    #[test]
    fn test_paycheck_is_excluded() {
        let c = Categorizer::default();
        let txn = Transaction::new(date(2024, 3, 15), "STARBUCKS PAYROLL DEPOSIT", 1200.0)
            .with_bank_category("Restaurants");
        let out = c.categorize(txn, &RuleSnapshot::empty());

        assert_eq!(out.category, EXCLUDE_CATEGORY);
        assert_eq!(out.category_source, CategorySource::Credit);
    }

    #[test]
    fn test_credit_beats_one_off_override() {
        let c = Categorizer::default();
        let txn = Transaction::new(date(2024, 3, 15), "REFUND AMAZON", 40.0);
        let id = c.normalize(txn.clone()).txn_id;
        let rules = snapshot(&[("refund amazon", "Shopping")], &[(id.as_str(), "Travel")]);

        let out = c.categorize(txn, &rules);
        assert_eq!(out.category, EXCLUDE_CATEGORY);
        assert_eq!(out.category_source, CategorySource::Credit);
    }

    #[test]
    fn test_one_off_beats_merchant_override() {
        let c = Categorizer::default();
        let id = c.normalize(starbucks()).txn_id;
        let rules = snapshot(&[("starbucks", "Shopping")], &[(id.as_str(), "Travel")]);

        let out = c.categorize(starbucks(), &rules);
        assert_eq!(out.category, "Travel");
        assert_eq!(out.category_source, CategorySource::OneOff);
    }

    #[test]
    fn test_one_off_only_hits_its_transaction() {
        let c = Categorizer::default();
        let id = c.normalize(starbucks()).txn_id;
        let rules = snapshot(&[], &[(id.as_str(), "Travel")]);

        let other = Transaction::new(date(2024, 3, 6), "STARBUCKS STORE 123", -5.75);
        let out = c.categorize(other, &rules);
        assert_eq!(out.category, "Dining");
        assert_eq!(out.category_source, CategorySource::Rule);
    }

    #[test]
    fn test_merchant_override_beats_bank_and_keywords() {
        let c = Categorizer::default();
        let txn = starbucks().with_bank_category("Restaurants");
        let rules = snapshot(&[("starbucks", "Coffee")], &[]);

        let out = c.categorize(txn, &rules);
        assert_eq!(out.category, "Coffee");
        assert_eq!(out.category_source, CategorySource::Merchant);
    }

    #[test]
    fn test_bank_beats_keywords() {
        let c = Categorizer::default();
        let txn = starbucks().with_bank_category("Groceries");
        let out = c.categorize(txn, &RuleSnapshot::empty());
        assert_eq!(out.category, "Groceries");
        assert_eq!(out.category_source, CategorySource::Bank);
    }

    #[test]
    fn test_unknown_bank_label_falls_through() {
        let c = Categorizer::default();
        let txn = starbucks().with_bank_category("Uncategorized");
        let out = c.categorize(txn, &RuleSnapshot::empty());
        assert_eq!(out.row.bank_category_clean, "");
        assert_eq!(out.category_source, CategorySource::Rule);
    }

    #[test]
    fn test_keyword_first_match_in_table_order() {
        let config = CategorizerConfig::default()
            .with_keywords(&[("coffee", "Dining"), ("beans", "Groceries")]);
        let c = Categorizer::new(&config);
        let txn = Transaction::new(date(2024, 1, 2), "COFFEE BEANS CO", -12.0);
        assert_eq!(c.categorize(txn, &RuleSnapshot::empty()).category, "Dining");

        let config = CategorizerConfig::default()
            .with_keywords(&[("beans", "Groceries"), ("coffee", "Dining")]);
        let c = Categorizer::new(&config);
        let txn = Transaction::new(date(2024, 1, 2), "COFFEE BEANS CO", -12.0);
        assert_eq!(c.categorize(txn, &RuleSnapshot::empty()).category, "Groceries");
    }

    #[test]
    fn test_fuzzy_match() {
        let config = CategorizerConfig::default()
            .with_keywords(&[("starbucks", "Dining"), ("netflix", "Entertainment")]);
        let c = Categorizer::new(&config);
        let txn = Transaction::new(date(2024, 1, 2), "STARBUCK COFFEE", -4.0);

        let out = c.categorize(txn, &RuleSnapshot::empty());
        assert_eq!(out.category, "Dining");
        assert_eq!(out.category_source, CategorySource::Fuzzy);
    }

    #[test]
    fn test_fuzzy_threshold_and_toggle() {
        let mut config = CategorizerConfig::default()
            .with_keywords(&[("starbucks", "Dining"), ("netflix", "Entertainment")]);
        config.fuzzy_threshold = 99.0;
        let c = Categorizer::new(&config);
        let txn = Transaction::new(date(2024, 1, 2), "STARBUCK COFFEE", -4.0);
        assert_eq!(c.categorize(txn.clone(), &RuleSnapshot::empty()).category_source, CategorySource::Other);

        let mut config = CategorizerConfig::default().with_keywords(&[("starbucks", "Dining")]);
        config.fuzzy_enabled = false;
        let c = Categorizer::new(&config);
        assert_eq!(c.categorize(txn, &RuleSnapshot::empty()).category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_default_other() {
        let c = Categorizer::default();
        let txn = Transaction::new(date(2024, 1, 2), "CITY PARKING GARAGE 77", -20.0);
        let out = c.categorize(txn, &RuleSnapshot::empty());
        assert_eq!(out.category, "Other");
        assert_eq!(out.category_source, CategorySource::Other);
    }

    #[test]
    fn test_empty_description_is_other() {
        let c = Categorizer::default();
        let txn = Transaction::new(date(2024, 1, 2), "", -20.0);
        let out = c.categorize(txn, &RuleSnapshot::empty());
        assert_eq!(out.row.merchant, "");
        assert_eq!(out.category_source, CategorySource::Other);
    }

    #[test]
    fn test_rerun_is_identical() {
        let c = Categorizer::default();
        let rules = snapshot(&[("amazon", "Shopping")], &[]);
        let batch = vec![
            starbucks(),
            Transaction::new(date(2024, 3, 7), "AMAZON MKTPLACE", -31.2),
            Transaction::new(date(2024, 3, 8), "ACME PAYROLL", 2500.0),
            Transaction::new(date(2024, 3, 9), "MYSTERY SHOP", -9.0).with_bank_category("Pet Care"),
        ];

        let first = c.categorize_batch(batch.clone(), &rules);
        let second = c.categorize_batch(batch, &rules);
        assert_eq!(first, second);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.row.txn_id, b.row.txn_id);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let c = Categorizer::default();
        let batch: Vec<Transaction> = (1..=25)
            .map(|d| {
                let desc = if d % 3 == 0 { "UBER TRIP" } else { "KROGER 221" };
                Transaction::new(date(2024, 5, d), desc, -(d as f64))
            })
            .collect();
        let rules = RuleSnapshot::empty();

        let seq = c.categorize_batch(batch.clone(), &rules);
        for workers in [0, 1, 2, 4, 7, 64] {
            assert_eq!(c.categorize_batch_parallel(batch.clone(), &rules, workers), seq);
        }
    }

    #[test]
    fn test_parallel_applies_overrides_in_order() {
        let c = Categorizer::default();
        let batch: Vec<Transaction> = (1..=40)
            .map(|d| {
                let desc = if d % 2 == 0 { "BLUE BOTTLE COFFEE" } else { "HULU 88" };
                Transaction::new(date(2024, 1, 1 + (d % 28)), desc, -(d as f64))
            })
            .collect();
        let mut merchant = MerchantOverrides::new();
        merchant.insert("blue bottle", "Dining");
        let rules = RuleSnapshot::new(merchant, OneOffOverrides::new());

        let out = c.categorize_batch_parallel(batch, &rules, 3);
        assert_eq!(out.len(), 40);
        for (i, row) in out.iter().enumerate() {
            assert_eq!(row.amount_spend(), (i + 1) as f64);
            if (i + 1) % 2 == 0 {
                assert_eq!(row.category_source, CategorySource::Merchant);
            } else {
                assert_eq!(row.category, "Entertainment");
            }
        }
    }

    #[test]
    fn test_run_reads_store_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::new(dir.path().join("o.json"), dir.path().join("one.csv"));
        let c = Categorizer::default();

        let out = c.run(vec![starbucks()], &store);
        assert_eq!(out[0].category, "Dining");

        store.set_merchant_override("starbucks", "Coffee").unwrap();
        let out = c.run(vec![starbucks()], &store);
        assert_eq!(out[0].category, "Coffee");
        assert_eq!(out[0].category_source, CategorySource::Merchant);
    }
}
