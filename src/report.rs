// 📋 Spending reports
// Text summary of a categorized batch and a filtered "top transactions" view.

use crate::forecast::{CategoryForecast, YearMonth};
use crate::transaction::CategorizedTransaction;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    pub dollars: f64,
    /// Share of total spend, 0-100
    pub pct_of_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendSummary {
    pub total_rows: usize,
    pub total_spend: f64,
    /// Largest spend first
    pub by_category: Vec<CategoryTotal>,
    /// Chronological
    pub monthly: Vec<(YearMonth, f64)>,
}

pub fn summarize(rows: &[CategorizedTransaction]) -> SpendSummary {
    let total_spend: f64 = rows.iter().map(|r| r.amount_spend()).sum();

    let mut per_cat: HashMap<&str, (usize, f64)> = HashMap::new();
    let mut monthly: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for r in rows {
        let entry = per_cat.entry(r.category.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += r.amount_spend();
        *monthly.entry(YearMonth::of(r.date())).or_insert(0.0) += r.amount_spend();
    }

    let mut by_category: Vec<CategoryTotal> = per_cat
        .into_iter()
        .map(|(category, (count, dollars))| CategoryTotal {
            category: category.to_string(),
            count,
            dollars,
            pct_of_spend: if total_spend > 0.0 {
                100.0 * dollars / total_spend
            } else {
                0.0
            },
        })
        .collect();
    by_category.sort_by(|a, b| {
        b.dollars
            .total_cmp(&a.dollars)
            .then_with(|| a.category.cmp(&b.category))
    });

    SpendSummary {
        total_rows: rows.len(),
        total_spend,
        by_category,
        monthly: monthly.into_iter().collect(),
    }
}

impl fmt::Display for SpendSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total transactions: {}", self.total_rows)?;
        writeln!(f, "Total spend (expenses only): {}", money(self.total_spend))?;
        writeln!(f, "By category:")?;
        for c in &self.by_category {
            writeln!(
                f,
                "  - {}: {} txns, {} ({:.1}% of spend)",
                c.category,
                c.count,
                money(c.dollars),
                c.pct_of_spend
            )?;
        }
        write!(f, "Monthly total spend (expenses only):")?;
        for (month, total) in &self.monthly {
            write!(f, "\n  - {}: {}", month, money(*total))?;
        }
        Ok(())
    }
}

/// "$1,234.56"
pub fn money(v: f64) -> String {
    let sign = if v < 0.0 { "-" } else { "" };
    let cents = format!("{:.2}", v.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}${}.{}", sign, grouped, frac)
}

// ============================================================================
// TOP TRANSACTIONS
// ============================================================================

#[derive(Debug, Clone)]
pub struct TopQuery {
    pub category: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub min_spend: Option<f64>,
    pub max_spend: Option<f64>,
    /// Case-insensitive search in description and merchant
    pub search: Option<String>,
    pub limit: usize,
}

impl Default for TopQuery {
    fn default() -> Self {
        TopQuery {
            category: None,
            start: None,
            end: None,
            min_spend: None,
            max_spend: None,
            search: None,
            limit: 10,
        }
    }
}

impl TopQuery {
    fn matches(&self, r: &CategorizedTransaction) -> bool {
        if let Some(cat) = &self.category {
            if !r.category.eq_ignore_ascii_case(cat) {
                return false;
            }
        }
        if self.start.is_some_and(|s| r.date() < s) || self.end.is_some_and(|e| r.date() > e) {
            return false;
        }
        if self.min_spend.is_some_and(|m| r.amount_spend() < m)
            || self.max_spend.is_some_and(|m| r.amount_spend() > m)
        {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let in_desc = r.row.txn.description.to_lowercase().contains(&term);
            let in_merchant = r.row.merchant.to_lowercase().contains(&term);
            if !in_desc && !in_merchant {
                return false;
            }
        }
        true
    }
}

/// Largest spend first, newest first among equal amounts
pub fn top_transactions<'a>(
    rows: &'a [CategorizedTransaction],
    query: &TopQuery,
) -> Vec<&'a CategorizedTransaction> {
    let mut hits: Vec<&CategorizedTransaction> = rows.iter().filter(|r| query.matches(r)).collect();
    hits.sort_by(|a, b| {
        b.amount_spend()
            .total_cmp(&a.amount_spend())
            .then_with(|| b.date().cmp(&a.date()))
    });
    hits.truncate(query.limit);
    hits
}

// ============================================================================
// FORECAST PRESENTATION
// ============================================================================

/// Order per-category forecasts by average spend, largest first
pub fn sort_by_avg_spend(forecasts: &mut [CategoryForecast]) {
    forecasts.sort_by(|a, b| {
        b.forecast
            .avg_spend
            .total_cmp(&a.forecast.avg_spend)
            .then_with(|| a.category.cmp(&b.category))
    });
}

// ============================================================================
// TESTS
// ============================================================================
