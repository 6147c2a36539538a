// 📈 Forecasting Engine
// Monthly spend forecast from recent history:
//   1. group spend by calendar month (overall or per category)
//   2. keep the trailing N months present in the data
//   3. trim IQR outliers from the monthly totals
//   4. report mean ± one standard deviation
//
// Pure functions of (batch, parameters). Nothing is cached or persisted.

use crate::categorize::EXCLUDE_CATEGORY;
use crate::error::{Error, Result};
use crate::transaction::CategorizedTransaction;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Category never counted as spending by the forecast
pub const TRANSFER_CATEGORY: &str = "Transfer";

/// Standard Tukey fence multiplier
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Below this many points quartiles are too unstable to trim anything
pub const MIN_OUTLIER_SAMPLE: usize = 4;

pub const DEFAULT_MONTHS_LOOKBACK: usize = 3;

// ============================================================================
// CALENDAR MONTH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(YearMonth { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    /// Parses "YYYY-MM"
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidParameter(format!("expected YYYY-MM, got {:?}", s));
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub avg_spend: f64,
    pub std_dev: f64,
    pub min_spend: f64,
    pub max_spend: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    /// Months retained after outlier removal
    pub num_months: usize,
}

impl ForecastResult {
    /// Statistics over already-trimmed monthly totals. None for an empty series.
    pub fn from_series(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let avg = mean(values);
        let std = sample_std_dev(values);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(ForecastResult {
            avg_spend: avg,
            std_dev: std,
            min_spend: min,
            max_spend: max,
            confidence_low: avg - std,
            confidence_high: avg + std,
            num_months: values.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryForecast {
    pub category: String,
    #[serde(flatten)]
    pub forecast: ForecastResult,
}

// ============================================================================
// OUTLIER REMOVAL
// ============================================================================

/// Drop values outside [Q1 - k·IQR, Q3 + k·IQR], keeping input order
///
/// - fewer than 4 points → returned unchanged
/// - if every point would be dropped → the input comes back unchanged
pub fn remove_outliers(data: &[f64], multiplier: f64) -> Vec<f64> {
    if data.len() < MIN_OUTLIER_SAMPLE {
        return data.to_vec();
    }

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - multiplier * iqr;
    let upper = q3 + multiplier * iqr;

    let kept: Vec<f64> = data
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect();

    if kept.is_empty() {
        return data.to_vec();
    }
    if kept.len() < data.len() {
        debug!(
            dropped = data.len() - kept.len(),
            lower, upper, "Trimmed outlier months"
        );
    }
    kept
}

/// Quantile with linear interpolation between closest ranks
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n-1) standard deviation; exactly 0 below two points
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let var = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

// ============================================================================
// MONTHLY AGGREGATES
// ============================================================================

fn spending_rows(rows: &[CategorizedTransaction]) -> impl Iterator<Item = &CategorizedTransaction> {
    rows.iter().filter(|r| r.category != TRANSFER_CATEGORY)
}

/// Summed amount_spend per month, chronological. Transfers excluded.
pub fn monthly_totals(rows: &[CategorizedTransaction]) -> Vec<(YearMonth, f64)> {
    let mut totals: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for r in spending_rows(rows) {
        *totals.entry(YearMonth::of(r.date())).or_insert(0.0) += r.amount_spend();
    }
    totals.into_iter().collect()
}

/// Summed amount_spend per (category, month). Transfers excluded.
pub fn monthly_totals_by_category(
    rows: &[CategorizedTransaction],
) -> BTreeMap<String, Vec<(YearMonth, f64)>> {
    let mut totals: BTreeMap<String, BTreeMap<YearMonth, f64>> = BTreeMap::new();
    for r in spending_rows(rows) {
        *totals
            .entry(r.category.clone())
            .or_default()
            .entry(YearMonth::of(r.date()))
            .or_insert(0.0) += r.amount_spend();
    }
    totals
        .into_iter()
        .map(|(cat, months)| (cat, months.into_iter().collect()))
        .collect()
}

/// The last `n` months that actually appear in the data
fn trailing_months(rows: &[CategorizedTransaction], n: usize) -> BTreeSet<YearMonth> {
    let months: BTreeSet<YearMonth> = spending_rows(rows).map(|r| YearMonth::of(r.date())).collect();
    let skip = months.len().saturating_sub(n);
    months.into_iter().skip(skip).collect()
}

fn check_lookback(months_lookback: usize) -> Result<()> {
    if months_lookback == 0 {
        return Err(Error::InvalidParameter(
            "months_lookback must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// FORECASTS
// ============================================================================

/// Forecast total monthly spend
///
/// Ok(None) when the batch is empty or has no spending months. That is a
/// distinct outcome from a forecast of zero.
pub fn forecast_total(
    rows: &[CategorizedTransaction],
    months_lookback: usize,
) -> Result<Option<ForecastResult>> {
    check_lookback(months_lookback)?;

    let totals = monthly_totals(rows);
    let skip = totals.len().saturating_sub(months_lookback);
    let series: Vec<f64> = totals.into_iter().skip(skip).map(|(_, v)| v).collect();
    if series.is_empty() {
        return Ok(None);
    }

    let kept = remove_outliers(&series, IQR_MULTIPLIER);
    Ok(ForecastResult::from_series(&kept))
}

/// Forecast monthly spend for each category independently
///
/// Categories come back in name order; ranking them is up to the caller.
pub fn forecast_by_category(
    rows: &[CategorizedTransaction],
    months_lookback: usize,
) -> Result<Vec<CategoryForecast>> {
    check_lookback(months_lookback)?;

    let window = trailing_months(rows, months_lookback);
    if window.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for (category, months) in monthly_totals_by_category(rows) {
        let series: Vec<f64> = months
            .into_iter()
            .filter(|(m, _)| window.contains(m))
            .map(|(_, v)| v)
            .collect();

        let kept = remove_outliers(&series, IQR_MULTIPLIER);
        if let Some(forecast) = ForecastResult::from_series(&kept) {
            out.push(CategoryForecast { category, forecast });
        }
    }
    Ok(out)
}

// ============================================================================
// PRE-ENGINE FILTER
// ============================================================================

/// Caller-chosen exclusions, applied before the engine sees the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastParams {
    pub months_lookback: usize,
    pub exclude_months: Vec<YearMonth>,
    pub exclude_categories: Vec<String>,
}

impl Default for ForecastParams {
    fn default() -> Self {
        ForecastParams {
            months_lookback: DEFAULT_MONTHS_LOOKBACK,
            exclude_months: Vec::new(),
            exclude_categories: Vec::new(),
        }
    }
}

impl ForecastParams {
    pub fn new(months_lookback: usize) -> Self {
        ForecastParams {
            months_lookback,
            ..Default::default()
        }
    }
}

/// Drop credits (EXCLUDE), anomaly months and unwanted categories
pub fn apply_exclusions(
    rows: &[CategorizedTransaction],
    params: &ForecastParams,
) -> Vec<CategorizedTransaction> {
    rows.iter()
        .filter(|r| r.category != EXCLUDE_CATEGORY)
        .filter(|r| !params.exclude_months.contains(&YearMonth::of(r.date())))
        .filter(|r| !params.exclude_categories.iter().any(|c| *c == r.category))
        .cloned()
        .collect()
}

/// Exclusions + total forecast + per-category forecasts in one call
pub fn forecast_report(
    rows: &[CategorizedTransaction],
    params: &ForecastParams,
) -> Result<(Option<ForecastResult>, Vec<CategoryForecast>)> {
    let filtered = apply_exclusions(rows, params);
    let total = forecast_total(&filtered, params.months_lookback)?;
    let by_category = forecast_by_category(&filtered, params.months_lookback)?;
    Ok((total, by_category))
}

// ============================================================================
// TESTS
// ============================================================================
