use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use data_loader::combined::{AssetSheet, CombinedData};
use log::warn;
use polars::prelude::*;

use crate::error::EngineError;
use crate::prediction_log::read_log;

/// Outcome of evaluating logged predictions against freshly loaded prices.
#[derive(Debug)]
pub enum Evaluation {
    /// The prediction log does not exist yet.
    NoLogFile,
    /// The log exists but holds no row older than the threshold.
    NothingStale { threshold_days: i64 },
    /// Stale rows exist but none could be matched against fresh data.
    NoMatches { skipped: usize },
    Report(EvaluationReport),
}

#[derive(Debug)]
pub struct EvaluationReport {
    pub details: Vec<EvalDetail>,
    pub mean_absolute_error: f64,
    /// Stale rows whose asset was missing from the fresh data.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct EvalDetail {
    pub coin: String,
    pub predicted_price: f64,
    pub actual_price: f64,
    pub error: f64,
    pub logged_at: NaiveDateTime,
}

impl EvaluationReport {
    /// Tabular view of the per-row errors for display.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let coin: Vec<String> = self.details.iter().map(|d| d.coin.clone()).collect();
        let predicted: Vec<f64> = self.details.iter().map(|d| d.predicted_price).collect();
        let actual: Vec<f64> = self.details.iter().map(|d| d.actual_price).collect();
        let error: Vec<f64> = self.details.iter().map(|d| d.error).collect();
        let logged_at: Vec<String> = self
            .details
            .iter()
            .map(|d| d.logged_at.format("%Y-%m-%d %H:%M:%S").to_string())
            .collect();
        DataFrame::new(vec![
            Series::new("coin", coin),
            Series::new("predicted_price", predicted),
            Series::new("actual_price", actual),
            Series::new("error", error),
            Series::new("logged_at", logged_at),
        ])
    }
}

/// Compare logged predictions older than the threshold against the latest
/// known price for each asset. A missing asset is skipped with a warning and
/// the aggregate is computed over the rest.
pub fn evaluate_predictions<P: AsRef<Path>>(
    log_path: P,
    threshold_days: i64,
    fresh: &CombinedData,
    now: NaiveDateTime,
) -> Result<Evaluation, EngineError> {
    let log_path = log_path.as_ref();
    if !log_path.exists() {
        return Ok(Evaluation::NoLogFile);
    }

    let log = read_log(log_path)?;
    let cutoff = now - Duration::days(threshold_days);
    let stale: Vec<_> = log.iter().filter(|row| row.date <= cutoff).collect();
    if stale.is_empty() {
        return Ok(Evaluation::NothingStale { threshold_days });
    }

    let mut details = Vec::new();
    let mut skipped = 0usize;
    for row in stale {
        match fresh.get(&row.coin).and_then(latest_price) {
            Some(actual_price) => {
                details.push(EvalDetail {
                    coin: row.coin.clone(),
                    predicted_price: row.price,
                    actual_price,
                    error: actual_price - row.price,
                    logged_at: row.date,
                });
            }
            None => {
                warn!("Could not retrieve fresh data for coin {}", row.coin);
                skipped += 1;
            }
        }
    }

    if details.is_empty() {
        return Ok(Evaluation::NoMatches { skipped });
    }

    let mean_absolute_error =
        details.iter().map(|d| d.error.abs()).sum::<f64>() / details.len() as f64;
    Ok(Evaluation::Report(EvaluationReport {
        details,
        mean_absolute_error,
        skipped,
    }))
}

fn latest_price(sheet: &AssetSheet) -> Option<f64> {
    sheet
        .float_values("price")?
        .into_iter()
        .rev()
        .flatten()
        .next()
}
