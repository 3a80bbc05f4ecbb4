use std::cmp::Ordering;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use data_loader::combined::CombinedData;
use feature_processing::misc::{CoinFeatures, StockFeatures};
use feature_processing::processor::{extract_coin_features, extract_stock_features};
use log::{info, warn};
use ndarray::Array2;
use rayon::prelude::*;

use crate::config::{CryptoConfig, EquitiesConfig, RetryConfig};
use crate::error::EngineError;
use crate::kmeans::{silhouette_score, zscore_normalize, KMeans, KMeansFit};
use crate::misc::{
    PredictionRow, StockRow, CRYPTO_GROUP_LABELS, EQUITY_GROUP_LABELS, EQUITY_OVERFLOW_LABEL,
};
use crate::sampler::sample_group_indices;

/// Probability-group labels derived from a fitted partition: one label per
/// row, plus the distinct labels in rank order for downstream grouping.
#[derive(Debug, Clone)]
pub struct GroupAssignment {
    pub per_row: Vec<String>,
    pub order: Vec<String>,
}

/// Rank clusters by mean price change, descending, and hand out ordinal
/// labels in that order. Ties rank by ascending cluster id so repeated runs
/// agree. Clusters past the label list share the overflow label.
pub fn map_clusters_to_groups(
    labels: &[usize],
    price_change: &[f64],
    group_labels: &[&str],
    overflow: &str,
) -> GroupAssignment {
    let mut sums: HashMap<usize, (f64, usize)> = HashMap::new();
    for (&cluster, &change) in labels.iter().zip(price_change) {
        let entry = sums.entry(cluster).or_insert((0.0, 0));
        entry.0 += change;
        entry.1 += 1;
    }

    let mut ranked: Vec<(usize, f64)> = sums
        .into_iter()
        .map(|(cluster, (sum, count))| (cluster, sum / count as f64))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut mapping: HashMap<usize, &str> = HashMap::new();
    let mut order = Vec::new();
    for (rank, (cluster, _)) in ranked.iter().enumerate() {
        let name = if rank < group_labels.len() {
            group_labels[rank]
        } else {
            overflow
        };
        mapping.insert(*cluster, name);
        if !order.iter().any(|existing: &String| existing.as_str() == name) {
            order.push(name.to_string());
        }
    }

    let per_row = labels
        .iter()
        .map(|cluster| mapping[cluster].to_string())
        .collect();
    GroupAssignment { per_row, order }
}

/// The full crypto retraining run: extract features per coin, cluster the
/// normalized feature matrix with a fixed k, label by cluster performance,
/// apply the liquidity and market-cap floors, and sample each group.
pub fn retrain_crypto(
    data: &CombinedData,
    cfg: &CryptoConfig,
    logged_at: NaiveDateTime,
) -> Result<Vec<PredictionRow>, EngineError> {
    info!("Starting model retraining...");
    let features = extract_all_coins(data)?;
    if features.is_empty() {
        return Err(EngineError::NoFeatures);
    }

    let normalized = zscore_normalize(&coin_feature_matrix(&features));
    let fit = KMeans::new(cfg.n_clusters, cfg.seed).fit(&normalized)?;

    let price_change: Vec<f64> = features.iter().map(|f| f.price_change).collect();
    let assignment = map_clusters_to_groups(
        &fit.labels,
        &price_change,
        &CRYPTO_GROUP_LABELS,
        CRYPTO_GROUP_LABELS[CRYPTO_GROUP_LABELS.len() - 1],
    );

    // Liquidity and market-cap floors; rows without either value fail.
    let kept: Vec<usize> = (0..features.len())
        .filter(|&i| {
            features[i]
                .trading_volume
                .is_some_and(|v| v >= cfg.min_trading_volume)
                && features[i]
                    .market_cap
                    .is_some_and(|m| m >= cfg.min_market_cap)
        })
        .collect();
    let kept_groups: Vec<String> = kept
        .iter()
        .map(|&i| assignment.per_row[i].clone())
        .collect();

    let chosen = sample_group_indices(&kept_groups, &assignment.order, cfg.group_cap, cfg.seed);
    let rows: Vec<PredictionRow> = chosen
        .into_iter()
        .map(|j| {
            let i = kept[j];
            PredictionRow::from_features(
                &features[i],
                fit.labels[i],
                &assignment.per_row[i],
                logged_at,
            )
        })
        .collect();

    info!(
        "Retraining selected {} coins across {} groups (from {} with features)",
        rows.len(),
        assignment.order.len(),
        features.len()
    );
    Ok(rows)
}

/// The equities run for one index workbook: extract per-stock features, pick
/// the best cluster count by silhouette score, label and sample the groups.
pub fn process_index(
    data: &CombinedData,
    cfg: &EquitiesConfig,
) -> Result<Vec<StockRow>, EngineError> {
    let features = extract_all_stocks(data)?;
    if features.is_empty() {
        return Err(EngineError::NoFeatures);
    }

    let labels = if features.len() < 2 {
        warn!("Only one sample available for clustering, skipping clustering step");
        vec![0; features.len()]
    } else {
        let normalized = zscore_normalize(&stock_feature_matrix(&features));
        let (fit, best_k, best_score) =
            search_best_k(&normalized, cfg.k_min, cfg.k_max, cfg.seed)?;
        if best_score >= 0.95 {
            info!("Selected k={best_k} with a silhouette score of {best_score:.4} (>= 0.95)");
        } else {
            info!("Selected k={best_k} with a silhouette score of {best_score:.4}");
        }
        fit.labels
    };

    let price_change: Vec<f64> = features.iter().map(|f| f.price_change).collect();
    let assignment = map_clusters_to_groups(
        &labels,
        &price_change,
        &EQUITY_GROUP_LABELS,
        EQUITY_OVERFLOW_LABEL,
    );

    let chosen = sample_group_indices(
        &assignment.per_row,
        &assignment.order,
        cfg.group_cap,
        cfg.seed,
    );
    Ok(chosen
        .into_iter()
        .map(|i| StockRow::from_features(&features[i], labels[i], &assignment.per_row[i]))
        .collect())
}

/// Fit every candidate cluster count independently and keep the partition
/// with the best silhouette score. Candidates run in parallel; each one
/// reseeds its own generator, so the reduction is order-independent. Ties
/// resolve toward the smaller k.
pub fn search_best_k(
    data: &Array2<f64>,
    k_min: usize,
    k_max: usize,
    seed: u64,
) -> Result<(KMeansFit, usize, f64), EngineError> {
    let upper = k_max.min(data.nrows());
    if upper < k_min {
        return Err(EngineError::ClusteringFailed);
    }

    let candidates: Vec<(usize, KMeansFit, f64)> = (k_min..=upper)
        .into_par_iter()
        .filter_map(|k| {
            let fit = KMeans::new(k, seed).fit(data).ok()?;
            let score = silhouette_score(data, &fit.labels);
            Some((k, fit, score))
        })
        .collect();

    candidates
        .into_iter()
        .max_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(Ordering::Equal)
                .then(b.0.cmp(&a.0))
        })
        .map(|(k, fit, score)| (fit, k, score))
        .ok_or(EngineError::ClusteringFailed)
}

/// Run a retraining closure with a bounded fixed-delay retry. A success
/// returns immediately; exhausting every attempt is fatal for the run.
pub fn run_with_retry<T, F>(retry: &RetryConfig, mut run: F) -> Result<T, EngineError>
where
    F: FnMut() -> Result<T, EngineError>,
{
    let attempts = retry.max_retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match run() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                return Err(EngineError::RetriesExhausted {
                    attempts,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                warn!(
                    "Retraining failed (attempt {attempt}/{attempts}): {e}. Retrying in {} seconds...",
                    retry.delay_seconds
                );
                thread::sleep(Duration::from_secs(retry.delay_seconds));
            }
        }
    }
}

fn extract_all_coins(data: &CombinedData) -> Result<Vec<CoinFeatures>, EngineError> {
    let mut features = Vec::with_capacity(data.len());
    for sheet in &data.sheets {
        match extract_coin_features(sheet)? {
            Some(f) => features.push(f),
            None => warn!("{}: no usable features, coin skipped", sheet.key),
        }
    }
    Ok(features)
}

fn extract_all_stocks(data: &CombinedData) -> Result<Vec<StockFeatures>, EngineError> {
    let mut features = Vec::with_capacity(data.len());
    for sheet in &data.sheets {
        match extract_stock_features(sheet)? {
            Some(f) => features.push(f),
            None => warn!("{}: no usable features, stock skipped", sheet.key),
        }
    }
    Ok(features)
}

fn coin_feature_matrix(features: &[CoinFeatures]) -> Array2<f64> {
    let mut matrix = Array2::zeros((features.len(), 4));
    for (i, f) in features.iter().enumerate() {
        matrix[[i, 0]] = f.mean_price;
        matrix[[i, 1]] = f.std_price;
        matrix[[i, 2]] = f.volatility;
        matrix[[i, 3]] = f.price_change;
    }
    matrix
}

fn stock_feature_matrix(features: &[StockFeatures]) -> Array2<f64> {
    let mut matrix = Array2::zeros((features.len(), 7));
    for (i, f) in features.iter().enumerate() {
        matrix[[i, 0]] = f.mean_price;
        matrix[[i, 1]] = f.std_price;
        matrix[[i, 2]] = f.min_price;
        matrix[[i, 3]] = f.max_price;
        matrix[[i, 4]] = f.price_change;
        matrix[[i, 5]] = f.strike_diff_mean;
        matrix[[i, 6]] = f.avg_volume;
    }
    matrix
}
