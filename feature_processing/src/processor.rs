use chrono::NaiveDateTime;
use data_loader::combined::AssetSheet;
use log::debug;
use polars::prelude::*;

use crate::error::FeatureError;
use crate::misc::{CoinFeatures, StockFeatures};

const DAYS_PER_MONTH: f64 = 30.44;

/// Extract features from one coin's sheet.
///
/// Returns `Ok(None)` when the coin has fewer than 2 valid (date, price)
/// rows, or when it is excluded by the momentum/crash filter. A missing
/// `date` or `price` column is an error and aborts the whole run.
pub fn extract_coin_features(sheet: &AssetSheet) -> Result<Option<CoinFeatures>, FeatureError> {
    let dates = sheet
        .datetime_values("date")
        .ok_or_else(|| missing(sheet, "date"))?;
    let raw_prices = sheet
        .float_values("price")
        .ok_or_else(|| missing(sheet, "price"))?;

    // Drop rows where either date or price is null, then sort by date.
    let mut rows: Vec<(NaiveDateTime, f64)> = dates
        .iter()
        .zip(&raw_prices)
        .filter_map(|(d, p)| Some(((*d)?, (*p)?)))
        .collect();
    rows.sort_by_key(|(date, _)| *date);

    if rows.len() < 2 {
        debug!("{}: fewer than 2 valid price rows, skipping", sheet.key);
        return Ok(None);
    }

    let prices: Vec<f64> = rows.iter().map(|(_, price)| *price).collect();
    let first_date = rows[0].0;
    let last_date = rows[rows.len() - 1].0;
    let age_in_days = (last_date - first_date).num_days() as f64;
    let age_in_months = round2(age_in_days / DAYS_PER_MONTH);

    let price_change_24h = horizon_change(&prices, 2);
    let price_change_7d = horizon_change(&prices, 7);
    let price_change_14d = horizon_change(&prices, 14);
    let price_change_30d = horizon_change(&prices, 30);

    // Momentum/crash filter, applied before clustering.
    if (price_change_24h < 0.0 && price_change_7d < 0.0) || price_change_30d < -50.0 {
        debug!("{}: excluded by momentum/crash filter", sheet.key);
        return Ok(None);
    }

    let mean_price = mean(&prices);
    let std_price = population_std(&prices, mean_price);
    let min_price = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_price = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let volatility = if mean_price != 0.0 {
        std_price / mean_price
    } else {
        0.0
    };
    let first = prices[0];
    let last = prices[prices.len() - 1];
    let price_change = if first != 0.0 { (last - first) / first } else { 0.0 };

    Ok(Some(CoinFeatures {
        coin: sheet.key.clone(),
        mean_price,
        std_price,
        min_price,
        max_price,
        volatility,
        price_change,
        price_change_24h,
        price_change_7d,
        price_change_14d,
        price_change_30d,
        age_in_months,
        token: first_cell(sheet.text_values("token")),
        contract_address: first_cell(sheet.text_values("contract_address")),
        market_cap: last_valid(sheet.float_values("market_cap")),
        chain: first_cell(sheet.text_values("platform")),
        trading_volume: last_valid(sheet.float_values("volume")),
        twitter_followers: first_cell(sheet.float_values("twitter_followers")),
        price: last,
        prediction_date: dates.last().cloned().flatten(),
    }))
}

/// Extract features from one stock's sheet of daily closes and volumes.
/// The first close acts as the strike price reference.
pub fn extract_stock_features(sheet: &AssetSheet) -> Result<Option<StockFeatures>, FeatureError> {
    let raw_close = sheet
        .float_values("Close")
        .ok_or_else(|| missing(sheet, "Close"))?;
    let raw_volume = sheet
        .float_values("Volume")
        .ok_or_else(|| missing(sheet, "Volume"))?;

    let close: Vec<f64> = raw_close.into_iter().flatten().collect();
    let volume: Vec<f64> = raw_volume.into_iter().flatten().collect();

    if close.len() < 2 {
        debug!("{}: fewer than 2 valid close prices, skipping", sheet.key);
        return Ok(None);
    }
    if volume.is_empty() {
        debug!("{}: Volume column has no data, skipping", sheet.key);
        return Ok(None);
    }

    let strike_price = close[0];
    let strike_diff_mean =
        close.iter().map(|c| c - strike_price).sum::<f64>() / close.len() as f64;
    let avg_volume = mean(&volume);

    let mean_price = mean(&close);
    let std_price = population_std(&close, mean_price);
    let min_price = close.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_price = close.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let first = close[0];
    let last = close[close.len() - 1];
    let price_change = if first != 0.0 { (last - first) / first } else { 0.0 };

    Ok(Some(StockFeatures {
        stock: sheet.key.clone(),
        mean_price,
        std_price,
        min_price,
        max_price,
        price_change,
        strike_diff_mean,
        avg_volume,
    }))
}

/// Tabular view of extracted coin features for preview and display.
pub fn coin_features_frame(features: &[CoinFeatures]) -> PolarsResult<DataFrame> {
    let coin: Vec<String> = features.iter().map(|f| f.coin.clone()).collect();
    let mean_price: Vec<f64> = features.iter().map(|f| f.mean_price).collect();
    let std_price: Vec<f64> = features.iter().map(|f| f.std_price).collect();
    let volatility: Vec<f64> = features.iter().map(|f| f.volatility).collect();
    let price_change: Vec<f64> = features.iter().map(|f| f.price_change).collect();
    let price: Vec<f64> = features.iter().map(|f| f.price).collect();
    let market_cap: Vec<Option<f64>> = features.iter().map(|f| f.market_cap).collect();
    let trading_volume: Vec<Option<f64>> = features.iter().map(|f| f.trading_volume).collect();

    DataFrame::new(vec![
        Series::new("coin", coin),
        Series::new("mean_price", mean_price),
        Series::new("std_price", std_price),
        Series::new("volatility", volatility),
        Series::new("price_change", price_change),
        Series::new("price", price),
        Series::new("market_cap", market_cap),
        Series::new("trading_volume", trading_volume),
    ])
}

/// Tabular view of extracted stock features.
pub fn stock_features_frame(features: &[StockFeatures]) -> PolarsResult<DataFrame> {
    let stock: Vec<String> = features.iter().map(|f| f.stock.clone()).collect();
    let mean_price: Vec<f64> = features.iter().map(|f| f.mean_price).collect();
    let std_price: Vec<f64> = features.iter().map(|f| f.std_price).collect();
    let min_price: Vec<f64> = features.iter().map(|f| f.min_price).collect();
    let max_price: Vec<f64> = features.iter().map(|f| f.max_price).collect();
    let price_change: Vec<f64> = features.iter().map(|f| f.price_change).collect();
    let strike_diff_mean: Vec<f64> = features.iter().map(|f| f.strike_diff_mean).collect();
    let avg_volume: Vec<f64> = features.iter().map(|f| f.avg_volume).collect();

    DataFrame::new(vec![
        Series::new("stock", stock),
        Series::new("mean_price", mean_price),
        Series::new("std_price", std_price),
        Series::new("min_price", min_price),
        Series::new("max_price", max_price),
        Series::new("price_change", price_change),
        Series::new("strike_diff_mean", strike_diff_mean),
        Series::new("avg_volume", avg_volume),
    ])
}

/// Percentage change over the last `n` observations. Fewer than `n`
/// observations and a zero reference price both yield 0; the two cases are
/// deliberately not distinguished.
fn horizon_change(prices: &[f64], n: usize) -> f64 {
    if n >= 1 && prices.len() >= n {
        let start = prices[prices.len() - n];
        let end = prices[prices.len() - 1];
        if start != 0.0 {
            (end - start) / start * 100.0
        } else {
            0.0
        }
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First row's cell, nulls included: a null leading cell stays `None` even
/// when later rows hold values.
fn first_cell<T>(values: Option<Vec<Option<T>>>) -> Option<T> {
    values.and_then(|v| v.into_iter().next().flatten())
}

/// Last non-null cell of the column, if any.
fn last_valid<T>(values: Option<Vec<Option<T>>>) -> Option<T> {
    values.and_then(|v| v.into_iter().rev().flatten().next())
}

fn missing(sheet: &AssetSheet, column: &str) -> FeatureError {
    FeatureError::MissingColumn {
        sheet: sheet.key.clone(),
        column: column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use data_loader::combined::{AssetSheet, ColumnData};

    fn date(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn coin_sheet(prices: &[f64]) -> AssetSheet {
        let dates: Vec<Option<NaiveDateTime>> =
            (0..prices.len()).map(|i| Some(date(i as u32 + 1))).collect();
        AssetSheet {
            key: "TEST".to_string(),
            columns: vec![
                ("date".to_string(), ColumnData::DateTime(dates)),
                (
                    "price".to_string(),
                    ColumnData::Float(prices.iter().map(|p| Some(*p)).collect()),
                ),
            ],
            rows: prices.len(),
        }
    }

    #[test]
    fn under_two_rows_yields_no_features() {
        let sheet = coin_sheet(&[10.0]);
        assert!(extract_coin_features(&sheet).unwrap().is_none());
    }

    #[test]
    fn null_rows_do_not_count_toward_minimum() {
        let sheet = AssetSheet {
            key: "TEST".to_string(),
            columns: vec![
                (
                    "date".to_string(),
                    ColumnData::DateTime(vec![Some(date(1)), Some(date(2)), None]),
                ),
                (
                    "price".to_string(),
                    ColumnData::Float(vec![Some(10.0), None, Some(12.0)]),
                ),
            ],
            rows: 3,
        };
        // Only one row survives the pair-wise null drop.
        assert!(extract_coin_features(&sheet).unwrap().is_none());
    }

    #[test]
    fn negative_short_term_momentum_is_excluded() {
        // 24h and 7d changes both negative.
        let sheet = coin_sheet(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 9.0, 8.0]);
        assert!(extract_coin_features(&sheet).unwrap().is_none());
    }

    #[test]
    fn crash_over_30_days_is_excluded_despite_recent_gains() {
        let mut prices = vec![100.0];
        prices.extend(std::iter::repeat(10.0).take(23));
        prices.extend([15.0, 20.0, 25.0, 30.0, 35.0, 40.0]);
        assert_eq!(prices.len(), 30);
        let sheet = coin_sheet(&prices);
        // 30d change is -60%, short-term changes are positive.
        assert!(extract_coin_features(&sheet).unwrap().is_none());
    }

    #[test]
    fn negative_day_with_positive_week_is_kept() {
        let sheet = coin_sheet(&[10.0, 10.5, 11.0, 11.5, 12.0, 12.5, 13.0, 12.9]);
        let features = extract_coin_features(&sheet).unwrap().unwrap();
        assert!(features.price_change_24h < 0.0);
        assert!(features.price_change_7d > 0.0);
    }

    #[test]
    fn short_series_defaults_long_horizons_to_zero() {
        let sheet = coin_sheet(&[10.0, 12.0, 15.0]);
        let features = extract_coin_features(&sheet).unwrap().unwrap();
        assert!((features.price_change_24h - 25.0).abs() < 1e-9);
        assert_eq!(features.price_change_7d, 0.0);
        assert_eq!(features.price_change_14d, 0.0);
        assert_eq!(features.price_change_30d, 0.0);
    }

    #[test]
    fn summary_statistics_match_hand_computation() {
        let sheet = coin_sheet(&[10.0, 20.0, 30.0]);
        let features = extract_coin_features(&sheet).unwrap().unwrap();
        assert!((features.mean_price - 20.0).abs() < 1e-9);
        // Population std of [10, 20, 30].
        assert!((features.std_price - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert!((features.min_price - 10.0).abs() < 1e-9);
        assert!((features.max_price - 30.0).abs() < 1e-9);
        assert!((features.price_change - 2.0).abs() < 1e-9);
        assert!((features.volatility - features.std_price / 20.0).abs() < 1e-9);
        // Two days of age.
        assert!((features.age_in_months - round2(2.0 / DAYS_PER_MONTH)).abs() < 1e-9);
        assert!((features.price - 30.0).abs() < 1e-9);
    }

    #[test]
    fn missing_price_column_is_an_error() {
        let sheet = AssetSheet {
            key: "TEST".to_string(),
            columns: vec![(
                "date".to_string(),
                ColumnData::DateTime(vec![Some(date(1)), Some(date(2))]),
            )],
            rows: 2,
        };
        assert!(extract_coin_features(&sheet).is_err());
    }

    #[test]
    fn metadata_passes_through_when_present() {
        let mut sheet = coin_sheet(&[10.0, 12.0]);
        sheet.columns.push((
            "market_cap".to_string(),
            ColumnData::Float(vec![Some(5_000_000.0), None]),
        ));
        sheet.columns.push((
            "token".to_string(),
            ColumnData::Text(vec![None, Some("XYZ".to_string())]),
        ));
        let features = extract_coin_features(&sheet).unwrap().unwrap();
        // Last non-null market cap; first-row token is null.
        assert_eq!(features.market_cap, Some(5_000_000.0));
        assert_eq!(features.token, None);
        assert_eq!(features.chain, None);
    }

    fn stock_sheet(close: &[f64], volume: &[Option<f64>]) -> AssetSheet {
        AssetSheet {
            key: "ACME".to_string(),
            columns: vec![
                (
                    "Close".to_string(),
                    ColumnData::Float(close.iter().map(|c| Some(*c)).collect()),
                ),
                ("Volume".to_string(), ColumnData::Float(volume.to_vec())),
            ],
            rows: close.len(),
        }
    }

    #[test]
    fn stock_features_use_first_close_as_strike() {
        let sheet = stock_sheet(&[100.0, 110.0, 120.0], &[Some(1000.0), Some(2000.0), None]);
        let features = extract_stock_features(&sheet).unwrap().unwrap();
        // mean(close - 100) = mean([0, 10, 20]).
        assert!((features.strike_diff_mean - 10.0).abs() < 1e-9);
        assert!((features.avg_volume - 1500.0).abs() < 1e-9);
        assert!((features.price_change - 0.2).abs() < 1e-9);
    }

    #[test]
    fn stock_with_one_close_yields_no_features() {
        let sheet = stock_sheet(&[100.0], &[Some(1000.0)]);
        assert!(extract_stock_features(&sheet).unwrap().is_none());
    }

    #[test]
    fn stock_missing_volume_column_is_an_error() {
        let sheet = AssetSheet {
            key: "ACME".to_string(),
            columns: vec![(
                "Close".to_string(),
                ColumnData::Float(vec![Some(1.0), Some(2.0)]),
            )],
            rows: 2,
        };
        assert!(extract_stock_features(&sheet).is_err());
    }

    #[test]
    fn features_frames_have_one_row_per_asset() {
        let sheet = coin_sheet(&[10.0, 12.0]);
        let features = vec![extract_coin_features(&sheet).unwrap().unwrap()];
        let df = coin_features_frame(&features).unwrap();
        assert_eq!(df.height(), 1);
        assert!(df.get_column_names().contains(&"price_change"));
    }
}
