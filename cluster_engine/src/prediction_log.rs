use std::fs::OpenOptions;
use std::path::Path;

use csv::WriterBuilder;
use log::info;
use serde::Serialize;

use crate::error::EngineError;
use crate::misc::PredictionRow;

/// Append prediction rows to the flat log file. The first write creates the
/// file with a header row; later writes append rows only. Rows are never
/// mutated or deleted — the log is append-only.
pub fn record_predictions<P: AsRef<Path>>(
    path: P,
    rows: &[PredictionRow],
) -> Result<(), EngineError> {
    let path = path.as_ref();
    let write_header = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Predictions recorded to {}", path.display());
    Ok(())
}

/// Read the whole prediction log back.
pub fn read_log<P: AsRef<Path>>(path: P) -> Result<Vec<PredictionRow>, EngineError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Write a run's table as a standalone comma-separated export, header
/// included, overwriting any previous export.
pub fn export_rows<P: AsRef<Path>, S: Serialize>(path: P, rows: &[S]) -> Result<(), EngineError> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use feature_processing::misc::CoinFeatures;

    fn features(coin: &str, price: f64) -> CoinFeatures {
        CoinFeatures {
            coin: coin.to_string(),
            mean_price: price,
            std_price: 0.5,
            min_price: price - 1.0,
            max_price: price + 1.0,
            volatility: 0.05,
            price_change: 0.2,
            price_change_24h: 1.0,
            price_change_7d: 2.0,
            price_change_14d: 0.0,
            price_change_30d: 0.0,
            age_in_months: 4.5,
            token: Some("TKN".to_string()),
            contract_address: None,
            market_cap: Some(2_500_000.0),
            chain: Some("solana".to_string()),
            trading_volume: Some(75_000.0),
            twitter_followers: None,
            price,
            prediction_date: NaiveDate::from_ymd_opt(2024, 1, 30)
                .unwrap()
                .and_hms_opt(0, 0, 0),
        }
    }

    fn row(coin: &str, price: f64) -> PredictionRow {
        let logged_at = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        PredictionRow::from_features(&features(coin, price), 0, "90% Uptrend", logged_at)
    }

    #[test]
    fn log_roundtrips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions_log.csv");
        record_predictions(&path, &[row("A", 10.0), row("B", 20.0)]).unwrap();

        let rows = read_log(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].coin, "A");
        assert_eq!(rows[0].price, 10.0);
        assert_eq!(rows[0].market_cap.as_deref(), Some("2,500,000"));
        assert_eq!(rows[0].probability_group, "90% Uptrend");
        assert_eq!(rows[1].coin, "B");
    }

    #[test]
    fn header_is_written_once_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions_log.csv");
        record_predictions(&path, &[row("A", 10.0)]).unwrap();
        record_predictions(&path, &[row("B", 20.0)]).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let headers = raw.lines().filter(|l| l.starts_with("coin,")).count();
        assert_eq!(headers, 1);
        assert_eq!(raw.lines().count(), 3);

        // Both appends survive a read back.
        let rows = read_log(&path).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn export_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_clustered_coins.csv");
        export_rows(&path, &[row("A", 10.0), row("B", 20.0)]).unwrap();
        export_rows(&path, &[row("C", 30.0)]).unwrap();

        let rows = read_log(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].coin, "C");
    }
}
