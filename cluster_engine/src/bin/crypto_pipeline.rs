use anyhow::Result;
use chrono::Utc;
use cluster_engine::config::PipelineConfig;
use cluster_engine::engine::{retrain_crypto, run_with_retry};
use cluster_engine::eval::{evaluate_predictions, Evaluation};
use cluster_engine::prediction_log::{export_rows, record_predictions};
use data_loader::logger::init_logger;
use data_loader::workbook::load_workbook;
use log::{info, warn};

fn main() -> Result<()> {
    init_logger();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "finance_hub.toml".to_string());
    let cfg = PipelineConfig::from_file(&config_path)?;

    info!("🚀 Starting coin clustering pipeline...");
    let combined = load_workbook(&cfg.crypto.data_file)?;
    info!("Data loaded successfully: {} coins", combined.len());
    if let Some(sheet) = combined.sheets.first() {
        match sheet.to_frame() {
            Ok(frame) => info!("Preview of {}:\n{}", sheet.key, frame.head(Some(5))),
            Err(e) => warn!("Could not build preview for {}: {e}", sheet.key),
        }
    }

    let now = Utc::now().naive_utc();
    match evaluate_predictions(
        &cfg.prediction_log.file,
        cfg.prediction_log.evaluation_days,
        &combined,
        now,
    )? {
        Evaluation::NoLogFile => info!("No prediction log file found for evaluation"),
        Evaluation::NothingStale { threshold_days } => {
            info!("No predictions older than {threshold_days} days to evaluate")
        }
        Evaluation::NoMatches { skipped } => {
            info!("No valid predictions were evaluated ({skipped} rows without fresh data)")
        }
        Evaluation::Report(report) => {
            info!(
                "Mean absolute error over predictions older than {} days: {:.4}",
                cfg.prediction_log.evaluation_days, report.mean_absolute_error
            );
            match report.to_frame() {
                Ok(frame) => info!("Evaluated predictions:\n{frame}"),
                Err(e) => warn!("Could not build evaluation table: {e}"),
            }
        }
    }

    let rows = run_with_retry(&cfg.retry, || {
        retrain_crypto(&combined, &cfg.crypto, Utc::now().naive_utc())
    })?;

    record_predictions(&cfg.prediction_log.file, &rows)?;
    export_rows(&cfg.crypto.export_file, &rows)?;
    info!("Model retraining completed successfully ✅");

    Ok(())
}
