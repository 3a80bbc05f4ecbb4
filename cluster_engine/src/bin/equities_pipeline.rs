use anyhow::Result;
use cluster_engine::config::PipelineConfig;
use cluster_engine::engine::process_index;
use cluster_engine::prediction_log::export_rows;
use data_loader::logger::init_logger;
use data_loader::workbook::load_workbook;
use log::{error, info};

fn main() -> Result<()> {
    init_logger();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "finance_hub.toml".to_string());
    let cfg = PipelineConfig::from_file(&config_path)?;

    info!(
        "🚀 Processing clustering for {} indices...",
        cfg.equities.indices.len()
    );

    let mut failures = 0usize;
    for index in &cfg.equities.indices {
        info!("Processing {}...", index.name);
        let combined = match load_workbook(&index.file) {
            Ok(combined) => combined,
            Err(e) => {
                error!("{}: {e}", index.name);
                failures += 1;
                continue;
            }
        };

        match process_index(&combined, &cfg.equities) {
            Ok(rows) => {
                let export = format!("{}_clustered_stocks.csv", index.name.replace(' ', "_"));
                export_rows(&export, &rows)?;
                info!("{}: {} stocks clustered", index.name, rows.len());
            }
            Err(e) => {
                error!("{}: {e}", index.name);
                failures += 1;
            }
        }
    }

    if failures > 0 && failures == cfg.equities.indices.len() {
        anyhow::bail!("All {failures} indices failed to process");
    }
    Ok(())
}
