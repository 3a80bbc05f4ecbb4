use chrono::NaiveDateTime;
use feature_processing::misc::{CoinFeatures, StockFeatures};
use serde::{Deserialize, Serialize};

/// Ordinal group labels for the crypto path, best-performing cluster first.
pub const CRYPTO_GROUP_LABELS: [&str; 3] = ["90% Uptrend", "80% Uptrend", "70% Uptrend"];

/// Ordinal group labels for the equities path, best-performing cluster first.
pub const EQUITY_GROUP_LABELS: [&str; 3] = ["95% Uptrend", "90% Uptrend", "80% Uptrend"];

/// Shared by every equities cluster ranked past the named labels.
pub const EQUITY_OVERFLOW_LABEL: &str = "80% Uptrend (Extra)";

/// One line of the prediction log: the coin's feature snapshot plus its
/// cluster assignment and the timestamp it was recorded at. Market cap and
/// trading volume are display-formatted here; everything upstream of row
/// construction stays numeric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    pub coin: String,
    pub mean_price: f64,
    pub std_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub volatility: f64,
    pub price_change: f64,
    pub price_change_24h: f64,
    pub price_change_7d: f64,
    pub price_change_14d: f64,
    pub price_change_30d: f64,
    pub age_in_months: f64,
    pub token: Option<String>,
    pub contract_address: Option<String>,
    pub market_cap: Option<String>,
    pub chain: Option<String>,
    pub trading_volume: Option<String>,
    pub twitter_followers: Option<f64>,
    pub price: f64,
    pub prediction_date: Option<NaiveDateTime>,
    pub cluster: usize,
    pub probability_group: String,
    pub date: NaiveDateTime,
}

impl PredictionRow {
    pub fn from_features(
        features: &CoinFeatures,
        cluster: usize,
        probability_group: &str,
        logged_at: NaiveDateTime,
    ) -> Self {
        Self {
            coin: features.coin.clone(),
            mean_price: features.mean_price,
            std_price: features.std_price,
            min_price: features.min_price,
            max_price: features.max_price,
            volatility: features.volatility,
            price_change: features.price_change,
            price_change_24h: features.price_change_24h,
            price_change_7d: features.price_change_7d,
            price_change_14d: features.price_change_14d,
            price_change_30d: features.price_change_30d,
            age_in_months: features.age_in_months,
            token: features.token.clone(),
            contract_address: features.contract_address.clone(),
            market_cap: features.market_cap.map(fmt_thousands),
            chain: features.chain.clone(),
            trading_volume: features.trading_volume.map(fmt_thousands),
            twitter_followers: features.twitter_followers,
            price: features.price,
            prediction_date: features.prediction_date,
            cluster,
            probability_group: probability_group.to_string(),
            date: logged_at,
        }
    }
}

/// One line of an equities export: the stock's feature snapshot plus its
/// cluster assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRow {
    pub stock: String,
    pub mean_price: f64,
    pub std_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_change: f64,
    pub strike_diff_mean: f64,
    pub avg_volume: f64,
    pub cluster: usize,
    pub probability_group: String,
}

impl StockRow {
    pub fn from_features(features: &StockFeatures, cluster: usize, probability_group: &str) -> Self {
        Self {
            stock: features.stock.clone(),
            mean_price: features.mean_price,
            std_price: features.std_price,
            min_price: features.min_price,
            max_price: features.max_price,
            price_change: features.price_change,
            strike_diff_mean: features.strike_diff_mean,
            avg_volume: features.avg_volume,
            cluster,
            probability_group: probability_group.to_string(),
        }
    }
}

/// Format a value as a thousands-separated integer string for display.
pub fn fmt_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        format!("-{out}")
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_formatting() {
        assert_eq!(fmt_thousands(1_234_567.4), "1,234,567");
        assert_eq!(fmt_thousands(999.0), "999");
        assert_eq!(fmt_thousands(1_000.0), "1,000");
        assert_eq!(fmt_thousands(-1_234.0), "-1,234");
        assert_eq!(fmt_thousands(0.2), "0");
    }
}
