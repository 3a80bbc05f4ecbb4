use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Per-coin feature record for the crypto path. Metadata fields are passed
/// through from the source sheet when the columns exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinFeatures {
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
    pub market_cap: Option<f64>,
    pub chain: Option<String>,
    pub trading_volume: Option<f64>,
    pub twitter_followers: Option<f64>,
    pub price: f64,
    pub prediction_date: Option<NaiveDateTime>,
}

/// Per-stock feature record for the equities path. The first close of the
/// series acts as the strike price reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockFeatures {
    pub stock: String,
    pub mean_price: f64,
    pub std_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_change: f64,
    pub strike_diff_mean: f64,
    pub avg_volume: f64,
}
