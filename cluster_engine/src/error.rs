use feature_processing::error::FeatureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No valid features extracted for retraining")]
    NoFeatures,

    #[error("Clustering requires at least {clusters} samples, got {samples}")]
    TooFewSamples { samples: usize, clusters: usize },

    #[error("Clustering failed: no viable cluster count")]
    ClusteringFailed,

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("Prediction log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Prediction log format error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Retraining failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<EngineError>,
    },
}
