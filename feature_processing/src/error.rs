use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Sheet {sheet} is missing required column '{column}'")]
    MissingColumn { sheet: String, column: String },
}
