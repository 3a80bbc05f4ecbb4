use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Error loading workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("No sheets were loaded successfully from {0}")]
    NoData(String),

    #[error("Sheet {0} is empty")]
    EmptySheet(String),
}
