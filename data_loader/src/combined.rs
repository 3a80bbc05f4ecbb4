use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Typed contents of one sheet column. Cells that do not fit the column's
/// inferred type are stored as nulls.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    DateTime(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All rows of one sheet. The sheet name is the asset key; row order is the
/// spreadsheet order and is never mutated after load.
#[derive(Debug, Clone)]
pub struct AssetSheet {
    pub key: String,
    pub columns: Vec<(String, ColumnData)>,
    pub rows: usize,
}

impl AssetSheet {
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, data)| data)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column values as floats. Text columns are re-parsed on demand so
    /// numeric data stored as strings still loads.
    pub fn float_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        match self.column(name)? {
            ColumnData::Float(v) => Some(v.clone()),
            ColumnData::Text(v) => Some(
                v.iter()
                    .map(|cell| cell.as_deref().and_then(parse_float))
                    .collect(),
            ),
            ColumnData::DateTime(_) => None,
        }
    }

    /// Column values as datetimes. Text columns are parsed against the
    /// common date formats seen in exported price sheets.
    pub fn datetime_values(&self, name: &str) -> Option<Vec<Option<NaiveDateTime>>> {
        match self.column(name)? {
            ColumnData::DateTime(v) => Some(v.clone()),
            ColumnData::Text(v) => Some(
                v.iter()
                    .map(|cell| cell.as_deref().and_then(parse_datetime))
                    .collect(),
            ),
            ColumnData::Float(_) => None,
        }
    }

    pub fn text_values(&self, name: &str) -> Option<Vec<Option<String>>> {
        match self.column(name)? {
            ColumnData::Text(v) => Some(v.clone()),
            ColumnData::Float(v) => Some(v.iter().map(|c| c.map(|f| f.to_string())).collect()),
            ColumnData::DateTime(v) => Some(
                v.iter()
                    .map(|c| c.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()))
                    .collect(),
            ),
        }
    }

    /// Tabular view of the sheet for preview and display.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut series = Vec::with_capacity(self.columns.len());
        for (name, data) in &self.columns {
            let s = match data {
                ColumnData::Float(v) => Series::new(name, v.clone()),
                ColumnData::Text(v) => Series::new(name, v.clone()),
                ColumnData::DateTime(v) => {
                    let formatted: Vec<Option<String>> = v
                        .iter()
                        .map(|c| c.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()))
                        .collect();
                    Series::new(name, formatted)
                }
            };
            series.push(s);
        }
        DataFrame::new(series)
    }
}

/// The combined table: every sheet of one workbook, keyed by sheet name.
/// Equivalent to a table keyed by (asset, row index).
#[derive(Debug, Clone, Default)]
pub struct CombinedData {
    pub sheets: Vec<AssetSheet>,
}

impl CombinedData {
    pub fn get(&self, key: &str) -> Option<&AssetSheet> {
        self.sheets.iter().find(|s| s.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

pub(crate) fn parse_float(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

pub(crate) fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
