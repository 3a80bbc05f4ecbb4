use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use log::{info, warn};

use crate::combined::{AssetSheet, ColumnData, CombinedData};
use crate::error::LoadError;

/// Load a multi-sheet workbook into one combined table, one sheet per asset.
/// A sheet that fails to read is skipped with a warning; a missing or
/// unreadable file is an error, as is a workbook where nothing loads.
pub fn load_workbook<P: AsRef<Path>>(path: P) -> Result<CombinedData, LoadError> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_owned();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(range) => range,
            Err(e) => {
                warn!("Error reading sheet {name}: {e}");
                continue;
            }
        };
        match sheet_from_cells(name, range.rows()) {
            Ok(sheet) => sheets.push(sheet),
            Err(e) => warn!("Error reading sheet {name}: {e}"),
        }
    }

    if sheets.is_empty() {
        return Err(LoadError::NoData(path.display().to_string()));
    }

    info!(
        "Loaded {} of {} sheets from {}",
        sheets.len(),
        sheet_names.len(),
        path.display()
    );
    Ok(CombinedData { sheets })
}

/// Convert one sheet's cell grid into typed columns. The first row is the
/// header row; every later row is one observation.
pub(crate) fn sheet_from_cells<'a, I>(key: &str, mut rows: I) -> Result<AssetSheet, LoadError>
where
    I: Iterator<Item = &'a [Data]>,
{
    let header_row = rows.next().ok_or_else(|| LoadError::EmptySheet(key.to_string()))?;
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.as_string() {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("column_{i}"),
        })
        .collect();

    let mut cells: Vec<Vec<Data>> = vec![Vec::new(); headers.len()];
    let mut n_rows = 0usize;
    for row in rows {
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(row.get(i).cloned().unwrap_or(Data::Empty));
        }
        n_rows += 1;
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| (name, column_from_cells(&cells)))
        .collect();

    Ok(AssetSheet {
        key: key.to_string(),
        columns,
        rows: n_rows,
    })
}

/// Infer a column type from its cells: any datetime cell makes it a datetime
/// column, a column of plain numbers becomes floats, anything else is text.
fn column_from_cells(cells: &[Data]) -> ColumnData {
    let mut saw_datetime = false;
    let mut saw_number = false;
    let mut saw_text = false;
    for cell in cells {
        match cell {
            Data::DateTime(_) | Data::DateTimeIso(_) => saw_datetime = true,
            Data::Float(_) | Data::Int(_) | Data::Bool(_) => saw_number = true,
            Data::String(s) if !s.trim().is_empty() => saw_text = true,
            _ => {}
        }
    }

    if saw_datetime {
        ColumnData::DateTime(cells.iter().map(|c| c.as_datetime()).collect())
    } else if saw_number && !saw_text {
        ColumnData::Float(cells.iter().map(|c| c.as_f64()).collect())
    } else {
        ColumnData::Text(
            cells
                .iter()
                .map(|c| match c {
                    Data::Empty => None,
                    other => other.as_string(),
                })
                .collect(),
        )
    }
}
