#![cfg(feature = "excel")]

//! Workbook row sources backed by `calamine` (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};

use crate::error::ReadError;
use crate::types::RowSet;

use super::source::{Workbook, WorkbookOpener};

/// Opens workbooks with `calamine`, auto-detecting the format from the extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalamineOpener;

impl WorkbookOpener for CalamineOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Workbook>, ReadError> {
        let inner = open_workbook_auto(path)?;
        Ok(Box::new(CalamineWorkbook { inner }))
    }
}

struct CalamineWorkbook {
    inner: Sheets<BufReader<File>>,
}

impl Workbook for CalamineWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<RowSet, ReadError> {
        let range = self.inner.worksheet_range(sheet)?;
        Ok(range_to_row_set(&range))
    }
}

/// Convert a sheet's used range into a [`RowSet`].
///
/// Behavior:
/// - The first non-empty row is the header row; anything above it is ignored
/// - Rows after the header that are entirely empty are dropped
/// - Every cell becomes text (see [`cell_to_text`]); empty cells become `""`
pub fn range_to_row_set(range: &Range<Data>) -> RowSet {
    let mut rows_iter = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));

    let header: Vec<String> = match rows_iter.next() {
        Some(row) => row.iter().map(cell_to_text).collect(),
        None => return RowSet::default(),
    };

    let rows = rows_iter
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            let mut out: Vec<String> = row.iter().map(cell_to_text).collect();
            out.resize(header.len(), String::new());
            out
        })
        .collect();

    RowSet::new(header, rows)
}

/// Text form of one cell.
///
/// Whole floats print without a fractional part (`3.0` → `"3"`), since spreadsheets store
/// every number as a float. Dates print as `YYYY-MM-DD HH:MM:SS`.
pub fn cell_to_text(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
        Data::Empty => String::new(),
    }
}
