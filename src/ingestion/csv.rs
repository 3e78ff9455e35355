//! Delimited (CSV) row source.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use crate::error::ReadError;
use crate::types::RowSet;

use super::source::RowSource;

/// A CSV file read as one unit.
#[derive(Debug, Clone)]
pub struct DelimitedFile {
    path: PathBuf,
    fallback: &'static Encoding,
}

impl DelimitedFile {
    /// Create a row source for `path`, decoding with `fallback` if the file is not UTF-8.
    pub fn new(path: impl Into<PathBuf>, fallback: &'static Encoding) -> Self {
        Self {
            path: path.into(),
            fallback,
        }
    }
}

impl RowSource for DelimitedFile {
    fn load(self: Box<Self>) -> Result<RowSet, ReadError> {
        read_delimited_path(&self.path, self.fallback)
    }
}

/// Read a CSV file into a [`RowSet`].
///
/// Rules:
///
/// - The first record is the header.
/// - Bytes are decoded as UTF-8; if that fails the whole file is decoded with `fallback`
///   and [`RowSet::fallback_encoding`] names it.
/// - Rows shorter than the header are padded with empty cells; longer rows are an error.
pub fn read_delimited_path(
    path: impl AsRef<Path>,
    fallback: &'static Encoding,
) -> Result<RowSet, ReadError> {
    let bytes = fs::read(path)?;
    read_delimited_bytes(&bytes, fallback)
}

/// Read CSV content already held in memory. See [`read_delimited_path`].
pub fn read_delimited_bytes(
    bytes: &[u8],
    fallback: &'static Encoding,
) -> Result<RowSet, ReadError> {
    let (text, fallback_used) = decode(bytes, fallback);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = read_delimited_from_reader(&mut rdr)?;
    rows.fallback_encoding = fallback_used.then(|| fallback.name());
    Ok(rows)
}

/// Read CSV data from an existing CSV reader.
///
/// The reader should be `flexible` so short rows reach the padding logic instead of failing
/// inside the csv crate.
pub fn read_delimited_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
) -> Result<RowSet, ReadError> {
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let width = header.len();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // 1-based, and the header is line 1.
        let user_row = row_idx0 + 2;
        let record = result?;
        if record.len() > width {
            return Err(ReadError::Malformed {
                message: format!(
                    "row {user_row} has {} fields but the header has {width}",
                    record.len()
                ),
            });
        }

        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(RowSet::new(header, rows))
}

fn decode<'a>(bytes: &'a [u8], fallback: &'static Encoding) -> (Cow<'a, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)), false),
        Err(_) => {
            let (text, _had_errors) = fallback.decode_without_bom_handling(bytes);
            (text, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::WINDOWS_1252;

    use super::*;

    #[test]
    fn strips_utf8_bom_from_first_header() {
        let rows = read_delimited_bytes(b"\xef\xbb\xbfid,name\n1,Ada\n", WINDOWS_1252).unwrap();
        assert_eq!(rows.header, ["id", "name"]);
        assert_eq!(rows.fallback_encoding, None);
    }

    #[test]
    fn falls_back_when_not_utf8() {
        // 0xE9 is 'é' in windows-1252 and invalid as a lone UTF-8 byte.
        let rows = read_delimited_bytes(b"city\nCaf\xe9\n", WINDOWS_1252).unwrap();
        assert_eq!(rows.rows, [["Café"]]);
        assert_eq!(rows.fallback_encoding, Some("windows-1252"));
    }
}
