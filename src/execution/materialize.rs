//! Loading one unit: load rows, name columns, recreate the table, stage, copy, commit.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::destination::{Destination, sql};
use crate::error::{ImportError, ImportResult, LoadError};
use crate::ingestion::SourceUnit;
use crate::naming::ColumnSpec;
use crate::types::{RowSet, TableTarget, UnitStatus};

use super::observer::{ProgressEvent, ProgressSink};

/// Load `unit` into `target`, replacing any existing table.
///
/// - A read failure returns [`ImportError::UnitRead`]; the destination is not touched.
/// - A unit with no data rows returns [`UnitStatus::SkippedEmpty`]; the destination is not
///   touched.
/// - Otherwise the drop, create, and copy run in one transaction. Any failure rolls that
///   transaction back and returns [`ImportError::UnitLoad`].
///
/// Rows are staged in an anonymous temporary file (in `staging_dir`, or the system temp
/// directory), which is removed when it is dropped, whatever the outcome.
pub fn materialize(
    destination: &mut dyn Destination,
    unit: SourceUnit,
    target: &TableTarget,
    staging_dir: Option<&Path>,
    sink: &dyn ProgressSink,
) -> ImportResult<UnitStatus> {
    let label = unit.label();
    let rows = unit.load().map_err(|source| ImportError::UnitRead {
        unit: label.clone(),
        source,
    })?;

    if let Some(encoding) = rows.fallback_encoding {
        warn!(unit = %label, encoding, "source is not valid UTF-8; decoded with fallback");
        sink.on_event(&ProgressEvent::EncodingFallback {
            unit: label.clone(),
            encoding,
        });
    }

    if rows.is_empty() {
        info!(unit = %label, "no data rows; skipping");
        return Ok(UnitStatus::SkippedEmpty);
    }

    let columns = ColumnSpec::from_header(&rows.header);
    for column in columns.renamed() {
        debug!(original = %column.original, name = %column.name, "column renamed");
    }

    let loaded = destination
        .begin()
        .map_err(LoadError::from)
        .and_then(|()| load_in_transaction(destination, &rows, &columns, target, staging_dir));

    match loaded {
        Ok(copied) => {
            info!(table = %target, rows = copied, "unit loaded");
            Ok(UnitStatus::Loaded { rows: copied })
        }
        Err(source) => {
            if let Err(err) = destination.rollback() {
                warn!(table = %target, error = %err, "rollback failed");
            }
            Err(ImportError::UnitLoad {
                table: target.to_string(),
                source,
            })
        }
    }
}

fn load_in_transaction(
    destination: &mut dyn Destination,
    rows: &RowSet,
    columns: &ColumnSpec,
    target: &TableTarget,
    staging_dir: Option<&Path>,
) -> Result<u64, LoadError> {
    destination.execute(&sql::drop_table(target))?;
    destination.execute(&sql::create_text_table(target, columns))?;

    let mut staged = stage_rows(rows, columns.len(), staging_dir)?;
    let copied = destination.copy_csv_in(target, columns, &mut staged)?;
    destination.commit()?;
    Ok(copied)
}

/// Write `rows` as headerless, fully-quoted UTF-8 CSV into a fresh temporary file and rewind
/// it. Short rows are padded to `width`.
pub fn stage_rows(
    rows: &RowSet,
    width: usize,
    staging_dir: Option<&Path>,
) -> Result<File, LoadError> {
    let file = match staging_dir {
        Some(dir) => tempfile::tempfile_in(dir)?,
        None => tempfile::tempfile()?,
    };

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(file);

    for (row_idx0, row) in rows.rows.iter().enumerate() {
        if row.len() > width {
            return Err(LoadError::RowWidth {
                row: row_idx0 + 1,
                found: row.len(),
                expected: width,
            });
        }
        let padding = std::iter::repeat_n("", width - row.len());
        wtr.write_record(row.iter().map(String::as_str).chain(padding))?;
    }

    let mut file = wtr.into_inner().map_err(|e| e.into_error())?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}
