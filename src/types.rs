//! Core data model types for an import run.
//!
//! A run is described by an [`ImportRequest`] (where to read, where to write) and produces an
//! [`ImportOutcome`]. Everything in between ([`RowSet`], [`TableTarget`], [`UnitStatus`]) is
//! scoped to a single unit.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, ImportResult};

/// How to reach the destination database.
///
/// `Debug` output redacts the password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionDescriptor {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Role to connect as.
    pub user: String,
    /// Password, if the server requires one.
    pub password: Option<String>,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password_set", &self.password.is_some())
            .finish()
    }
}

impl ConnectionDescriptor {
    /// `host:port/database`, for log lines. Never includes the password.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    /// Reject descriptors that cannot possibly connect.
    pub fn validate(&self) -> ImportResult<()> {
        let required = [
            ("host", &self.host),
            ("database", &self.database),
            ("user", &self.user),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ImportError::InvalidTarget {
                    message: format!("'{name}' must not be empty"),
                });
            }
        }
        if self.port == 0 {
            return Err(ImportError::InvalidTarget {
                message: "'port' must be between 1 and 65535".to_string(),
            });
        }
        Ok(())
    }
}

/// Destination connection plus the namespace (schema) tables are created in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportTarget {
    /// Where to connect.
    #[serde(default)]
    pub connection: ConnectionDescriptor,
    /// Requested namespace; sanitized (case preserved) before use.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "public".to_string()
}

impl ImportTarget {
    /// Create a target from a connection and a namespace name.
    pub fn new(connection: ConnectionDescriptor, namespace: impl Into<String>) -> Self {
        Self {
            connection,
            namespace: namespace.into(),
        }
    }
}

/// Which kind of files a run imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Comma-separated files; one unit per file.
    Delimited,
    /// Spreadsheet workbooks; one unit per sheet.
    Workbook,
}

impl SourceKind {
    /// File extensions (lowercase, without the dot) picked up for this kind.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Delimited => &["csv"],
            Self::Workbook => &["xlsx", "xlsm", "xls", "xlsb", "ods"],
        }
    }

    /// Parse a source kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        [Self::Delimited, Self::Workbook]
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }

    /// `true` if `path` has one of this kind's extensions.
    pub fn matches_path(self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
            == Some(self)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delimited => f.write_str("csv"),
            Self::Workbook => f.write_str("excel"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" | "delimited" => Ok(Self::Delimited),
            "excel" | "xlsx" | "workbook" => Ok(Self::Workbook),
            other => Err(format!("unknown source kind '{other}' (expected csv or excel)")),
        }
    }
}

/// Everything one batch needs besides the progress sink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportRequest {
    /// Destination.
    pub target: ImportTarget,
    /// Directory scanned (non-recursively) for sources.
    pub source_dir: PathBuf,
    /// Kind of files to import.
    pub kind: SourceKind,
}

impl ImportRequest {
    /// Create a request.
    pub fn new(target: ImportTarget, source_dir: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            target,
            source_dir: source_dir.into(),
            kind,
        }
    }
}

/// One unit's rows, fully loaded, with every cell as text.
///
/// Missing header cells are empty strings; missing data cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    /// Header cells in source order.
    pub header: Vec<String>,
    /// Data rows in source order.
    pub rows: Vec<Vec<String>>,
    /// Name of the fallback encoding, when the source was not valid UTF-8.
    pub fallback_encoding: Option<&'static str>,
}

impl RowSet {
    /// Create a row set decoded as UTF-8.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header,
            rows,
            fallback_encoding: None,
        }
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// `true` if there are no data rows (a header alone does not count).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableTarget {
    /// Sanitized namespace.
    pub namespace: String,
    /// Sanitized table name.
    pub table: String,
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\".\"{}\"", self.namespace, self.table)
    }
}

/// Non-error result of materializing one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// The table was (re)created and this many rows were copied in.
    Loaded { rows: u64 },
    /// The unit had no data rows; the destination was left untouched.
    SkippedEmpty,
}

/// Aggregate counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    /// Units produced by enumeration (sheets or files).
    pub discovered: usize,
    /// Units whose table was created and loaded.
    pub succeeded: usize,
    /// Units with zero data rows.
    pub skipped_empty: usize,
    /// Units that failed to read or load.
    pub failed: usize,
    /// Workbooks that could not be opened at all.
    pub unreadable_sources: usize,
    /// Workbooks that opened but held no sheets.
    pub sheetless_sources: usize,
    /// The run stopped early because its cancellation token fired.
    pub cancelled: bool,
}

impl ImportOutcome {
    /// `true` when nothing failed, nothing was unreadable, and the run was not cancelled.
    ///
    /// Empty units do not count against success.
    pub fn overall_success(&self) -> bool {
        self.failed == 0 && self.unreadable_sources == 0 && !self.cancelled
    }

    /// Units counted in the final tally. An unopenable or sheetless workbook counts as one
    /// unit.
    pub fn total(&self) -> usize {
        self.discovered + self.unreadable_sources + self.sheetless_sources
    }

    /// Final one-line classification of the run.
    pub fn summary(&self) -> Summary {
        let total = self.total();
        if total == 0 {
            Summary::NoSources
        } else if self.succeeded == total {
            Summary::AllSucceeded { total }
        } else if self.succeeded > 0 {
            Summary::Partial {
                succeeded: self.succeeded,
                total,
            }
        } else {
            Summary::NoneSucceeded { total }
        }
    }
}

/// The four terminal outcomes a caller may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Summary {
    /// The directory held nothing importable.
    NoSources,
    /// Every unit loaded.
    AllSucceeded { total: usize },
    /// Some units loaded.
    Partial { succeeded: usize, total: usize },
    /// Units were found but none loaded.
    NoneSucceeded { total: usize },
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSources => f.write_str("no importable source files found"),
            Self::AllSucceeded { total } => write!(f, "all {total} units imported successfully"),
            Self::Partial { succeeded, total } => write!(
                f,
                "{succeeded}/{total} units processed; check the log for details"
            ),
            Self::NoneSucceeded { total } => write!(
                f,
                "no units imported successfully (0/{total}); check the log for details"
            ),
        }
    }
}
