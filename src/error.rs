//! Error taxonomy: fatal run errors, per-unit read and load errors, destination errors.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Error type returned by the import engine.
///
/// Variants fall in two groups. Fatal errors ([`ImportError::is_fatal`]) stop a batch before
/// any unit is processed. Unit errors are caught at the unit boundary, rolled back, reported
/// through the progress sink, and counted in the [`crate::types::ImportOutcome`].
#[derive(Debug, Error)]
pub enum ImportError {
    /// The connection descriptor or namespace is unusable (missing host, port 0, ...).
    #[error("invalid import target: {message}")]
    InvalidTarget { message: String },

    /// The destination could not be reached.
    #[error("cannot connect to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: DestinationError,
    },

    /// The destination namespace could not be created.
    #[error("cannot provision namespace '{namespace}': {source}")]
    Namespace {
        namespace: String,
        #[source]
        source: DestinationError,
    },

    /// The source directory does not exist or cannot be listed.
    #[error("cannot read source directory {}: {source}", path.display())]
    SourceDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The background worker thread panicked before reporting an outcome.
    #[error("import worker panicked: {message}")]
    WorkerPanicked { message: String },

    /// A source file or sheet could not be read or parsed.
    #[error("cannot read {unit}: {source}")]
    UnitRead {
        unit: String,
        #[source]
        source: ReadError,
    },

    /// The destination rejected a unit, or staging failed. The unit was rolled back.
    #[error("failed to load {table}: {source}")]
    UnitLoad {
        table: String,
        #[source]
        source: LoadError,
    },
}

/// Coarse classification of an [`ImportError`], for callers that branch on the kind of
/// failure rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Run-level failure; nothing was imported.
    Fatal,
    /// A unit's source could not be read.
    UnitRead,
    /// A unit's load was rejected and rolled back.
    UnitLoad,
}

/// Severity classification used for progress events and log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal, the run carries on).
    Warning,
    /// Error-level event (a unit failed).
    Error,
    /// The run itself failed.
    Critical,
}

impl ImportError {
    /// Returns the error's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnitRead { .. } => ErrorKind::UnitRead,
            Self::UnitLoad { .. } => ErrorKind::UnitLoad,
            Self::InvalidTarget { .. }
            | Self::Connection { .. }
            | Self::Namespace { .. }
            | Self::SourceDirectory { .. }
            | Self::WorkerPanicked { .. } => ErrorKind::Fatal,
        }
    }

    /// `true` when the error aborts the whole batch.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Severity used when the error is reported.
    pub fn severity(&self) -> ImportSeverity {
        match self {
            Self::UnitRead { source, .. } if source.is_io() => ImportSeverity::Critical,
            Self::UnitRead { .. } | Self::UnitLoad { .. } => ImportSeverity::Error,
            _ => ImportSeverity::Critical,
        }
    }
}

/// Failure to read one source unit.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Underlying I/O error (file vanished, permission denied, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text parse error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    /// Workbook parse error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// The data is readable but not tabular in the expected shape.
    #[error("malformed source: {message}")]
    Malformed { message: String },

    /// Workbook sources were requested but the crate was built without `excel`.
    #[error("workbook support not enabled (enable cargo feature 'excel')")]
    WorkbooksDisabled,
}

impl ReadError {
    /// `true` when the failure came from the filesystem rather than the file's content.
    pub fn is_io(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Csv(err) => matches!(err.kind(), ::csv::ErrorKind::Io(_)),
            _ => false,
        }
    }
}

/// Failure to load one unit into the destination.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The destination rejected a statement or the bulk transfer.
    #[error(transparent)]
    Destination(#[from] DestinationError),

    /// Writing or rewinding the staging file failed.
    #[error("staging failed: {0}")]
    Staging(#[from] std::io::Error),

    /// Encoding a row into the staging file failed.
    #[error("staging failed: {0}")]
    StagingCsv(#[from] csv::Error),

    /// A data row has more cells than the header.
    #[error("row {row} has {found} cells but the header has {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },

    /// Another unit of the same run already produced this destination table.
    #[error("table {table} was already created by {previous} in this run")]
    TableNameCollision { table: String, previous: String },
}

/// Error raised by a [`crate::destination::Destination`].
#[derive(Debug, Error)]
pub enum DestinationError {
    /// PostgreSQL client error.
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),

    /// I/O error while streaming data to the destination.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other destination-specific rejection.
    #[error("{message}")]
    Rejected { message: String },

    /// The session died while a unit was loading and could not be rolled back.
    #[error("connection lost while loading {table}: {cause}")]
    Lost { table: String, cause: String },
}

impl DestinationError {
    /// Build a [`DestinationError::Rejected`] from a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
