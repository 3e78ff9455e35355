//! `tabload` bulk-loads a directory of CSV files or spreadsheet workbooks into PostgreSQL.
//!
//! Every file (or every sheet of every workbook) becomes one table in a target schema. Table
//! and column names are sanitized into valid, collision-free identifiers; rows are loaded
//! with `COPY ... FROM STDIN` rather than row-by-row inserts; and each unit runs in its own
//! transaction, so one bad file never aborts the batch.
//!
//! The primary entrypoint is [`execution::Importer::run`] (or [`execution::spawn_import`] to
//! run it on a worker thread). Progress is delivered to an [`execution::ProgressSink`].
//!
//! ## What you can import
//!
//! - **CSV**: `.csv` files, UTF-8 with automatic fallback to `windows-1252` (`latin1`)
//! - **Workbooks** (requires the Cargo feature `excel`, on by default): `.xlsx`, `.xlsm`,
//!   `.xls`, `.xlsb`, `.ods`; one table per sheet, named `<file>_<sheet>`
//!
//! Every destination column is `TEXT`. No type inference is performed: spreadsheet data is
//! not assumed to be type-consistent, and cleansing is left to downstream consumers.
//! Destination tables are always dropped (`CASCADE`) and re-created; there is no append or
//! upsert mode.
//!
//! ## Quick example
//!
//! ```no_run
//! use tabload::execution::{Importer, ImportOptions, TracingSink};
//! use tabload::types::{ConnectionDescriptor, ImportRequest, ImportTarget, SourceKind};
//!
//! # fn main() -> Result<(), tabload::ImportError> {
//! let connection = ConnectionDescriptor {
//!     host: "db.internal".to_string(),
//!     password: Some("secret".to_string()),
//!     ..ConnectionDescriptor::default()
//! };
//! let request = ImportRequest::new(
//!     ImportTarget::new(connection, "staging"),
//!     "./exports",
//!     SourceKind::Workbook,
//! );
//!
//! let outcome = Importer::new(ImportOptions::default()).run(&request, &TracingSink)?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Background runs
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tabload::execution::{Importer, progress_channel, spawn_import};
//! use tabload::types::{ConnectionDescriptor, ImportRequest, ImportTarget, SourceKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = ImportRequest::new(
//!     ImportTarget::new(ConnectionDescriptor::default(), "public"),
//!     "./exports",
//!     SourceKind::Delimited,
//! );
//! let (sink, events) = progress_channel(256);
//! let handle = spawn_import(Importer::default(), request, Arc::new(sink))?;
//!
//! let outcome = handle.wait_polling(Duration::from_millis(100), || {
//!     for event in events.try_iter() {
//!         println!("{event}");
//!     }
//! })?;
//! println!("overall success: {}", outcome.overall_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`naming`]: identifier sanitization, column deduplication, table names
//! - [`ingestion`]: directory enumeration and format-specific row readers
//! - [`destination`]: the database seam and its PostgreSQL implementation
//! - [`execution`]: the batch coordinator, worker thread, and progress sinks
//! - [`types`]: request/outcome data model
//! - [`error`]: error taxonomy

pub mod destination;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod naming;
pub mod types;

pub use error::{ErrorKind, ImportError, ImportResult};
