//! Batch coordination: connect, provision the namespace, walk the units, report.
//!
//! This module sits "above" [`crate::ingestion`] and [`crate::destination`] and provides:
//!
//! - [`Importer`]: runs one batch on the calling thread
//! - [`spawn_import`]: runs one batch on a dedicated worker thread
//! - [`ProgressSink`] implementations for delivering progress to the caller
//!
//! A run moves through connect → provision namespace → enumerate → one unit at a time →
//! summary. Anything failing before the first unit is fatal and returned as `Err`; unit
//! failures are rolled back, reported, counted, and the run moves on, unless the destination
//! session has closed underneath them.

mod cancel;
mod materialize;
mod observer;
mod worker;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::{error, info, info_span, warn};

use crate::destination::{ConnectOptions, Connector, Destination, PostgresConnector, sql};
use crate::error::{DestinationError, ImportError, ImportResult, LoadError};
use crate::ingestion::{
    Discovery, SourceEnumerator, SourceUnit, WorkbookOpener, default_workbook_opener,
};
use crate::naming::{sanitize_namespace, table_target};
use crate::types::{
    ConnectionDescriptor, ImportOutcome, ImportRequest, ImportTarget, SourceKind, UnitStatus,
};

pub use cancel::CancellationToken;
pub use materialize::{materialize, stage_rows};
pub use observer::{
    CallbackSink, ChannelSink, CompositeSink, FileSink, ProgressEvent, ProgressSink, TracingSink,
    progress_channel,
};
pub use worker::{ImportHandle, spawn_import};

/// Configuration for an [`Importer`].
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Directory for staging files. If `None`, uses the system temp directory.
    pub staging_dir: Option<PathBuf>,
    /// Encoding tried for delimited files that are not valid UTF-8.
    pub fallback_encoding: &'static Encoding,
    /// Connection settings beyond the descriptor.
    pub connect: ConnectOptions,
    /// Checked between units; `None` means the run cannot be cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            staging_dir: None,
            fallback_encoding: WINDOWS_1252,
            connect: ConnectOptions::default(),
            cancel: None,
        }
    }
}

/// Runs import batches against one destination kind.
#[derive(Clone)]
pub struct Importer {
    connector: Arc<dyn Connector>,
    workbooks: Arc<dyn WorkbookOpener>,
    options: ImportOptions,
}

impl fmt::Debug for Importer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Importer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

impl Importer {
    /// An importer writing to PostgreSQL.
    pub fn new(options: ImportOptions) -> Self {
        Self::with_connector(Arc::new(PostgresConnector), options)
    }

    /// An importer writing through a custom [`Connector`].
    pub fn with_connector(connector: Arc<dyn Connector>, options: ImportOptions) -> Self {
        Self {
            connector,
            workbooks: default_workbook_opener(),
            options,
        }
    }

    /// Replace the workbook opener.
    pub fn with_workbook_opener(mut self, opener: Arc<dyn WorkbookOpener>) -> Self {
        self.workbooks = opener;
        self
    }

    /// Options this importer was built with.
    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Open and close one connection. Used to check credentials before a run.
    pub fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ImportResult<()> {
        descriptor.validate()?;
        let destination = self.connect(descriptor)?;
        drop(destination);
        Ok(())
    }

    /// Run one batch on the calling thread.
    ///
    /// Returns `Err` only for fatal errors (invalid target, connection, namespace, source
    /// directory). Every unit-level problem is reported through `sink` and counted in the
    /// returned [`ImportOutcome`].
    pub fn run(
        &self,
        request: &ImportRequest,
        sink: &dyn ProgressSink,
    ) -> ImportResult<ImportOutcome> {
        let endpoint = request.target.connection.endpoint();
        let span = info_span!("import", %endpoint, kind = %request.kind);
        let _enter = span.enter();

        sink.on_event(&ProgressEvent::RunStarted {
            endpoint,
            kind: request.kind,
        });

        let result = self.run_connected(request, sink);
        match &result {
            Ok(outcome) => {
                let summary = outcome.summary();
                info!(?outcome, %summary, "import finished");
                sink.on_event(&ProgressEvent::RunFinished { summary });
            }
            Err(err) => {
                error!(error = %err, "import aborted");
                sink.on_event(&ProgressEvent::Fatal {
                    message: err.to_string(),
                });
            }
        }
        result
    }

    fn connect(&self, descriptor: &ConnectionDescriptor) -> ImportResult<Box<dyn Destination>> {
        self.connector
            .connect(descriptor, &self.options.connect)
            .map_err(|source| ImportError::Connection {
                endpoint: descriptor.endpoint(),
                source,
            })
    }

    fn run_connected(
        &self,
        request: &ImportRequest,
        sink: &dyn ProgressSink,
    ) -> ImportResult<ImportOutcome> {
        let descriptor = &request.target.connection;
        descriptor.validate()?;
        let mut destination = self.connect(descriptor)?;
        sink.on_event(&ProgressEvent::Connected {
            endpoint: descriptor.endpoint(),
        });

        let result = self.run_batch(destination.as_mut(), request, sink);

        drop(destination);
        sink.on_event(&ProgressEvent::ConnectionClosed);
        result
    }

    fn run_batch(
        &self,
        destination: &mut dyn Destination,
        request: &ImportRequest,
        sink: &dyn ProgressSink,
    ) -> ImportResult<ImportOutcome> {
        let namespace = provision_namespace(destination, &request.target.namespace, sink)?;

        let mut units = SourceEnumerator::new(Arc::clone(&self.workbooks), self.options.fallback_encoding)
            .enumerate(&request.source_dir, request.kind)
            .map_err(|source| ImportError::SourceDirectory {
                path: request.source_dir.clone(),
                source,
            })?;
        sink.on_event(&ProgressEvent::SourcesListed {
            kind: request.kind,
            files: units.file_count(),
            dir: request.source_dir.clone(),
        });

        let mut batch = Batch {
            destination,
            endpoint: request.target.connection.endpoint(),
            namespace: &namespace,
            staging_dir: self.options.staging_dir.as_deref(),
            sink,
            outcome: ImportOutcome::default(),
            claimed: HashMap::new(),
        };

        loop {
            // Checked before advancing: advancing may open the next workbook.
            if self.cancelled() {
                warn!("cancellation requested; stopping before the next unit");
                batch.outcome.cancelled = true;
                sink.on_event(&ProgressEvent::Cancelled);
                break;
            }
            let Some(discovery) = units.next() else {
                break;
            };
            batch.accept(discovery)?;
        }

        Ok(batch.outcome)
    }

    fn cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Sanitize the namespace and make sure it exists. Returns the sanitized name.
fn provision_namespace(
    destination: &mut dyn Destination,
    requested: &str,
    sink: &dyn ProgressSink,
) -> ImportResult<String> {
    let namespace = sanitize_namespace(requested);
    if namespace != requested {
        info!(requested, sanitized = %namespace, "namespace renamed");
        sink.on_event(&ProgressEvent::NamespaceRenamed {
            requested: requested.to_string(),
            sanitized: namespace.clone(),
        });
    }

    destination
        .execute(&sql::create_namespace(&namespace))
        .map_err(|source| ImportError::Namespace {
            namespace: namespace.clone(),
            source,
        })?;
    sink.on_event(&ProgressEvent::NamespaceReady {
        namespace: namespace.clone(),
    });
    Ok(namespace)
}

/// Per-run state while units are processed.
struct Batch<'a> {
    destination: &'a mut dyn Destination,
    endpoint: String,
    namespace: &'a str,
    staging_dir: Option<&'a Path>,
    sink: &'a dyn ProgressSink,
    outcome: ImportOutcome,
    /// Destination table -> unit that loaded it in this run.
    claimed: HashMap<String, String>,
}

impl Batch<'_> {
    fn accept(&mut self, discovery: Discovery) -> ImportResult<()> {
        match discovery {
            Discovery::Unit(unit) => return self.process_unit(unit),
            Discovery::Unreadable { path, error } => {
                warn!(path = %path.display(), %error, "cannot open workbook");
                self.outcome.unreadable_sources += 1;
                self.sink.on_event(&ProgressEvent::SourceUnreadable {
                    path,
                    message: error.to_string(),
                });
            }
            Discovery::NoSheets { path } => {
                warn!(path = %path.display(), "workbook has no sheets");
                self.outcome.sheetless_sources += 1;
                self.sink.on_event(&ProgressEvent::WorkbookEmpty { path });
            }
        }
        Ok(())
    }

    /// Load one unit. Only a dead session is an error here; every other failure is counted
    /// and reported.
    fn process_unit(&mut self, unit: SourceUnit) -> ImportResult<()> {
        self.outcome.discovered += 1;
        let index = self.outcome.discovered;
        let label = unit.label();
        let target = table_target(self.namespace, unit.path(), unit.sheet());

        let span = info_span!("unit", index, unit = %label, table = %target);
        let _enter = span.enter();
        self.sink.on_event(&ProgressEvent::UnitStarted {
            index,
            unit: label.clone(),
            table: target.to_string(),
        });

        let result = match self.claimed.get(&target.table) {
            Some(previous) => Err(ImportError::UnitLoad {
                table: target.to_string(),
                source: LoadError::TableNameCollision {
                    table: target.to_string(),
                    previous: previous.clone(),
                },
            }),
            None => materialize(
                &mut *self.destination,
                unit,
                &target,
                self.staging_dir,
                self.sink,
            ),
        };

        match result {
            Ok(UnitStatus::Loaded { rows }) => {
                self.outcome.succeeded += 1;
                self.claimed.insert(target.table.clone(), label.clone());
                self.sink.on_event(&ProgressEvent::UnitLoaded {
                    unit: label,
                    table: target.to_string(),
                    rows,
                });
            }
            Ok(UnitStatus::SkippedEmpty) => {
                self.outcome.skipped_empty += 1;
                self.sink
                    .on_event(&ProgressEvent::UnitSkippedEmpty { unit: label });
            }
            Err(err) => {
                warn!(error = %err, "unit failed");
                self.outcome.failed += 1;
                self.sink.on_event(&ProgressEvent::UnitFailed {
                    unit: label,
                    kind: err.kind(),
                    message: err.to_string(),
                });

                if self.destination.is_closed() {
                    error!(table = %target, "destination session closed; aborting the run");
                    return Err(ImportError::Connection {
                        endpoint: self.endpoint.clone(),
                        source: DestinationError::Lost {
                            table: target.to_string(),
                            cause: err.to_string(),
                        },
                    });
                }
            }
        }
        Ok(())
    }
}

/// Run one batch against PostgreSQL with default options and report whether it fully
/// succeeded.
///
/// Fatal errors are reported through `sink` and yield `false`.
///
/// ```no_run
/// use std::path::Path;
///
/// use tabload::execution::{CallbackSink, run};
/// use tabload::types::{ConnectionDescriptor, ImportTarget, SourceKind};
///
/// let target = ImportTarget::new(ConnectionDescriptor::default(), "staging");
/// let sink = CallbackSink::new(|line: &str| eprintln!("{line}"));
/// let ok = run(&target, Path::new("./exports"), SourceKind::Delimited, &sink);
/// println!("success={ok}");
/// ```
pub fn run(
    target: &ImportTarget,
    source_dir: &Path,
    kind: SourceKind,
    sink: &dyn ProgressSink,
) -> bool {
    let request = ImportRequest::new(target.clone(), source_dir, kind);
    Importer::default()
        .run(&request, sink)
        .is_ok_and(|outcome| outcome.overall_success())
}
