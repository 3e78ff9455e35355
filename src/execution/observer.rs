//! Progress events and the sinks that deliver them: tracing, callbacks, channels, files.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ErrorKind, ImportSeverity};
use crate::types::{SourceKind, Summary};

/// Progress events emitted by the batch coordinator, in the order they happen.
///
/// `Display` renders the human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted { endpoint: String, kind: SourceKind },
    Connected { endpoint: String },
    NamespaceRenamed { requested: String, sanitized: String },
    NamespaceReady { namespace: String },
    SourcesListed { kind: SourceKind, files: usize, dir: PathBuf },
    SourceUnreadable { path: PathBuf, message: String },
    WorkbookEmpty { path: PathBuf },
    UnitStarted { index: usize, unit: String, table: String },
    EncodingFallback { unit: String, encoding: &'static str },
    UnitSkippedEmpty { unit: String },
    UnitLoaded { unit: String, table: String, rows: u64 },
    UnitFailed { unit: String, kind: ErrorKind, message: String },
    Cancelled,
    Fatal { message: String },
    RunFinished { summary: Summary },
    ConnectionClosed,
    /// Free-form line passed to [`ProgressSink::report`] by the caller.
    Message { line: String },
}

impl ProgressEvent {
    /// Severity of this event.
    pub fn severity(&self) -> ImportSeverity {
        match self {
            Self::NamespaceRenamed { .. }
            | Self::SourceUnreadable { .. }
            | Self::WorkbookEmpty { .. }
            | Self::EncodingFallback { .. }
            | Self::UnitSkippedEmpty { .. }
            | Self::Cancelled => ImportSeverity::Warning,
            Self::UnitFailed { .. } => ImportSeverity::Error,
            Self::Fatal { .. } => ImportSeverity::Critical,
            Self::RunFinished { summary } => match summary {
                Summary::NoSources | Summary::AllSucceeded { .. } => ImportSeverity::Info,
                Summary::Partial { .. } => ImportSeverity::Warning,
                Summary::NoneSucceeded { .. } => ImportSeverity::Error,
            },
            _ => ImportSeverity::Info,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { endpoint, kind } => write!(f, "starting {kind} import into {endpoint}"),
            Self::Connected { endpoint } => write!(f, "connected to {endpoint}"),
            Self::NamespaceRenamed { requested, sanitized } => {
                write!(f, "schema name '{requested}' adjusted to '{sanitized}'")
            }
            Self::NamespaceReady { namespace } => write!(f, "schema \"{namespace}\" is ready"),
            Self::SourcesListed { kind, files, dir } => {
                write!(f, "found {files} {kind} file(s) in {}", dir.display())
            }
            Self::SourceUnreadable { path, message } => {
                write!(f, "  WARNING: cannot open {}: {message}", path.display())
            }
            Self::WorkbookEmpty { path } => {
                write!(f, "  WARNING: {} has no sheets, skipping", path.display())
            }
            Self::UnitStarted { index, unit, table } => {
                write!(f, "processing #{index}: {unit} -> {table}")
            }
            Self::EncodingFallback { unit, encoding } => {
                write!(f, "  WARNING: {unit} is not valid UTF-8, read as {encoding}")
            }
            Self::UnitSkippedEmpty { unit } => write!(f, "  WARNING: {unit} has no data rows, skipping"),
            Self::UnitLoaded { table, rows, .. } => write!(f, "  loaded {rows} row(s) into {table}"),
            Self::UnitFailed { unit, message, .. } => write!(f, "  ERROR ({unit}): {message}"),
            Self::Cancelled => f.write_str("cancelled; remaining units were not processed"),
            Self::Fatal { message } => write!(f, "import failed: {message}"),
            Self::RunFinished { summary } => fmt::Display::fmt(summary, f),
            Self::ConnectionClosed => f.write_str("database connection closed"),
            Self::Message { line } => f.write_str(line),
        }
    }
}

/// Receives progress from a running import.
///
/// Called synchronously on the worker thread, so implementations must be cheap and must hand
/// off to their own thread if they touch UI state.
pub trait ProgressSink: Send + Sync {
    /// Receive one human-readable status line.
    fn report(&self, line: &str);

    /// Receive a structured event. Defaults to forwarding its line to [`Self::report`].
    fn on_event(&self, event: &ProgressEvent) {
        self.report(&event.to_string());
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn report(&self, line: &str) {
        (**self).report(line);
    }

    fn on_event(&self, event: &ProgressEvent) {
        (**self).on_event(event);
    }
}

/// Sends events into a bounded channel for the caller to drain.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: SyncSender<ProgressEvent>,
}

/// Create a bounded progress channel.
///
/// The worker blocks when `capacity` events are queued, so the caller must keep draining the
/// receiver. Events are delivered in the order they were produced. Once the receiver is
/// dropped, further events are discarded.
pub fn progress_channel(capacity: usize) -> (ChannelSink, Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (ChannelSink { tx }, rx)
}

impl ProgressSink for ChannelSink {
    fn report(&self, line: &str) {
        self.on_event(&ProgressEvent::Message {
            line: line.to_string(),
        });
    }

    fn on_event(&self, event: &ProgressEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

/// Forwards events to `tracing` at a level matching their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&self, line: &str) {
        tracing::info!(target: "tabload::progress", "{line}");
    }

    fn on_event(&self, event: &ProgressEvent) {
        match event.severity() {
            ImportSeverity::Info => tracing::info!(target: "tabload::progress", "{event}"),
            ImportSeverity::Warning => tracing::warn!(target: "tabload::progress", "{event}"),
            ImportSeverity::Error | ImportSeverity::Critical => {
                tracing::error!(target: "tabload::progress", "{event}")
            }
        }
    }
}

/// Wraps a plain `Fn(&str)` callback.
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    /// Create a sink calling `callback` with every status line.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> fmt::Debug for CallbackSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

impl<F> ProgressSink for CallbackSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, line: &str) {
        (self.callback)(line);
    }
}

/// A sink that fans out to a list of sinks.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl CompositeSink {
    /// Create a composite sink from a list of sinks.
    pub fn new(sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self { sinks }
    }
}

impl fmt::Debug for CompositeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSink")
            .field("sinks_len", &self.sinks.len())
            .finish()
    }
}

impl ProgressSink for CompositeSink {
    fn report(&self, line: &str) {
        for s in &self.sinks {
            s.report(line);
        }
    }

    fn on_event(&self, event: &ProgressEvent) {
        for s in &self.sinks {
            s.on_event(event);
        }
    }
}

/// Appends progress lines to a local log file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    /// Create a sink that appends to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, severity: ImportSeverity, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {severity:?} {line}", unix_ts());
        }
    }
}

impl ProgressSink for FileSink {
    fn report(&self, line: &str) {
        self.append_line(ImportSeverity::Info, line);
    }

    fn on_event(&self, event: &ProgressEvent) {
        self.append_line(event.severity(), &event.to_string());
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
