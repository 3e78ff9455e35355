//! Source units and directory enumeration.
//!
//! A [`SourceUnit`] pairs a location (file path, optional sheet) with a [`RowSource`] that
//! produces its rows on demand. Delimited files and workbook sheets both end up as a
//! [`RowSet`], so nothing downstream of [`SourceUnit::load`] knows which format it came from.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ReadError;
use crate::types::{RowSet, SourceKind};

use super::csv::DelimitedFile;

/// Produces the rows of one unit. Consumed exactly once.
pub trait RowSource {
    /// Read the full row set into memory.
    fn load(self: Box<Self>) -> Result<RowSet, ReadError>;
}

/// An opened workbook.
pub trait Workbook {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Read one sheet.
    fn read_sheet(&mut self, sheet: &str) -> Result<RowSet, ReadError>;
}

/// Opens workbook files. Shared with the worker thread, hence `Send + Sync`.
pub trait WorkbookOpener: Send + Sync {
    /// Open the workbook at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn Workbook>, ReadError>;
}

/// Opener used when the crate is built without workbook support.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkbooksDisabled;

impl WorkbookOpener for WorkbooksDisabled {
    fn open(&self, _path: &Path) -> Result<Box<dyn Workbook>, ReadError> {
        Err(ReadError::WorkbooksDisabled)
    }
}

/// The opener used by default: `calamine` when the `excel` feature is on.
pub fn default_workbook_opener() -> Arc<dyn WorkbookOpener> {
    #[cfg(feature = "excel")]
    {
        Arc::new(super::excel::CalamineOpener)
    }

    #[cfg(not(feature = "excel"))]
    {
        Arc::new(WorkbooksDisabled)
    }
}

/// One importable table source: a file, or one sheet of a workbook.
pub struct SourceUnit {
    path: PathBuf,
    sheet: Option<String>,
    rows: Box<dyn RowSource>,
}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnit")
            .field("path", &self.path)
            .field("sheet", &self.sheet)
            .finish()
    }
}

impl SourceUnit {
    /// Create a unit from its location and row source.
    pub fn new(path: impl Into<PathBuf>, sheet: Option<String>, rows: Box<dyn RowSource>) -> Self {
        Self {
            path: path.into(),
            sheet,
            rows,
        }
    }

    /// Source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sheet name, for workbook units.
    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    /// Human-readable name: `people.csv` or `book.xlsx[Sheet1]`.
    pub fn label(&self) -> String {
        let file = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        match &self.sheet {
            Some(sheet) => format!("{file}[{sheet}]"),
            None => file,
        }
    }

    /// Read the unit's rows. Consumes the unit.
    pub fn load(self) -> Result<RowSet, ReadError> {
        self.rows.load()
    }
}

struct WorkbookSheet {
    workbook: Rc<RefCell<Box<dyn Workbook>>>,
    sheet: String,
}

impl RowSource for WorkbookSheet {
    fn load(self: Box<Self>) -> Result<RowSet, ReadError> {
        self.workbook.borrow_mut().read_sheet(&self.sheet)
    }
}

/// One item produced by enumeration.
#[derive(Debug)]
pub enum Discovery {
    /// An importable unit.
    Unit(SourceUnit),
    /// A workbook that could not be opened. The run is degraded but continues.
    Unreadable { path: PathBuf, error: ReadError },
    /// A workbook with no sheets. Produces no units.
    NoSheets { path: PathBuf },
}

/// Lists source files and expands them into units.
#[derive(Clone)]
pub struct SourceEnumerator {
    opener: Arc<dyn WorkbookOpener>,
    fallback_encoding: &'static Encoding,
}

impl fmt::Debug for SourceEnumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEnumerator")
            .field("fallback_encoding", &self.fallback_encoding.name())
            .finish()
    }
}

impl Default for SourceEnumerator {
    fn default() -> Self {
        Self::new(default_workbook_opener(), WINDOWS_1252)
    }
}

impl SourceEnumerator {
    /// Create an enumerator with an explicit workbook opener and CSV fallback encoding.
    pub fn new(opener: Arc<dyn WorkbookOpener>, fallback_encoding: &'static Encoding) -> Self {
        Self {
            opener,
            fallback_encoding,
        }
    }

    /// List `directory` (non-recursively) and return a lazy iterator over its units.
    ///
    /// The file list is read immediately so its length is known; workbooks are opened and
    /// rows are read only as the iterator advances. Fails only when the directory itself
    /// cannot be read.
    pub fn enumerate(&self, directory: &Path, kind: SourceKind) -> io::Result<SourceUnits> {
        let files = list_source_files(directory, kind)?;
        debug!(dir = %directory.display(), %kind, files = files.len(), "listed source files");
        Ok(SourceUnits {
            kind,
            file_count: files.len(),
            files: files.into_iter(),
            pending: VecDeque::new(),
            opener: Arc::clone(&self.opener),
            fallback_encoding: self.fallback_encoding,
        })
    }
}

/// Enumerate `directory` with the default opener and `windows-1252` fallback.
pub fn enumerate_sources(directory: impl AsRef<Path>, kind: SourceKind) -> io::Result<SourceUnits> {
    SourceEnumerator::default().enumerate(directory.as_ref(), kind)
}

/// Absolute paths of the files in `directory` with one of `kind`'s extensions, sorted by
/// file name. Hidden files and Office lock files (`~$book.xlsx`) are ignored.
pub fn list_source_files(directory: &Path, kind: SourceKind) -> io::Result<Vec<PathBuf>> {
    let root = fs::canonicalize(directory)?;
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %root.display(), error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name.starts_with("~$") {
            continue;
        }
        if entry.path().is_file() && kind.matches_path(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Lazy, single-pass iterator over the units of one directory.
pub struct SourceUnits {
    kind: SourceKind,
    file_count: usize,
    files: std::vec::IntoIter<PathBuf>,
    pending: VecDeque<SourceUnit>,
    opener: Arc<dyn WorkbookOpener>,
    fallback_encoding: &'static Encoding,
}

impl fmt::Debug for SourceUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnits")
            .field("kind", &self.kind)
            .field("file_count", &self.file_count)
            .field("remaining_files", &self.files.len())
            .field("pending_units", &self.pending.len())
            .finish()
    }
}

impl SourceUnits {
    /// Number of matching files found in the directory.
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    fn expand_workbook(&mut self, path: PathBuf) -> Discovery {
        let workbook = match self.opener.open(&path) {
            Ok(workbook) => workbook,
            Err(error) => return Discovery::Unreadable { path, error },
        };
        let sheets = workbook.sheet_names();
        if sheets.is_empty() {
            return Discovery::NoSheets { path };
        }

        let shared = Rc::new(RefCell::new(workbook));
        for sheet in sheets {
            let rows = WorkbookSheet {
                workbook: Rc::clone(&shared),
                sheet: sheet.clone(),
            };
            self.pending
                .push_back(SourceUnit::new(path.clone(), Some(sheet), Box::new(rows)));
        }
        match self.pending.pop_front() {
            Some(unit) => Discovery::Unit(unit),
            None => Discovery::NoSheets { path },
        }
    }
}

impl Iterator for SourceUnits {
    type Item = Discovery;

    fn next(&mut self) -> Option<Discovery> {
        if let Some(unit) = self.pending.pop_front() {
            return Some(Discovery::Unit(unit));
        }

        let path = self.files.next()?;
        match self.kind {
            SourceKind::Delimited => {
                let rows = DelimitedFile::new(path.clone(), self.fallback_encoding);
                Some(Discovery::Unit(SourceUnit::new(path, None, Box::new(rows))))
            }
            SourceKind::Workbook => Some(self.expand_workbook(path)),
        }
    }
}
