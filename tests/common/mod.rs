#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tabload::destination::{ConnectOptions, Connector, Destination};
use tabload::error::{DestinationError, ReadError};
use tabload::execution::{ImportOptions, Importer, ProgressEvent, ProgressSink};
use tabload::ingestion::{Workbook, WorkbookOpener};
use tabload::naming::ColumnSpec;
use tabload::types::{
    ConnectionDescriptor, ImportRequest, ImportTarget, RowSet, SourceKind, TableTarget,
};

/// A committed table in the fake database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug)]
struct PendingCopy {
    key: String,
    table: Table,
}

/// Everything the fake database saw, shared between the test and the worker.
#[derive(Debug, Default)]
pub struct DbState {
    /// Every statement in order, including `BEGIN`/`COMMIT`/`ROLLBACK` and `COPY` text.
    pub statements: Vec<String>,
    /// Committed tables keyed by `namespace.table`.
    pub tables: BTreeMap<String, Table>,
    pub connects: usize,
    pub closed: usize,
    /// Statements containing any of these fragments are rejected.
    pub fail_statements_containing: Vec<String>,
    /// Copies into these table names are rejected.
    pub fail_copy_into: Vec<String>,
    /// The session dies once this many statements have been sent; everything after fails.
    pub lose_connection_after: Option<usize>,
    /// Set once the session has died.
    pub lost: bool,
    in_transaction: bool,
    pending: Vec<PendingCopy>,
}

pub type SharedDb = Arc<Mutex<DbState>>;

pub fn shared_db() -> SharedDb {
    Arc::new(Mutex::new(DbState::default()))
}

/// Connector handing out [`RecordingDestination`]s over one shared state.
#[derive(Debug, Clone)]
pub struct RecordingConnector {
    pub db: SharedDb,
    /// When set, every connection attempt is refused with this message.
    pub refuse: Option<String>,
}

impl RecordingConnector {
    pub fn new(db: &SharedDb) -> Self {
        Self {
            db: Arc::clone(db),
            refuse: None,
        }
    }

    pub fn refusing(db: &SharedDb, message: &str) -> Self {
        Self {
            db: Arc::clone(db),
            refuse: Some(message.to_string()),
        }
    }
}

impl Connector for RecordingConnector {
    fn connect(
        &self,
        _descriptor: &ConnectionDescriptor,
        _options: &ConnectOptions,
    ) -> Result<Box<dyn Destination>, DestinationError> {
        if let Some(message) = &self.refuse {
            return Err(DestinationError::rejected(message.clone()));
        }
        self.db.lock().unwrap().connects += 1;
        Ok(Box::new(RecordingDestination {
            db: Arc::clone(&self.db),
        }))
    }
}

/// In-memory destination with transactional copies.
///
/// Copies become visible in [`DbState::tables`] on commit and are discarded on rollback.
pub struct RecordingDestination {
    db: SharedDb,
}

impl RecordingDestination {
    /// Record `statement` and fail it if the session has died.
    fn send(db: &mut DbState, statement: &str) -> Result<(), DestinationError> {
        db.statements.push(statement.to_string());
        if db
            .lose_connection_after
            .is_some_and(|limit| db.statements.len() > limit)
        {
            db.lost = true;
        }
        if db.lost {
            return Err(DestinationError::rejected("connection closed"));
        }
        Ok(())
    }

    fn check(db: &DbState, statement: &str) -> Result<(), DestinationError> {
        match db
            .fail_statements_containing
            .iter()
            .find(|fragment| statement.contains(fragment.as_str()))
        {
            Some(fragment) => Err(DestinationError::rejected(format!(
                "injected failure on '{fragment}'"
            ))),
            None => Ok(()),
        }
    }
}

impl Drop for RecordingDestination {
    fn drop(&mut self) {
        if let Ok(mut db) = self.db.lock() {
            db.closed += 1;
        }
    }
}

impl Destination for RecordingDestination {
    fn execute(&mut self, statement: &str) -> Result<(), DestinationError> {
        let mut db = self.db.lock().unwrap();
        Self::send(&mut db, statement)?;
        Self::check(&db, statement)
    }

    fn begin(&mut self) -> Result<(), DestinationError> {
        let mut db = self.db.lock().unwrap();
        Self::send(&mut db, "BEGIN")?;
        db.in_transaction = true;
        db.pending.clear();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DestinationError> {
        let mut db = self.db.lock().unwrap();
        Self::send(&mut db, "COMMIT")?;
        Self::check(&db, "COMMIT")?;
        db.in_transaction = false;
        let pending = std::mem::take(&mut db.pending);
        for copy in pending {
            db.tables.insert(copy.key, copy.table);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DestinationError> {
        let mut db = self.db.lock().unwrap();
        Self::send(&mut db, "ROLLBACK")?;
        db.in_transaction = false;
        db.pending.clear();
        Ok(())
    }

    fn copy_csv_in(
        &mut self,
        table: &TableTarget,
        columns: &ColumnSpec,
        data: &mut dyn Read,
    ) -> Result<u64, DestinationError> {
        let statement = tabload::destination::sql::copy_csv_from_stdin(table, columns);
        {
            let mut db = self.db.lock().unwrap();
            Self::send(&mut db, &statement)?;
            Self::check(&db, &statement)?;
            if db.fail_copy_into.contains(&table.table) {
                return Err(DestinationError::rejected(format!(
                    "injected copy failure for {}",
                    table.table
                )));
            }
        }

        let mut payload = String::new();
        data.read_to_string(&mut payload)?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(payload.as_bytes());
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| DestinationError::rejected(e.to_string()))?;
            if record.len() != columns.len() {
                return Err(DestinationError::rejected(format!(
                    "extra data after last expected column: got {} fields, expected {}",
                    record.len(),
                    columns.len()
                )));
            }
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let copied = rows.len() as u64;
        let mut db = self.db.lock().unwrap();
        let key = format!("{}.{}", table.namespace, table.table);
        let copy = PendingCopy {
            key,
            table: Table {
                columns: columns.names().map(str::to_string).collect(),
                rows,
            },
        };
        db.pending.push(copy);
        Ok(copied)
    }

    fn is_closed(&self) -> bool {
        self.db.lock().unwrap().lost
    }
}

/// Sink that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::UnitFailed { unit, message, .. } => Some((unit, message)),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, line: &str) {
        self.on_event(&ProgressEvent::Message {
            line: line.to_string(),
        });
    }

    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// One sheet of a [`FakeWorkbook`]: its rows, or the message its read fails with.
pub type FakeSheet = (String, Result<RowSet, String>);

/// Workbook opener serving canned sheets keyed by file name.
///
/// Files not in the map fail to open, like a corrupt workbook would.
#[derive(Debug, Default, Clone)]
pub struct FakeWorkbooks {
    books: HashMap<String, Vec<FakeSheet>>,
    /// Number of `open` calls so far, shared across clones.
    pub opens: Arc<AtomicUsize>,
}

impl FakeWorkbooks {
    pub fn with_book(mut self, file_name: &str, sheets: Vec<FakeSheet>) -> Self {
        self.books.insert(file_name.to_string(), sheets);
        self
    }
}

impl WorkbookOpener for FakeWorkbooks {
    fn open(&self, path: &Path) -> Result<Box<dyn Workbook>, ReadError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.books.get(&name) {
            Some(sheets) => Ok(Box::new(FakeWorkbook {
                sheets: sheets.clone(),
            })),
            None => Err(ReadError::Malformed {
                message: format!("{name} is not a workbook"),
            }),
        }
    }
}

struct FakeWorkbook {
    sheets: Vec<FakeSheet>,
}

impl Workbook for FakeWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<RowSet, ReadError> {
        let (_, rows) = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .ok_or_else(|| ReadError::Malformed {
                message: format!("no sheet named {sheet}"),
            })?;
        rows.clone()
            .map_err(|message| ReadError::Malformed { message })
    }
}

pub fn sheet(name: &str, header: &[&str], rows: &[&[&str]]) -> FakeSheet {
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect();
    (
        name.to_string(),
        Ok(RowSet::new(
            header.iter().map(|c| c.to_string()).collect(),
            rows,
        )),
    )
}

pub fn broken_sheet(name: &str, message: &str) -> FakeSheet {
    (name.to_string(), Err(message.to_string()))
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

pub fn importer(db: &SharedDb) -> Importer {
    Importer::with_connector(
        Arc::new(RecordingConnector::new(db)),
        ImportOptions::default(),
    )
}

pub fn request(dir: &Path, namespace: &str, kind: SourceKind) -> ImportRequest {
    ImportRequest::new(
        ImportTarget::new(ConnectionDescriptor::default(), namespace),
        dir,
        kind,
    )
}
