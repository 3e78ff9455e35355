//! The destination database seam.
//!
//! The engine talks to the database only through [`Connector`] and [`Destination`]: plain
//! statements, explicit transaction control, and a streamed CSV copy into named columns.
//! [`PostgresConnector`] is the production implementation.

pub mod pg;
pub mod sql;

use std::io::Read;
use std::time::Duration;

use crate::error::DestinationError;
use crate::naming::ColumnSpec;
use crate::types::{ConnectionDescriptor, TableTarget};

pub use pg::{PostgresConnector, PostgresDestination};

/// One open destination session. Used from a single thread, one statement at a time.
pub trait Destination {
    /// Run a statement that returns no rows.
    fn execute(&mut self, statement: &str) -> Result<(), DestinationError>;

    /// Open a transaction.
    fn begin(&mut self) -> Result<(), DestinationError>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<(), DestinationError>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<(), DestinationError>;

    /// Stream fully-quoted, headerless CSV from `data` into `columns` of `table`, in the
    /// column spec's order. Returns the number of rows copied.
    fn copy_csv_in(
        &mut self,
        table: &TableTarget,
        columns: &ColumnSpec,
        data: &mut dyn Read,
    ) -> Result<u64, DestinationError>;

    /// `true` once the session is unusable (server gone, socket dropped). Nothing sent after
    /// this point can succeed.
    fn is_closed(&self) -> bool;
}

/// Session settings that are not part of the connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Give up connecting after this long.
    pub connect_timeout: Option<Duration>,
    /// Reported to the server as `application_name`.
    pub application_name: String,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            application_name: "tabload".to_string(),
        }
    }
}

/// Opens destination sessions.
pub trait Connector: Send + Sync {
    /// Connect to the database described by `descriptor`.
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Destination>, DestinationError>;
}
