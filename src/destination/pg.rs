//! PostgreSQL destination on the synchronous `postgres` client.

use std::io::{self, Read};

use postgres::{Client, NoTls};
use tracing::debug;

use crate::error::DestinationError;
use crate::naming::ColumnSpec;
use crate::types::{ConnectionDescriptor, TableTarget};

use super::{ConnectOptions, Connector, Destination, sql};

/// Connects with `postgres::Config`, without TLS.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

impl Connector for PostgresConnector {
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Destination>, DestinationError> {
        Ok(Box::new(PostgresDestination::connect(descriptor, options)?))
    }
}

/// An open PostgreSQL session.
pub struct PostgresDestination {
    client: Client,
}

impl PostgresDestination {
    /// Open a session.
    pub fn connect(
        descriptor: &ConnectionDescriptor,
        options: &ConnectOptions,
    ) -> Result<Self, DestinationError> {
        let mut config = postgres::Config::new();
        config
            .host(&descriptor.host)
            .port(descriptor.port)
            .dbname(&descriptor.database)
            .user(&descriptor.user)
            .application_name(&options.application_name);
        if let Some(password) = &descriptor.password {
            config.password(password);
        }
        if let Some(timeout) = options.connect_timeout {
            config.connect_timeout(timeout);
        }

        let client = config.connect(NoTls)?;
        debug!(endpoint = %descriptor.endpoint(), "connected");
        Ok(Self { client })
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Destination for PostgresDestination {
    fn execute(&mut self, statement: &str) -> Result<(), DestinationError> {
        debug!(%statement, "execute");
        self.client.batch_execute(statement)?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DestinationError> {
        self.execute("BEGIN")
    }

    fn commit(&mut self) -> Result<(), DestinationError> {
        self.execute("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DestinationError> {
        self.execute("ROLLBACK")
    }

    fn copy_csv_in(
        &mut self,
        table: &TableTarget,
        columns: &ColumnSpec,
        data: &mut dyn Read,
    ) -> Result<u64, DestinationError> {
        let statement = sql::copy_csv_from_stdin(table, columns);
        debug!(%statement, "copy in");
        let mut writer = self.client.copy_in(statement.as_str())?;
        io::copy(data, &mut writer)?;
        Ok(writer.finish()?)
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}
