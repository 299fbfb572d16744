//! SQL Server sessions over tiberius.
//!
//! - One TCP connection per session, no pooling
//! - Connect is bounded by the configured timeout
//! - Driver errors are wrapped without the connection string

use super::{Connector, ResultSet, Session};
use crate::connection::ConnectionString;
use crate::{ProbeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::time::Duration;
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// Builds the driver configuration for a connection string.
pub fn tiberius_config(target: &ConnectionString, trust_server_certificate: bool) -> Config {
    let mut config = Config::new();
    config.host(target.host());
    config.port(target.port());
    config.database(target.database());
    config.application_name("rdsprobe");
    config.authentication(AuthMethod::sql_server(
        target.username(),
        target.password(),
    ));
    if trust_server_certificate {
        config.trust_cert();
    }
    config
}

/// Opens tiberius sessions.
#[derive(Debug, Clone, Copy)]
pub struct SqlServerConnector {
    connect_timeout: Duration,
    trust_server_certificate: bool,
}

impl SqlServerConnector {
    /// Creates a connector.
    pub const fn new(connect_timeout: Duration, trust_server_certificate: bool) -> Self {
        Self {
            connect_timeout,
            trust_server_certificate,
        }
    }

    async fn open(&self, config: Config) -> Result<Client<Compat<TcpStream>>> {
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| ProbeError::database("Database connection error", e))?;

        tcp.set_nodelay(true)
            .map_err(|e| ProbeError::database("Database connection error", e))?;

        Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| ProbeError::database("Database connection error", e))
    }
}

/// An open tiberius client.
pub struct SqlServerSession {
    client: Client<Compat<TcpStream>>,
}

#[async_trait]
impl Connector for SqlServerConnector {
    type Session = SqlServerSession;

    async fn connect(&self, target: &ConnectionString) -> Result<Self::Session> {
        let config = tiberius_config(target, self.trust_server_certificate);
        debug!("Opening session: {}", target);

        let client = tokio::time::timeout(self.connect_timeout, self.open(config))
            .await
            .map_err(|_| ProbeError::connect_timeout(self.connect_timeout))??;

        Ok(SqlServerSession { client })
    }
}

#[async_trait]
impl Session for SqlServerSession {
    async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        debug!("Executing: {}", sql);

        let stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| ProbeError::database("Query failed", e))?;

        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| ProbeError::database("Query failed", e))?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let values = rows
            .iter()
            .map(|row| row.cells().map(|(_, data)| cell_text(data)).collect())
            .collect();

        Ok(ResultSet::new(columns, values))
    }

    async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| ProbeError::database("Failed to close session", e))
    }
}

fn temporal<'a, T>(data: &'a ColumnData<'static>) -> Option<String>
where
    T: FromSql<'a> + ToString,
{
    T::from_sql(data).ok().flatten().map(|value| value.to_string())
}

/// Renders a cell as text; NULL becomes `None`.
fn cell_text(data: &ColumnData<'static>) -> Option<String> {
    match data {
        ColumnData::U8(v) => v.as_ref().map(ToString::to_string),
        ColumnData::I16(v) => v.as_ref().map(ToString::to_string),
        ColumnData::I32(v) => v.as_ref().map(ToString::to_string),
        ColumnData::I64(v) => v.as_ref().map(ToString::to_string),
        ColumnData::F32(v) => v.as_ref().map(ToString::to_string),
        ColumnData::F64(v) => v.as_ref().map(ToString::to_string),
        ColumnData::Bit(v) => v.as_ref().map(ToString::to_string),
        ColumnData::String(v) => v.as_ref().map(ToString::to_string),
        ColumnData::Guid(v) => v.as_ref().map(ToString::to_string),
        ColumnData::Numeric(v) => v.as_ref().map(ToString::to_string),
        ColumnData::Binary(v) => v.as_ref().map(|bytes| format!("<{} bytes>", bytes.len())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<NaiveDateTime>(data)
        }
        ColumnData::Date(_) => temporal::<NaiveDate>(data),
        ColumnData::Time(_) => temporal::<NaiveTime>(data),
        ColumnData::DateTimeOffset(_) => temporal::<DateTime<FixedOffset>>(data),
        ColumnData::Xml(v) => v.as_ref().map(|xml| format!("{xml:?}")),
    }
}
