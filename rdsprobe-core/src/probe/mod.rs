//! Diagnostic probe against a SQL Server instance.
//!
//! The probe runs a fixed sequence of read-only statements:
//! server version, RDS restore task status for the target database, the
//! database list, and, when the target exists, its table list from a second
//! session. The driver sits behind [`Connector`] and [`Session`] so the
//! sequence can run against an in-memory fake.

#[cfg(feature = "mssql")]
pub mod sqlserver;


use crate::connection::ConnectionString;
use crate::report::Reporter;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, info};

/// Server version query
pub const VERSION_QUERY: &str = "SELECT @@VERSION AS Version";
/// Database list query
pub const DATABASES_QUERY: &str = "SELECT name FROM sys.databases ORDER BY name";
/// Table list query, run inside the target database
pub const TABLES_QUERY: &str = "SELECT schema_name(schema_id) AS schema_name, name \
     FROM sys.tables ORDER BY schema_name, name";

/// Remediation steps printed when the target database is missing
pub const RESTORE_REMEDIATION: [&str; 3] = [
    "Re-run the upload-and-restore-adventureworks.sh script",
    "Check IAM permissions for the RDS instance to access S3",
    "Verify the backup file in S3 is accessible",
];

/// Quotes a value as a T-SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Restore task status call for `database`.
pub fn task_status_query(database: &str) -> String {
    format!(
        "EXEC msdb.dbo.rds_task_status @db_name = {}",
        quote_literal(database)
    )
}

/// Rows returned by one statement, with columns addressable by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    /// Builds a result set; NULL cells are `None`.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let mut index = HashMap::with_capacity(columns.len());
        for (position, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(position);
        }
        Self {
            columns,
            index,
            rows,
        }
    }

    /// Iterates over the rows.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row { set: self, values })
    }
}

/// One row of a [`ResultSet`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a ResultSet,
    values: &'a [Option<String>],
}

impl<'a> Row<'a> {
    /// Cell by column name: `None` if the column is absent, `Some(None)` if NULL.
    pub fn value(&self, column: &str) -> Option<Option<&'a str>> {
        let position = *self.set.index.get(column)?;
        Some(self.values.get(position)?.as_deref())
    }

    /// Non-null cell by column name.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.value(column).flatten()
    }

    /// Non-null cell by position.
    pub fn get_index(&self, position: usize) -> Option<&'a str> {
        self.values.get(position)?.as_deref()
    }

    /// Iterates over `(column, value)` pairs.
    pub fn cells(self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> {
        self.set
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Option::as_deref))
    }
}

/// An open session to one database.
#[async_trait]
pub trait Session: Send {
    /// Runs a statement and returns its first result set.
    async fn query(&mut self, sql: &str) -> Result<ResultSet>;

    /// Closes the session.
    async fn close(self) -> Result<()>;
}

/// Opens sessions from a connection string.
#[async_trait]
pub trait Connector: Sync {
    /// Session type produced by this connector
    type Session: Session;

    /// Opens a session to the database named in `target`.
    async fn connect(&self, target: &ConnectionString) -> Result<Self::Session>;
}

/// One row of `rds_task_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTaskRecord {
    /// `task_id`, or the first column when that name is absent
    pub task_id: Option<String>,
    /// `lifecycle` value when the column is present; NULL renders as `None`
    pub lifecycle: Option<Option<String>>,
    /// Non-null `task_info` text
    pub task_info: Option<String>,
    /// Every other column
    pub other: Vec<(String, Option<String>)>,
}

impl RestoreTaskRecord {
    const KNOWN: [&'static str; 3] = ["task_id", "lifecycle", "task_info"];

    /// Reads a record through the column-name index.
    pub fn from_row(row: &Row<'_>) -> Self {
        let task_id = row
            .value("task_id")
            .unwrap_or_else(|| row.get_index(0))
            .map(str::to_string);

        Self {
            task_id,
            lifecycle: row.value("lifecycle").map(|v| v.map(str::to_string)),
            task_info: row.get("task_info").map(str::to_string),
            other: row
                .cells()
                .filter(|(name, _)| !Self::KNOWN.iter().any(|known| known == name))
                .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
                .collect(),
        }
    }
}

/// One row of the target database's table list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    /// Schema name
    pub schema_name: String,
    /// Table name
    pub table_name: String,
}

impl TableRecord {
    /// Reads a record; rows missing either name are skipped.
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            schema_name: row.get("schema_name")?.to_string(),
            table_name: row.get("name")?.to_string(),
        })
    }
}

/// Everything the probe learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// `@@VERSION`
    pub version: String,
    /// Restore tasks for the target database
    pub tasks: Vec<RestoreTaskRecord>,
    /// Every database on the server
    pub databases: Vec<String>,
    /// Tables of the target database; `None` when it does not exist
    pub target_tables: Option<Vec<TableRecord>>,
}

/// Runs the diagnostic sequence through a [`Connector`].
#[derive(Debug)]
pub struct Prober<C> {
    connector: C,
    target_database: String,
}

impl<C: Connector> Prober<C> {
    /// Creates a prober for `target_database`.
    pub fn new(connector: C, target_database: impl Into<String>) -> Self {
        Self {
            connector,
            target_database: target_database.into(),
        }
    }

    /// Runs the probe starting from `master`, reporting as it goes.
    ///
    /// At most one session is open at any time: the `master` session is
    /// closed before the target database session is opened.
    ///
    /// # Errors
    /// Returns the first driver or report error; nothing after it runs.
    pub async fn run<W: Write>(
        &self,
        master: &ConnectionString,
        reporter: &mut Reporter<W>,
    ) -> Result<ProbeOutcome> {
        let target = self.target_database.as_str();

        reporter.line(format_args!(
            "Connecting to {} database on {}:{}...",
            master.database(),
            master.host(),
            master.port()
        ))?;
        let mut session = self.connector.connect(master).await?;
        info!("Connected to {}", master);

        let version = session.query(VERSION_QUERY).await?;
        let version = version
            .rows()
            .next()
            .and_then(|row| row.get("Version").or_else(|| row.get_index(0)))
            .unwrap_or_default()
            .to_string();
        reporter.line(format_args!("SQL Server Version: {version}"))?;

        reporter.section(format_args!("Checking {target} restore task status:"))?;
        let tasks = session.query(&task_status_query(target)).await?;
        let tasks: Vec<RestoreTaskRecord> =
            tasks.rows().map(|row| RestoreTaskRecord::from_row(&row)).collect();
        report_tasks(reporter, target, &tasks)?;

        reporter.section("Checking available databases:")?;
        let databases = session.query(DATABASES_QUERY).await?;
        let databases: Vec<String> = databases
            .rows()
            .filter_map(|row| row.get("name").or_else(|| row.get_index(0)))
            .map(str::to_string)
            .collect();
        for name in &databases {
            reporter.item(name)?;
        }

        let target_tables = if databases.iter().any(|name| name == target) {
            reporter.section(format_args!(
                "{target} database found! Testing connection..."
            ))?;
            session.close().await?;

            let target_conn = master.with_database(target);
            let mut target_session = self.connector.connect(&target_conn).await?;
            info!("Connected to {}", target_conn);

            let tables = target_session.query(TABLES_QUERY).await?;
            let tables: Vec<TableRecord> = tables
                .rows()
                .filter_map(|row| TableRecord::from_row(&row))
                .collect();

            reporter.section(format_args!("{target} tables:"))?;
            for table in &tables {
                reporter.item(format_args!("{}.{}", table.schema_name, table.table_name))?;
            }
            target_session.close().await?;
            Some(tables)
        } else {
            reporter.section(format_args!("{target} database not found."))?;
            reporter.line("The restore task may have failed. Check the error details above.")?;
            reporter.line("To fix this, you might need to:")?;
            reporter.numbered(&RESTORE_REMEDIATION)?;
            session.close().await?;
            None
        };

        reporter.success("Successfully tested SQL Server connection!")?;

        Ok(ProbeOutcome {
            version,
            tasks,
            databases,
            target_tables,
        })
    }
}

fn report_tasks<W: Write>(
    reporter: &mut Reporter<W>,
    target: &str,
    tasks: &[RestoreTaskRecord],
) -> Result<()> {
    if tasks.is_empty() {
        return reporter.line(format_args!("No restore tasks found for {target}."));
    }

    reporter.section("Restore tasks:")?;
    for task in tasks {
        reporter.section(format_args!(
            "Task ID: {}",
            task.task_id.as_deref().unwrap_or("NULL")
        ))?;
        if let Some(lifecycle) = &task.lifecycle {
            reporter.line(format_args!(
                "Status: {}",
                lifecycle.as_deref().unwrap_or("NULL")
            ))?;
        }
        if let Some(info) = &task.task_info {
            reporter.line("Error/Info details:")?;
            reporter.line(info)?;
        }
        debug!("Task columns: {:?}", task.other);
    }
    Ok(())
}
