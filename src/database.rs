use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};

use crate::{
    ast::{
        ColumnsSelect, CreateTable, DropTable, InsertInto, InsertTemplate, Select, Statement,
        TABLE_EXISTS_SQL,
    },
    config::{DatabaseConfig, OpenMode},
    error::{Error, Result},
    row::Row,
    statement::PreparedStatement,
    table::Table,
};

/// The main entry point of the marshaling layer.
/// Owns the single connection to the store; every operation goes through it.
///
/// # Example
/// ```
/// use sqlwrap::{Column, ColumnsSelect, Database, DataType, Row, Value};
///
/// let db = Database::open_in_memory().unwrap();
/// let schema = Row::new(vec![
///     Column::primary_key("id", Value::witness(DataType::Integer)),
///     Column::typed("name", DataType::Text),
/// ]);
/// db.create_table("users", &schema).unwrap();
/// db.insert_row("users", &Row::from_pairs([("id", Value::Integer(7)), ("name", Value::from("alice"))]))
///     .unwrap();
///
/// let result = db.select("users", &ColumnsSelect::Star).unwrap();
/// assert_eq!(result.get_row(0), Some(vec![Value::Integer(7), Value::from("alice")]));
/// ```
pub struct Database {
    conn: Connection,
    /// `None` for in-memory stores.
    path: Option<PathBuf>,
}

impl Database {
    /// Opens (or, in [OpenMode::ReadWriteCreate], creates) the store at `path`.
    ///
    /// # Errors
    /// [Error::ConnectionOpenFailed] on a bad path, missing permissions, or a
    /// missing file in [OpenMode::ReadWrite].
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with(&DatabaseConfig::new(path).with_mode(mode))
    }

    pub fn open_with(config: &DatabaseConfig) -> Result<Self> {
        let open_failed = |source| Error::ConnectionOpenFailed {
            path: config.path.clone(),
            source,
        };
        let conn = Connection::open_with_flags(&config.path, config.mode.flags())
            .map_err(open_failed)?;
        if let Some(timeout) = config.busy_timeout {
            conn.busy_timeout(timeout).map_err(open_failed)?;
        }
        tracing::info!(path = %config.path.display(), mode = ?config.mode, "database opened");
        Ok(Self {
            conn,
            path: Some(config.path.clone()),
        })
    }

    /// Opens a private, transient in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|source| Error::ConnectionOpenFailed {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        tracing::info!("in-memory database opened");
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying connection, for operations this layer does not wrap.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Prepares `sql` for manual binding. See [PreparedStatement].
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'_>> {
        PreparedStatement::prepare(&self.conn, sql)
    }

    /// Runs a statement that produces no records and returns the number of
    /// rows it changed.
    pub fn execute(&self, statement: &Statement) -> Result<usize> {
        let sql = statement.to_string();
        let mut stmt = self.prepare(&sql)?;
        let changed = stmt.execute()?;
        stmt.finalize()?;
        Ok(changed)
    }

    /// Looks `name` up in the catalog.
    ///
    /// A missing table is `Ok(false)`; only a failing catalog query is an error.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        tracing::debug!(sql = TABLE_EXISTS_SQL, table = name, "checking table");
        self.conn
            .query_row(TABLE_EXISTS_SQL, [name], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
            .map_err(|source| Error::execute(format!("table_exists '{name}'"), source))
    }

    /// Creates `name` from a schema [Row] unless it already exists.
    ///
    /// Each column becomes `<name> <TYPE> PRIMARY KEY` or `<name> <TYPE> NOT NULL`,
    /// its type taken from the column's value tag.
    ///
    /// # Errors
    /// See [CreateTable::from_schema] for the schema checks, plus
    /// [Error::StatementExecuteFailed] from the store.
    pub fn create_table(&self, name: &str, schema: &Row) -> Result<()> {
        let create = CreateTable::from_schema(name, schema)?;
        self.execute(&create.into())?;
        tracing::info!(table = name, columns = schema.len(), "table created");
        Ok(())
    }

    /// Drops `name`. Dropping a missing table is not an error.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.execute(&DropTable::new(name)?.into())?;
        tracing::info!(table = name, "table dropped");
        Ok(())
    }

    /// Inserts one data [Row], its values written into the statement as
    /// literals.
    pub fn insert_row(&self, name: &str, row: &Row) -> Result<()> {
        self.execute(&InsertInto::from_row(name, row)?.into())?;
        Ok(())
    }

    /// Inserts `row`, replacing any existing record with the same key.
    pub fn upsert_row(&self, name: &str, row: &Row) -> Result<()> {
        let template = InsertTemplate::new(name, row.names())?.or_replace();
        let mut stmt = self.prepare(&template.to_string())?;
        stmt.bind(row.values())?;
        stmt.execute()?;
        stmt.finalize()
    }

    /// Inserts every row of `table` inside one transaction.
    ///
    /// One statement with a placeholder per column is prepared, then each row
    /// is bound, executed and reset. Either all rows are committed or, on the
    /// first failure, the transaction is rolled back and the error returned.
    /// Returns the number of rows inserted.
    pub fn insert_table(&mut self, name: &str, table: &Table) -> Result<usize> {
        let template = InsertTemplate::new(name, table.names())?;
        self.run_batch(&template, table)
    }

    /// Like [Database::insert_table] with `INSERT OR REPLACE` semantics.
    pub fn upsert_table(&mut self, name: &str, table: &Table) -> Result<usize> {
        let template = InsertTemplate::new(name, table.names())?.or_replace();
        self.run_batch(&template, table)
    }

    fn run_batch(&mut self, template: &InsertTemplate, table: &Table) -> Result<usize> {
        let sql = template.to_string();
        tracing::debug!(sql = %sql, rows = table.row_count(), "beginning batch");
        let tx = self
            .conn
            .transaction()
            .map_err(|source| Error::execute("begin transaction", source))?;

        match bind_rows(&tx, &sql, table) {
            Ok(changed) => {
                tx.commit()
                    .map_err(|source| Error::execute("commit", source))?;
                tracing::info!(table = %template.table, rows = changed, "batch committed");
                Ok(changed)
            }
            Err(err) => {
                tracing::warn!(table = %template.table, error = %err, "batch failed, rolling back");
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Selects `columns` from `name` and decodes every record by declared type.
    pub fn select(&self, name: &str, columns: &ColumnsSelect) -> Result<Table> {
        let select = Select::new(name, columns)?;
        self.query_table(&select.to_string())
    }

    pub fn select_all(&self, name: &str) -> Result<Table> {
        self.select(name, &ColumnsSelect::Star)
    }

    /// Selects the columns named by `projection`, whose values are ignored.
    pub fn select_columns(&self, name: &str, projection: &Row) -> Result<Table> {
        let names = projection.iter().map(|c| c.name().to_string()).collect();
        self.select(name, &ColumnsSelect::Names(names))
    }

    /// Runs arbitrary query text and collects the full result.
    ///
    /// The statement is finalized after the last record has been read.
    pub fn query_table(&self, sql: &str) -> Result<Table> {
        let mut stmt = self.prepare(sql)?;
        let table = stmt.query_table()?;
        stmt.finalize()?;
        Ok(table)
    }

    /// Closes the connection, reporting any error the store raises on close.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn
            .close()
            .map_err(|(_, source)| Error::execute("close", source))?;
        match path {
            Some(path) => tracing::info!(path = %path.display(), "database closed"),
            None => tracing::info!("in-memory database closed"),
        }
        Ok(())
    }
}

fn bind_rows(conn: &Connection, sql: &str, table: &Table) -> Result<usize> {
    let mut stmt = PreparedStatement::prepare(conn, sql)?;
    let mut changed = 0;
    for row_idx in 0..table.row_count() {
        let Some(values) = table.row_values(row_idx) else {
            break;
        };
        stmt.bind(values)?;
        changed += stmt.execute().inspect_err(|err| {
            tracing::warn!(row = row_idx, error = %err, "row insert failed");
        })?;
        stmt.reset();
    }
    stmt.finalize()?;
    Ok(changed)
}
