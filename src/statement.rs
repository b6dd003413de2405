use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::table::Table;
use crate::value::Value;

/// Lifecycle of a [PreparedStatement].
///
/// ```text
/// prepare ─► Prepared ─bind─► Bound ─execute─► Executed
///               ▲                                  │
///               └──────────────reset───────────────┘
/// ```
///
/// Finalizing consumes the statement, so there is no terminal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Prepared,
    Bound,
    Executed,
}

/// A parameterized statement bound to one connection.
///
/// Enforces the bind/execute/reset discipline: a statement cannot run twice
/// without a [reset](PreparedStatement::reset) in between, nor be rebound
/// after running without one.
pub struct PreparedStatement<'conn> {
    inner: rusqlite::Statement<'conn>,
    sql: String,
    state: StatementState,
}

impl<'conn> PreparedStatement<'conn> {
    /// Compiles `sql` on `conn`.
    ///
    /// # Errors
    /// [Error::StatementPrepareFailed] if the store rejects the text.
    pub fn prepare(conn: &'conn rusqlite::Connection, sql: &str) -> Result<Self> {
        tracing::debug!(sql, "preparing statement");
        let inner = conn
            .prepare(sql)
            .map_err(|source| Error::StatementPrepareFailed {
                sql: sql.to_string(),
                source,
            })?;
        Ok(Self {
            inner,
            sql: sql.to_string(),
            state: StatementState::Prepared,
        })
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` placeholders in the statement.
    pub fn parameter_count(&self) -> usize {
        self.inner.parameter_count()
    }

    fn misuse(&self, operation: &'static str) -> Error {
        Error::StatementMisuse {
            operation,
            state: self.state,
        }
    }

    /// Binds `values` to placeholders `?1..?N` in order.
    ///
    /// Allowed from `Prepared` and `Bound` (rebinding overwrites).
    ///
    /// # Errors
    /// - [Error::StatementMisuse] after execution without a reset.
    /// - [Error::ParameterCount] if the number of values is not the
    ///   placeholder count.
    pub fn bind<'v>(&mut self, values: impl IntoIterator<Item = &'v Value>) -> Result<()> {
        if self.state == StatementState::Executed {
            return Err(self.misuse("bind"));
        }
        let expected = self.parameter_count();
        let mut found = 0;
        for value in values {
            found += 1;
            if found > expected {
                continue;
            }
            self.inner
                .raw_bind_parameter(found, value)
                .map_err(|source| Error::execute(format!("bind parameter {found}"), source))?;
        }
        if found != expected {
            self.inner.clear_bindings();
            self.state = StatementState::Prepared;
            return Err(Error::ParameterCount { expected, found });
        }
        self.state = StatementState::Bound;
        Ok(())
    }

    fn check_runnable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            StatementState::Bound => Ok(()),
            StatementState::Prepared if self.parameter_count() == 0 => Ok(()),
            _ => Err(self.misuse(operation)),
        }
    }

    /// Runs the statement to completion and returns the changed-row count.
    ///
    /// # Errors
    /// - [Error::StatementMisuse] if not bound, or already executed.
    /// - [Error::StatementExecuteFailed] on any store error (constraints,
    ///   I/O). The statement still counts as executed and must be reset.
    pub fn execute(&mut self) -> Result<usize> {
        self.check_runnable("execute")?;
        self.state = StatementState::Executed;
        self.inner
            .raw_execute()
            .map_err(|source| Error::execute(format!("execute `{}`", self.sql), source))
    }

    /// Runs a query and collects every result record into a [Table].
    ///
    /// The table has one column per result column, named after it. Each
    /// cell is decoded by the column's declared type (see
    /// [DataType::decode]), not by the storage class of the value. All
    /// records are read before this returns.
    ///
    /// # Errors
    /// - [Error::UnsupportedDeclaredType] for expression columns or declared
    ///   types other than INTEGER, REAL, TEXT and BLOB.
    /// - [Error::Decode], [Error::AllocationFailed], [Error::StatementExecuteFailed].
    pub fn query_table(&mut self) -> Result<Table> {
        self.check_runnable("query")?;

        let layout: Vec<(String, Option<String>)> = self
            .inner
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.decl_type().map(str::to_string)))
            .collect();
        let decoders = layout
            .iter()
            .map(|(name, decl)| DataType::from_declared(name, decl.as_deref()))
            .collect::<Result<Vec<_>>>()?;

        let mut table = Table::new(layout.iter().map(|(name, _)| name.clone()));
        self.state = StatementState::Executed;

        let operation = || format!("query `{}`", self.sql);
        let mut rows = self.inner.raw_query();
        while let Some(record) = rows.next().map_err(|e| Error::execute(operation(), e))? {
            let mut values = Vec::with_capacity(decoders.len());
            for (idx, (decoder, (name, _))) in decoders.iter().zip(&layout).enumerate() {
                let raw = record.get_ref(idx).map_err(|e| Error::execute(operation(), e))?;
                values.push(decoder.decode(name, raw)?);
            }
            table.push_row(values)?;
        }
        tracing::debug!(sql = %self.sql, rows = table.row_count(), "query exhausted");
        Ok(table)
    }

    /// Returns to `Prepared` and clears every binding.
    pub fn reset(&mut self) {
        self.inner.clear_bindings();
        self.state = StatementState::Prepared;
    }

    /// Releases the statement's store-side resources.
    ///
    /// # Errors
    /// [Error::StatementExecuteFailed] if the store reports an error while
    /// finalizing.
    pub fn finalize(self) -> Result<()> {
        let operation = format!("finalize `{}`", self.sql);
        self.inner
            .finalize()
            .map_err(|source| Error::execute(operation, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .unwrap();
        conn
    }

    fn count(conn: &rusqlite::Connection) -> i64 {
        conn.query_row("SELECT count(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    // ─────────────────────────────────────────────────────────────
    // Test 1 : state transitions
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_bind_execute_reset_cycle() {
        let conn = conn();
        let mut stmt = PreparedStatement::prepare(&conn, "INSERT INTO t (id, name) VALUES (?1, ?2);")
            .unwrap();
        assert_eq!(stmt.state(), StatementState::Prepared);
        assert_eq!(stmt.parameter_count(), 2);

        for i in 0..3 {
            let row = [Value::Integer(i), Value::from("x")];
            stmt.bind(&row).unwrap();
            assert_eq!(stmt.state(), StatementState::Bound);
            assert_eq!(stmt.execute().unwrap(), 1);
            assert_eq!(stmt.state(), StatementState::Executed);
            stmt.reset();
            assert_eq!(stmt.state(), StatementState::Prepared);
        }
        stmt.finalize().unwrap();
        assert_eq!(count(&conn), 3);
    }

    #[test]
    fn test_execute_twice_without_reset_is_misuse() {
        let conn = conn();
        let mut stmt = PreparedStatement::prepare(&conn, "INSERT INTO t (id, name) VALUES (?1, ?2);")
            .unwrap();
        stmt.bind(&[Value::Integer(1), Value::from("a")]).unwrap();
        stmt.execute().unwrap();

        let err = stmt.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misuse);
        let err = stmt.bind(&[Value::Integer(2), Value::from("b")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misuse);
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_execute_unbound_parameterized_is_misuse() {
        let conn = conn();
        let mut stmt = PreparedStatement::prepare(&conn, "INSERT INTO t (id, name) VALUES (?1, ?2);")
            .unwrap();
        assert_eq!(stmt.execute().unwrap_err().kind(), ErrorKind::Misuse);
    }

    #[test]
    fn test_wrong_parameter_count() {
        let conn = conn();
        let mut stmt = PreparedStatement::prepare(&conn, "INSERT INTO t (id, name) VALUES (?1, ?2);")
            .unwrap();

        let err = stmt.bind(&[Value::Integer(1)]).unwrap_err();
        assert!(matches!(err, Error::ParameterCount { expected: 2, found: 1 }));
        let err = stmt
            .bind(&[Value::Integer(1), Value::Null, Value::Null])
            .unwrap_err();
        assert!(matches!(err, Error::ParameterCount { expected: 2, found: 3 }));
        assert_eq!(stmt.state(), StatementState::Prepared);
    }

    #[test]
    fn test_prepare_failure_keeps_sql() {
        let conn = conn();
        let err = PreparedStatement::prepare(&conn, "INSERT INTO nowhere VALUES (1);")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::StatementPrepareFailed);
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_constraint_violation_is_execute_error() {
        let conn = conn();
        let mut stmt = PreparedStatement::prepare(&conn, "INSERT INTO t (id, name) VALUES (?1, ?2);")
            .unwrap();
        stmt.bind(&[Value::Integer(1), Value::Null]).unwrap();
        let err = stmt.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StatementExecuteFailed);
        assert_eq!(
            err.sqlite_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : extraction
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_table_decodes_every_record() {
        let conn = conn();
        conn.execute_batch("INSERT INTO t VALUES (1, 'a'); INSERT INTO t VALUES (2, 'b');")
            .unwrap();

        let mut stmt = PreparedStatement::prepare(&conn, "SELECT id, name FROM t ORDER BY id;")
            .unwrap();
        let table = stmt.query_table().unwrap();
        assert_eq!(stmt.state(), StatementState::Executed);
        stmt.finalize().unwrap();

        assert_eq!(table.names(), vec!["id", "name"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get_row(1).unwrap(), vec![Value::Integer(2), Value::from("b")]);
    }

    #[test]
    fn test_query_with_bound_parameter() {
        let conn = conn();
        conn.execute_batch("INSERT INTO t VALUES (1, 'a'); INSERT INTO t VALUES (2, 'b');")
            .unwrap();

        let mut stmt = PreparedStatement::prepare(&conn, "SELECT name FROM t WHERE id = ?1;")
            .unwrap();
        stmt.bind(&[Value::Integer(2)]).unwrap();
        let table = stmt.query_table().unwrap();
        assert_eq!(table.get(0, 0), Some(&Value::from("b")));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_expression_column_is_unsupported() {
        let conn = conn();
        let mut stmt = PreparedStatement::prepare(&conn, "SELECT count(*) FROM t;").unwrap();
        let err = stmt.query_table().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDeclaredType { .. }));
        assert_eq!(stmt.state(), StatementState::Prepared);
    }
}
