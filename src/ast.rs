use std::fmt;

use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;

/// Catalog lookup used by [Database::table_exists](crate::Database::table_exists).
pub const TABLE_EXISTS_SQL: &str = "SELECT name FROM sqlite_master WHERE type='table' AND name=?1;";

/// Checks that `name` can be spliced into SQL text unquoted:
/// `[A-Za-z_][A-Za-z0-9_]*`.
///
/// ```
/// # use sqlwrap::ast::validate_identifier;
/// assert!(validate_identifier("user_id").is_ok());
/// assert!(validate_identifier("1st").is_err());
/// assert!(validate_identifier("a; DROP TABLE b").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

fn validated_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Vec<String>> {
    names
        .into_iter()
        .map(|n| validate_identifier(n).map(str::to_string))
        .collect()
}

/// Statements run for their effect, without producing records.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    DropTable(DropTable),
    InsertInto(InsertInto),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateTable(s) => fmt::Display::fmt(s, f),
            Statement::DropTable(s) => fmt::Display::fmt(s, f),
            Statement::InsertInto(s) => fmt::Display::fmt(s, f),
        }
    }
}

impl From<CreateTable> for Statement {
    fn from(s: CreateTable) -> Self {
        Statement::CreateTable(s)
    }
}

impl From<DropTable> for Statement {
    fn from(s: DropTable) -> Self {
        Statement::DropTable(s)
    }
}

impl From<InsertInto> for Statement {
    fn from(s: InsertInto) -> Self {
        Statement::InsertInto(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    /// `PRIMARY KEY` or `NOT NULL`, as given by [Column::constraint].
    ///
    /// [Column::constraint]: crate::column::Column::constraint
    pub constraint: &'static str,
}

/// `CREATE TABLE IF NOT EXISTS` built from a schema [Row].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl CreateTable {
    /// Reads names, type witnesses and key flags from `schema`.
    ///
    /// # Errors
    /// - [Error::InvalidIdentifier] for a table or column name that is not a
    ///   plain identifier.
    /// - [Error::EmptySchema] if `schema` has no columns.
    /// - [Error::CompositePrimaryKey] if more than one column is flagged.
    pub fn from_schema(name: &str, schema: &Row) -> Result<Self> {
        let name = validate_identifier(name)?.to_string();
        if schema.is_empty() {
            return Err(Error::EmptySchema { table: name });
        }
        let columns = schema
            .iter()
            .map(|c| {
                Ok(ColumnDef {
                    name: validate_identifier(c.name())?.to_string(),
                    data_type: c.data_type(),
                    constraint: c.constraint(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let key_mask = schema.primary_key_mask();
        if key_mask.count_ones() > 1 {
            return Err(Error::CompositePrimaryKey {
                table: name,
                columns: key_mask
                    .iter_ones()
                    .map(|i| columns[i].name.clone())
                    .collect(),
            });
        }
        Ok(Self { name, columns })
    }
}

impl fmt::Display for CreateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE TABLE IF NOT EXISTS {}(", self.name)?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(
                f,
                "{} {} {}",
                col.name,
                col.data_type.type_name(),
                col.constraint
            )?;
        }
        f.write_str(");")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub name: String,
}

impl DropTable {
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: validate_identifier(name)?.to_string(),
        })
    }
}

impl fmt::Display for DropTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DROP TABLE IF EXISTS {};", self.name)
    }
}

/// Single-row insert with the values rendered as SQL literals.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertInto {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl InsertInto {
    pub fn from_row(table: &str, row: &Row) -> Result<Self> {
        let table = validate_identifier(table)?.to_string();
        if row.is_empty() {
            return Err(Error::EmptySchema { table });
        }
        Ok(Self {
            table,
            columns: validated_names(row.iter().map(|c| c.name()))?,
            values: row.values().cloned().collect(),
        })
    }
}

impl fmt::Display for InsertInto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "INSERT INTO {} ({}) VALUES (",
            self.table,
            self.columns.join(", ")
        )?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&value.to_sql_literal())?;
        }
        f.write_str(");")
    }
}

/// Insert with one positional placeholder per column, for binding.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertTemplate {
    pub table: String,
    pub columns: Vec<String>,
    /// Emit `INSERT OR REPLACE` (upsert on key conflict).
    pub or_replace: bool,
}

impl InsertTemplate {
    pub fn new<'a>(table: &str, columns: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let table = validate_identifier(table)?.to_string();
        let columns = validated_names(columns)?;
        if columns.is_empty() {
            return Err(Error::EmptySchema { table });
        }
        Ok(Self {
            table,
            columns,
            or_replace: false,
        })
    }

    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }
}

impl fmt::Display for InsertTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.or_replace {
            "INSERT OR REPLACE"
        } else {
            "INSERT"
        };
        write!(
            f,
            "{verb} INTO {} ({}) VALUES (",
            self.table,
            self.columns.join(", ")
        )?;
        for i in 1..=self.columns.len() {
            if i > 1 {
                f.write_str(", ")?;
            }
            write!(f, "?{i}")?;
        }
        f.write_str(");")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnsSelect {
    Star,
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub columns: ColumnsSelect,
    pub table: String,
}

impl Select {
    pub fn new(table: &str, columns: &ColumnsSelect) -> Result<Self> {
        let table = validate_identifier(table)?.to_string();
        let columns = match columns {
            ColumnsSelect::Star => ColumnsSelect::Star,
            ColumnsSelect::Names(names) if names.is_empty() => {
                return Err(Error::EmptySchema { table });
            }
            ColumnsSelect::Names(names) => {
                ColumnsSelect::Names(validated_names(names.iter().map(String::as_str))?)
            }
        };
        Ok(Self { columns, table })
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.columns {
            ColumnsSelect::Star => write!(f, "SELECT * FROM {};", self.table),
            ColumnsSelect::Names(names) => {
                write!(f, "SELECT {} FROM {};", names.join(", "), self.table)
            }
        }
    }
}
