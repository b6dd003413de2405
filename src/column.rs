use allocative::Allocative;

use crate::data_type::DataType;
use crate::value::Value;

/// Longest column name kept, in bytes. Longer names are truncated.
pub const MAX_COLUMN_NAME_LENGTH: usize = 32;

/// A named cell: one [Value] plus the flag marking it part of the primary key.
///
/// The same type serves two purposes. Inside a schema [Row](crate::Row) the
/// value is only a type witness and `primary_key` decides the DDL clause;
/// inside a data row the value is the cell content and the flag is ignored.
#[derive(Debug, Clone, PartialEq, Default, Allocative)]
pub struct Column {
    name: String,
    /// The cell content, or the type witness for schema columns.
    pub value: Value,
    /// Whether this column belongs to the primary key.
    pub primary_key: bool,
}

impl Column {
    /// Creates a non-key column.
    ///
    /// Names longer than [MAX_COLUMN_NAME_LENGTH] bytes are truncated, see
    /// [truncate_name].
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: truncate_name(name.into()),
            value: value.into(),
            primary_key: false,
        }
    }

    /// Creates a column flagged as the primary key.
    pub fn primary_key(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, value)
        }
    }

    /// Creates a schema column whose value is a witness of `data_type`.
    ///
    /// # Example
    /// ```
    /// # use sqlwrap::{Column, DataType};
    /// let col = Column::typed("score", DataType::Real);
    /// assert_eq!(col.data_type(), DataType::Real);
    /// assert!(!col.primary_key);
    /// ```
    pub fn typed(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, Value::witness(data_type))
    }

    /// The (possibly truncated) column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the column, applying the same truncation as [Column::new].
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = truncate_name(name.into());
    }

    /// Tag of the column's value.
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    /// The DDL constraint clause for this column.
    pub fn constraint(&self) -> &'static str {
        if self.primary_key {
            "PRIMARY KEY"
        } else {
            "NOT NULL"
        }
    }
}

/// Cuts `name` down to at most [MAX_COLUMN_NAME_LENGTH] bytes on a char
/// boundary and logs a warning when anything was dropped.
pub fn truncate_name(mut name: String) -> String {
    if name.len() <= MAX_COLUMN_NAME_LENGTH {
        return name;
    }
    let mut end = MAX_COLUMN_NAME_LENGTH;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    tracing::warn!(
        name = %name,
        max = MAX_COLUMN_NAME_LENGTH,
        kept = end,
        "column name too long, truncating"
    );
    name.truncate(end);
    name
}
