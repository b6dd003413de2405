use allocative::Allocative;
use bitvec::prelude::*;

use crate::column::Column;
use crate::value::Value;

/// A fixed-length, ordered sequence of [Column]s.
///
/// Used either as a schema descriptor (names, type witnesses, key flags) for
/// `CREATE TABLE`, or as one data record for `INSERT`. The column count is
/// set on construction and never changes.
#[derive(Debug, Clone, PartialEq, Allocative)]
pub struct Row {
    columns: Box<[Column]>,
}

impl Row {
    /// A row of `count` empty columns (unnamed, `NULL`, not a key).
    pub fn with_count(count: usize) -> Self {
        Self {
            columns: vec![Column::default(); count].into_boxed_slice(),
        }
    }

    /// A row owning the given columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns: columns.into_boxed_slice(),
        }
    }

    /// A row holding copies of `columns`.
    pub fn from_columns(columns: &[Column]) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// A data row from `(name, value)` pairs.
    ///
    /// ```
    /// # use sqlwrap::{Row, Value};
    /// let row = Row::from_pairs([("id", Value::Integer(7)), ("name", Value::from("alice"))]);
    /// assert_eq!(row.len(), 2);
    /// assert_eq!(row.value("name"), Some(&Value::from("alice")));
    /// ```
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, value)| Column::new(name, value))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    /// Mutable access to one column. The column count itself cannot change.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Column> {
        self.columns.get_mut(idx)
    }

    /// Replaces the column at `idx`, returning the previous one.
    /// Returns `None` and leaves the row untouched if `idx` is out of bounds.
    pub fn replace(&mut self, idx: usize, column: Column) -> Option<Column> {
        self.columns
            .get_mut(idx)
            .map(|slot| std::mem::replace(slot, column))
    }

    /// Position of the first column named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Value of the first column named `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.columns[i].value)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|c| &c.value)
    }

    /// One bit per column, set for primary-key members.
    pub fn primary_key_mask(&self) -> BitVec {
        self.columns.iter().map(|c| c.primary_key).collect()
    }

    /// Consumes the row and returns its values in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.columns
            .into_vec()
            .into_iter()
            .map(|c| c.value)
            .collect()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
