use std::collections::TryReserveError;

use allocative::Allocative;
use bitvec::prelude::*;

use crate::column::{Column, truncate_name};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;

/// One column of a [Table]: a name and the values of every row.
#[derive(Debug, Clone, PartialEq, Allocative)]
pub struct TableColumn {
    name: String,
    values: Vec<Value>,
    /// A `true` bit marks a `NULL` cell at that row.
    #[allocative(skip)]
    null_bitmap: BitVec,
}

impl TableColumn {
    fn new(name: String) -> Self {
        Self {
            name: truncate_name(name),
            values: Vec::new(),
            null_bitmap: BitVec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live values, one per row.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, row_idx: usize) -> Option<&Value> {
        self.values.get(row_idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of `NULL` cells in the column.
    pub fn null_count(&self) -> usize {
        self.null_bitmap.count_ones()
    }

    pub fn is_null(&self, row_idx: usize) -> Option<bool> {
        self.null_bitmap.get(row_idx).map(|b| *b)
    }

    fn push(&mut self, value: Value) {
        self.null_bitmap.push(value.is_null());
        self.values.push(value);
    }

    /// Ensures the bitmap can hold `rows` bits without reallocating.
    ///
    /// `BitVec::reserve` aborts on exhaustion, so the storage words are
    /// reserved on a plain `Vec` and the bits copied over.
    fn try_reserve_bitmap(&mut self, rows: usize) -> std::result::Result<(), TryReserveError> {
        if self.null_bitmap.capacity() >= rows {
            return Ok(());
        }
        let mut words: Vec<usize> = Vec::new();
        words.try_reserve_exact(rows.div_ceil(usize::BITS as usize))?;
        words.extend_from_slice(self.null_bitmap.as_raw_slice());
        let len = self.null_bitmap.len();
        let mut grown = BitVec::from_vec(words);
        grown.truncate(len);
        self.null_bitmap = grown;
        Ok(())
    }
}

/// A columnar buffer of [Value]s: `values[col][row]`.
///
/// The column count is fixed at construction. Rows are appended one at a
/// time; the row capacity doubles (starting at 1) whenever an append would
/// exceed it. Every column always holds exactly [Table::row_count] values.
///
/// # Example
/// ```
/// # use sqlwrap::{Table, Value};
/// let mut table = Table::new(["id", "name"]);
/// table.append_row(&[Value::Integer(1), Value::from("alice")]).unwrap();
///
/// assert_eq!(table.row_count(), 1);
/// assert_eq!(table.get(1, 0), Some(&Value::from("alice")));
/// assert_eq!(table.column_index("id"), Some(0));
/// ```
#[derive(Debug, Clone, PartialEq, Allocative)]
pub struct Table {
    columns: Vec<TableColumn>,
    row_count: usize,
    row_cap: usize,
}

impl Table {
    /// An empty table with one column per name.
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|n| TableColumn::new(n.into()))
                .collect(),
            row_count: 0,
            row_cap: 0,
        }
    }

    /// An empty table of `count` unnamed columns.
    pub fn with_column_count(count: usize) -> Self {
        Self::new(std::iter::repeat_n(String::new(), count))
    }

    /// An empty table shaped after a row's column names.
    pub fn from_schema(schema: &Row) -> Self {
        Self::new(schema.iter().map(|c| c.name().to_string()))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Rows that fit before the next growth step.
    pub fn row_capacity(&self) -> usize {
        self.row_cap
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column(&self, col_idx: usize) -> Option<&TableColumn> {
        self.columns.get(col_idx)
    }

    /// Index of the first column named `name`. Linear scan.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get_col(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The cell at (`col_idx`, `row_idx`), or `None` when either is out of
    /// bounds.
    pub fn get(&self, col_idx: usize, row_idx: usize) -> Option<&Value> {
        if row_idx >= self.row_count {
            return None;
        }
        self.columns.get(col_idx)?.values.get(row_idx)
    }

    /// The cell at `row_idx` in the column named `name`.
    pub fn get_by_name(&self, name: &str, row_idx: usize) -> Option<&Value> {
        self.get(self.column_index(name)?, row_idx)
    }

    /// Values of one row across all columns.
    pub fn row_values(&self, row_idx: usize) -> Option<impl Iterator<Item = &Value>> {
        if row_idx >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(move |c| &c.values[row_idx]))
    }

    pub fn get_row(&self, row_idx: usize) -> Option<Vec<Value>> {
        self.row_values(row_idx).map(|vals| vals.cloned().collect())
    }

    /// One row as a data [Row] named after the table's columns.
    pub fn row(&self, row_idx: usize) -> Option<Row> {
        let values = self.row_values(row_idx)?;
        Some(Row::new(
            self.columns
                .iter()
                .zip(values)
                .map(|(col, v)| Column::new(col.name.clone(), v.clone()))
                .collect(),
        ))
    }

    /// Iterates all rows as data [Row]s.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.row_count).filter_map(move |i| self.row(i))
    }

    /// Appends a copy of `values` as the next row.
    ///
    /// # Errors
    /// - [Error::RowLengthMismatch] if `values.len()` differs from the column count.
    /// - [Error::AllocationFailed] if growing the storage fails. The table is
    ///   left exactly as it was.
    pub fn append_row(&mut self, values: &[Value]) -> Result<()> {
        self.check_len(values.len())?;
        self.grow_for_one()?;
        for (col, value) in self.columns.iter_mut().zip(values) {
            col.push(value.clone());
        }
        self.row_count += 1;
        Ok(())
    }

    /// Appends `values` as the next row, taking ownership instead of copying.
    ///
    /// # Errors
    /// Same as [Table::append_row].
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        self.check_len(values.len())?;
        self.grow_for_one()?;
        for (col, value) in self.columns.iter_mut().zip(values) {
            col.push(value);
        }
        self.row_count += 1;
        Ok(())
    }

    /// Appends the values of a data row, matched by position.
    pub fn append_data_row(&mut self, row: &Row) -> Result<()> {
        self.check_len(row.len())?;
        self.grow_for_one()?;
        for (col, value) in self.columns.iter_mut().zip(row.values()) {
            col.push(value.clone());
        }
        self.row_count += 1;
        Ok(())
    }

    fn check_len(&self, found: usize) -> Result<()> {
        if found != self.columns.len() {
            return Err(Error::RowLengthMismatch {
                expected: self.columns.len(),
                found,
            });
        }
        Ok(())
    }

    /// Makes room for one more row in every column, doubling the capacity
    /// when it is exhausted.
    ///
    /// All reservations, bitmaps included, happen before any row is written.
    /// When one fails, the columns reserved so far only hold extra spare
    /// capacity, so the visible contents and `row_cap` are unchanged.
    fn grow_for_one(&mut self) -> Result<()> {
        if self.row_count < self.row_cap {
            return Ok(());
        }
        let new_cap = self.row_cap.checked_mul(2).unwrap_or(usize::MAX).max(1);
        for col in &mut self.columns {
            let additional = new_cap.saturating_sub(col.values.len());
            col.values
                .try_reserve_exact(additional)
                .map_err(|source| Error::AllocationFailed {
                    requested_rows: new_cap,
                    source,
                })?;
            col.try_reserve_bitmap(new_cap)
                .map_err(|source| Error::AllocationFailed {
                    requested_rows: new_cap,
                    source,
                })?;
        }
        self.row_cap = new_cap;
        Ok(())
    }
}
