use std::fmt::{self, Write as _};

use allocative::Allocative;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

use crate::data_type::DataType;
use crate::error::{Error, Result};

/// A single dynamically-typed cell exchanged with the store.
///
/// `Text` and `Blob` own their buffer outright. Cloning deep-copies it and
/// [Value::take] moves it out, leaving [Value::Null] behind. Dropping a value
/// releases the buffer exactly once.
#[derive(Debug, Clone, PartialEq, Default, Allocative)]
pub enum Value {
    /// represents an empty or missing value.
    #[default]
    Null,
    /// A 64-bit signed integer value.
    Integer(i64),
    /// A 64-bit floating-point value.
    Real(f64),
    /// A UTF-8 string value.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Builds a text value from the first `len` bytes of `s`.
    ///
    /// `len` is clamped to `s.len()` and rounded down to a char boundary, so
    /// the result is always valid UTF-8.
    ///
    /// ```
    /// # use sqlwrap::Value;
    /// assert_eq!(Value::text_with_len("hello", 3), Value::Text("hel".into()));
    /// assert_eq!(Value::text_with_len("hi", 10), Value::Text("hi".into()));
    /// ```
    pub fn text_with_len(s: &str, len: usize) -> Self {
        Self::Text(s[..floor_char_boundary(s, len)].to_string())
    }

    /// Builds a blob value from the first `len` bytes of `bytes`.
    pub fn blob_with_len(bytes: &[u8], len: usize) -> Self {
        Self::Blob(bytes[..len.min(bytes.len())].to_vec())
    }

    /// A placeholder value of the given type.
    ///
    /// Used when a [Row](crate::Row) describes a schema: only the tag of the
    /// witness matters.
    pub fn witness(data_type: DataType) -> Self {
        match data_type {
            DataType::Null => Self::Null,
            DataType::Integer => Self::Integer(0),
            DataType::Real => Self::Real(0.0),
            DataType::Text => Self::Text(String::new()),
            DataType::Blob => Self::Blob(Vec::new()),
        }
    }

    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the tag of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Integer(_) => DataType::Integer,
            Self::Real(_) => DataType::Real,
            Self::Text(_) => DataType::Text,
            Self::Blob(_) => DataType::Blob,
        }
    }

    /// Column type name of this value's tag, as written into DDL.
    pub fn type_name(&self) -> &'static str {
        self.data_type().type_name()
    }

    /// Moves the value out, leaving [Value::Null] in its place.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Length in bytes of the owned payload. Zero for non-buffer tags.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Blob(b) => b.len(),
            Self::Null | Self::Integer(_) | Self::Real(_) => 0,
        }
    }

    fn mismatch(&self, expected: DataType) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.data_type(),
        }
    }

    /// Returns the inner integer.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if the value is not a [Value::Integer].
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            _ => Err(self.mismatch(DataType::Integer)),
        }
    }

    /// Returns the inner real.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if the value is not a [Value::Real].
    pub fn as_real(&self) -> Result<f64> {
        match self {
            Self::Real(f) => Ok(*f),
            _ => Err(self.mismatch(DataType::Real)),
        }
    }

    /// Returns the inner string slice.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if the value is not a [Value::Text].
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Self::Text(s) => Ok(s),
            _ => Err(self.mismatch(DataType::Text)),
        }
    }

    /// Returns the inner bytes.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if the value is not a [Value::Blob].
    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            Self::Blob(b) => Ok(b),
            _ => Err(self.mismatch(DataType::Blob)),
        }
    }

    /// Canonical textual rendering, see the [fmt::Display] impl.
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }

    /// Renders the value as a SQL literal for statement text.
    ///
    /// Text is single-quoted with embedded quotes doubled, blobs use the
    /// `X'..'` hex form and numbers are unquoted. Text holding a NUL is cast
    /// from its hex bytes, since SQL text cannot contain one. Reals keep full precision;
    /// NaN has no literal and renders as `NULL`, infinities as out-of-range
    /// exponents that SQLite reads back as infinities.
    ///
    /// ```
    /// # use sqlwrap::Value;
    /// assert_eq!(Value::Integer(7).to_sql_literal(), "7");
    /// assert_eq!(Value::from("it's").to_sql_literal(), "'it''s'");
    /// assert_eq!(Value::Null.to_sql_literal(), "NULL");
    /// ```
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Real(f) if f.is_nan() => "NULL".to_string(),
            Self::Real(f) if f.is_infinite() => {
                let literal = if f.is_sign_positive() { "9e999" } else { "-9e999" };
                literal.to_string()
            }
            Self::Real(f) => format!("{f:?}"),
            // the tokenizer stops at NUL, so such text goes through a blob literal
            Self::Text(s) if s.contains('\0') => {
                let mut out = String::with_capacity(s.len() * 2 + 19);
                out.push_str("CAST(");
                write_hex_literal(&mut out, s.as_bytes());
                out.push_str(" AS TEXT)");
                out
            }
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Blob(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 3);
                write_hex_literal(&mut out, b);
                out
            }
        }
    }
}

fn write_hex_literal(out: &mut String, bytes: &[u8]) {
    out.push_str("X'");
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\'');
}

fn floor_char_boundary(s: &str, len: usize) -> usize {
    let mut end = len.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Integers as decimal, reals with six decimals, text and blobs verbatim,
/// null as `NULL`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r:.6}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Binding dispatch: every tag maps to its own SQLite bind call.
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            Self::Null => ValueRef::Null,
            Self::Integer(i) => ValueRef::Integer(*i),
            Self::Real(f) => ValueRef::Real(*f),
            Self::Text(s) => ValueRef::Text(s.as_bytes()),
            Self::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
