use allocative::Allocative;
use rusqlite::types::ValueRef;

use crate::error::{Error, Result};
use crate::value::Value;

/// The storage classes a [Value] can carry.
///
/// Besides tagging values, a `DataType` is what a schema column declares:
/// [DataType::type_name] is the type written into generated DDL and
/// [DataType::from_declared] reads it back when results are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Allocative)]
#[repr(u8)]
pub enum DataType {
    /// SQL `NULL`, no payload.
    Null = 0,
    /// A 64-bit signed integer.
    Integer = 1,
    /// A 64-bit floating-point number.
    Real = 2,
    /// A UTF-8 character string.
    Text = 3,
    /// An opaque byte string.
    Blob = 4,
}

impl DataType {
    /// All tags, in tag-code order.
    pub const ALL: [DataType; 5] = [
        DataType::Null,
        DataType::Integer,
        DataType::Real,
        DataType::Text,
        DataType::Blob,
    ];

    /// The column type name used in generated DDL.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }

    /// Numeric code of the tag, as persisted by the settings `dType` column.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [DataType::tag]. Returns `None` for unknown codes.
    pub fn from_tag(tag: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| i64::from(t.tag()) == tag)
    }

    /// Parses a column's declared type into the tag its values decode to.
    ///
    /// Only `INTEGER`, `REAL`, `TEXT` and `BLOB` (any case) are decodable.
    /// Anything else, including a declared `NULL` or a missing declaration
    /// (expression columns), is reported as [Error::UnsupportedDeclaredType].
    pub fn from_declared(column: &str, declared: Option<&str>) -> Result<Self> {
        let unsupported = || Error::UnsupportedDeclaredType {
            column: column.to_string(),
            declared: declared.map(str::to_string),
        };
        let decl = declared.ok_or_else(unsupported)?.trim();
        [Self::Integer, Self::Real, Self::Text, Self::Blob]
            .into_iter()
            .find(|t| decl.eq_ignore_ascii_case(t.type_name()))
            .ok_or_else(unsupported)
    }

    /// Runtime storage class of a raw store value.
    pub fn of_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(_) => Self::Integer,
            ValueRef::Real(_) => Self::Real,
            ValueRef::Text(_) => Self::Text,
            ValueRef::Blob(_) => Self::Blob,
        }
    }

    /// Decodes one store cell according to this declared type.
    ///
    /// SQL `NULL` stays [Value::Null] whatever the declaration. Non-null cells
    /// of another storage class are converted: reals truncate to integers,
    /// integers widen to reals, and numbers in a text or blob column render
    /// as text. Reals render in Rust's shortest round-trip form (`1e20` is
    /// `"100000000000000000000"`), not SQLite's `%!.15g` (`"1.0e+20"`).
    /// Text that does not parse as the declared number is a [Error::Decode],
    /// where SQLite would take the longest numeric prefix.
    pub fn decode(self, column: &str, raw: ValueRef<'_>) -> Result<Value> {
        let decode_err = || Error::Decode {
            column: column.to_string(),
            declared: self,
            found: Self::of_value_ref(raw),
        };

        let value = match (self, raw) {
            (_, ValueRef::Null) => Value::Null,

            (Self::Integer, ValueRef::Integer(i)) => Value::Integer(i),
            (Self::Integer, ValueRef::Real(f)) => Value::Integer(f as i64),
            (Self::Integer, ValueRef::Text(t) | ValueRef::Blob(t)) => std::str::from_utf8(t)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .map(Value::Integer)
                .ok_or_else(decode_err)?,

            (Self::Real, ValueRef::Real(f)) => Value::Real(f),
            (Self::Real, ValueRef::Integer(i)) => Value::Real(i as f64),
            (Self::Real, ValueRef::Text(t) | ValueRef::Blob(t)) => std::str::from_utf8(t)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map(Value::Real)
                .ok_or_else(decode_err)?,

            (Self::Text, ValueRef::Text(t) | ValueRef::Blob(t)) => {
                Value::Text(String::from_utf8_lossy(t).into_owned())
            }
            (Self::Text, ValueRef::Integer(i)) => Value::Text(i.to_string()),
            (Self::Text, ValueRef::Real(f)) => Value::Text(f.to_string()),

            (Self::Blob, ValueRef::Blob(b) | ValueRef::Text(b)) => Value::Blob(b.to_vec()),
            (Self::Blob, ValueRef::Integer(i)) => Value::Blob(i.to_string().into_bytes()),
            (Self::Blob, ValueRef::Real(f)) => Value::Blob(f.to_string().into_bytes()),

            (Self::Null, _) => return Err(decode_err()),
        };
        Ok(value)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    // ─────────────────────────────────────────────────────────────
    // Test 1 : type names
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_type_names() {
        let names: Vec<&str> = DataType::ALL.iter().map(|t| t.type_name()).collect();
        assert_eq!(names, vec!["NULL", "INTEGER", "REAL", "TEXT", "BLOB"]);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : tag codes
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_tag_round_trip() {
        for t in DataType::ALL {
            assert_eq!(DataType::from_tag(i64::from(t.tag())), Some(t));
        }
        assert_eq!(DataType::Text.tag(), 3);
        assert_eq!(DataType::from_tag(5), None);
        assert_eq!(DataType::from_tag(-1), None);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : declared types
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_from_declared() {
        assert_eq!(
            DataType::from_declared("a", Some("INTEGER")).unwrap(),
            DataType::Integer
        );
        assert_eq!(
            DataType::from_declared("a", Some("real")).unwrap(),
            DataType::Real
        );
        assert_eq!(
            DataType::from_declared("a", Some("Text")).unwrap(),
            DataType::Text
        );
        assert_eq!(
            DataType::from_declared("a", Some("BLOB")).unwrap(),
            DataType::Blob
        );

        for bad in [Some("NULL"), Some("VARCHAR(10)"), None] {
            let err = DataType::from_declared("a", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : decoding by declared type
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_decode_matching_storage() {
        assert_eq!(
            DataType::Integer.decode("c", ValueRef::Integer(7)).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            DataType::Real.decode("c", ValueRef::Real(1.5)).unwrap(),
            Value::Real(1.5)
        );
        assert_eq!(
            DataType::Text.decode("c", ValueRef::Text(b"alice")).unwrap(),
            Value::Text("alice".into())
        );
        assert_eq!(
            DataType::Blob.decode("c", ValueRef::Blob(&[1, 2])).unwrap(),
            Value::Blob(vec![1, 2])
        );
    }

    #[test]
    fn test_decode_null_cell_in_any_column() {
        for t in [DataType::Integer, DataType::Real, DataType::Text, DataType::Blob] {
            assert_eq!(t.decode("c", ValueRef::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_decode_conversions() {
        assert_eq!(
            DataType::Integer.decode("c", ValueRef::Real(2.9)).unwrap(),
            Value::Integer(2)
        );
        assert_eq!(
            DataType::Real.decode("c", ValueRef::Integer(3)).unwrap(),
            Value::Real(3.0)
        );
        assert_eq!(
            DataType::Text.decode("c", ValueRef::Integer(42)).unwrap(),
            Value::Text("42".into())
        );
        assert_eq!(
            DataType::Integer.decode("c", ValueRef::Text(b" 12 ")).unwrap(),
            Value::Integer(12)
        );
    }

    #[test]
    fn test_decode_real_in_text_column_uses_round_trip_form() {
        assert_eq!(
            DataType::Text.decode("c", ValueRef::Real(1e20)).unwrap(),
            Value::Text("100000000000000000000".into())
        );
        assert_eq!(
            DataType::Text.decode("c", ValueRef::Real(0.1)).unwrap(),
            Value::Text("0.1".into())
        );
        assert_eq!(
            DataType::Blob.decode("c", ValueRef::Real(2.5)).unwrap(),
            Value::Blob(b"2.5".to_vec())
        );
    }

    #[test]
    fn test_decode_unparsable_text_is_an_error() {
        let err = DataType::Integer
            .decode("age", ValueRef::Text(b"abc"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("age"));
    }
}
