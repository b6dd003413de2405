//! Named, typed configuration values persisted in a `settings` table.
//!
//! Every setting is one record `(name TEXT PRIMARY KEY, value TEXT, dType INTEGER)`:
//! the value is stored in text form and `dType` holds the [DataType] tag
//! needed to decode it again.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::column::Column;
use crate::data_type::DataType;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::table::Table;
use crate::value::Value;

pub use crate::config::DEFAULT_DB;

pub const SETTINGS_TABLE: &str = "settings";

const NAME: &str = "name";
const VALUE: &str = "value";
const D_TYPE: &str = "dType";

/// Schema row of the settings table.
pub fn schema() -> Row {
    Row::new(vec![
        Column::primary_key(NAME, Value::witness(DataType::Text)),
        Column::typed(VALUE, DataType::Text),
        Column::typed(D_TYPE, DataType::Integer),
    ])
}

/// Drops the settings table and recreates it empty.
pub fn reset(db: &Database) -> Result<()> {
    db.drop_table(SETTINGS_TABLE)?;
    db.create_table(SETTINGS_TABLE, &schema())
}

/// One named value.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub name: String,
    pub value: Value,
}

/// JSON shape of a [Setting].
#[derive(Debug, Deserialize)]
struct Record {
    name: String,
    value: serde_json::Value,
    #[serde(rename = "dType")]
    d_type: i64,
}

fn invalid(name: &str, reason: impl std::fmt::Display) -> Error {
    Error::InvalidSetting(format!("'{name}': {reason}"))
}

/// Text form stored in the `value` column.
fn encode_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => BASE64.encode(b),
    }
}

fn decode_text(name: &str, data_type: DataType, text: &str) -> Result<Value> {
    let value = match data_type {
        DataType::Null => Value::Null,
        DataType::Integer => Value::Integer(
            text.parse::<i64>()
                .map_err(|e| invalid(name, format_args!("bad integer {text:?}: {e}")))?,
        ),
        DataType::Real => finite_real(
            name,
            text.parse::<f64>()
                .map_err(|e| invalid(name, format_args!("bad real {text:?}: {e}")))?,
        )?,
        DataType::Text => Value::Text(text.to_string()),
        DataType::Blob => Value::Blob(
            BASE64
                .decode(text)
                .map_err(|e| invalid(name, format_args!("bad base64: {e}")))?,
        ),
    };
    Ok(value)
}

/// JSON has no literal for NaN or the infinities, so settings never hold them.
fn finite_real(name: &str, f: f64) -> Result<Value> {
    if !f.is_finite() {
        return Err(invalid(name, format_args!("real {f} is not finite")));
    }
    Ok(Value::Real(f))
}

fn data_type_of(name: &str, tag: i64) -> Result<DataType> {
    DataType::from_tag(tag).ok_or_else(|| invalid(name, format_args!("unknown dType {tag}")))
}

impl Setting {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The record written to the settings table.
    ///
    /// ```
    /// # use sqlwrap::{Setting, Value};
    /// let row = Setting::new("retries", 3i64).to_row();
    /// assert_eq!(row.value("value"), Some(&Value::from("3")));
    /// assert_eq!(row.value("dType"), Some(&Value::Integer(1)));
    /// ```
    pub fn to_row(&self) -> Row {
        Row::new(vec![
            Column::new(NAME, self.name.as_str()),
            Column::new(VALUE, encode_text(&self.value)),
            Column::new(D_TYPE, i64::from(self.value.data_type().tag())),
        ])
    }

    /// Reads a record of the settings table back.
    ///
    /// # Errors
    /// [Error::InvalidSetting] if a column is missing, has the wrong type, or
    /// the stored text does not decode under its `dType`.
    pub fn from_row(row: &Row) -> Result<Self> {
        let field = |column: &str| {
            row.value(column)
                .ok_or_else(|| Error::InvalidSetting(format!("record has no '{column}' column")))
        };
        let name = field(NAME)?.as_text()?.to_string();
        let tag = field(D_TYPE)?.as_int()?;
        let data_type = data_type_of(&name, tag)?;
        let value = decode_text(&name, data_type, field(VALUE)?.as_text()?)?;
        Ok(Self { name, value })
    }

    /// `{"name": .., "value": .., "dType": ..}` with the value in its natural
    /// JSON type; blobs are base64 strings.
    ///
    /// A non-finite real has no JSON form and comes out as `null`. Such a
    /// setting cannot be stored through [Settings::set] or read back by
    /// [Settings::load], so only a hand-built [Setting] reaches this case.
    pub fn to_json(&self) -> serde_json::Value {
        let value = match &self.value {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Blob(b) => serde_json::Value::from(BASE64.encode(b)),
        };
        serde_json::json!({
            "name": self.name,
            "value": value,
            "dType": self.value.data_type().tag(),
        })
    }

    /// Inverse of [Setting::to_json]. The value must match its `dType`.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let record = Record::deserialize(json)?;
        Self::from_record(record)
    }

    fn from_record(record: Record) -> Result<Self> {
        let Record {
            name,
            value,
            d_type,
        } = record;
        let data_type = data_type_of(&name, d_type)?;
        let mismatch = || invalid(&name, format_args!("value {value} is not a {data_type}"));

        let value = match data_type {
            DataType::Null if value.is_null() => Value::Null,
            DataType::Integer => value.as_i64().map(Value::Integer).ok_or_else(mismatch)?,
            DataType::Real => value.as_f64().map(Value::Real).ok_or_else(mismatch)?,
            DataType::Text => value
                .as_str()
                .map(Value::from)
                .ok_or_else(mismatch)?,
            DataType::Blob => {
                let encoded = value.as_str().ok_or_else(mismatch)?;
                decode_text(&name, DataType::Blob, encoded)?
            }
            DataType::Null => return Err(mismatch()),
        };
        Ok(Self { name, value })
    }
}

/// In-memory view of the settings table.
///
/// The cache never holds the connection: each operation that touches the
/// store takes the [Database] it should use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    entries: BTreeMap<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every record of the settings table.
    pub fn load(db: &Database) -> Result<Self> {
        let table = db.select_all(SETTINGS_TABLE)?;
        let mut settings = Self::new();
        for row in table.rows() {
            let setting = Setting::from_row(&row)?;
            settings.entries.insert(setting.name, setting.value);
        }
        tracing::debug!(count = settings.len(), "settings loaded");
        Ok(settings)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Writes `name` to the store, overwriting any previous value, then
    /// updates the cache.
    ///
    /// # Errors
    /// [Error::InvalidSetting] for a NaN or infinite real, before the store
    /// is touched.
    pub fn set(&mut self, db: &Database, name: &str, value: impl Into<Value>) -> Result<()> {
        let setting = Setting::new(name, value);
        if let Value::Real(f) = setting.value {
            finite_real(&setting.name, f)?;
        }
        db.upsert_row(SETTINGS_TABLE, &setting.to_row())?;
        self.entries.insert(setting.name, setting.value);
        Ok(())
    }

    /// Deletes `name` from the store and the cache, returning its old value.
    pub fn remove(&mut self, db: &Database, name: &str) -> Result<Option<Value>> {
        let mut stmt = db.prepare(&format!("DELETE FROM {SETTINGS_TABLE} WHERE {NAME} = ?1;"))?;
        stmt.bind(&[Value::from(name)])?;
        stmt.execute()?;
        stmt.finalize()?;
        Ok(self.entries.remove(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Settings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// JSON array of every setting, in name order.
    pub fn to_json(&self) -> serde_json::Value {
        self.iter()
            .map(|(name, value)| Setting::new(name, value.clone()).to_json())
            .collect()
    }

    /// Upserts every setting of a JSON array in a single transaction.
    ///
    /// The whole document is validated first; nothing is written, and the
    /// cache is left as is, if any entry is invalid or the store fails.
    pub fn import_json(&mut self, db: &mut Database, json: &str) -> Result<usize> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        let settings = records
            .into_iter()
            .map(Setting::from_record)
            .collect::<Result<Vec<_>>>()?;

        let mut table = Table::from_schema(&schema());
        for setting in &settings {
            table.push_row(setting.to_row().into_values())?;
        }
        let written = db.upsert_table(SETTINGS_TABLE, &table)?;

        self.entries
            .extend(settings.into_iter().map(|s| (s.name, s.value)));
        tracing::info!(count = written, "settings imported");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn store() -> Database {
        let db = Database::open_in_memory().unwrap();
        reset(&db).unwrap();
        db
    }

    fn samples() -> Vec<Setting> {
        vec![
            Setting::new("nothing", Value::Null),
            Setting::new("retries", 3i64),
            Setting::new("ratio", 0.1),
            Setting::new("greeting", "hello, world"),
            Setting::new("key", vec![0u8, 1, 254, 255]),
        ]
    }

    // ─────────────────────────────────────────────────────────────
    // Test 1 : Schema
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_schema_ddl() {
        let ddl = crate::ast::CreateTable::from_schema(SETTINGS_TABLE, &schema())
            .unwrap()
            .to_string();
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS settings(name TEXT PRIMARY KEY,value TEXT NOT NULL,dType INTEGER NOT NULL);"
        );
    }

    #[test]
    fn test_reset_wipes_existing_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_DB);
        let db = Database::open(&path, crate::OpenMode::ReadWriteCreate).unwrap();
        reset(&db).unwrap();

        let mut settings = Settings::new();
        settings.set(&db, "a", 1i64).unwrap();
        assert_eq!(Settings::load(&db).unwrap().len(), 1);

        reset(&db).unwrap();
        assert!(Settings::load(&db).unwrap().is_empty());
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : Row form
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_to_row_encodes_as_text() {
        let row = Setting::new("key", vec![0u8, 1, 254, 255]).to_row();
        assert_eq!(row.names(), vec!["name", "value", "dType"]);
        assert_eq!(row.value("value"), Some(&Value::from("AAH+/w==")));
        assert_eq!(row.value("dType"), Some(&Value::Integer(4)));

        let row = Setting::new("nothing", Value::Null).to_row();
        assert_eq!(row.value("value"), Some(&Value::from("NULL")));
    }

    #[test]
    fn test_row_form_round_trips_every_type() {
        for setting in samples() {
            assert_eq!(Setting::from_row(&setting.to_row()).unwrap(), setting);
        }
    }

    #[test]
    fn test_from_row_rejects_non_finite_real_text() {
        let row = Row::from_pairs([
            ("name", Value::from("x")),
            ("value", Value::from("NaN")),
            ("dType", Value::Integer(2)),
        ]);
        assert!(matches!(
            Setting::from_row(&row),
            Err(Error::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_from_row_rejects_unknown_tag() {
        let row = Row::from_pairs([
            ("name", Value::from("x")),
            ("value", Value::from("1")),
            ("dType", Value::Integer(9)),
        ]);
        let err = Setting::from_row(&row).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Settings);
    }

    #[test]
    fn test_from_row_rejects_bad_integer_text() {
        let row = Row::from_pairs([
            ("name", Value::from("x")),
            ("value", Value::from("three")),
            ("dType", Value::Integer(1)),
        ]);
        assert!(matches!(
            Setting::from_row(&row),
            Err(Error::InvalidSetting(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : JSON form
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_json_shape() {
        let json = Setting::new("retries", 3i64).to_json();
        assert_eq!(
            json,
            serde_json::json!({"name": "retries", "value": 3, "dType": 1})
        );
    }

    #[test]
    fn test_json_round_trips_every_type() {
        for setting in samples() {
            assert_eq!(Setting::from_json(&setting.to_json()).unwrap(), setting);
        }
    }

    #[test]
    fn test_from_json_checks_value_against_tag() {
        let json = serde_json::json!({"name": "n", "value": "seven", "dType": 1});
        assert!(matches!(
            Setting::from_json(&json),
            Err(Error::InvalidSetting(_))
        ));

        let json = serde_json::json!({"name": "n", "value": 1});
        assert!(matches!(Setting::from_json(&json), Err(Error::Json(_))));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : Cache over the store
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_set_get_load() {
        let db = store();
        let mut settings = Settings::new();
        for s in samples() {
            settings.set(&db, &s.name, s.value).unwrap();
        }
        settings.set(&db, "retries", 5i64).unwrap();

        assert_eq!(settings.get("retries"), Some(&Value::Integer(5)));
        let loaded = Settings::load(&db).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.len(), samples().len());
    }

    #[test]
    fn test_set_rejects_non_finite_real() {
        let db = store();
        let mut settings = Settings::new();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = settings.set(&db, "x", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Settings);
        }
        assert!(settings.is_empty());
        assert!(Settings::load(&db).unwrap().is_empty());

        // every stored real exports to JSON that imports again
        settings.set(&db, "x", 1e300).unwrap();
        let json = settings.to_json();
        assert_eq!(Setting::from_json(&json[0]).unwrap(), Setting::new("x", 1e300));
    }

    #[test]
    fn test_load_reads_last_record() {
        let db = store();
        let mut settings = Settings::new();
        settings.set(&db, "a", 1i64).unwrap();
        settings.set(&db, "z", 2i64).unwrap();

        let loaded = Settings::load(&db).unwrap();
        assert_eq!(loaded.get("z"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_remove() {
        let db = store();
        let mut settings = Settings::new();
        settings.set(&db, "gone", "soon").unwrap();

        assert_eq!(settings.remove(&db, "gone").unwrap(), Some(Value::from("soon")));
        assert_eq!(settings.remove(&db, "gone").unwrap(), None);
        assert!(Settings::load(&db).unwrap().is_empty());
    }

    #[test]
    fn test_export_import() {
        let db = store();
        let mut source = Settings::new();
        for s in samples() {
            source.set(&db, &s.name, s.value).unwrap();
        }
        let exported = source.to_json().to_string();

        let mut target_db = store();
        let mut target = Settings::new();
        assert_eq!(target.import_json(&mut target_db, &exported).unwrap(), 5);
        assert_eq!(target, source);
        assert_eq!(Settings::load(&target_db).unwrap(), source);
    }

    #[test]
    fn test_invalid_import_writes_nothing() {
        let mut db = store();
        let mut settings = Settings::new();
        let json = r#"[
            {"name": "ok", "value": 1, "dType": 1},
            {"name": "bad", "value": "x", "dType": 2}
        ]"#;

        assert!(settings.import_json(&mut db, json).is_err());
        assert!(settings.is_empty());
        assert!(Settings::load(&db).unwrap().is_empty());
    }

    #[test]
    fn test_import_without_table_rolls_back() {
        let mut db = Database::open_in_memory().unwrap();
        let mut settings = Settings::new();
        let json = r#"[{"name": "a", "value": 1, "dType": 1}]"#;

        let err = settings.import_json(&mut db, json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StatementPrepareFailed);
        assert!(settings.is_empty());
        assert!(db.connection().is_autocommit());
    }
}
