pub mod ast;
pub mod column;
pub mod config;
pub mod data_type;
pub mod database;
pub mod error;
pub mod row;
pub mod settings;
pub mod statement;
pub mod table;
pub mod value;

pub use ast::ColumnsSelect;
pub use column::{Column, MAX_COLUMN_NAME_LENGTH};
pub use config::{DatabaseConfig, OpenMode};
pub use data_type::DataType;
pub use database::Database;
pub use error::{Error, ErrorKind, Result};
pub use row::Row;
pub use settings::{Setting, Settings};
pub use statement::{PreparedStatement, StatementState};
pub use table::{Table, TableColumn};
pub use value::Value;
