use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::OpenFlags;

/// Store file opened when no path is given.
pub const DEFAULT_DB: &str = "settings.db";

/// How [Database::open](crate::Database::open) treats a missing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Create the file if it does not exist.
    #[default]
    ReadWriteCreate,
    /// Fail with [ConnectionOpenFailed](crate::Error::ConnectionOpenFailed)
    /// if the file does not exist.
    ReadWrite,
}

impl OpenMode {
    pub fn flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            OpenMode::ReadWriteCreate => base | OpenFlags::SQLITE_OPEN_CREATE,
            OpenMode::ReadWrite => base,
        }
    }
}

/// Connection parameters.
///
/// ```
/// # use std::time::Duration;
/// # use sqlwrap::{DatabaseConfig, OpenMode};
/// let config = DatabaseConfig::new("app.db")
///     .with_mode(OpenMode::ReadWrite)
///     .with_busy_timeout(Duration::from_millis(250));
/// assert_eq!(config.mode, OpenMode::ReadWrite);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub mode: OpenMode,
    /// How long a locked database is retried before `SQLITE_BUSY` surfaces.
    /// `None` keeps SQLite's default of failing immediately.
    pub busy_timeout: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode: OpenMode::default(),
            busy_timeout: None,
        }
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, PathBuf::from("settings.db"));
        assert_eq!(config.mode, OpenMode::ReadWriteCreate);
        assert_eq!(config.busy_timeout, None);
    }

    #[test]
    fn test_mode_flags() {
        let create = OpenMode::ReadWriteCreate.flags();
        assert!(create.contains(OpenFlags::SQLITE_OPEN_CREATE));
        assert!(create.contains(OpenFlags::SQLITE_OPEN_READ_WRITE));

        let strict = OpenMode::ReadWrite.flags();
        assert!(!strict.contains(OpenFlags::SQLITE_OPEN_CREATE));
        assert!(strict.contains(OpenFlags::SQLITE_OPEN_NO_MUTEX));
    }
}
