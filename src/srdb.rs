pub mod courses;
pub mod notifications;
pub mod results;
pub mod schema;
pub mod users;

use std::path::{Path, PathBuf};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode};

use crate::models::{Grade, Level, NotificationStatus, Role, Semester};

pub type DBResult<T> = Result<T, rusqlite::Error>;

/// Handle to the records database. Each query opens its own connection.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    /// Opens (creating if needed) the database at `path` and makes sure every
    /// table exists.
    pub fn open(path: impl AsRef<Path>) -> DBResult<Self> {
        let db = Self { path: path.as_ref().to_path_buf() };
        db.initialize()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn connect(&self) -> DBResult<Connection> {
        let connection = Connection::open(&self.path)?;
        connection.pragma_update(None, "foreign_keys", "ON")?;
        Ok(connection)
    }

    fn initialize(&self) -> DBResult<()> {
        let connection = self.connect()?;

        for (table, statement) in [
            ("Users", schema::USERS_SCHEMA),
            ("Courses", schema::COURSES_SCHEMA),
            ("StudentCourses", schema::STUDENT_COURSES_SCHEMA),
            ("Results", schema::RESULTS_SCHEMA),
            ("SmsLogs", schema::SMS_LOGS_SCHEMA),
        ] {
            log::debug!("[initialize_db] creating {table} table...");
            connection.execute(statement, [])?;
        }

        Ok(())
    }
}

/// Maps a unique-constraint violation to `Ok(false)` ("already there"); every
/// other error is passed through.
pub(crate) fn swallow_constraint_violation(err: rusqlite::Error) -> DBResult<bool> {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            log::trace!("[swallow_constraint_violation] ignoring: {err}");
            Ok(false)
        }
        other => Err(other),
    }
}

/// Current time as stored in timestamp columns.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Stores the enum by its lowercase/short name and parses it back on read.
macro_rules! text_column {
    ($($ty:ty),*) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse::<$ty>()
                    .map_err(|err| FromSqlError::Other(err.into()))
            }
        }
    )*};
}

text_column!(Level, Semester, Role, Grade, NotificationStatus);
