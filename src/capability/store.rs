use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags, params};

use super::{CapabilityProvider, CapabilityResult};

const TABLE_EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'favorite_food'";
// Several rows for one person collapse to the earliest inserted one.
const LOOKUP_SQL: &str =
    "SELECT food FROM favorite_food WHERE person_name = ?1 ORDER BY rowid LIMIT 1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Open { path: PathBuf, message: String },
    MissingTable { path: PathBuf },
    Query(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { path, message } => {
                write!(f, "could not open database {}: {message}", path.display())
            }
            Self::MissingTable { path } => write!(
                f,
                "database {} has no favorite_food table",
                path.display()
            ),
            Self::Query(message) => write!(f, "favorite food query failed: {message}"),
        }
    }
}

impl Error for StoreError {}

/// SQLite-backed `favorite_food(person_name, food)` table. Clones share one
/// connection.
#[derive(Clone)]
pub struct FoodStore {
    conn: Arc<Mutex<Connection>>,
}

impl FoodStore {
    /// Opens an existing database. A missing file or table is an error; nothing is created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_error = |err: rusqlite::Error| StoreError::Open {
            path: path.to_path_buf(),
            message: err.to_string(),
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(open_error)?;

        let tables: i64 = conn
            .query_row(TABLE_EXISTS_SQL, [], |row| row.get(0))
            .map_err(open_error)?;
        if tables == 0 {
            return Err(StoreError::MissingTable {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The name is always bound as a parameter, never spliced into SQL text.
    pub fn lookup(&self, person: &str) -> Result<Option<String>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Query("database connection lock poisoned".to_string()))?;

        match conn.query_row(LOOKUP_SQL, params![person], |row| row.get::<_, String>(0)) {
            Ok(food) => Ok(Some(food)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(StoreError::Query(err.to_string())),
        }
    }
}

impl CapabilityProvider for FoodStore {
    // Runs on the blocking pool: a locked database sits in SQLite's busy handler.
    async fn resolve(&self, subject: &str) -> CapabilityResult {
        let store = self.clone();
        let subject = subject.to_string();
        match tokio::task::spawn_blocking(move || store.lookup(&subject)).await {
            Ok(Ok(Some(food))) => CapabilityResult::Found(food),
            Ok(Ok(None)) => CapabilityResult::NotFound,
            Ok(Err(err)) => CapabilityResult::Unavailable(err.to_string()),
            Err(err) => CapabilityResult::Unavailable(format!("favorite food lookup aborted: {err}")),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    use rusqlite::{Connection, params};

    /// Creates `foods.db` under `dir` holding `rows` in insertion order.
    pub(crate) fn seed_database(dir: &Path, rows: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("foods.db");
        let conn = Connection::open(&path).expect("create database");
        conn.execute(
            "CREATE TABLE favorite_food (person_name TEXT NOT NULL, food TEXT NOT NULL)",
            [],
        )
        .expect("create table");
        for (person, food) in rows {
            conn.execute(
                "INSERT INTO favorite_food (person_name, food) VALUES (?1, ?2)",
                params![person, food],
            )
            .expect("insert row");
        }
        path
    }
}
