//! Roster storage
//! Mission: Persist users, classes, students and staff/class assignments in SQLite
//!
//! - A single connection guarded by a mutex; every public call is one
//!   round-trip or one transaction.
//! - Foreign keys are enforced by SQLite, so deleting a class or a user
//!   cascades to students and `staff_classes` rows.

mod classes;
pub mod models;
mod students;
mod users;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, Row};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::access::Directory;
use crate::auth::models::{Gender, User, UserRole};

pub use models::*;

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS class_names (
    id TEXT PRIMARY KEY,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS program_types (
    id TEXT PRIMARY KEY,
    type_name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS classes (
    id TEXT PRIMARY KEY,
    class_name_id TEXT NOT NULL REFERENCES class_names(id),
    program_type_id TEXT NOT NULL REFERENCES program_types(id),
    department TEXT,
    section TEXT,
    regular_or_self TEXT
);

CREATE INDEX IF NOT EXISTS idx_classes_program_type
    ON classes(program_type_id);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE,
    password_hash TEXT,
    staff_roll_number TEXT UNIQUE,
    staff_name TEXT,
    role TEXT NOT NULL,
    gender TEXT NOT NULL,
    can_access_both INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS staff_classes (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    class_id TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, class_id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_staff_classes_class
    ON staff_classes(class_id);

CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY,
    roll_number TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    gender TEXT NOT NULL,
    class_id TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    present INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_students_class
    ON students(class_id, roll_number);
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// SQLite-backed roster store
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    bcrypt_cost: u32,
}

impl Store {
    /// Open (or create) the database file and apply the schema
    pub fn open(db_path: &str, bcrypt_cost: u32) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;
        let store = Self::from_connection(conn, bcrypt_cost)?;

        info!("Roster database ready at {}", db_path);
        Ok(store)
    }

    /// Private in-memory database, used by tests and tooling
    pub fn open_in_memory(bcrypt_cost: u32) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, bcrypt_cost)
    }

    fn from_connection(conn: Connection, bcrypt_cost: u32) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to apply roster schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            bcrypt_cost,
        })
    }
}

impl Directory for Store {
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.get_user(id)
    }

    fn find_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        self.get_student(id)
    }

    fn class_exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.get_class(id)?.is_some())
    }

    fn all_class_ids(&self) -> StoreResult<Vec<Uuid>> {
        Ok(self.list_classes()?.into_iter().map(|c| c.id).collect())
    }

    fn students_in_class(&self, class_id: Uuid) -> StoreResult<Vec<Student>> {
        self.list_students_by_class(class_id, None)
    }

    fn set_presence(&self, student_id: Uuid, present: bool) -> StoreResult<Option<Student>> {
        self.update_presence(student_id, present)
    }
}

// ===== Column conversions =====

impl ToSql for UserRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UserRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trim and drop empty optional text so `""` and `NULL` mean the same thing.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(value: &str, field: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}
