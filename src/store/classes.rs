//! Classes and their normalized lookup tables.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use super::{clean, new_id, required, uuid_at, Store, StoreError, StoreResult};
use crate::store::models::{BulkOutcome, ClassRecord, ClassSummary, ClassUpdate, NewClass, ProgramType};

pub(super) const CLASS_SELECT: &str = "
    SELECT c.id, cn.name, pt.type_name, c.department, c.section, c.regular_or_self
    FROM classes c
    JOIN class_names cn ON cn.id = c.class_name_id
    JOIN program_types pt ON pt.id = c.program_type_id";

const CLASS_ORDER: &str = " ORDER BY cn.name, c.department, c.section, c.regular_or_self";

pub(super) fn class_from_row(row: &Row<'_>) -> rusqlite::Result<ClassRecord> {
    Ok(ClassRecord {
        id: uuid_at(row, 0)?,
        class_name: row.get(1)?,
        program_type: row.get(2)?,
        department: row.get(3)?,
        section: row.get(4)?,
        regular_or_self: row.get(5)?,
    })
}

pub(super) fn query_class(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<ClassRecord>> {
    let sql = format!("{CLASS_SELECT} WHERE c.id = ?1");
    conn.query_row(&sql, params![id.to_string()], class_from_row)
        .optional()
}

/// The identifying tuple of a class, already cleaned.
struct ClassKey {
    class_name: String,
    program_type: String,
    department: Option<String>,
    section: Option<String>,
    regular_or_self: Option<String>,
}

impl ClassKey {
    fn from_new(new: &NewClass) -> StoreResult<Self> {
        Ok(Self {
            class_name: required(&new.class_name, "class_name")?,
            program_type: required(&new.program_type, "program_type")?,
            department: clean(&new.department),
            section: clean(&new.section),
            regular_or_self: clean(&new.regular_or_self),
        })
    }

    /// `IS` so that two missing sections compare equal.
    fn find(&self, conn: &Connection, exclude: Option<Uuid>) -> rusqlite::Result<Option<Uuid>> {
        conn.query_row(
            "SELECT c.id FROM classes c
             JOIN class_names cn ON cn.id = c.class_name_id
             JOIN program_types pt ON pt.id = c.program_type_id
             WHERE cn.name = ?1 AND pt.type_name = ?2
               AND c.department IS ?3 AND c.section IS ?4 AND c.regular_or_self IS ?5
               AND (?6 IS NULL OR c.id != ?6)
             LIMIT 1",
            params![
                self.class_name,
                self.program_type,
                self.department,
                self.section,
                self.regular_or_self,
                exclude.map(|id| id.to_string()),
            ],
            |row| uuid_at(row, 0),
        )
        .optional()
    }
}

fn class_name_id(conn: &Connection, name: &str) -> rusqlite::Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM class_names WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = new_id();
    conn.execute(
        "INSERT INTO class_names (id, name) VALUES (?1, ?2)",
        params![id, name],
    )?;
    Ok(id)
}

fn program_type_id(conn: &Connection, type_name: &str) -> rusqlite::Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM program_types WHERE type_name = ?1",
            params![type_name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = new_id();
    conn.execute(
        "INSERT INTO program_types (id, type_name) VALUES (?1, ?2)",
        params![id, type_name],
    )?;
    Ok(id)
}

fn insert_class(conn: &Connection, new: &NewClass) -> StoreResult<Uuid> {
    let key = ClassKey::from_new(new)?;
    if key.find(conn, None)?.is_some() {
        return Err(StoreError::Conflict(
            "Class with same details already exists".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO classes (id, class_name_id, program_type_id, department, section, regular_or_self)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            class_name_id(conn, &key.class_name)?,
            program_type_id(conn, &key.program_type)?,
            key.department,
            key.section,
            key.regular_or_self,
        ],
    )?;
    Ok(id)
}

fn program_type_from_row(row: &Row<'_>) -> rusqlite::Result<ProgramType> {
    Ok(ProgramType {
        id: uuid_at(row, 0)?,
        type_name: row.get(1)?,
    })
}

/// `column` is a fixed column name, never request input
fn find_program_type(
    conn: &Connection,
    column: &str,
    value: &str,
) -> rusqlite::Result<Option<ProgramType>> {
    let sql = format!("SELECT id, type_name FROM program_types WHERE {column} = ?1");
    conn.query_row(&sql, params![value], program_type_from_row)
        .optional()
}

fn classes_of_program_type(conn: &Connection, id: Uuid) -> rusqlite::Result<Vec<ClassRecord>> {
    let sql = format!("{CLASS_SELECT} WHERE c.program_type_id = ?1{CLASS_ORDER}");
    let mut stmt = conn.prepare(&sql)?;
    let classes = stmt
        .query_map(params![id.to_string()], class_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(classes)
}

impl Store {
    pub fn create_class(&self, new: &NewClass) -> StoreResult<ClassRecord> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = insert_class(&tx, new)?;
        let class = query_class(&tx, id)?
            .ok_or_else(|| StoreError::NotFound("Class".to_string()))?;
        tx.commit()?;

        info!("Created class {} ({})", class.class_name, class.id);
        Ok(class)
    }

    /// Duplicate or incomplete rows are skipped and reported
    pub fn bulk_create_classes(&self, classes: &[NewClass]) -> StoreResult<BulkOutcome<ClassRecord>> {
        let mut outcome = BulkOutcome::default();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for new in classes {
            match insert_class(&tx, new) {
                Ok(id) => {
                    if let Some(class) = query_class(&tx, id)? {
                        outcome.created.push(class);
                    }
                }
                Err(e @ (StoreError::Conflict(_) | StoreError::Invalid(_))) => {
                    outcome.skip(new.class_name.clone(), e.to_string())
                }
                Err(e) => return Err(e),
            }
        }
        tx.commit()?;

        info!(
            "Bulk class import: {} created, {} skipped",
            outcome.created.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    pub fn update_class(&self, id: Uuid, update: &ClassUpdate) -> StoreResult<ClassRecord> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let current =
            query_class(&tx, id)?.ok_or_else(|| StoreError::NotFound("Class".to_string()))?;

        let key = ClassKey {
            class_name: clean(&update.class_name).unwrap_or(current.class_name),
            program_type: clean(&update.program_type).unwrap_or(current.program_type),
            department: match &update.department {
                Some(_) => clean(&update.department),
                None => current.department,
            },
            section: match &update.section {
                Some(_) => clean(&update.section),
                None => current.section,
            },
            regular_or_self: match &update.regular_or_self {
                Some(_) => clean(&update.regular_or_self),
                None => current.regular_or_self,
            },
        };

        if key.find(&tx, Some(id))?.is_some() {
            return Err(StoreError::Conflict("Duplicate class details".to_string()));
        }

        tx.execute(
            "UPDATE classes
             SET class_name_id = ?2, program_type_id = ?3, department = ?4, section = ?5,
                 regular_or_self = ?6
             WHERE id = ?1",
            params![
                id.to_string(),
                class_name_id(&tx, &key.class_name)?,
                program_type_id(&tx, &key.program_type)?,
                key.department,
                key.section,
                key.regular_or_self,
            ],
        )?;
        let class =
            query_class(&tx, id)?.ok_or_else(|| StoreError::NotFound("Class".to_string()))?;
        tx.commit()?;

        info!("Updated class {}", id);
        Ok(class)
    }

    /// Delete a class with its students and staff links; returns how many
    /// students were removed
    pub fn delete_class(&self, id: Uuid) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if query_class(&tx, id)?.is_none() {
            return Err(StoreError::NotFound("Class".to_string()));
        }

        let students: i64 = tx.query_row(
            "SELECT COUNT(*) FROM students WHERE class_id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        tx.execute("DELETE FROM classes WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;

        info!("Deleted class {} with {} students", id, students);
        Ok(students as usize)
    }

    pub fn get_class(&self, id: Uuid) -> StoreResult<Option<ClassRecord>> {
        let conn = self.conn.lock();
        Ok(query_class(&conn, id)?)
    }

    pub fn list_classes(&self) -> StoreResult<Vec<ClassRecord>> {
        let conn = self.conn.lock();
        let sql = format!("{CLASS_SELECT}{CLASS_ORDER}");
        let mut stmt = conn.prepare_cached(&sql)?;
        let classes = stmt
            .query_map([], class_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(classes)
    }

    pub fn list_program_types(&self) -> StoreResult<Vec<ProgramType>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT id, type_name FROM program_types ORDER BY type_name")?;
        let types = stmt
            .query_map([], program_type_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(types)
    }

    pub fn classes_by_program_type(
        &self,
        type_name: &str,
    ) -> StoreResult<(ProgramType, Vec<ClassRecord>)> {
        let conn = self.conn.lock();
        let program_type = find_program_type(&conn, "type_name", type_name.trim())?
            .ok_or_else(|| StoreError::NotFound(format!("Program type '{}'", type_name)))?;
        let classes = classes_of_program_type(&conn, program_type.id)?;
        Ok((program_type, classes))
    }

    pub fn classes_by_program_type_id(
        &self,
        id: Uuid,
    ) -> StoreResult<(ProgramType, Vec<ClassRecord>)> {
        let conn = self.conn.lock();
        let program_type = find_program_type(&conn, "id", &id.to_string())?
            .ok_or_else(|| StoreError::NotFound("Program type".to_string()))?;
        let classes = classes_of_program_type(&conn, program_type.id)?;
        Ok((program_type, classes))
    }

    /// Attendance counts for the given classes; unknown ids are skipped
    pub fn class_summaries(&self, class_ids: &[Uuid]) -> StoreResult<Vec<ClassSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT cn.name, COUNT(s.id), COALESCE(SUM(s.present), 0)
             FROM classes c
             JOIN class_names cn ON cn.id = c.class_name_id
             LEFT JOIN students s ON s.class_id = c.id
             WHERE c.id = ?1
             GROUP BY c.id",
        )?;

        let mut summaries = Vec::with_capacity(class_ids.len());
        for id in class_ids {
            let row = stmt
                .query_row(params![id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .optional()?;

            if let Some((class_name, total, present)) = row {
                summaries.push(ClassSummary {
                    class_id: *id,
                    class_name,
                    total_students: total as usize,
                    present_count: present as usize,
                    absent_count: (total - present) as usize,
                });
            }
        }
        Ok(summaries)
    }
}
