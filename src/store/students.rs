//! Students and their presence flag.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::classes::{class_from_row, query_class, CLASS_SELECT};
use super::{clean, required, uuid_at, Store, StoreError, StoreResult};
use crate::store::models::{
    BulkDelete, BulkIssue, BulkOutcome, NewStudent, PresentClassReport, Student, StudentUpdate,
};

const STUDENT_COLUMNS: &str = "id, roll_number, name, gender, class_id, present";

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: uuid_at(row, 0)?,
        roll_number: row.get(1)?,
        name: row.get(2)?,
        gender: row.get(3)?,
        class_id: uuid_at(row, 4)?,
        present: row.get(5)?,
    })
}

fn query_student(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], student_from_row)
        .optional()
}

fn query_student_by_roll(conn: &Connection, roll: &str) -> rusqlite::Result<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE roll_number = ?1");
    conn.query_row(&sql, params![roll.trim()], student_from_row)
        .optional()
}

fn roll_number_taken(conn: &Connection, roll: &str, exclude: Option<Uuid>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE roll_number = ?1 AND (?2 IS NULL OR id != ?2))",
        params![roll, exclude.map(|id| id.to_string())],
        |row| row.get(0),
    )
}

/// Find the class a new student belongs to. An explicit id wins; otherwise
/// the class name is required and the remaining details narrow the match.
fn resolve_student_class(conn: &Connection, new: &NewStudent) -> StoreResult<Uuid> {
    if let Some(id) = new.class_id {
        return match query_class(conn, id)? {
            Some(class) => Ok(class.id),
            None => Err(StoreError::NotFound("Class".to_string())),
        };
    }

    let class_name = clean(&new.class_name).ok_or_else(|| {
        StoreError::Invalid("Either class_id or class_name is required".to_string())
    })?;

    let sql = format!(
        "{CLASS_SELECT}
         WHERE cn.name = ?1
           AND (?2 IS NULL OR pt.type_name = ?2)
           AND (?3 IS NULL OR c.department = ?3)
           AND (?4 IS NULL OR c.section = ?4)"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let matches = stmt
        .query_map(
            params![
                class_name,
                clean(&new.program_type),
                clean(&new.department),
                clean(&new.section),
            ],
            class_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    match matches.as_slice() {
        [] => Err(StoreError::NotFound(format!(
            "Class matching '{}'",
            class_name
        ))),
        [only] => Ok(only.id),
        many => Err(StoreError::Invalid(format!(
            "Class details match {} classes; add program_type, department or section",
            many.len()
        ))),
    }
}

fn insert_student(conn: &Connection, new: &NewStudent) -> StoreResult<Student> {
    let roll = required(&new.roll_number, "roll_number")?;
    let name = required(&new.name, "name")?;
    if roll_number_taken(conn, &roll, None)? {
        return Err(StoreError::Conflict("Roll number already exists".to_string()));
    }
    let class_id = resolve_student_class(conn, new)?;

    let student = Student {
        id: Uuid::new_v4(),
        roll_number: roll,
        name,
        gender: new.gender,
        class_id,
        present: false,
    };
    conn.execute(
        "INSERT INTO students (id, roll_number, name, gender, class_id, present)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        params![
            student.id.to_string(),
            student.roll_number,
            student.name,
            student.gender,
            student.class_id.to_string(),
        ],
    )?;
    Ok(student)
}

impl Store {
    pub fn create_student(&self, new: &NewStudent) -> StoreResult<Student> {
        let conn = self.conn.lock();
        let student = insert_student(&conn, new)?;
        info!("Created student {} in class {}", student.roll_number, student.class_id);
        Ok(student)
    }

    /// Rows that fail validation are reported; the rest are inserted
    pub fn bulk_create_students(&self, students: &[NewStudent]) -> StoreResult<BulkOutcome<Student>> {
        let mut outcome = BulkOutcome::default();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for new in students {
            match insert_student(&tx, new) {
                Ok(student) => outcome.created.push(student),
                Err(e @ (StoreError::Conflict(_)
                | StoreError::Invalid(_)
                | StoreError::NotFound(_))) => {
                    outcome.skip(new.roll_number.clone(), e.to_string())
                }
                Err(e) => return Err(e),
            }
        }
        tx.commit()?;

        info!(
            "Bulk student import: {} created, {} skipped",
            outcome.created.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    pub fn get_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        let conn = self.conn.lock();
        Ok(query_student(&conn, id)?)
    }

    pub fn get_student_by_roll(&self, roll: &str) -> StoreResult<Option<Student>> {
        let conn = self.conn.lock();
        Ok(query_student_by_roll(&conn, roll)?)
    }

    /// Case-insensitive substring match on name or roll number
    pub fn search_students(&self, query: &str) -> StoreResult<Vec<Student>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students
             WHERE instr(lower(name), ?1) > 0 OR instr(lower(roll_number), ?1) > 0
             ORDER BY roll_number"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let students = stmt
            .query_map(params![needle], student_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Student search '{}' matched {}", needle, students.len());
        Ok(students)
    }

    pub fn list_students_by_class(
        &self,
        class_id: Uuid,
        present: Option<bool>,
    ) -> StoreResult<Vec<Student>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students
             WHERE class_id = ?1 AND (?2 IS NULL OR present = ?2)
             ORDER BY roll_number"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let students = stmt
            .query_map(params![class_id.to_string(), present], student_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(students)
    }

    pub fn update_student(&self, id: Uuid, update: &StudentUpdate) -> StoreResult<Student> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut student =
            query_student(&tx, id)?.ok_or_else(|| StoreError::NotFound("Student".to_string()))?;

        if let Some(roll) = &update.roll_number {
            let roll = required(roll, "roll_number")?;
            if roll_number_taken(&tx, &roll, Some(id))? {
                return Err(StoreError::Conflict("Roll number already exists".to_string()));
            }
            student.roll_number = roll;
        }
        if let Some(name) = &update.name {
            student.name = required(name, "name")?;
        }
        if let Some(gender) = update.gender {
            student.gender = gender;
        }
        if let Some(present) = update.present {
            student.present = present;
        }
        if let Some(class_id) = update.class_id {
            if query_class(&tx, class_id)?.is_none() {
                return Err(StoreError::NotFound("Class".to_string()));
            }
            student.class_id = class_id;
        }

        tx.execute(
            "UPDATE students
             SET roll_number = ?2, name = ?3, gender = ?4, class_id = ?5, present = ?6
             WHERE id = ?1",
            params![
                id.to_string(),
                student.roll_number,
                student.name,
                student.gender,
                student.class_id.to_string(),
                student.present,
            ],
        )?;
        tx.commit()?;

        info!("Updated student {}", student.roll_number);
        Ok(student)
    }

    pub fn update_student_by_roll(&self, roll: &str, update: &StudentUpdate) -> StoreResult<Student> {
        let id = self
            .get_student_by_roll(roll)?
            .map(|s| s.id)
            .ok_or_else(|| StoreError::NotFound("Student".to_string()))?;
        self.update_student(id, update)
    }

    pub fn delete_student(&self, id: Uuid) -> StoreResult<Student> {
        let conn = self.conn.lock();
        let student =
            query_student(&conn, id)?.ok_or_else(|| StoreError::NotFound("Student".to_string()))?;
        conn.execute("DELETE FROM students WHERE id = ?1", params![id.to_string()])?;

        info!("Deleted student {}", student.roll_number);
        Ok(student)
    }

    /// Delete by id; unparsable or unknown ids are reported, not fatal
    pub fn bulk_delete_students(&self, student_ids: &[String]) -> StoreResult<BulkDelete> {
        let mut result = BulkDelete::default();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for raw in student_ids {
            let reason = match Uuid::parse_str(raw.trim()) {
                Ok(id) => {
                    let removed =
                        tx.execute("DELETE FROM students WHERE id = ?1", params![id.to_string()])?;
                    if removed > 0 {
                        result.deleted.push(id);
                        continue;
                    }
                    "Student not found".to_string()
                }
                Err(e) => format!("Invalid student id: {}", e),
            };
            result.errors.push(BulkIssue {
                key: raw.clone(),
                reason,
            });
        }
        tx.commit()?;

        info!(
            "Bulk delete: {} students removed, {} rejected",
            result.deleted.len(),
            result.errors.len()
        );
        Ok(result)
    }

    /// Set the presence flag; `None` when the student does not exist
    pub fn update_presence(&self, id: Uuid, present: bool) -> StoreResult<Option<Student>> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE students SET present = ?2 WHERE id = ?1",
            params![id.to_string(), present],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(query_student(&conn, id)?)
    }

    /// Present students grouped by class, classes without anyone present
    /// left out
    pub fn present_students_report(&self) -> StoreResult<Vec<PresentClassReport>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE present = 1 ORDER BY roll_number"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let present = stmt
            .query_map([], student_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut by_class: BTreeMap<Uuid, Vec<Student>> = BTreeMap::new();
        for student in present {
            by_class.entry(student.class_id).or_default().push(student);
        }

        let mut report = Vec::with_capacity(by_class.len());
        for (class_id, students) in by_class {
            if let Some(class) = query_class(&conn, class_id)? {
                report.push(PresentClassReport { class, students });
            }
        }
        report.sort_by(|a, b| {
            (&a.class.class_name, &a.class.section).cmp(&(&b.class.class_name, &b.class.section))
        });
        Ok(report)
    }
}
