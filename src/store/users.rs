//! User accounts and staff/class assignments.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::{clean, required, uuid_at, Store, StoreError, StoreResult};
use crate::auth::models::{Gender, User, UserRole};
use crate::auth::password::{hash_password, verify_password};
use crate::store::models::{BulkOutcome, NewStaff, StaffFilter, StaffUpdate};

const USER_COLUMNS: &str = "id, username, password_hash, staff_roll_number, staff_name, \
                            role, gender, can_access_both, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        staff_roll_number: row.get(3)?,
        staff_name: row.get(4)?,
        role: row.get(5)?,
        gender: row.get(6)?,
        can_access_both: row.get(7)?,
        assigned_classes: BTreeSet::new(),
        created_at: row.get(8)?,
    })
}

fn load_assignments(conn: &Connection, user_id: Uuid) -> rusqlite::Result<BTreeSet<Uuid>> {
    let mut stmt = conn.prepare_cached("SELECT class_id FROM staff_classes WHERE user_id = ?1")?;
    let ids = stmt
        .query_map(params![user_id.to_string()], |row| uuid_at(row, 0))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(ids)
}

/// `column` is always one of our own column names, never caller input.
fn query_user(conn: &Connection, column: &str, value: &dyn ToSql) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let user = conn.query_row(&sql, [value], user_from_row).optional()?;

    match user {
        Some(mut user) => {
            user.assigned_classes = load_assignments(conn, user.id)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

fn query_staff(conn: &Connection, column: &str, value: &dyn ToSql) -> StoreResult<User> {
    query_user(conn, column, value)?
        .filter(|u| u.role.is_staff())
        .ok_or_else(|| StoreError::NotFound("Staff".to_string()))
}

fn roll_number_taken(conn: &Connection, roll: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE staff_roll_number = ?1)",
        params![roll],
        |row| row.get(0),
    )
}

fn ensure_staff_role(role: UserRole) -> StoreResult<()> {
    if role.is_staff() {
        Ok(())
    } else {
        Err(StoreError::Invalid(
            "Staff role must be attendance_incharge or certificate_incharge".to_string(),
        ))
    }
}

/// Resolve class references given by id and/or by class name. A name
/// must match exactly one class.
fn resolve_classes(conn: &Connection, ids: &[Uuid], names: &[String]) -> StoreResult<Vec<Uuid>> {
    let mut resolved: Vec<Uuid> = Vec::with_capacity(ids.len() + names.len());

    for id in ids {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM classes WHERE id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(format!("Class with id {}", id)));
        }
        resolved.push(*id);
    }

    for name in names {
        let mut stmt = conn.prepare_cached(
            "SELECT c.id FROM classes c
             JOIN class_names cn ON cn.id = c.class_name_id
             WHERE cn.name = ?1",
        )?;
        let matches = stmt
            .query_map(params![name.trim()], |row| uuid_at(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match matches.as_slice() {
            [] => return Err(StoreError::NotFound(format!("Class named '{}'", name))),
            [only] => resolved.push(*only),
            many => {
                return Err(StoreError::Invalid(format!(
                    "Class name '{}' matches {} classes; assign it by id",
                    name,
                    many.len()
                )))
            }
        }
    }

    let mut seen = BTreeSet::new();
    resolved.retain(|id| seen.insert(*id));
    Ok(resolved)
}

fn set_assignments(conn: &Connection, user_id: Uuid, class_ids: &[Uuid]) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM staff_classes WHERE user_id = ?1",
        params![user_id.to_string()],
    )?;
    let mut stmt = conn
        .prepare_cached("INSERT OR IGNORE INTO staff_classes (user_id, class_id) VALUES (?1, ?2)")?;
    for class_id in class_ids {
        stmt.execute(params![user_id.to_string(), class_id.to_string()])?;
    }
    Ok(())
}

/// Validates everything before the first write, so a rejected row leaves
/// nothing behind.
fn insert_staff(conn: &Connection, staff: &NewStaff) -> StoreResult<Uuid> {
    let roll = required(&staff.staff_roll_number, "staff_roll_number")?;
    ensure_staff_role(staff.role)?;
    if roll_number_taken(conn, &roll)? {
        return Err(StoreError::Conflict(
            "Staff with this roll number already exists".to_string(),
        ));
    }
    let classes = resolve_classes(conn, &staff.assigned_class_ids, &staff.assigned_class_names)?;

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (id, username, password_hash, staff_roll_number, staff_name,
                            role, gender, can_access_both, created_at)
         VALUES (?1, NULL, NULL, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            roll,
            clean(&staff.staff_name),
            staff.role,
            staff.gender,
            staff.can_access_both,
            Utc::now().to_rfc3339(),
        ],
    )?;
    set_assignments(conn, id, &classes)?;

    Ok(id)
}

impl Store {
    /// Create the configured admin when the database has no admin yet
    pub fn ensure_default_admin(&self, username: &str, password: &str) -> StoreResult<bool> {
        let count: i64 = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = 'admin'",
                [],
                |row| row.get(0),
            )?
        };

        if count > 0 {
            return Ok(false);
        }

        self.create_admin(username, password)?;
        info!("Default admin user created (username: {})", username);
        warn!("Change the default admin password in production");
        Ok(true)
    }

    pub fn create_admin(&self, username: &str, password: &str) -> StoreResult<User> {
        let username = required(username, "username")?;
        if password.is_empty() {
            return Err(StoreError::Invalid("password must not be empty".to_string()));
        }
        let password_hash = hash_password(password, self.bcrypt_cost)?;

        let conn = self.conn.lock();
        if query_user(&conn, "username", &username)?.is_some() {
            return Err(StoreError::Conflict("Username already exists".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: Some(username),
            password_hash: Some(password_hash),
            staff_roll_number: None,
            staff_name: None,
            role: UserRole::Admin,
            gender: Gender::Male,
            can_access_both: false,
            assigned_classes: BTreeSet::new(),
            created_at: Utc::now().to_rfc3339(),
        };

        conn.execute(
            "INSERT INTO users (id, username, password_hash, staff_roll_number, staff_name,
                                role, gender, can_access_both, created_at)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5, 0, ?6)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.role,
                user.gender,
                user.created_at,
            ],
        )?;

        info!("Created admin: {}", user.display_name());
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        query_user(&conn, "id", &id.to_string())
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        query_user(&conn, "username", &username.trim())
    }

    pub fn get_user_by_staff_roll(&self, roll: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        query_user(&conn, "staff_roll_number", &roll.trim())
    }

    /// Returns the account when the username exists and the password matches
    pub fn verify_credentials(&self, username: &str, password: &str) -> StoreResult<Option<User>> {
        let Some(user) = self.get_user_by_username(username)? else {
            return Ok(None);
        };

        let valid = user
            .password_hash
            .as_deref()
            .map(|h| verify_password(password, h))
            .unwrap_or(false);

        Ok(valid.then_some(user))
    }

    pub fn create_staff(&self, staff: &NewStaff) -> StoreResult<User> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = insert_staff(&tx, staff)?;
        tx.commit()?;

        let user = query_staff(&conn, "id", &id.to_string())?;
        info!(
            "Created staff: {} ({}, {} classes)",
            user.display_name(),
            user.role,
            user.assigned_classes.len()
        );
        Ok(user)
    }

    /// Rows with a taken roll number or an unresolvable class are skipped
    pub fn bulk_create_staff(&self, staff: &[NewStaff]) -> StoreResult<BulkOutcome<User>> {
        let mut outcome = BulkOutcome::default();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(staff.len());
        for entry in staff {
            match insert_staff(&tx, entry) {
                Ok(id) => ids.push(id),
                Err(
                    e @ (StoreError::Conflict(_)
                    | StoreError::Invalid(_)
                    | StoreError::NotFound(_)),
                ) => outcome.skip(entry.staff_roll_number.clone(), e.to_string()),
                Err(e) => return Err(e),
            }
        }
        tx.commit()?;

        for id in ids {
            outcome.created.push(query_staff(&conn, "id", &id.to_string())?);
        }

        info!(
            "Bulk staff import: {} created, {} skipped",
            outcome.created.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    pub fn list_staff(&self, filter: &StaffFilter) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE u.role != 'admin'
               AND (?1 IS NULL OR u.role = ?1)
               AND (?2 IS NULL OR u.gender = ?2)
               AND (?3 IS NULL OR EXISTS (
                    SELECT 1 FROM staff_classes sc
                    JOIN classes c ON c.id = sc.class_id
                    JOIN program_types pt ON pt.id = c.program_type_id
                    WHERE sc.user_id = u.id AND pt.type_name = ?3))
             ORDER BY u.staff_roll_number"
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut users = stmt
            .query_map(
                params![filter.role, filter.gender, clean(&filter.program_type)],
                user_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for user in &mut users {
            user.assigned_classes = load_assignments(&conn, user.id)?;
        }
        Ok(users)
    }

    pub fn update_staff(&self, id: Uuid, update: &StaffUpdate) -> StoreResult<User> {
        self.update_staff_where("id", &id.to_string(), update)
    }

    pub fn update_staff_by_roll(&self, roll: &str, update: &StaffUpdate) -> StoreResult<User> {
        self.update_staff_where("staff_roll_number", &roll.trim(), update)
    }

    fn update_staff_where(
        &self,
        column: &str,
        key: &dyn ToSql,
        update: &StaffUpdate,
    ) -> StoreResult<User> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut staff = query_staff(&tx, column, key)?;

        if let Some(roll) = clean(&update.staff_roll_number) {
            if staff.staff_roll_number.as_deref() != Some(roll.as_str()) {
                if roll_number_taken(&tx, &roll)? {
                    return Err(StoreError::Conflict(
                        "Staff roll number already exists".to_string(),
                    ));
                }
                staff.staff_roll_number = Some(roll);
            }
        }
        if update.staff_name.is_some() {
            staff.staff_name = clean(&update.staff_name);
        }
        if let Some(role) = update.role {
            ensure_staff_role(role)?;
            staff.role = role;
        }
        if let Some(gender) = update.gender {
            staff.gender = gender;
        }
        if let Some(flag) = update.can_access_both {
            staff.can_access_both = flag;
        }

        tx.execute(
            "UPDATE users
             SET staff_roll_number = ?2, staff_name = ?3, role = ?4, gender = ?5,
                 can_access_both = ?6
             WHERE id = ?1",
            params![
                staff.id.to_string(),
                staff.staff_roll_number,
                staff.staff_name,
                staff.role,
                staff.gender,
                staff.can_access_both,
            ],
        )?;

        if update.replaces_assignments() {
            let ids = update.assigned_class_ids.as_deref().unwrap_or_default();
            let names = update.assigned_class_names.as_deref().unwrap_or_default();
            let classes = resolve_classes(&tx, ids, names)?;
            set_assignments(&tx, staff.id, &classes)?;
        }

        tx.commit()?;

        let staff = query_staff(&conn, "id", &staff.id.to_string())?;
        info!("Updated staff: {}", staff.display_name());
        Ok(staff)
    }

    /// Delete one staff account; its class assignments go with it
    pub fn delete_staff(&self, id: Uuid) -> StoreResult<User> {
        self.delete_staff_where("id", &id.to_string())
    }

    pub fn delete_staff_by_roll(&self, roll: &str) -> StoreResult<User> {
        self.delete_staff_where("staff_roll_number", &roll.trim())
    }

    fn delete_staff_where(&self, column: &str, key: &dyn ToSql) -> StoreResult<User> {
        let conn = self.conn.lock();
        let staff = query_staff(&conn, column, key)?;
        conn.execute("DELETE FROM users WHERE id = ?1", params![staff.id.to_string()])?;

        info!("Deleted staff: {}", staff.display_name());
        Ok(staff)
    }

    /// Delete every non-admin account
    pub fn delete_all_staff(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM users WHERE role != 'admin'", [])?;

        warn!("Deleted all staff accounts ({})", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;

    fn new_staff(roll: &str, classes: Vec<Uuid>, names: Vec<String>) -> NewStaff {
        NewStaff {
            staff_roll_number: roll.to_string(),
            staff_name: Some("Ravi".to_string()),
            role: UserRole::AttendanceIncharge,
            gender: Gender::Male,
            can_access_both: false,
            assigned_class_ids: classes,
            assigned_class_names: names,
        }
    }

    #[test]
    fn test_default_admin_created_once() {
        let store = store();
        assert!(store.ensure_default_admin("admin", "admin123").unwrap());
        assert!(!store.ensure_default_admin("admin", "admin123").unwrap());

        let admin = store.get_user_by_username("admin").unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[test]
    fn test_credentials() {
        let store = store();
        store.create_admin("root", "toot-toot").unwrap();

        assert!(store.verify_credentials("root", "toot-toot").unwrap().is_some());
        assert!(store.verify_credentials("root", "wrong").unwrap().is_none());
        assert!(store.verify_credentials("nobody", "toot-toot").unwrap().is_none());

        let dup = store.create_admin("root", "other");
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_create_staff_with_ids_and_names() {
        let store = store();
        let a = class(&store, "I BCA", "A");
        let b = class(&store, "II BSc", "A");

        let staff = store
            .create_staff(&new_staff("S001", vec![a.id], vec!["II BSc".to_string()]))
            .unwrap();
        assert_eq!(staff.assigned_classes, BTreeSet::from([a.id, b.id]));

        let found = store.get_user_by_staff_roll("S001").unwrap().unwrap();
        assert_eq!(found.id, staff.id);
        assert!(found.is_assigned_to(&b.id));

        let dup = store.create_staff(&new_staff("S001", vec![], vec![]));
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_ambiguous_class_name_rejected() {
        let store = store();
        class(&store, "I BCA", "A");
        class(&store, "I BCA", "B");

        let result = store.create_staff(&new_staff("S002", vec![], vec!["I BCA".to_string()]));
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert!(store.get_user_by_staff_roll("S002").unwrap().is_none());
    }

    #[test]
    fn test_admin_role_rejected_for_staff() {
        let store = store();
        let mut staff = new_staff("S003", vec![], vec![]);
        staff.role = UserRole::Admin;
        assert!(matches!(store.create_staff(&staff), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_bulk_create_skips_bad_rows() {
        let store = store();
        let a = class(&store, "I BCA", "A");
        store.create_staff(&new_staff("S001", vec![], vec![])).unwrap();

        let outcome = store
            .bulk_create_staff(&[
                new_staff("S001", vec![], vec![]),
                new_staff("S002", vec![a.id], vec![]),
                new_staff("S003", vec![Uuid::new_v4()], vec![]),
            ])
            .unwrap();

        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].staff_roll_number.as_deref(), Some("S002"));
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.skipped[0].key, "S001");
    }

    #[test]
    fn test_update_staff_replaces_assignments() {
        let store = store();
        let a = class(&store, "I BCA", "A");
        let b = class(&store, "II BSc", "A");
        let staff = store.create_staff(&new_staff("S001", vec![a.id], vec![])).unwrap();
        store.create_staff(&new_staff("S002", vec![], vec![])).unwrap();

        let updated = store
            .update_staff(
                staff.id,
                &StaffUpdate {
                    gender: Some(Gender::Female),
                    can_access_both: Some(true),
                    assigned_class_ids: Some(vec![b.id]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.gender, Gender::Female);
        assert!(updated.can_access_both);
        assert_eq!(updated.assigned_classes, BTreeSet::from([b.id]));

        let cleared = store
            .update_staff_by_roll(
                "S001",
                &StaffUpdate {
                    assigned_class_ids: Some(vec![]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(cleared.assigned_classes.is_empty());

        let taken = store.update_staff(
            staff.id,
            &StaffUpdate {
                staff_roll_number: Some("S002".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(taken, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_list_staff_filters() {
        let store = store();
        let a = class(&store, "I BCA", "A");
        store.create_admin("root", "pw").unwrap();
        store.create_staff(&new_staff("S001", vec![a.id], vec![])).unwrap();
        let mut cert = new_staff("S002", vec![], vec![]);
        cert.role = UserRole::CertificateIncharge;
        cert.gender = Gender::Female;
        store.create_staff(&cert).unwrap();

        assert_eq!(store.list_staff(&StaffFilter::default()).unwrap().len(), 2);

        let females = store
            .list_staff(&StaffFilter {
                gender: Some(Gender::Female),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(females.len(), 1);
        assert_eq!(females[0].role, UserRole::CertificateIncharge);

        let ug = store
            .list_staff(&StaffFilter {
                program_type: Some("UG".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ug.len(), 1);
        assert_eq!(ug[0].staff_roll_number.as_deref(), Some("S001"));

        let pg = store
            .list_staff(&StaffFilter {
                program_type: Some("PG".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(pg.is_empty());
    }

    #[test]
    fn test_delete_staff_cascades_assignments() {
        let store = store();
        let a = class(&store, "I BCA", "A");
        store.create_admin("root", "pw").unwrap();
        let staff = store.create_staff(&new_staff("S001", vec![a.id], vec![])).unwrap();
        store.create_staff(&new_staff("S002", vec![a.id], vec![])).unwrap();

        store.delete_staff(staff.id).unwrap();
        assert!(store.get_user(staff.id).unwrap().is_none());
        assert!(matches!(store.delete_staff(staff.id), Err(StoreError::NotFound(_))));

        {
            let conn = store.conn.lock();
            let links: i64 = conn
                .query_row("SELECT COUNT(*) FROM staff_classes", [], |r| r.get(0))
                .unwrap();
            assert_eq!(links, 1);
        }

        assert_eq!(store.delete_all_staff().unwrap(), 1);
        assert!(store.get_user_by_username("root").unwrap().is_some());
    }

    #[test]
    fn test_admin_is_not_staff() {
        let store = store();
        let admin = store.create_admin("root", "pw").unwrap();
        assert!(matches!(store.delete_staff(admin.id), Err(StoreError::NotFound(_))));
    }
}
