//! Admin endpoints: classes, lookups, staff, students and reports.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::access::{filter_visible_students, AccessError, Requirement};
use crate::auth::models::{Claims, User, UserResponse};
use crate::store::{
    BulkDelete, BulkIssue, BulkOutcome, ClassRecord, ClassUpdate, NewClass, NewStaff, NewStudent,
    PresentClassReport, ProgramType, StaffFilter, StaffUpdate, Student, StudentUpdate,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        // classes and lookups
        .route("/admin/classes", post(create_class).get(list_classes))
        .route("/admin/classes/bulk", post(bulk_create_classes))
        .route("/admin/classes/:id", patch(update_class).delete(delete_class))
        .route("/admin/classes/:id/students", get(class_students))
        .route("/admin/program-types", get(list_program_types))
        .route("/admin/program-types/:name/classes", get(classes_by_program_type))
        .route("/admin/program-type-ids/:id/classes", get(classes_by_program_type_id))
        // staff
        .route(
            "/admin/staff",
            post(create_staff).get(list_staff).delete(delete_all_staff),
        )
        .route("/admin/staff/bulk", post(bulk_create_staff))
        .route("/admin/staff/:id", patch(update_staff).delete(delete_staff))
        .route(
            "/admin/staff/by-roll/:roll",
            patch(update_staff_by_roll).delete(delete_staff_by_roll),
        )
        // students
        .route("/admin/students", post(create_student).get(list_students))
        .route("/admin/students/bulk", post(bulk_create_students))
        .route("/admin/students/bulk-delete", post(bulk_delete_students))
        .route("/admin/students/search", get(search_students))
        .route("/admin/students/:id", patch(update_student).delete(delete_student))
        .route("/admin/students/by-roll/:roll", patch(update_student_by_roll))
        // reports
        .route("/admin/reports/present-students", get(present_students))
}

fn require_admin(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    state.authorize(claims, Requirement::Admin).map(|_| ())
}

// ===== Classes =====

async fn create_class(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewClass>,
) -> Result<(StatusCode, Json<ClassRecord>), ApiError> {
    require_admin(&state, &claims)?;
    let class = state.store.create_class(&payload)?;
    Ok((StatusCode::CREATED, Json(class)))
}

async fn bulk_create_classes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<Vec<NewClass>>,
) -> Result<Json<BulkOutcome<ClassRecord>>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.bulk_create_classes(&payload)?))
}

async fn list_classes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ClassRecord>>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.list_classes()?))
}

async fn update_class(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClassUpdate>,
) -> Result<Json<ClassRecord>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.update_class(id, &payload)?))
}

async fn delete_class(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let students_deleted = state.store.delete_class(id)?;
    Ok(Json(json!({
        "message": "Class deleted successfully",
        "class_id": id,
        "students_deleted": students_deleted,
    })))
}

#[derive(Debug, Deserialize)]
struct PresenceQuery {
    present: Option<bool>,
}

async fn class_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<PresenceQuery>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let class = state
        .store
        .get_class(id)?
        .ok_or(ApiError::Access(AccessError::ClassNotFound))?;
    let students = state.store.list_students_by_class(id, query.present)?;

    Ok(Json(json!({
        "class": class,
        "total_students": students.len(),
        "students": students,
    })))
}

async fn list_program_types(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ProgramType>>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.list_program_types()?))
}

async fn classes_by_program_type(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let (program_type, classes) = state.store.classes_by_program_type(&name)?;
    Ok(Json(json!({
        "program_type": program_type,
        "classes": classes,
    })))
}

async fn classes_by_program_type_id(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let (program_type, classes) = state.store.classes_by_program_type_id(id)?;
    Ok(Json(json!({
        "program_type": program_type,
        "classes": classes,
    })))
}

// ===== Staff =====

fn bulk_users(outcome: BulkOutcome<User>) -> BulkOutcome<UserResponse> {
    BulkOutcome {
        created: outcome.created.iter().map(UserResponse::from_user).collect(),
        skipped: outcome.skipped,
    }
}

async fn create_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewStaff>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_admin(&state, &claims)?;
    let staff = state.store.create_staff(&payload)?;
    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&staff))))
}

async fn bulk_create_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<Vec<NewStaff>>,
) -> Result<Json<BulkOutcome<UserResponse>>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(bulk_users(state.store.bulk_create_staff(&payload)?)))
}

async fn list_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<StaffFilter>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&state, &claims)?;
    let staff = state.store.list_staff(&filter)?;
    Ok(Json(staff.iter().map(UserResponse::from_user).collect()))
}

async fn update_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StaffUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&state, &claims)?;
    let staff = state.store.update_staff(id, &payload)?;
    Ok(Json(UserResponse::from_user(&staff)))
}

async fn update_staff_by_roll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(roll): Path<String>,
    Json(payload): Json<StaffUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&state, &claims)?;
    let staff = state.store.update_staff_by_roll(&roll, &payload)?;
    Ok(Json(UserResponse::from_user(&staff)))
}

async fn delete_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let staff = state.store.delete_staff(id)?;
    Ok(Json(json!({
        "message": "Staff deleted successfully",
        "staff_id": staff.id,
    })))
}

async fn delete_staff_by_roll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(roll): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let staff = state.store.delete_staff_by_roll(&roll)?;
    Ok(Json(json!({
        "message": "Staff deleted successfully",
        "staff_id": staff.id,
    })))
}

async fn delete_all_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let deleted = state.store.delete_all_staff()?;
    Ok(Json(json!({
        "message": "All staff deleted",
        "deleted_count": deleted,
    })))
}

// ===== Students =====

async fn create_student(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewStudent>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    require_admin(&state, &claims)?;
    let student = state.store.create_student(&payload)?;
    Ok((StatusCode::CREATED, Json(student)))
}

async fn bulk_create_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<Vec<NewStudent>>,
) -> Result<Json<BulkOutcome<Student>>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.bulk_create_students(&payload)?))
}

#[derive(Debug, Deserialize)]
struct StudentListQuery {
    class_id: Option<Uuid>,
    present: Option<bool>,
}

/// Every student, or one class's, through the admin view of the
/// visibility filter
async fn list_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<StudentListQuery>,
) -> Result<Json<Vec<Student>>, ApiError> {
    let admin = state.authorize(&claims, Requirement::Admin)?;
    let mut students = filter_visible_students(state.store.as_ref(), &admin, query.class_id)?;
    if let Some(present) = query.present {
        students.retain(|s| s.present == present);
    }
    Ok(Json(students))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Student>>, ApiError> {
    require_admin(&state, &claims)?;
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest("Query parameter q is required".to_string()));
    }
    Ok(Json(state.store.search_students(&query.q)?))
}

async fn update_student(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StudentUpdate>,
) -> Result<Json<Student>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.update_student(id, &payload)?))
}

async fn update_student_by_roll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(roll): Path<String>,
    Json(payload): Json<StudentUpdate>,
) -> Result<Json<Student>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.update_student_by_roll(&roll, &payload)?))
}

async fn delete_student(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &claims)?;
    let student = state.store.delete_student(id)?;
    Ok(Json(json!({
        "message": "Student deleted successfully",
        "student_id": student.id,
        "roll_number": student.roll_number,
    })))
}

#[derive(Debug, Deserialize)]
struct BulkDeleteRequest {
    student_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BulkDeleteResponse {
    deleted_count: usize,
    deleted: Vec<Uuid>,
    errors: Vec<BulkIssue>,
}

async fn bulk_delete_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    require_admin(&state, &claims)?;
    let BulkDelete { deleted, errors } = state.store.bulk_delete_students(&payload.student_ids)?;
    info!("Admin bulk delete removed {} students", deleted.len());
    Ok(Json(BulkDeleteResponse {
        deleted_count: deleted.len(),
        deleted,
        errors,
    }))
}

// ===== Reports =====

async fn present_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<PresentClassReport>>, ApiError> {
    require_admin(&state, &claims)?;
    Ok(Json(state.store.present_students_report()?))
}

#[cfg(test)]
mod tests {
    use super::super::router;
    use super::super::test_support::{call, state, token_for};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::auth::models::{Gender, UserRole};
    use crate::store::test_support as fixtures;

    #[tokio::test]
    async fn test_admin_routes_reject_staff() {
        let state = state(true);
        let staff = fixtures::staff(
            &state.store,
            "STF1",
            UserRole::AttendanceIncharge,
            Gender::Male,
            vec![],
        );
        let token = token_for(&state, &staff);
        let app = router(state);

        let (status, body) = call(&app, Method::GET, "/admin/classes", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin access required");
    }

    #[tokio::test]
    async fn test_class_and_student_lifecycle() {
        let state = state(true);
        let admin = state.store.create_admin("root", "hunter22").unwrap();
        let token = token_for(&state, &admin);
        let app = router(state);

        let class_body = json!({
            "class_name": "III BSc",
            "program_type": "UG",
            "department": "Mathematics",
            "section": "A",
            "regular_or_self": "Regular"
        });
        let (status, class) = call(
            &app,
            Method::POST,
            "/admin/classes",
            Some(&token),
            Some(class_body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let class_id = class["id"].as_str().unwrap().to_string();

        let (status, _) =
            call(&app, Method::POST, "/admin/classes", Some(&token), Some(class_body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, student) = call(
            &app,
            Method::POST,
            "/admin/students",
            Some(&token),
            Some(json!({
                "roll_number": "21MA001",
                "name": "Anitha",
                "gender": "female",
                "class_name": "III BSc",
                "section": "A"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(student["class_id"], class_id.as_str());
        assert_eq!(student["present"], false);
        let student_id = student["id"].as_str().unwrap().to_string();

        let (status, updated) = call(
            &app,
            Method::PATCH,
            &format!("/admin/students/{}", student_id),
            Some(&token),
            Some(json!({"present": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["present"], true);

        let (status, listing) = call(
            &app,
            Method::GET,
            &format!("/admin/classes/{}/students?present=true", class_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["total_students"], 1);

        let (status, report) = call(
            &app,
            Method::GET,
            "/admin/reports/present-students",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report[0]["students"][0]["roll_number"], "21MA001");

        let (status, found) = call(
            &app,
            Method::GET,
            "/admin/students/search?q=anith",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, deleted) = call(
            &app,
            Method::DELETE,
            &format!("/admin/classes/{}", class_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["students_deleted"], 1);
    }

    #[tokio::test]
    async fn test_classes_by_program_type_id() {
        let state = state(true);
        let admin = state.store.create_admin("root", "hunter22").unwrap();
        fixtures::class(&state.store, "I BCA", "A");
        let ug = state.store.list_program_types().unwrap().remove(0);
        let token = token_for(&state, &admin);
        let app = router(state);

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/admin/program-type-ids/{}/classes", ug.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["program_type"]["type_name"], ug.type_name.as_str());
        assert_eq!(body["classes"][0]["class_name"], "I BCA");

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/admin/program-type-ids/{}/classes", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("Program type"));

        let (status, _) = call(
            &app,
            Method::GET,
            "/admin/program-type-ids/not-a-uuid/classes",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_staff_management() {
        let state = state(true);
        let admin = state.store.create_admin("root", "hunter22").unwrap();
        let c = fixtures::class(&state.store, "I BCA", "A");
        let token = token_for(&state, &admin);
        let app = router(state);

        let (status, staff) = call(
            &app,
            Method::POST,
            "/admin/staff",
            Some(&token),
            Some(json!({
                "staff_roll_number": "STF100",
                "staff_name": "Ravi",
                "role": "attendance_incharge",
                "gender": "male",
                "assigned_class_names": ["I BCA"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(staff["assigned_classes"][0], c.id.to_string());
        assert_eq!(staff["can_access_both"], false);

        let (status, listed) = call(
            &app,
            Method::GET,
            "/admin/staff?role=attendance_incharge&program_type=UG",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, updated) = call(
            &app,
            Method::PATCH,
            "/admin/staff/by-roll/STF100",
            Some(&token),
            Some(json!({"can_access_both": true, "assigned_class_ids": []})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["can_access_both"], true);
        assert!(updated["assigned_classes"].as_array().unwrap().is_empty());

        let (status, body) =
            call(&app, Method::DELETE, "/admin/staff", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_count"], 1);

        let (status, me) = call(&app, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["role"], "admin");
    }

    #[tokio::test]
    async fn test_bulk_delete_reports_errors() {
        let state = state(true);
        let admin = state.store.create_admin("root", "hunter22").unwrap();
        let c = fixtures::class(&state.store, "I BCA", "A");
        let s = fixtures::student(&state.store, "R1", Gender::Male, c.id);
        let token = token_for(&state, &admin);
        let app = router(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/admin/students/bulk-delete",
            Some(&token),
            Some(json!({"student_ids": [s.id.to_string(), "bogus"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_count"], 1);
        assert_eq!(body["errors"][0]["key"], "bogus");
    }
}
