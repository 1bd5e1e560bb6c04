//! Staff endpoints: roster listings, attendance marking and class summary.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::access::{
    mark_attendance, visible_class_ids, visible_roster, ClassRoster, Requirement, RosterView,
};
use crate::auth::models::{Claims, Gender, User, UserRole};
use crate::store::{ClassSummary, Student};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/attendance-staff/students", get(attendance_listing))
        .route("/attendance-staff/attendance", put(mark))
        .route("/certificate-staff/students", get(certificate_listing))
        .route("/class/summary", get(class_summary))
}

#[derive(Debug, Deserialize)]
struct RosterQuery {
    class_id: Option<Uuid>,
    present: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ClassListing {
    class_id: Uuid,
    class_name: String,
    department: Option<String>,
    section: Option<String>,
    regular_or_self: Option<String>,
    students_count: usize,
    students: Vec<Student>,
}

#[derive(Debug, Serialize)]
struct RosterResponse {
    staff_id: Uuid,
    staff_name: Option<String>,
    staff_gender: Gender,
    assigned_classes_count: usize,
    classes: Vec<ClassListing>,
}

fn roster_response(
    state: &AppState,
    user: &User,
    rosters: Vec<ClassRoster>,
    present: Option<bool>,
) -> Result<RosterResponse, ApiError> {
    let mut classes = Vec::with_capacity(rosters.len());
    for ClassRoster {
        class_id,
        mut students,
    } in rosters
    {
        let Some(class) = state.store.get_class(class_id)? else {
            continue;
        };
        if let Some(present) = present {
            students.retain(|s| s.present == present);
        }
        classes.push(ClassListing {
            class_id,
            class_name: class.class_name,
            department: class.department,
            section: class.section,
            regular_or_self: class.regular_or_self,
            students_count: students.len(),
            students,
        });
    }

    Ok(RosterResponse {
        staff_id: user.id,
        staff_name: user.staff_name.clone(),
        staff_gender: user.gender,
        assigned_classes_count: user.assigned_classes.len(),
        classes,
    })
}

/// Same-gender students of the caller's assigned classes
async fn attendance_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RosterQuery>,
) -> Result<Json<RosterResponse>, ApiError> {
    let user = state.authorize(&claims, Requirement::AttendanceStaff)?;
    let rosters = visible_roster(
        state.store.as_ref(),
        &user,
        RosterView::SameGender,
        query.class_id,
    )?;
    Ok(Json(roster_response(&state, &user, rosters, query.present)?))
}

/// All students of the caller's assigned classes
async fn certificate_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RosterQuery>,
) -> Result<Json<RosterResponse>, ApiError> {
    let user = state.authorize(&claims, Requirement::CertificateStaff)?;
    let rosters = visible_roster(state.store.as_ref(), &user, RosterView::Full, query.class_id)?;
    Ok(Json(roster_response(&state, &user, rosters, query.present)?))
}

#[derive(Debug, Deserialize)]
struct MarkAttendanceRequest {
    student_id: Uuid,
    present: bool,
}

#[derive(Debug, Serialize)]
struct MarkAttendanceResponse {
    message: String,
    student_id: Uuid,
    student_name: String,
    present: bool,
}

async fn mark(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> Result<Json<MarkAttendanceResponse>, ApiError> {
    let user = state.caller(&claims)?;
    let student = mark_attendance(
        state.store.as_ref(),
        &state.window,
        &user,
        payload.student_id,
        payload.present,
        Utc::now(),
    )?;

    Ok(Json(MarkAttendanceResponse {
        message: "Attendance updated successfully".to_string(),
        student_id: student.id,
        student_name: student.name,
        present: student.present,
    }))
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    role: UserRole,
    summary: Vec<ClassSummary>,
}

/// Attendance counts for every class the caller may see
async fn class_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let user = state.caller(&claims)?;
    let class_ids = visible_class_ids(state.store.as_ref(), &user, None)?;
    let summary = state.store.class_summaries(&class_ids)?;
    Ok(Json(SummaryResponse {
        role: user.role,
        summary,
    }))
}
