//! End-to-end flow over HTTP: admin sets up the roster, staff log in by
//! roll number, list their students and mark attendance.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, FixedOffset, NaiveTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use convocation_attendance::{
    access::AttendanceWindow,
    api::{router, AppState},
    auth::{password::MIN_COST, JwtHandler},
    store::Store,
};

fn window(start: (u32, u32, u32), end: (u32, u32, u32)) -> AttendanceWindow {
    AttendanceWindow::new(
        NaiveTime::from_hms_opt(start.0, start.1, start.2).unwrap(),
        NaiveTime::from_hms_opt(end.0, end.1, end.2).unwrap(),
        FixedOffset::east_opt(0).unwrap(),
    )
}

/// One minute, twelve hours away from the current time
fn closed_window() -> AttendanceWindow {
    let start = (Utc::now() + Duration::hours(12)).time();
    AttendanceWindow::new(
        start,
        start + Duration::minutes(1),
        FixedOffset::east_opt(0).unwrap(),
    )
}

fn app(store: Arc<Store>, window: AttendanceWindow) -> Router {
    let jwt = Arc::new(JwtHandler::new("integration-secret".to_string(), 60));
    router(AppState::new(store, jwt, window))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn login_admin(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/admin/login",
        None,
        Some(json!({"username": "principal", "password": "convocation-2025"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

async fn login_staff(app: &Router, roll: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/staff/login",
        None,
        Some(json!({"staff_roll_number": roll})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_full_attendance_day() {
    let db = NamedTempFile::new().unwrap();
    let store = Arc::new(Store::open(db.path().to_str().unwrap(), MIN_COST).unwrap());
    assert!(store
        .ensure_default_admin("principal", "convocation-2025")
        .unwrap());
    assert!(!store
        .ensure_default_admin("principal", "convocation-2025")
        .unwrap());

    let open = app(store.clone(), window((0, 0, 0), (23, 59, 59)));
    let admin = login_admin(&open).await;

    // Roster setup
    let (status, outcome) = send(
        &open,
        Method::POST,
        "/admin/classes/bulk",
        Some(&admin),
        Some(json!([
            {"class_name": "III BSc", "program_type": "UG", "department": "Physics", "section": "A"},
            {"class_name": "II MSc", "program_type": "PG", "department": "Physics"},
            {"class_name": "II MSc", "program_type": "PG", "department": "Physics"}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["created"].as_array().unwrap().len(), 2);
    assert_eq!(outcome["skipped"].as_array().unwrap().len(), 1);

    let (_, pg) = send(
        &open,
        Method::GET,
        "/admin/program-types/PG/classes",
        Some(&admin),
        None,
    )
    .await;
    let msc_id = pg["classes"][0]["id"].as_str().unwrap().to_string();

    let (status, students) = send(
        &open,
        Method::POST,
        "/admin/students/bulk",
        Some(&admin),
        Some(json!([
            {"roll_number": "22PH001", "name": "Arun", "gender": "male", "class_name": "III BSc"},
            {"roll_number": "22PH002", "name": "Bala", "gender": "female", "class_name": "III BSc"},
            {"roll_number": "23MS001", "name": "Chitra", "gender": "female", "class_id": msc_id},
            {"roll_number": "22PH001", "name": "Dup", "gender": "male", "class_name": "III BSc"}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(students["created"].as_array().unwrap().len(), 3);
    assert_eq!(students["skipped"][0]["key"], "22PH001");
    let arun = students["created"][0]["id"].as_str().unwrap().to_string();
    let bala = students["created"][1]["id"].as_str().unwrap().to_string();
    let chitra = students["created"][2]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &open,
        Method::POST,
        "/admin/staff/bulk",
        Some(&admin),
        Some(json!([
            {"staff_roll_number": "STF01", "staff_name": "Mr. Kumar", "role": "attendance_incharge",
             "gender": "male", "assigned_class_names": ["III BSc"]},
            {"staff_roll_number": "STF02", "staff_name": "Ms. Latha", "role": "certificate_incharge",
             "gender": "female", "assigned_class_names": ["III BSc", "II MSc"]}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Attendance incharge marks their own-gender student
    let kumar = login_staff(&open, "STF01").await;
    let (status, listing) = send(
        &open,
        Method::GET,
        "/attendance-staff/students",
        Some(&kumar),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["classes"][0]["students_count"], 1);

    let (status, _) = send(
        &open,
        Method::PUT,
        "/attendance-staff/attendance",
        Some(&kumar),
        Some(json!({"student_id": arun, "present": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &open,
        Method::PUT,
        "/attendance-staff/attendance",
        Some(&kumar),
        Some(json!({"student_id": bala, "present": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &open,
        Method::PUT,
        "/attendance-staff/attendance",
        Some(&kumar),
        Some(json!({"student_id": chitra, "present": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not assigned to this class");

    // Certificate incharge reads everything assigned but cannot mark
    let latha = login_staff(&open, "STF02").await;
    let (status, listing) = send(
        &open,
        Method::GET,
        "/certificate-staff/students",
        Some(&latha),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["assigned_classes_count"], 2);

    let (status, _) = send(
        &open,
        Method::PUT,
        "/attendance-staff/attendance",
        Some(&latha),
        Some(json!({"student_id": bala, "present": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Once the window closes the same request is refused
    let closed = app(store.clone(), closed_window());
    let (status, body) = send(
        &closed,
        Method::PUT,
        "/attendance-staff/attendance",
        Some(&kumar),
        Some(json!({"student_id": arun, "present": false})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Attendance marking is allowed only between"));

    // Admin view and report reflect the single mark
    let (_, summary) = send(&open, Method::GET, "/class/summary", Some(&admin), None).await;
    let present_total: u64 = summary["summary"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["present_count"].as_u64().unwrap())
        .sum();
    assert_eq!(present_total, 1);

    let (_, report) = send(
        &open,
        Method::GET,
        "/admin/reports/present-students",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(report.as_array().unwrap().len(), 1);
    assert_eq!(report[0]["students"][0]["name"], "Arun");

    // Staff logins stop working once staff are removed
    let (status, body) = send(&open, Method::DELETE, "/admin/staff", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 2);

    let (status, _) = send(
        &open,
        Method::POST,
        "/staff/login",
        None,
        Some(json!({"staff_roll_number": "STF01"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_login_rejects_staff_and_bad_passwords() {
    let store = Arc::new(Store::open_in_memory(MIN_COST).unwrap());
    store.create_admin("principal", "convocation-2025").unwrap();
    let app = app(store, window((12, 5, 0), (13, 15, 0)));

    let (status, body) = send(
        &app,
        Method::POST,
        "/admin/login",
        None,
        Some(json!({"username": "nobody", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");

    let (status, _) = send(
        &app,
        Method::POST,
        "/staff/login",
        None,
        Some(json!({"staff_roll_number": "NOPE"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = login_admin(&app).await;
    let (status, body) = send(&app, Method::GET, "/auth/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
}
