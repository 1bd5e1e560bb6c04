//! HTTP API
//! Mission: Route admin, staff and shared endpoints onto the access layer
//!
//! Public: `/`, `/health`, `/admin/login`, `/staff/login`.
//! Everything else sits behind the bearer-token middleware and then
//! resolves the caller through [`AppState::authorize`].

pub mod admin;
pub mod error;
pub mod staff;

use axum::{
    extract::FromRef,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::access::{authorize, resolve_user, AttendanceWindow, Requirement};
use crate::auth::api::{admin_login, me, staff_login};
use crate::auth::models::{Claims, User};
use crate::auth::{auth_middleware, AuthState, JwtHandler};
use crate::middleware::request_logging;
use crate::store::Store;

pub use error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub jwt: Arc<JwtHandler>,
    pub window: AttendanceWindow,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        AuthState {
            store: state.store.clone(),
            jwt_handler: state.jwt.clone(),
        }
    }
}

impl AppState {
    pub fn new(store: Arc<Store>, jwt: Arc<JwtHandler>, window: AttendanceWindow) -> Self {
        Self { store, jwt, window }
    }

    /// Resolve the token subject without any role requirement
    pub fn caller(&self, claims: &Claims) -> Result<User, ApiError> {
        Ok(resolve_user(self.store.as_ref(), claims)?)
    }

    /// Resolve the token subject and check `requirement`
    pub fn authorize(&self, claims: &Claims, requirement: Requirement) -> Result<User, ApiError> {
        let user = self.caller(claims)?;
        Ok(authorize(user, requirement)?)
    }
}

/// Build the full router
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/admin/login", post(admin_login))
        .route("/staff/login", post(staff_login));

    let protected = Router::new()
        .route("/auth/me", get(me))
        .merge(admin::routes())
        .merge(staff::routes())
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Convocation attendance backend is running" }))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
