//! Authentication Module
//! Mission: Password checks, signed tokens and the login endpoints

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;

pub use api::AuthState;
pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
