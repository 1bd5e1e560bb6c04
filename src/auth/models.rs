//! Authentication Models
//! Mission: Define users, roles and the signed claim bundle

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account row: either an admin (username + password) or a staff member
/// (roll number login, assigned to classes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // bcrypt hash - never serialize
    pub staff_roll_number: Option<String>,
    pub staff_name: Option<String>,
    pub role: UserRole,
    pub gender: Gender,
    /// Grants both staff capabilities regardless of `role`.
    pub can_access_both: bool,
    pub assigned_classes: BTreeSet<Uuid>,
    pub created_at: String,
}

impl User {
    pub fn is_assigned_to(&self, class_id: &Uuid) -> bool {
        self.assigned_classes.contains(class_id)
    }

    pub fn display_name(&self) -> &str {
        self.staff_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.staff_roll_number.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,               // Manages classes, staff and students
    AttendanceIncharge,  // Marks same-gender students in assigned classes
    CertificateIncharge, // Read-only roster of assigned classes
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::AttendanceIncharge => "attendance_incharge",
            UserRole::CertificateIncharge => "certificate_incharge",
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "attendance_incharge" => Ok(UserRole::AttendanceIncharge),
            "certificate_incharge" => Ok(UserRole::CertificateIncharge),
            _ => Err(format!("{:?} is not a valid role", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(format!("{:?} is not a valid gender", s)),
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    pub role: UserRole,
    pub gender: Gender,
    #[serde(default)]
    pub can_access_both: bool,
    pub exp: usize, // expiration timestamp
}

/// Admin login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Staff login request body
#[derive(Debug, Deserialize)]
pub struct StaffLoginRequest {
    pub staff_roll_number: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize, // seconds until expiration
    pub role: UserRole,
}

/// User response (sanitized)
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub staff_roll_number: Option<String>,
    pub staff_name: Option<String>,
    pub role: UserRole,
    pub gender: Gender,
    pub can_access_both: bool,
    pub assigned_classes: Vec<Uuid>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            staff_roll_number: user.staff_roll_number.clone(),
            staff_name: user.staff_name.clone(),
            role: user.role,
            gender: user.gender,
            can_access_both: user.can_access_both,
            assigned_classes: user.assigned_classes.iter().copied().collect(),
            created_at: user.created_at.clone(),
        }
    }
}
