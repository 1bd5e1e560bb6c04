//! Service configuration.
//!
//! Built once at startup and handed to the components. Sources, lowest to
//! highest precedence: built-in defaults, an optional TOML file, then
//! environment variables (`.env` is loaded into the environment first).

use anyhow::{anyhow, bail, Context, Result};
use chrono::{FixedOffset, NaiveTime};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use tracing::warn;

use crate::access::{parse_time_of_day, AttendanceWindow};
use crate::auth::password::{DEFAULT_COST, MAX_COST, MIN_COST};

const DEV_JWT_SECRET: &str = "dev-only-change-me";
/// One year
const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    bind_addr: Option<String>,
    db_path: Option<String>,
    jwt_secret: Option<String>,
    token_ttl_minutes: Option<i64>,
    window_start: Option<String>,
    window_end: Option<String>,
    utc_offset_minutes: Option<i32>,
    default_admin_username: Option<String>,
    default_admin_password: Option<String>,
    bcrypt_cost: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub utc_offset_minutes: i32,
    pub default_admin_username: String,
    /// No default admin is created unless a password is configured.
    pub default_admin_password: Option<String>,
    pub bcrypt_cost: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            db_path: "convocation.db".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_minutes: 60,
            window_start: NaiveTime::from_hms_opt(12, 5, 0).unwrap_or_default(),
            window_end: NaiveTime::from_hms_opt(13, 15, 0).unwrap_or_default(),
            utc_offset_minutes: 330,
            default_admin_username: "admin".to_string(),
            default_admin_password: None,
            bcrypt_cost: DEFAULT_COST,
        }
    }
}

fn parse_addr(raw: &str) -> Result<SocketAddr> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid bind address {:?}", raw))
}

fn parse_time(raw: &str, key: &str) -> Result<NaiveTime> {
    parse_time_of_day(raw).with_context(|| format!("{} must be HH:MM or HH:MM:SS, got {:?}", key, raw))
}

fn parse_num<T>(raw: &str, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} is not a valid number: {:?}", key, raw))
}

impl AppConfig {
    /// Defaults overlaid with the values present in a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Unable to load config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cf: ConfigFile = toml::from_str(contents).context("Invalid TOML")?;
        let mut c = Self::default();

        if let Some(s) = cf.bind_addr {
            c.bind_addr = parse_addr(&s)?;
        }
        if let Some(s) = cf.db_path {
            c.db_path = s;
        }
        if let Some(s) = cf.jwt_secret {
            c.jwt_secret = s;
        }
        if let Some(n) = cf.token_ttl_minutes {
            c.token_ttl_minutes = n;
        }
        if let Some(s) = cf.window_start {
            c.window_start = parse_time(&s, "window_start")?;
        }
        if let Some(s) = cf.window_end {
            c.window_end = parse_time(&s, "window_end")?;
        }
        if let Some(n) = cf.utc_offset_minutes {
            c.utc_offset_minutes = n;
        }
        if let Some(s) = cf.default_admin_username {
            c.default_admin_username = s;
        }
        if cf.default_admin_password.is_some() {
            c.default_admin_password = cf.default_admin_password;
        }
        if let Some(n) = cf.bcrypt_cost {
            c.bcrypt_cost = n;
        }

        c.validate()?;
        Ok(c)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BIND_ADDR") {
            self.bind_addr = parse_addr(&v)?;
        }
        if let Some(v) = get("DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = get("JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = get("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.token_ttl_minutes = parse_num(&v, "ACCESS_TOKEN_EXPIRE_MINUTES")?;
        }
        if let Some(v) = get("ATTENDANCE_WINDOW_START") {
            self.window_start = parse_time(&v, "ATTENDANCE_WINDOW_START")?;
        }
        if let Some(v) = get("ATTENDANCE_WINDOW_END") {
            self.window_end = parse_time(&v, "ATTENDANCE_WINDOW_END")?;
        }
        if let Some(v) = get("ATTENDANCE_UTC_OFFSET_MINUTES") {
            self.utc_offset_minutes = parse_num(&v, "ATTENDANCE_UTC_OFFSET_MINUTES")?;
        }
        if let Some(v) = get("ADMIN_USERNAME") {
            self.default_admin_username = v;
        }
        if let Some(v) = get("ADMIN_PASSWORD") {
            self.default_admin_password = Some(v);
        }
        if let Some(v) = get("BCRYPT_COST") {
            self.bcrypt_cost = parse_num(&v, "BCRYPT_COST")?;
        }

        self.validate()
    }

    /// Defaults, then the optional file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;

        if config.jwt_secret == DEV_JWT_SECRET {
            warn!("JWT_SECRET not set, using the development secret");
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&self.token_ttl_minutes) {
            bail!(
                "token lifetime must be between 1 and {} minutes, got {}",
                MAX_TOKEN_TTL_MINUTES,
                self.token_ttl_minutes
            );
        }
        if !(MIN_COST..=MAX_COST).contains(&self.bcrypt_cost) {
            bail!(
                "bcrypt cost must be between {} and {}, got {}",
                MIN_COST,
                MAX_COST,
                self.bcrypt_cost
            );
        }
        if self.jwt_secret.is_empty() {
            bail!("JWT secret must not be empty");
        }
        self.utc_offset()?;
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("UTC offset out of range: {} minutes", self.utc_offset_minutes))
    }

    pub fn attendance_window(&self) -> Result<AttendanceWindow> {
        Ok(AttendanceWindow::new(
            self.window_start,
            self.window_end,
            self.utc_offset()?,
        ))
    }
}
