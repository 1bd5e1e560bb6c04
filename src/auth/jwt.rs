//! Token Issuer/Verifier
//! Mission: Mint and check the signed claim bundle (identity, role, gender,
//! override flag)

use crate::access::AccessError;
use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    expiration_minutes: i64,
}

impl JwtHandler {
    pub fn new(secret: String, expiration_minutes: i64) -> Self {
        Self {
            secret,
            expiration_minutes,
        }
    }

    /// Generate a token for a user; returns it with its lifetime in seconds
    pub fn generate_token(&self, user: &User) -> Result<(String, usize)> {
        let lifetime = Duration::try_minutes(self.expiration_minutes)
            .filter(|d| *d > Duration::zero())
            .context("Token lifetime out of range")?;
        let expiration = Utc::now()
            .checked_add_signed(lifetime)
            .context("Invalid timestamp")?
            .timestamp();

        let exp = usize::try_from(expiration).context("Invalid timestamp")?;
        let expires_in =
            usize::try_from(lifetime.num_seconds()).context("Token lifetime out of range")?;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            gender: user.gender,
            can_access_both: user.can_access_both,
            exp,
        };

        debug!(
            "Generating JWT for {} ({}), expires in {}m",
            user.display_name(),
            user.id,
            self.expiration_minutes
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")?;

        Ok((token, expires_in))
    }

    /// Bad signature, malformed structure and expiry all fail the same way.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AccessError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!("Token rejected: {}", e);
            AccessError::InvalidToken
        })?;

        debug!("Validated JWT for user {}", decoded.claims.sub);

        Ok(decoded.claims)
    }
}
