//! Credential Verifier
//! Mission: Hash and check admin passwords with bcrypt

use bcrypt::{hash, verify, BcryptError};
use tracing::warn;

pub use bcrypt::DEFAULT_COST;

/// Cost range bcrypt accepts; the crate keeps its own bounds private.
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    hash(password, cost)
}

/// Returns `false` for a wrong password and for a hash bcrypt cannot read.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match verify(password, password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}
