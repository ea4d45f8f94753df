use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use super::error::{AuthError, AuthResult};

const MEMORY_COST_KIB: u32 = 128 * 1024;
const ITERATIONS: u32 = 4;
const OUTPUT_LEN: usize = 32;

/// Argon2id password hasher.
///
/// Produces self-describing PHC strings, so verification always uses the
/// parameters a hash was created with, regardless of the hasher's own.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1)
            .clamp(1, Params::MAX_P_COST);
        let params = Params::new(MEMORY_COST_KIB, ITERATIONS, parallelism, Some(OUTPUT_LEN))
            .unwrap_or_default();
        Self { params }
    }
}

impl CredentialHasher {
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `plain` with a fresh 16-byte salt.
    pub fn hash(&self, plain: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AuthError::HashingFailure(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` for a wrong password; `Err` only when `hash` is not a
    /// usable argon2 PHC string.
    pub fn verify(&self, plain: &str, hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AuthError::HashingFailure(e.to_string())
        })?;
        match self.argon2().verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(AuthError::HashingFailure(e.to_string()))
            }
        }
    }
}
