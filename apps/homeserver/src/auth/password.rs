//! Argon2id credential hashing.

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::rand_core::{OsRng, RngCore};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::ApiError;

/// Hashes and verifies passwords with fixed Argon2id cost parameters.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Verified against when the account does not exist, so that lookups for
    /// unknown users cost the same as real ones. No password matches it.
    absent_user_hash: String,
    #[cfg(test)]
    verifications: std::sync::atomic::AtomicUsize,
}

impl CredentialHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, password_hash::Error> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let salt = SaltString::generate(&mut OsRng);
        let absent_user_hash = argon2.hash_password(&secret, &salt)?.to_string();

        Ok(Self {
            argon2,
            absent_user_hash,
            #[cfg(test)]
            verifications: Default::default(),
        })
    }

    /// Hash a password with a random salt into a PHC string.
    pub fn hash(&self, password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| {
                tracing::error!(?e, "password hashing failed");
                ApiError::internal("Failed to process password")
            })
    }

    /// Whether `password` matches the stored hash. A missing hash still pays
    /// for a full verification and always fails.
    pub fn verify_stored(&self, password: &str, hash: Option<&str>) -> bool {
        let matched = self.verify(password, hash.unwrap_or(&self.absent_user_hash));
        matched && hash.is_some()
    }

    /// Whether `password` matches the stored PHC string.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::error!(?e, "stored password hash is malformed");
                false
            }
        }
    }
}


#[cfg(test)]
impl CredentialHasher {
    pub(crate) fn verifications(&self) -> usize {
        self.verifications.load(std::sync::atomic::Ordering::Relaxed)
    }
}
