//! Password service - Argon2id hashing and verification
//!
//! Hashing is deliberately slow, so the async entry points move the work
//! onto tokio's blocking pool and never stall the runtime's workers.

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::domain::result::{Error, Result};
use crate::domain::Argon2Params;

/// Verified against when there is no real hash, so that a miss costs the
/// same as a wrong password
const DUMMY_PLAINTEXT: &str = "tally-dummy-password";

struct Inner {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

/// One-way password hashing with PHC-formatted output
///
/// Cheap to clone; clones share the dummy hash computed at construction.
#[derive(Clone)]
pub struct PasswordService {
    inner: Arc<Inner>,
}

impl PasswordService {
    /// Rejects out-of-range work factors with `Error::Config`
    ///
    /// Runs one hash up front to build the dummy hash, so construction costs
    /// as much as a single login.
    pub fn new(params: &Argon2Params) -> Result<Self> {
        let argon2_params = params
            .to_argon2()
            .map_err(|e| Error::Config(format!("Invalid password hashing parameters: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
        let dummy_hash = hash_with(&argon2, DUMMY_PLAINTEXT)?;

        Ok(Self {
            inner: Arc::new(Inner { argon2, dummy_hash }),
        })
    }

    /// Salted Argon2id hash, on the calling thread
    pub fn hash_blocking(&self, plaintext: &str) -> Result<String> {
        hash_with(&self.inner.argon2, plaintext)
    }

    /// Constant-time check of `plaintext` against a PHC hash
    ///
    /// Fails closed: a malformed hash is a mismatch, never an error. The
    /// work factor comes from the hash itself, so older hashes keep working
    /// after the configured parameters change.
    pub fn verify_blocking(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .inner
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Hash on the blocking pool
    pub async fn hash(&self, plaintext: String) -> Result<String> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.hash_blocking(&plaintext))
            .await
            .map_err(|e| Error::Other(format!("Password hashing task failed: {}", e)))?
    }

    /// Verify on the blocking pool
    ///
    /// With no stored hash the dummy hash is checked instead and the result
    /// is always `false`. A panicked or cancelled task also yields `false`.
    pub async fn verify(&self, plaintext: String, hash: Option<String>) -> bool {
        let service = self.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => service.verify_blocking(&plaintext, &hash),
            None => {
                let _ = service.verify_blocking(&plaintext, &service.inner.dummy_hash);
                false
            }
        })
        .await
        .unwrap_or(false)
    }
}

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Other(format!("Failed to hash password: {}", e)))
}
