//! Password gate
//!
//! A boolean predicate in front of the dashboard: the supplied password is
//! hashed with SHA-256 and compared against a configured hex digest, and
//! the resulting session flag is remembered for the process lifetime.
//! Deliberately not an authentication protocol.

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Hex SHA-256 digest of a password
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a password against an expected hex digest
pub fn verify_password(password: &str, expected_hash: &str) -> bool {
    hash_password(password).eq_ignore_ascii_case(expected_hash)
}

/// Session-scoped authentication flag
pub struct SessionGate {
    password_hash: String,
    authenticated: AtomicBool,
}

impl SessionGate {
    pub fn new(password_hash: impl Into<String>) -> Self {
        Self {
            password_hash: password_hash.into(),
            authenticated: AtomicBool::new(false),
        }
    }

    /// Verify the credential and remember the result
    pub fn login(&self, password: &str) -> bool {
        let ok = verify_password(password, &self.password_hash);
        if ok {
            self.authenticated.store(true, Ordering::SeqCst);
            info!("Dashboard session authenticated");
        }
        ok
    }

    pub fn logout(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}
