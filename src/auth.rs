use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::PortalError;
use crate::models::{Account, Role};
use crate::srdb::{self, Db};

const SALT_LEN: usize = 16;

/// Stored form of a password: random salt and `sha256(salt || password)`,
/// both hex encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub salt: String,
    pub hash: String,
}

impl Credential {
    /// Hashes `password` under a freshly generated salt.
    pub fn new(password: &str) -> Self {
        let salt = hex::encode(rand::random::<[u8; SALT_LEN]>());
        let hash = digest(&salt, password);
        Self { salt, hash }
    }

    pub fn verify(&self, password: &str) -> bool {
        constant_time_eq(digest(&self.salt, password).as_bytes(), self.hash.as_bytes())
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// A logged-in account. Created by [`login`], dropped on logout.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.account.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the session holds `role`.
    pub fn require(&self, role: Role) -> Result<&Account, PortalError> {
        if self.account.role == role {
            Ok(&self.account)
        } else {
            Err(PortalError::Forbidden(role))
        }
    }
}

/// Checks `email`/`password` against the stored credential.
///
/// An unknown email and a wrong password fail the same way.
pub fn login(db: &Db, email: &str, password: &str) -> Result<Session> {
    log::trace!("[login] Login attempt for {email}");

    let found = srdb::users::query_account_with_credential(db, email.trim())
        .context("Login failed")?;

    match found {
        Some((account, credential)) if credential.verify(password) => {
            log::info!("[login] {} logged in as {}", account.email, account.role.as_str());
            Ok(Session { account, started_at: Utc::now() })
        }
        _ => {
            log::info!("[login] Rejected credentials for {email}");
            Err(PortalError::InvalidCredentials.into())
        }
    }
}

/// Creates the admin account if no account with that email exists yet.
///
/// Returns `true` if an account was created.
pub fn seed_admin(db: &Db, name: &str, email: &str, password: &str) -> Result<bool> {
    if srdb::users::email_exists(db, email)? {
        log::debug!("[seed_admin] {email} already exists, leaving it alone.");
        return Ok(false);
    }

    srdb::users::insert_admin(db, name, email, &Credential::new(password))
        .with_context(|| format!("Could not create admin account {email}"))?;
    log::info!("[seed_admin] Created admin account {email}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srdb::testing::temp_db;

    #[test]
    fn credential_verifies_only_the_right_password() {
        let credential = Credential::new("correct horse");
        assert!(credential.verify("correct horse"));
        assert!(!credential.verify("correct horse "));
        assert!(!credential.verify(""));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = Credential::new("pw");
        let b = Credential::new("pw");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        assert_eq!(a.salt.len(), SALT_LEN * 2);
    }

    #[test]
    fn constant_time_eq_checks_length_and_content() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn login_round_trip() {
        let (_dir, db) = temp_db();
        assert!(seed_admin(&db, "Admin", "admin@school.edu", "s3cret").unwrap());
        assert!(!seed_admin(&db, "Admin", "admin@school.edu", "other").unwrap());

        let session = login(&db, "admin@school.edu", "s3cret").unwrap();
        assert!(session.is_admin());
        assert!(session.require(Role::Admin).is_ok());
        assert!(matches!(session.require(Role::Student), Err(PortalError::Forbidden(Role::Student))));

        let err = login(&db, "admin@school.edu", "other").unwrap_err();
        assert!(matches!(err.downcast_ref::<PortalError>(), Some(PortalError::InvalidCredentials)));

        let err = login(&db, "nobody@school.edu", "s3cret").unwrap_err();
        assert!(matches!(err.downcast_ref::<PortalError>(), Some(PortalError::InvalidCredentials)));
    }
}
