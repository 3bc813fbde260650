// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Credential checking. `AuthSession` only needs a yes/no (plus the user id)
// from whatever stores the credentials; `UserDirectory` is the in-memory
// implementation used for a single run.

use std::collections::HashMap;

use tracing::{debug, warn};

use printpool_core::error::{PrintpoolError, Result};
use printpool_core::types::{User, UserId};

use crate::digest::{password_digest, verify_password};

/// Anything that can decide whether a name/password pair is genuine.
///
/// Implementations may block (remote directory, slow hash); async callers
/// should wrap calls in `tokio::task::spawn_blocking`.
pub trait CredentialOracle: Send + Sync {
    /// Return the id of the user owning these credentials, or
    /// `PrintpoolError::NotAuthorized`.
    fn verify(&self, user_name: &str, password: &str) -> Result<UserId>;
}

struct DirectoryEntry {
    id: UserId,
    password_hex: String,
}

/// In-memory user directory keyed by user name.
#[derive(Default)]
pub struct UserDirectory {
    entries: HashMap<String, DirectoryEntry>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a list of users. Later duplicates of a name
    /// replace earlier ones.
    pub fn from_users<'a>(users: impl IntoIterator<Item = &'a User>) -> Self {
        let mut dir = Self::new();
        for user in users {
            dir.insert(user);
        }
        dir
    }

    /// Add a user. Only the password digest is kept.
    pub fn insert(&mut self, user: &User) {
        debug!(user = %user.name, id = %user.id, "user registered");
        self.entries.insert(
            user.name.clone(),
            DirectoryEntry {
                id: user.id,
                password_hex: password_digest(&user.password),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialOracle for UserDirectory {
    fn verify(&self, user_name: &str, password: &str) -> Result<UserId> {
        match self.entries.get(user_name) {
            Some(entry) if verify_password(password, &entry.password_hex) => Ok(entry.id),
            Some(_) => {
                warn!(user = user_name, "password mismatch");
                Err(PrintpoolError::NotAuthorized)
            }
            None => {
                warn!(user = user_name, "unknown user");
                Err(PrintpoolError::NotAuthorized)
            }
        }
    }
}
