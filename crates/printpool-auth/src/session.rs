// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Token sessions.
//
// `AuthSession` owns the token → user binding table.  Every read and write
// goes through one `RwLock`, so once `logout` returns, no later `is_valid`
// call on any thread can see the token as live.  Revoked tokens leave a
// tombstone behind so a repeated logout by the same user is a harmless
// no-op instead of an `UnknownToken` error.  `purge_expired` drops a
// tombstone once a full TTL has passed since the token's expiry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use printpool_core::error::{PrintpoolError, Result};
use printpool_core::types::{Token, UserId};

use crate::directory::CredentialOracle;

/// A live binding between a token and its owner.
#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct SessionTable {
    live: HashMap<Token, Session>,
    /// Tokens that were logged out or purged.
    revoked: HashMap<Token, Session>,
}

/// Issues, checks, and revokes tokens.
pub struct AuthSession {
    oracle: Arc<dyn CredentialOracle>,
    ttl: chrono::Duration,
    table: RwLock<SessionTable>,
}

impl AuthSession {
    /// Create a session table that checks credentials with `oracle` and
    /// issues tokens valid for `ttl`.
    pub fn new(oracle: Arc<dyn CredentialOracle>, ttl: Duration) -> Self {
        // Absurdly long TTLs saturate instead of failing.
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        Self {
            oracle,
            ttl,
            table: RwLock::new(SessionTable::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check credentials and issue a fresh token bound to the user.
    ///
    /// Blocks for as long as the credential oracle does.
    #[instrument(skip(self, password), fields(user = user_name))]
    pub fn authenticate(&self, user_name: &str, password: &str) -> Result<Token> {
        let user_id = self.oracle.verify(user_name, password)?;

        let token = Token::new();
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.write()
            .live
            .insert(token, Session { user_id, expires_at });

        info!(user = user_name, %user_id, "user authenticated");
        Ok(token)
    }

    /// Revoke `token` on behalf of `user_id`.
    ///
    /// Fails with `UnknownToken` if the token was never issued or belongs to
    /// someone else.  Revoking an already revoked token is a no-op.
    #[instrument(skip(self), fields(%token, %user_id))]
    pub fn logout(&self, token: Token, user_id: UserId) -> Result<()> {
        let mut table = self.write();

        if let Some(session) = table.live.get(&token).copied() {
            if session.user_id != user_id {
                warn!(%token, %user_id, "logout attempted with a foreign token");
                return Err(PrintpoolError::UnknownToken);
            }
            table.live.remove(&token);
            table.revoked.insert(token, session);
            info!(%user_id, "user logged out");
            return Ok(());
        }

        match table.revoked.get(&token) {
            Some(tombstone) if tombstone.user_id == user_id => {
                debug!(%token, "token already revoked");
                Ok(())
            }
            _ => {
                warn!(%token, %user_id, "logout attempted with an unknown token");
                Err(PrintpoolError::UnknownToken)
            }
        }
    }

    /// Whether `token` is currently live. No side effects.
    pub fn is_valid(&self, token: Token) -> bool {
        let now = Utc::now();
        self.read()
            .live
            .get(&token)
            .is_some_and(|session| session.is_live(now))
    }

    /// The user a live token belongs to.
    pub fn owner(&self, token: Token) -> Option<UserId> {
        let now = Utc::now();
        self.read()
            .live
            .get(&token)
            .filter(|session| session.is_live(now))
            .map(|session| session.user_id)
    }

    /// Number of issued tokens that have not been revoked (expired ones
    /// included until purged).
    pub fn active_sessions(&self) -> usize {
        self.read().live.len()
    }

    /// Number of revoked tokens still remembered for repeated logouts.
    pub fn revoked_sessions(&self) -> usize {
        self.read().revoked.len()
    }

    /// Drop tombstones older than one TTL past their expiry, then move every
    /// expired token to the revoked set. Returns how many tokens were moved.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let ttl = self.ttl;
        let mut table = self.write();

        let before = table.revoked.len();
        table.revoked.retain(|_, tombstone| {
            tombstone
                .expires_at
                .checked_add_signed(ttl)
                .is_none_or(|forget_at| now < forget_at)
        });
        let forgotten = before - table.revoked.len();

        let expired: Vec<(Token, Session)> = table
            .live
            .iter()
            .filter(|(_, session)| !session.is_live(now))
            .map(|(token, session)| (*token, *session))
            .collect();

        for (token, session) in &expired {
            table.live.remove(token);
            table.revoked.insert(*token, *session);
        }

        if !expired.is_empty() || forgotten > 0 {
            debug!(expired = expired.len(), forgotten, "purged tokens");
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UserDirectory;
    use printpool_core::types::User;

    fn session_with(users: &[&User], ttl: Duration) -> AuthSession {
        let dir = UserDirectory::from_users(users.iter().copied());
        AuthSession::new(Arc::new(dir), ttl)
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn authenticate_then_double_logout() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], HOUR);

        let token = auth.authenticate("alice", "pw").expect("login");
        assert!(auth.is_valid(token));
        assert_eq!(auth.owner(token), Some(alice.id));

        auth.logout(token, alice.id).expect("first logout");
        assert!(!auth.is_valid(token));

        auth.logout(token, alice.id).expect("second logout is a no-op");
        assert!(!auth.is_valid(token));
        assert_eq!(auth.active_sessions(), 0);
    }

    #[test]
    fn bad_credentials_are_not_authorized() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], HOUR);
        assert!(matches!(
            auth.authenticate("alice", "wrong"),
            Err(PrintpoolError::NotAuthorized)
        ));
        assert_eq!(auth.active_sessions(), 0);
    }

    #[test]
    fn tokens_are_unique_per_login() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], HOUR);
        let first = auth.authenticate("alice", "pw").unwrap();
        let second = auth.authenticate("alice", "pw").unwrap();
        assert_ne!(first, second);
        assert_eq!(auth.active_sessions(), 2);
    }

    #[test]
    fn logout_with_foreign_token_is_rejected() {
        let alice = User::new("alice", "pw");
        let bob = User::new("bob", "pw2");
        let auth = session_with(&[&alice, &bob], HOUR);

        let token = auth.authenticate("alice", "pw").unwrap();
        assert!(matches!(
            auth.logout(token, bob.id),
            Err(PrintpoolError::UnknownToken)
        ));
        // Still alice's.
        assert!(auth.is_valid(token));

        auth.logout(token, alice.id).unwrap();
        assert!(matches!(
            auth.logout(token, bob.id),
            Err(PrintpoolError::UnknownToken)
        ));
    }

    #[test]
    fn logout_of_never_issued_token_is_unknown() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], HOUR);
        assert!(matches!(
            auth.logout(Token::new(), alice.id),
            Err(PrintpoolError::UnknownToken)
        ));
    }

    #[test]
    fn zero_ttl_tokens_are_never_valid() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], Duration::ZERO);
        let token = auth.authenticate("alice", "pw").unwrap();
        assert!(!auth.is_valid(token));
        assert_eq!(auth.owner(token), None);

        assert_eq!(auth.purge_expired(), 1);
        assert_eq!(auth.active_sessions(), 0);
        // Purged tokens can still be logged out by their owner.
        auth.logout(token, alice.id).expect("logout after purge");
        assert_eq!(auth.revoked_sessions(), 1);
    }

    #[test]
    fn stale_tombstones_are_forgotten() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], Duration::ZERO);
        let token = auth.authenticate("alice", "pw").unwrap();

        assert_eq!(auth.purge_expired(), 1);
        assert_eq!(auth.revoked_sessions(), 1);

        // With a zero TTL the tombstone is already a full TTL past expiry.
        assert_eq!(auth.purge_expired(), 0);
        assert_eq!(auth.revoked_sessions(), 0);
        assert!(matches!(
            auth.logout(token, alice.id),
            Err(PrintpoolError::UnknownToken)
        ));
    }

    #[test]
    fn recent_tombstones_survive_a_purge() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], HOUR);
        let token = auth.authenticate("alice", "pw").unwrap();
        auth.logout(token, alice.id).unwrap();

        assert_eq!(auth.purge_expired(), 0);
        assert_eq!(auth.revoked_sessions(), 1);
        auth.logout(token, alice.id).expect("repeat logout still a no-op");
    }

    #[test]
    fn logout_is_visible_to_every_thread() {
        let alice = User::new("alice", "pw");
        let auth = session_with(&[&alice], HOUR);
        let token = auth.authenticate("alice", "pw").unwrap();
        auth.logout(token, alice.id).unwrap();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| assert!(!auth.is_valid(token)));
            }
        });
    }

    #[test]
    fn concurrent_logins_and_logouts_stay_consistent() {
        let users: Vec<User> = (0..8)
            .map(|i| User::new(format!("user_{i}"), format!("password_{i}")))
            .collect();
        let auth = session_with(&users.iter().collect::<Vec<_>>(), HOUR);

        std::thread::scope(|s| {
            for user in &users {
                let auth = &auth;
                s.spawn(move || {
                    for _ in 0..50 {
                        let token = auth.authenticate(&user.name, &user.password).unwrap();
                        assert!(auth.is_valid(token));
                        auth.logout(token, user.id).unwrap();
                        assert!(!auth.is_valid(token));
                    }
                });
            }
        });

        assert_eq!(auth.active_sessions(), 0);
    }
}
