// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printpool-auth: who may print.
//
// Credentials are checked by a pluggable `CredentialOracle`; successful logins
// receive an opaque `Token` tracked by `AuthSession` until logout or expiry.

pub mod digest;
pub mod directory;
pub mod session;

pub use digest::{password_digest, verify_password};
pub use directory::{CredentialOracle, UserDirectory};
pub use session::AuthSession;
