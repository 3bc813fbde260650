// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printpool print service.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user of the print service. Immutable once created.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub password: String,
}

impl User {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            password: password.into(),
        }
    }
}

// Passwords stay out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque credential issued by a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token(pub Uuid);

impl Token {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-form print settings (e.g. `copies = 2`, `duplex = long-edge`).
pub type JobSettings = BTreeMap<String, String>;

/// A unit of print work. Moved from submitter to queue to exactly one worker.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    /// Name of the target printer.
    pub printer: String,
    /// Document identifier. Content rendering happens elsewhere.
    pub document: String,
    pub settings: JobSettings,
    /// Token the job is submitted under; checked again before printing.
    pub token: Token,
    pub submitted_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(printer: impl Into<String>, document: impl Into<String>, token: Token) -> Self {
        Self {
            id: JobId::new(),
            printer: printer.into(),
            document: document.into(),
            settings: JobSettings::new(),
            token,
            submitted_at: Utc::now(),
        }
    }

    /// Attach a single setting, builder style.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Outcome flags for a print attempt.
///
/// Failure flags combine freely; `SUCCESS` never coexists with a failure flag.
/// OR-ing a failure into a success leaves only the failure bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrinterResult(u8);

impl PrinterResult {
    pub const SUCCESS: Self = Self(1);
    pub const NOT_AUTHORIZED: Self = Self(1 << 1);
    pub const QUEUE_FULL: Self = Self(1 << 2);
    pub const NOT_AVAILABLE: Self = Self(1 << 3);
    pub const PRINTER_NOT_FOUND: Self = Self(1 << 4);
    pub const ERR_GENERAL: Self = Self(1 << 5);

    const FAILURE_MASK: u8 = 0b11_1110;

    const NAMED: [(Self, &'static str); 6] = [
        (Self::SUCCESS, "SUCCESS"),
        (Self::NOT_AUTHORIZED, "NOT_AUTHORIZED"),
        (Self::QUEUE_FULL, "QUEUE_FULL"),
        (Self::NOT_AVAILABLE, "NOT_AVAILABLE"),
        (Self::PRINTER_NOT_FOUND, "PRINTER_NOT_FOUND"),
        (Self::ERR_GENERAL, "ERR_GENERAL"),
    ];

    /// Raw bit representation.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Rebuild from raw bits. Rejects empty sets, unknown bits, and
    /// success mixed with failures.
    pub fn from_bits(bits: u8) -> Option<Self> {
        let known = Self::SUCCESS.0 | Self::FAILURE_MASK;
        if bits == 0 || bits & !known != 0 {
            return None;
        }
        if bits & Self::SUCCESS.0 != 0 && bits & Self::FAILURE_MASK != 0 {
            return None;
        }
        Some(Self(bits))
    }

    /// Whether every flag in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn is_failure(self) -> bool {
        self.0 & Self::FAILURE_MASK != 0
    }

    /// Names of the flags that are set, in bit order.
    pub fn flag_names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for PrinterResult {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        let bits = self.0 | rhs.0;
        if bits & Self::FAILURE_MASK != 0 {
            Self(bits & Self::FAILURE_MASK)
        } else {
            Self(bits)
        }
    }
}

impl BitOrAssign for PrinterResult {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl fmt::Display for PrinterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.flag_names().join("|"))
    }
}

impl fmt::Debug for PrinterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrinterResult({self})")
    }
}

impl Serialize for PrinterResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lifecycle states of a dispatch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Waiting for work.
    Idle,
    /// Taking a job off a printer queue.
    Dequeuing,
    /// Checking the job's token.
    Authorizing,
    /// Inside the print operation.
    Printing,
    /// Shut down. Terminal.
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Dequeuing => "dequeuing",
            Self::Authorizing => "authorizing",
            Self::Printing => "printing",
            Self::Stopped => "stopped",
        };
        f.pad(label)
    }
}
