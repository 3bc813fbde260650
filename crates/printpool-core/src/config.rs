// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PrintpoolError, Result};

/// How the coordinator reacts to a full printer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    /// Reject immediately with `QUEUE_FULL`.
    #[default]
    NonBlocking,
    /// Wait for space in the queue.
    Wait,
}

/// Settings for one dispatch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent dispatch workers.
    pub workers: usize,
    /// Capacity of every printer queue.
    pub queue_capacity: usize,
    /// How long an issued token stays valid.
    pub token_ttl_secs: u64,
    /// Consecutive failures before a printer is considered unavailable.
    pub failure_threshold: u32,
    /// Base cooldown before an unavailable printer gets a probe job.
    pub circuit_cooldown_secs: u64,
    pub submit_mode: SubmitMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 10,
            token_ttl_secs: 3600,
            failure_threshold: 3,
            circuit_cooldown_secs: 30,
            submit_mode: SubmitMode::NonBlocking,
        }
    }
}

impl PoolConfig {
    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PrintpoolError::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(PrintpoolError::Config(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(PrintpoolError::Config(
                "failure_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn circuit_cooldown(&self) -> Duration {
        Duration::from_secs(self.circuit_cooldown_secs)
    }
}
