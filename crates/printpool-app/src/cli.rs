// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use printpool_core::config::{PoolConfig, SubmitMode};

/// Run one print dispatch cycle and report what happened to every job.
#[derive(Parser, Debug, Clone)]
#[command(name = "printpool", version)]
pub struct Cli {
    /// Number of users (`user_i` / `password_i`).
    #[arg(long, default_value_t = 5)]
    pub users: usize,

    /// Number of printers (`printer_i`).
    #[arg(long, default_value_t = 5)]
    pub printers: usize,

    /// Jobs each user submits.
    #[arg(long, default_value_t = 1)]
    pub jobs_per_user: usize,

    /// Concurrent dispatch workers (overrides the config file).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Capacity of every printer queue (overrides the config file).
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Simulated time spent printing one job, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub latency_ms: u64,

    /// Printer to treat as offline. Repeatable.
    #[arg(long = "offline", value_name = "PRINTER")]
    pub offline: Vec<String>,

    /// Printer whose device faults on every job. Repeatable.
    #[arg(long = "faulty", value_name = "PRINTER")]
    pub faulty: Vec<String>,

    /// Wait for queue space instead of rejecting jobs with QUEUE_FULL.
    #[arg(long)]
    pub wait: bool,

    /// JSON file with pool settings.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the full report as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Apply command-line overrides on top of `base`.
    pub fn apply(&self, mut base: PoolConfig) -> PoolConfig {
        if let Some(workers) = self.workers {
            base.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            base.queue_capacity = capacity;
        }
        if self.wait {
            base.submit_mode = SubmitMode::Wait;
        }
        base
    }
}
