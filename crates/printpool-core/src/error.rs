// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printpool.

use thiserror::Error;

use crate::types::PrinterResult;

/// Top-level error type for all Printpool operations.
#[derive(Debug, Error)]
pub enum PrintpoolError {
    // -- Authorization --
    #[error("not authorized")]
    NotAuthorized,

    #[error("unknown token")]
    UnknownToken,

    // -- Submission / dispatch --
    #[error("queue for printer {printer} is full")]
    QueueFull { printer: String },

    #[error("printer not found: {0}")]
    PrinterNotFound(String),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("printer already registered: {0}")]
    DuplicatePrinter(String),

    // -- Print operation --
    #[error("print device fault: {0}")]
    Device(String),

    #[error("general failure: {0}")]
    General(String),

    // -- Configuration / IO --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PrintpoolError {
    /// The result flag recorded for a job that failed with this error.
    pub fn as_result_flag(&self) -> PrinterResult {
        match self {
            Self::NotAuthorized | Self::UnknownToken => PrinterResult::NOT_AUTHORIZED,
            Self::QueueFull { .. } => PrinterResult::QUEUE_FULL,
            Self::PrinterNotFound(_) => PrinterResult::PRINTER_NOT_FOUND,
            _ => PrinterResult::ERR_GENERAL,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintpoolError>;
