// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The print operation itself.
//
// Workers hand each authorized job to a `PrintDevice`.  How the document is
// rendered and transported is the device's business; the dispatcher only
// cares about the returned `PrinterResult`.  `SimulatedPrinter` stands in for
// real hardware during a run.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use printpool_core::error::{PrintpoolError, Result};
use printpool_core::types::{JobSettings, PrinterResult, Token};

/// Performs a single print.
///
/// Implementations may block; the worker pool always calls them on the
/// blocking thread pool.  An `Err` (or a panic) is recorded as `ERR_GENERAL`.
pub trait PrintDevice: Send + Sync {
    fn perform_print(
        &self,
        printer: &str,
        document: &str,
        settings: &JobSettings,
        token: &Token,
    ) -> Result<PrinterResult>;
}

/// In-process printer that sleeps for a fixed latency and then succeeds,
/// unless the printer has been marked offline or faulty.
#[derive(Debug, Default)]
pub struct SimulatedPrinter {
    latency: Duration,
    offline: HashSet<String>,
    faulty: HashSet<String>,
    printed: AtomicUsize,
}

impl SimulatedPrinter {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    /// Report `NOT_AVAILABLE` for every job sent to `printer`.
    pub fn with_offline(mut self, printer: impl Into<String>) -> Self {
        self.offline.insert(printer.into());
        self
    }

    /// Fail every job sent to `printer` with a device fault.
    pub fn with_faulty(mut self, printer: impl Into<String>) -> Self {
        self.faulty.insert(printer.into());
        self
    }

    /// Number of jobs that printed successfully.
    pub fn printed(&self) -> usize {
        self.printed.load(Ordering::Relaxed)
    }
}

impl PrintDevice for SimulatedPrinter {
    fn perform_print(
        &self,
        printer: &str,
        document: &str,
        settings: &JobSettings,
        _token: &Token,
    ) -> Result<PrinterResult> {
        if self.offline.contains(printer) {
            debug!(printer, document, "printer offline");
            return Ok(PrinterResult::NOT_AVAILABLE);
        }

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if self.faulty.contains(printer) {
            warn!(printer, document, "simulated device fault");
            return Err(PrintpoolError::Device(format!(
                "{printer} stopped while printing {document}"
            )));
        }

        debug!(printer, document, settings = settings.len(), "printed");
        self.printed.fetch_add(1, Ordering::Relaxed);
        Ok(PrinterResult::SUCCESS)
    }
}
