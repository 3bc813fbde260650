// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable run summary and the process exit policy.

use std::fmt;

use printpool_core::types::PrinterResult;
use printpool_dispatch::DispatchReport;

/// Every job finished without the all-printers-failed condition.
pub const EXIT_OK: u8 = 0;
/// Every printer that received jobs only produced ERR_GENERAL.
pub const EXIT_ALL_PRINTERS_FAILED: u8 = 1;
/// The run could not be set up.
pub const EXIT_SETUP_ERROR: u8 = 2;

const FLAGS: [PrinterResult; 6] = [
    PrinterResult::SUCCESS,
    PrinterResult::NOT_AUTHORIZED,
    PrinterResult::QUEUE_FULL,
    PrinterResult::NOT_AVAILABLE,
    PrinterResult::PRINTER_NOT_FOUND,
    PrinterResult::ERR_GENERAL,
];

pub fn exit_code(report: &DispatchReport) -> u8 {
    if report.all_printers_errored() {
        EXIT_ALL_PRINTERS_FAILED
    } else {
        EXIT_OK
    }
}

/// Text summary of a run; `Display` writes it line by line.
pub struct Summary<'a>(pub &'a DispatchReport);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(
            f,
            "{} jobs: {} succeeded, {} failed",
            report.total(),
            report.succeeded(),
            report.failed()
        )?;

        for flag in FLAGS {
            let count = report.count(flag);
            if count > 0 {
                writeln!(f, "  {flag:<18} {count}")?;
            }
        }

        let by_printer = report.by_printer();
        if !by_printer.is_empty() {
            writeln!(f, "per printer:")?;
            for (printer, tally) in by_printer {
                writeln!(
                    f,
                    "  {printer:<12} ok {:>3}  failed {:>3}",
                    tally.succeeded, tally.failed
                )?;
            }
        }

        for failure in &report.submission_failures {
            writeln!(
                f,
                "rejected {} for {}: {}",
                failure.document, failure.printer, failure.result
            )?;
        }
        Ok(())
    }
}
