// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printpool Dispatch: bounded per-printer queues, the printer registry, the
// worker pool that drains them, and the coordinator that runs one complete
// login → print → logout cycle.  Authorization comes from `printpool-auth`;
// the print operation itself sits behind the `PrintDevice` trait.

pub mod coordinator;
pub mod device;
pub mod health;
pub mod pool;
pub mod queue;
pub mod registry;

pub use coordinator::{Coordinator, DispatchReport, PrintRequest, SubmissionFailure};
pub use device::{PrintDevice, SimulatedPrinter};
pub use health::{CircuitState, HealthTracker};
pub use pool::{JobOutcome, WorkerPool};
pub use queue::PrinterQueue;
pub use registry::PrinterRegistry;
