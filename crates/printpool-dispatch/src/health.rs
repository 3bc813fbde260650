// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer availability tracking with a circuit breaker.
//
// If a printer keeps failing, stop sending it jobs that will only fail again.
// Jobs for a tripped printer resolve to NOT_AVAILABLE straight away.  Once the
// cooldown runs out a single probe job is let through; its outcome decides
// whether the printer is back.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation. Jobs go to the device.
    Closed,
    /// Too many failures. Jobs are short-circuited. Cooldown timer running.
    Open,
    /// Cooldown expired. One probe job is in flight.
    HalfOpen,
}

/// Health record for a single printer.
#[derive(Debug, Clone)]
struct PrinterHealth {
    state: CircuitState,
    consecutive_failures: u32,
    /// When the circuit was opened (for cooldown calculation).
    opened_at: Option<Instant>,
}

impl Default for PrinterHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Health tracking for every printer that has received a job.
#[derive(Debug)]
pub struct HealthTracker {
    printers: HashMap<String, PrinterHealth>,
    /// Failures before the circuit opens.
    failure_threshold: u32,
    base_cooldown: Duration,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(30))
    }
}

impl HealthTracker {
    pub fn new(failure_threshold: u32, base_cooldown: Duration) -> Self {
        Self {
            printers: HashMap::new(),
            failure_threshold: failure_threshold.max(1),
            base_cooldown,
        }
    }

    /// Whether a job for `printer` should reach the device.
    ///
    /// Moves an open circuit to half-open once its cooldown has passed.
    pub fn allow_request(&mut self, printer: &str) -> bool {
        let base = self.base_cooldown;
        let health = self.printers.entry(printer.to_owned()).or_default();

        match health.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let Some(opened_at) = health.opened_at else {
                    health.state = CircuitState::Closed;
                    return true;
                };
                let cooldown = cooldown_duration(base, health.consecutive_failures);
                if opened_at.elapsed() >= cooldown {
                    info!(printer, "circuit half-open, letting a probe job through");
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    debug!(
                        printer,
                        remaining_ms = (cooldown - opened_at.elapsed()).as_millis(),
                        "circuit open, short-circuiting job"
                    );
                    false
                }
            }
            // The probe is still out.
            CircuitState::HalfOpen => false,
        }
    }

    pub fn record_success(&mut self, printer: &str) {
        let health = self.printers.entry(printer.to_owned()).or_default();
        if health.state != CircuitState::Closed {
            info!(printer, prev_state = ?health.state, "printer recovered, closing circuit");
        }
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
        health.opened_at = None;
    }

    /// Count a failure against `printer` and return its current streak.
    pub fn record_failure(&mut self, printer: &str) -> u32 {
        let threshold = self.failure_threshold;
        let health = self.printers.entry(printer.to_owned()).or_default();
        health.consecutive_failures += 1;

        if health.state == CircuitState::HalfOpen {
            warn!(printer, "probe failed, reopening circuit");
            health.state = CircuitState::Open;
            health.opened_at = Some(Instant::now());
        } else if health.consecutive_failures >= threshold && health.state == CircuitState::Closed
        {
            warn!(
                printer,
                failures = health.consecutive_failures,
                "marking printer unavailable"
            );
            health.state = CircuitState::Open;
            health.opened_at = Some(Instant::now());
        }
        health.consecutive_failures
    }

    /// Circuit state for `printer`; untracked printers are closed.
    pub fn state(&self, printer: &str) -> CircuitState {
        self.printers
            .get(printer)
            .map(|h| h.state)
            .unwrap_or(CircuitState::Closed)
    }
}

/// Cooldown grows with the failure streak: base, 4x base from 5 failures,
/// 10x base from 10 failures.
fn cooldown_duration(base: Duration, failures: u32) -> Duration {
    if failures >= 10 {
        base * 10
    } else if failures >= 5 {
        base * 4
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_printer_allows_jobs() {
        let mut tracker = HealthTracker::default();
        assert!(tracker.allow_request("printer_0"));
        assert_eq!(tracker.state("printer_0"), CircuitState::Closed);
    }

    #[test]
    fn circuit_opens_after_threshold() {
        let mut tracker = HealthTracker::default();
        tracker.record_failure("printer_0");
        tracker.record_failure("printer_0");
        assert!(tracker.allow_request("printer_0"));

        tracker.record_failure("printer_0");
        assert!(!tracker.allow_request("printer_0"));
        assert_eq!(tracker.state("printer_0"), CircuitState::Open);
    }

    #[test]
    fn success_resets_the_streak() {
        let mut tracker = HealthTracker::default();
        tracker.record_failure("printer_0");
        assert_eq!(tracker.record_failure("printer_0"), 2);
        tracker.record_success("printer_0");
        assert_eq!(tracker.record_failure("printer_0"), 1);
        assert!(tracker.allow_request("printer_0"));
    }

    #[test]
    fn probe_after_cooldown_then_recovery() {
        let mut tracker = HealthTracker::new(1, Duration::ZERO);
        tracker.record_failure("printer_0");
        assert_eq!(tracker.state("printer_0"), CircuitState::Open);

        // Zero cooldown: the next job is the probe, the one after waits.
        assert!(tracker.allow_request("printer_0"));
        assert_eq!(tracker.state("printer_0"), CircuitState::HalfOpen);
        assert!(!tracker.allow_request("printer_0"));

        tracker.record_success("printer_0");
        assert_eq!(tracker.state("printer_0"), CircuitState::Closed);
        assert!(tracker.allow_request("printer_0"));
    }

    #[test]
    fn failed_probe_reopens() {
        let mut tracker = HealthTracker::new(1, Duration::ZERO);
        tracker.record_failure("printer_0");
        assert!(tracker.allow_request("printer_0"));
        tracker.record_failure("printer_0");
        assert_eq!(tracker.state("printer_0"), CircuitState::Open);
    }

    #[test]
    fn printers_are_tracked_independently() {
        let mut tracker = HealthTracker::new(1, Duration::from_secs(60));
        tracker.record_failure("printer_0");
        assert!(!tracker.allow_request("printer_0"));
        assert!(tracker.allow_request("printer_1"));
    }

    #[test]
    fn cooldown_grows_with_failures() {
        let base = Duration::from_secs(30);
        assert_eq!(cooldown_duration(base, 3), base);
        assert_eq!(cooldown_duration(base, 5), base * 4);
        assert_eq!(cooldown_duration(base, 12), base * 10);
    }
}
