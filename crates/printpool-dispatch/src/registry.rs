// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry: printer name to queue.
//
// The printer set is fixed before dispatch starts.  After construction the
// registry is only ever read, so it is shared as `Arc<PrinterRegistry>` and
// lookups take no lock.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use printpool_core::error::{PrintpoolError, Result};

use crate::queue::PrinterQueue;

/// Owns one `PrinterQueue` per registered printer.
#[derive(Debug, Default)]
pub struct PrinterRegistry {
    /// Queues in registration order.
    queues: Vec<Arc<PrinterQueue>>,
    /// Printer name to index into `queues`.
    index: HashMap<String, usize>,
}

impl PrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with one queue of `capacity` per name.
    pub fn with_printers<I, S>(names: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(name, capacity)?;
        }
        info!(printers = registry.len(), capacity, "printer registry ready");
        Ok(registry)
    }

    /// Add a printer. Names must be unique.
    pub fn register(&mut self, name: impl Into<String>, capacity: usize) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(PrintpoolError::DuplicatePrinter(name));
        }
        debug!(printer = %name, capacity, "printer registered");
        self.index.insert(name.clone(), self.queues.len());
        self.queues.push(Arc::new(PrinterQueue::new(name, capacity)));
        Ok(())
    }

    /// The queue for `printer_id`.
    pub fn queue_for(&self, printer_id: &str) -> Result<Arc<PrinterQueue>> {
        self.index
            .get(printer_id)
            .map(|&i| Arc::clone(&self.queues[i]))
            .ok_or_else(|| PrintpoolError::PrinterNotFound(printer_id.to_owned()))
    }

    /// Jobs currently waiting for `printer_id`.
    pub fn queue_depth(&self, printer_id: &str) -> Result<usize> {
        self.queue_for(printer_id).map(|q| q.depth())
    }

    /// Printer names in registration order.
    pub fn all_printer_ids(&self) -> Vec<String> {
        self.queues.iter().map(|q| q.name().to_owned()).collect()
    }

    /// Queues in registration order.
    pub fn queues(&self) -> &[Arc<PrinterQueue>] {
        &self.queues
    }

    /// Jobs waiting across every printer.
    pub fn total_depth(&self) -> usize {
        self.queues.iter().map(|q| q.depth()).sum()
    }

    pub fn close_all(&self) {
        for queue in &self.queues {
            queue.close();
        }
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printpool_core::types::{PrintJob, Token};

    fn registry() -> PrinterRegistry {
        PrinterRegistry::with_printers((0..5).map(|i| format!("printer_{i}")), 10)
            .expect("unique names")
    }

    #[test]
    fn ids_keep_registration_order() {
        let reg = registry();
        assert_eq!(
            reg.all_printer_ids(),
            vec!["printer_0", "printer_1", "printer_2", "printer_3", "printer_4"]
        );
    }

    #[test]
    fn lookup_of_unknown_printer_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.queue_for("ghost"),
            Err(PrintpoolError::PrinterNotFound(name)) if name == "ghost"
        ));
        assert!(matches!(
            reg.queue_depth("ghost"),
            Err(PrintpoolError::PrinterNotFound(_))
        ));
    }

    #[test]
    fn depth_tracks_the_right_queue() {
        let reg = registry();
        let queue = reg.queue_for("printer_2").unwrap();
        queue
            .try_enqueue(PrintJob::new("printer_2", "job_0", Token::new()))
            .unwrap();

        assert_eq!(reg.queue_depth("printer_2").unwrap(), 1);
        assert_eq!(reg.queue_depth("printer_0").unwrap(), 0);
        assert_eq!(reg.total_depth(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = PrinterRegistry::with_printers(["printer_0", "printer_0"], 10);
        assert!(matches!(result, Err(PrintpoolError::DuplicatePrinter(_))));
    }

    #[test]
    fn close_all_closes_every_queue() {
        let reg = registry();
        reg.close_all();
        assert!(reg.queues().iter().all(|q| q.is_closed()));
    }
}
