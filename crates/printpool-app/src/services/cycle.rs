// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Builds the users, printers, and jobs for one run and hands them to the
// coordinator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use printpool_auth::{AuthSession, UserDirectory};
use printpool_core::config::PoolConfig;
use printpool_core::error::{PrintpoolError, Result};
use printpool_core::types::User;
use printpool_dispatch::{Coordinator, DispatchReport, PrintRequest, PrinterRegistry, SimulatedPrinter};

use crate::cli::Cli;

/// Load pool settings from `path`, or use the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PoolConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            PoolConfig::load(path)
        }
        None => Ok(PoolConfig::default()),
    }
}

/// `user_0` / `password_0`, `user_1` / `password_1`, ...
pub fn build_users(count: usize) -> Vec<User> {
    (0..count)
        .map(|i| User::new(format!("user_{i}"), format!("password_{i}")))
        .collect()
}

pub fn printer_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("printer_{i}")).collect()
}

/// Job `k` goes to printer `k mod printers`, so a single job per user spreads
/// the users over the printers one to one.
pub fn build_requests(users: &[User], printers: &[String], jobs_per_user: usize) -> Vec<PrintRequest> {
    if printers.is_empty() {
        return Vec::new();
    }
    let mut requests = Vec::with_capacity(users.len() * jobs_per_user);
    for (i, user) in users.iter().enumerate() {
        for j in 0..jobs_per_user {
            let k = i * jobs_per_user + j;
            requests.push(PrintRequest::new(
                user.clone(),
                printers[k % printers.len()].clone(),
                format!("job_{k}"),
            ));
        }
    }
    requests
}

/// Run one complete dispatch cycle as described by `cli`.
pub async fn run_cycle(cli: &Cli) -> Result<DispatchReport> {
    let config = cli.apply(load_config(cli.config.as_deref())?);
    config.validate()?;
    if cli.printers == 0 {
        return Err(PrintpoolError::Config("at least one printer is required".into()));
    }

    let users = build_users(cli.users);
    let printers = printer_names(cli.printers);

    let directory = UserDirectory::from_users(&users);
    let auth = Arc::new(AuthSession::new(Arc::new(directory), config.token_ttl()));
    let registry = Arc::new(PrinterRegistry::with_printers(
        printers.iter().cloned(),
        config.queue_capacity,
    )?);

    let mut device = SimulatedPrinter::new(Duration::from_millis(cli.latency_ms));
    for name in &cli.offline {
        device = device.with_offline(name.clone());
    }
    for name in &cli.faulty {
        device = device.with_faulty(name.clone());
    }

    let requests = build_requests(&users, &printers, cli.jobs_per_user);
    info!(
        users = users.len(),
        printers = printers.len(),
        jobs = requests.len(),
        workers = config.workers,
        "starting dispatch cycle"
    );

    Coordinator::new(config, auth, registry, Arc::new(device))
        .run(requests)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn one_job_per_user_maps_users_to_printers() {
        let users = build_users(5);
        let printers = printer_names(5);
        let requests = build_requests(&users, &printers, 1);

        assert_eq!(requests.len(), 5);
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(request.user.name, format!("user_{i}"));
            assert_eq!(request.printer, format!("printer_{i}"));
            assert_eq!(request.document, format!("job_{i}"));
        }
    }

    #[test]
    fn more_jobs_than_printers_wrap_around() {
        let users = build_users(2);
        let printers = printer_names(3);
        let requests = build_requests(&users, &printers, 2);
        let targets: Vec<_> = requests.iter().map(|r| r.printer.as_str()).collect();
        assert_eq!(targets, vec!["printer_0", "printer_1", "printer_2", "printer_0"]);
    }

    #[test]
    fn config_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 3, "queue_capacity": 4}}"#).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, 4);
    }

    #[test]
    fn invalid_config_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 0}}"#).unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(PrintpoolError::Config(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn default_cycle_succeeds() {
        let cli = Cli::parse_from(["printpool", "--latency-ms", "1"]);
        let report = run_cycle(&cli).await.unwrap();
        assert_eq!(report.total(), 5);
        assert_eq!(report.succeeded(), 5);
    }

    #[tokio::test]
    async fn zero_printers_is_rejected() {
        let cli = Cli::parse_from(["printpool", "--printers", "0"]);
        assert!(matches!(
            run_cycle(&cli).await,
            Err(PrintpoolError::Config(_))
        ));
    }
}
