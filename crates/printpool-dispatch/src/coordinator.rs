// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One end-to-end dispatch cycle.
//
// The coordinator owns the session table, the printer registry, and the print
// device for the run.  `run` logs every user in (concurrently), submits their
// jobs, waits for the workers to finish, logs everyone out again, and hands
// back a report with exactly one entry per request.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use printpool_auth::AuthSession;
use printpool_core::config::{PoolConfig, SubmitMode};
use printpool_core::error::Result;
use printpool_core::types::{JobId, JobSettings, PrintJob, PrinterResult, Token, User, UserId};

use crate::device::PrintDevice;
use crate::pool::{JobOutcome, WorkerPool};
use crate::registry::PrinterRegistry;

/// A user's request to print one document.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub user: User,
    pub printer: String,
    pub document: String,
    pub settings: JobSettings,
}

impl PrintRequest {
    pub fn new(user: User, printer: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            user,
            printer: printer.into(),
            document: document.into(),
            settings: JobSettings::new(),
        }
    }
}

/// A request that never reached a printer queue.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionFailure {
    pub job_id: JobId,
    pub printer: String,
    pub document: String,
    /// `None` when the user could not log in.
    pub token: Option<Token>,
    pub result: PrinterResult,
}

/// Per-printer tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrinterSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Everything recorded during one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<JobOutcome>,
    pub submission_failures: Vec<SubmissionFailure>,
}

impl DispatchReport {
    /// Requests accounted for (processed or rejected).
    pub fn total(&self) -> usize {
        self.outcomes.len() + self.submission_failures.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Requests whose result carries `flag`.
    pub fn count(&self, flag: PrinterResult) -> usize {
        let processed = self.outcomes.iter().filter(|o| o.result.contains(flag));
        let rejected = self
            .submission_failures
            .iter()
            .filter(|f| f.result.contains(flag));
        processed.count() + rejected.count()
    }

    /// Tally by printer, covering processed jobs only.
    pub fn by_printer(&self) -> BTreeMap<String, PrinterSummary> {
        let mut summary: BTreeMap<String, PrinterSummary> = BTreeMap::new();
        for outcome in &self.outcomes {
            let entry = summary.entry(outcome.printer.clone()).or_default();
            if outcome.result.is_success() {
                entry.succeeded += 1;
            } else {
                entry.failed += 1;
            }
        }
        summary
    }

    /// True when jobs were processed and every printer that received one
    /// produced nothing but `ERR_GENERAL`.
    pub fn all_printers_errored(&self) -> bool {
        if self.outcomes.is_empty() {
            return false;
        }
        let mut errored: HashMap<&str, bool> = HashMap::new();
        for outcome in &self.outcomes {
            let only_errors = outcome.result == PrinterResult::ERR_GENERAL;
            errored
                .entry(outcome.printer.as_str())
                .and_modify(|all| *all &= only_errors)
                .or_insert(only_errors);
        }
        errored.values().all(|all| *all)
    }
}

/// Runs a single dispatch cycle over injected components.
pub struct Coordinator {
    config: PoolConfig,
    auth: Arc<AuthSession>,
    registry: Arc<PrinterRegistry>,
    device: Arc<dyn PrintDevice>,
}

impl Coordinator {
    pub fn new(
        config: PoolConfig,
        auth: Arc<AuthSession>,
        registry: Arc<PrinterRegistry>,
        device: Arc<dyn PrintDevice>,
    ) -> Self {
        Self {
            config,
            auth,
            registry,
            device,
        }
    }

    /// Log in, submit, drain, log out. The registry's queues are closed
    /// afterwards, so a coordinator runs exactly once.
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub async fn run(self, requests: Vec<PrintRequest>) -> Result<DispatchReport> {
        let tokens = self.authenticate_all(&requests).await;

        let pool = WorkerPool::start(
            &self.config,
            Arc::clone(&self.registry),
            Arc::clone(&self.auth),
            Arc::clone(&self.device),
        )?;

        let mut submission_failures = Vec::new();
        for request in requests {
            let token = tokens.get(&request.user.id).copied();
            if let Some(failure) = self.submit(&pool, request, token).await {
                submission_failures.push(failure);
            }
        }

        pool.wait_idle().await;
        self.logout_all(&tokens);
        let outcomes = pool.shutdown().await;

        let report = DispatchReport {
            outcomes,
            submission_failures,
        };
        info!(
            total = report.total(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "dispatch cycle complete"
        );
        Ok(report)
    }

    /// Log every distinct user in on the blocking pool. Users whose login
    /// fails are left out of the returned map.
    async fn authenticate_all(&self, requests: &[PrintRequest]) -> HashMap<UserId, Token> {
        let mut users: HashMap<UserId, &User> = HashMap::new();
        for request in requests {
            users.entry(request.user.id).or_insert(&request.user);
        }

        let mut logins = JoinSet::new();
        for user in users.values() {
            let auth = Arc::clone(&self.auth);
            let (id, name, password) = (user.id, user.name.clone(), user.password.clone());
            logins.spawn_blocking(move || (id, name.clone(), auth.authenticate(&name, &password)));
        }

        let mut tokens = HashMap::new();
        while let Some(joined) = logins.join_next().await {
            match joined {
                Ok((id, _, Ok(token))) => {
                    tokens.insert(id, token);
                }
                Ok((_, name, Err(e))) => warn!(user = %name, error = %e, "login failed"),
                Err(e) => error!(error = %e, "login task ended abnormally"),
            }
        }
        debug!(logged_in = tokens.len(), users = users.len(), "authentication finished");
        tokens
    }

    async fn submit(
        &self,
        pool: &WorkerPool,
        request: PrintRequest,
        token: Option<Token>,
    ) -> Option<SubmissionFailure> {
        let Some(token) = token else {
            return Some(SubmissionFailure {
                job_id: JobId::new(),
                printer: request.printer,
                document: request.document,
                token: None,
                result: PrinterResult::NOT_AUTHORIZED,
            });
        };

        let mut job = PrintJob::new(request.printer, request.document, token);
        job.settings = request.settings;
        let (job_id, printer, document) = (job.id, job.printer.clone(), job.document.clone());

        let submitted = match self.config.submit_mode {
            SubmitMode::NonBlocking => pool.submit(job),
            SubmitMode::Wait => pool.submit_wait(job).await,
        };

        match submitted {
            Ok(()) => None,
            Err(e) => {
                warn!(%job_id, %printer, error = %e, "job rejected at submission");
                Some(SubmissionFailure {
                    job_id,
                    printer,
                    document,
                    token: Some(token),
                    result: e.as_result_flag(),
                })
            }
        }
    }

    fn logout_all(&self, tokens: &HashMap<UserId, Token>) {
        for (user_id, token) in tokens {
            if let Err(e) = self.auth.logout(*token, *user_id) {
                warn!(%user_id, error = %e, "logout failed");
            }
        }
    }
}
