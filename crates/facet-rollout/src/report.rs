//! Structured run reports
//!
//! Every run yields a [`RolloutReport`], including runs that fail before the
//! first router call. A failed batch is reported with the exact call
//! arguments so it can be inspected or resubmitted by hand.

use crate::batch::{RolloutPlan, RouteBatch};
use crate::errors::{ErrorClass, RolloutError};
use crate::phase::RolloutPhase;
use chrono::{DateTime, Utc};
use facet_manifest::{Address, Hash32, Selector};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Final outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every batch applied and the root activated (or simulated in dry-run)
    Succeeded,
    /// Empty manifest, nothing to do
    NoOp,
    /// Stopped early or post-verification disagreed
    Failed,
}

/// Outcome of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Router confirmed the batch
    Applied,
    /// Retry budget exhausted or reverted
    Failed,
    /// Planned only
    DryRun,
    /// Run stopped before reaching the batch
    NotAttempted,
}

/// Per-batch record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Zero-based batch index
    pub index: usize,
    /// Routes in the batch
    pub size: usize,
    /// Selectors in submission order
    pub selectors: Vec<Selector>,
    /// Outcome
    pub status: BatchStatus,
    /// Submission attempts made
    pub attempts: u32,
    /// Gas consumed by the confirming transaction
    pub gas_used: u64,
    /// Confirming transaction
    pub tx_hash: Option<Hash32>,
    /// Messages of failed attempts
    pub errors: Vec<String>,
    /// Wall time spent on the batch
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// Record for a batch that has not been submitted
    pub fn pending(batch: &RouteBatch, status: BatchStatus) -> Self {
        Self {
            index: batch.index,
            size: batch.len(),
            selectors: batch.selectors.clone(),
            status,
            attempts: 0,
            gas_used: 0,
            tx_hash: None,
            errors: Vec::new(),
            elapsed_ms: 0,
        }
    }
}

/// Result of reading back one sampled route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    /// Router serves the expected facet
    Match,
    /// Router serves a different facet
    Mismatch,
    /// Not read back (dry-run)
    NotChecked,
    /// Read failed
    LookupFailed,
}

/// Post-application sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCheck {
    /// Sampled selector
    pub selector: Selector,
    /// Facet from the manifest
    pub expected: Address,
    /// Facet reported by the router
    pub found: Option<Address>,
    /// Outcome
    pub status: SampleStatus,
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Error class
    pub class: ErrorClass,
    /// Human-readable message
    pub message: String,
    /// Full arguments of the failing batch, for transaction failures
    pub batch: Option<RouteBatch>,
}

impl FailureDetail {
    /// Describe `error`, attaching `batch` when given
    pub fn from_error(error: &RolloutError, batch: Option<RouteBatch>) -> Self {
        Self {
            class: error.class(),
            message: error.to_string(),
            batch,
        }
    }
}

/// Structured record of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Whether state-changing calls were suppressed
    pub dry_run: bool,
    /// Outcome
    pub status: RunStatus,
    /// Last phase reached
    pub phase: RolloutPhase,
    /// Root of the manifest, when it was readable
    pub merkle_root: Option<Hash32>,
    /// Epoch committed by this run
    pub epoch: Option<u64>,
    /// Routes in the manifest
    pub total_routes: usize,
    /// Routes in confirmed batches
    pub applied_routes: usize,
    /// Routes in the failed batch
    pub failed_routes: usize,
    /// Routes never submitted
    pub pending_routes: usize,
    /// Batches planned
    pub total_batches: usize,
    /// Batches confirmed
    pub applied_batches: usize,
    /// Retries across all state-changing calls
    pub retries: u32,
    /// State-changing calls issued, retries included
    pub state_changing_calls: u32,
    /// Gas consumed by confirmed transactions
    pub gas_used: u64,
    /// Wall time of the run
    pub elapsed_ms: u64,
    /// Per-batch records
    pub batches: Vec<BatchReport>,
    /// Post-application samples
    pub samples: Vec<SampleCheck>,
    /// Non-fatal observations
    pub warnings: Vec<String>,
    /// Failure description, for failed runs
    pub failure: Option<FailureDetail>,
}

impl RolloutReport {
    /// Whether the run reached its goal
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded | RunStatus::NoOp)
    }

    /// Render as pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Accumulates a report while a run progresses
#[derive(Debug)]
pub struct ReportRecorder {
    report: RolloutReport,
    started: Instant,
}

impl ReportRecorder {
    /// Start recording
    pub fn start(dry_run: bool, epoch: Option<u64>) -> Self {
        Self {
            report: RolloutReport {
                run_id: Uuid::new_v4(),
                started_at: Utc::now(),
                dry_run,
                status: RunStatus::Failed,
                phase: RolloutPhase::NoPending,
                merkle_root: None,
                epoch,
                total_routes: 0,
                applied_routes: 0,
                failed_routes: 0,
                pending_routes: 0,
                total_batches: 0,
                applied_batches: 0,
                retries: 0,
                state_changing_calls: 0,
                gas_used: 0,
                elapsed_ms: 0,
                batches: Vec::new(),
                samples: Vec::new(),
                warnings: Vec::new(),
                failure: None,
            },
            started: Instant::now(),
        }
    }

    /// Run identifier
    pub fn run_id(&self) -> Uuid {
        self.report.run_id
    }

    /// Report in progress
    pub fn report(&self) -> &RolloutReport {
        &self.report
    }

    /// Record the manifest root and route count
    pub fn set_manifest(&mut self, root: Hash32, total_routes: usize) {
        self.report.merkle_root = Some(root);
        self.report.total_routes = total_routes;
        self.report.pending_routes = total_routes;
    }

    /// Seed per-batch records from the plan
    pub fn set_plan(&mut self, plan: &RolloutPlan) {
        let status = if plan.dry_run {
            BatchStatus::DryRun
        } else {
            BatchStatus::NotAttempted
        };
        self.report.total_batches = plan.batches.len();
        self.report.batches = plan
            .batches
            .iter()
            .map(|batch| BatchReport::pending(batch, status))
            .collect();
    }

    /// Record the phase reached
    pub fn set_phase(&mut self, phase: RolloutPhase) {
        self.report.phase = phase;
    }

    /// Record a non-fatal observation
    pub fn warn(&mut self, warning: impl Into<String>) {
        self.report.warnings.push(warning.into());
    }

    /// Account for a retried state-changing call
    pub fn record_call(&mut self, attempts: u32, gas_used: u64) {
        self.report.state_changing_calls += attempts;
        self.report.retries += attempts.saturating_sub(1);
        self.report.gas_used += gas_used;
    }

    /// Record a confirmed batch
    pub fn batch_applied(
        &mut self,
        index: usize,
        attempts: u32,
        tx_hash: Hash32,
        gas_used: u64,
        errors: Vec<String>,
        elapsed: Duration,
    ) {
        self.record_call(attempts, gas_used);
        if let Some(entry) = self.report.batches.get_mut(index) {
            entry.status = BatchStatus::Applied;
            entry.attempts = attempts;
            entry.tx_hash = Some(tx_hash);
            entry.gas_used = gas_used;
            entry.errors = errors;
            entry.elapsed_ms = millis(elapsed);
            self.report.applied_routes += entry.size;
            self.report.pending_routes = self.report.pending_routes.saturating_sub(entry.size);
        }
        self.report.applied_batches += 1;
    }

    /// Record a batch that exhausted its budget or reverted
    pub fn batch_failed(
        &mut self,
        index: usize,
        attempts: u32,
        errors: Vec<String>,
        elapsed: Duration,
    ) {
        self.record_call(attempts, 0);
        if let Some(entry) = self.report.batches.get_mut(index) {
            entry.status = BatchStatus::Failed;
            entry.attempts = attempts;
            entry.errors = errors;
            entry.elapsed_ms = millis(elapsed);
            self.report.failed_routes += entry.size;
            self.report.pending_routes = self.report.pending_routes.saturating_sub(entry.size);
        }
    }

    /// Record a post-application sample
    pub fn sample(&mut self, check: SampleCheck) {
        self.report.samples.push(check);
    }

    /// Close a successful or no-op run
    pub fn finish(mut self, status: RunStatus) -> RolloutReport {
        self.report.status = status;
        self.report.elapsed_ms = millis(self.started.elapsed());
        self.report
    }

    /// Close a failed run
    pub fn fail(mut self, error: &RolloutError, batch: Option<RouteBatch>) -> RolloutReport {
        self.report.failure = Some(FailureDetail::from_error(error, batch));
        self.finish(RunStatus::Failed)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
