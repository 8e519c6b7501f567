//! Route application engine
//!
//! Drives a validated manifest through the router:
//!
//! 1. validate the manifest (no router contact on failure)
//! 2. read router status and check preconditions
//! 3. ask for operator confirmation
//! 4. `commitRoot` when an epoch is given
//! 5. `applyRoutes` batch by batch, strictly in order, with retries
//! 6. `activateCommittedRoot`
//! 7. read back the first, middle and last route
//!
//! Every run produces a [`RolloutReport`]. Errors never escape `run`; they
//! end up in the report's failure detail alongside the phase reached.
//! Applied batches are never rolled back.

use crate::batch::{RolloutPlan, RouteBatch};
use crate::cancel::CancellationFlag;
use crate::config::RolloutConfig;
use crate::effects::{AutoConfirm, ConfirmationEffects, RouterEffects, RouterStatus, TxReceipt};
use crate::errors::{PreconditionError, RolloutError, RouterError};
use crate::phase::RolloutPhase;
use crate::report::{ReportRecorder, RolloutReport, RunStatus, SampleCheck, SampleStatus};
use crate::retry::{RetryPolicy, RetryResult};
use facet_manifest::{Hash32, Manifest, ManifestValidator, ValidatedManifest};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Error that stopped a run, with the batch it stopped on
struct Halt {
    error: RolloutError,
    batch: Option<RouteBatch>,
}

impl From<RolloutError> for Halt {
    fn from(error: RolloutError) -> Self {
        Self { error, batch: None }
    }
}

impl From<PreconditionError> for Halt {
    fn from(error: PreconditionError) -> Self {
        RolloutError::from(error).into()
    }
}

/// Applies route manifests to a router
pub struct RouteApplicationEngine<R: RouterEffects> {
    router: Arc<R>,
    config: RolloutConfig,
    confirmation: Arc<dyn ConfirmationEffects>,
    cancellation: CancellationFlag,
    validator: ManifestValidator,
}

impl<R: RouterEffects> RouteApplicationEngine<R> {
    /// Create an engine; fails if `config` is out of bounds
    pub fn new(router: Arc<R>, config: RolloutConfig) -> Result<Self, RolloutError> {
        config.validate()?;
        Ok(Self {
            router,
            config,
            confirmation: Arc::new(AutoConfirm),
            cancellation: CancellationFlag::new(),
            validator: ManifestValidator::new(),
        })
    }

    /// Ask `confirmation` before the first state-changing call
    pub fn with_confirmation(mut self, confirmation: Arc<dyn ConfirmationEffects>) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Observe `flag` between batches
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Use `validator` for manifests passed to [`Self::run`]
    pub fn with_validator(mut self, validator: ManifestValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Handle for cancelling runs of this engine
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Active configuration
    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    /// Router handle
    pub fn router(&self) -> &Arc<R> {
        &self.router
    }

    /// Validate `manifest`, then commit it under `epoch` (when given) and apply it.
    ///
    /// With `epoch = None` the root must already be pending on the router.
    pub async fn run(&self, manifest: &Manifest, epoch: Option<u64>) -> RolloutReport {
        let mut recorder = ReportRecorder::start(self.config.dry_run, epoch);
        match self.validator.validate(manifest) {
            Ok(validated) => self.execute(recorder, &validated, epoch).await,
            Err(err) => {
                let err = RolloutError::from(err);
                error!(
                    run_id = %recorder.run_id(),
                    root = %manifest.merkle_root,
                    error = %err,
                    "Manifest rejected before any router call"
                );
                recorder.warn("no router calls were made");
                recorder.fail(&err, None)
            }
        }
    }

    /// Apply `manifest` against a root committed beforehand
    pub async fn apply(&self, manifest: &Manifest) -> RolloutReport {
        self.run(manifest, None).await
    }

    /// Like [`Self::run`] for a manifest that is already validated
    pub async fn run_validated(
        &self,
        manifest: &ValidatedManifest,
        epoch: Option<u64>,
    ) -> RolloutReport {
        let recorder = ReportRecorder::start(self.config.dry_run, epoch);
        self.execute(recorder, manifest, epoch).await
    }

    /// Commit `manifest`'s root under `epoch`.
    ///
    /// Once the commit lands, the router must report the root and `epoch` as
    /// pending. Returns `None` in dry-run, where only the checks are performed.
    #[instrument(skip_all, fields(root = %manifest.root(), epoch = epoch))]
    pub async fn commit(
        &self,
        manifest: &ValidatedManifest,
        epoch: u64,
    ) -> Result<Option<TxReceipt>, RolloutError> {
        let status = self.read_status().await?;
        check_commit(&status, epoch)?;
        if self.config.dry_run {
            info!("Dry run: commitRoot not sent");
            return Ok(None);
        }
        let root = manifest.root();
        let receipt = self.submit_commit(root, epoch).await.into_result()?;
        self.confirm_committed(root, epoch).await?;
        Ok(Some(receipt))
    }

    /// Read-only check that `root` is pending and the router accepts routes
    pub async fn check_preconditions(&self, root: Hash32) -> Result<RouterStatus, RolloutError> {
        let status = self.read_status().await?;
        check_pending(&status, root)?;
        Ok(status)
    }

    async fn execute(
        &self,
        mut recorder: ReportRecorder,
        manifest: &ValidatedManifest,
        epoch: Option<u64>,
    ) -> RolloutReport {
        let limit = self.config.run_timeout();
        let run = self.drive(&mut recorder, manifest, epoch);
        let outcome = tokio::time::timeout(limit, run).await;

        let report = match outcome {
            Ok(Ok(status)) => recorder.finish(status),
            Ok(Err(halt)) => {
                error!(run_id = %recorder.run_id(), error = %halt.error, "Rollout failed");
                recorder.fail(&halt.error, halt.batch)
            }
            Err(_) => {
                let err = RolloutError::DeadlineExceeded { limit };
                error!(run_id = %recorder.run_id(), error = %err, "Rollout stopped");
                recorder.fail(&err, None)
            }
        };

        info!(
            run_id = %report.run_id,
            status = ?report.status,
            phase = report.phase.name(),
            applied_routes = report.applied_routes,
            failed_routes = report.failed_routes,
            retries = report.retries,
            gas_used = report.gas_used,
            elapsed_ms = report.elapsed_ms,
            "Rollout finished"
        );
        report
    }

    #[instrument(
        skip_all,
        fields(run_id = %recorder.run_id(), root = %manifest.root(), epoch = ?epoch)
    )]
    async fn drive(
        &self,
        recorder: &mut ReportRecorder,
        manifest: &ValidatedManifest,
        epoch: Option<u64>,
    ) -> Result<RunStatus, Halt> {
        let root = manifest.root();
        recorder.set_manifest(root, manifest.len());
        for warning in manifest.warnings() {
            warn!(%warning, "Manifest validated with reduced confidence");
            recorder.warn(warning.to_string());
        }

        if manifest.is_empty() {
            info!("Manifest has no routes; nothing to apply");
            return Ok(RunStatus::NoOp);
        }

        let config = &self.config;
        let plan = RolloutPlan::new(manifest, epoch, config.batch_size, config.dry_run);
        recorder.set_plan(&plan);
        info!(
            routes = plan.total_routes,
            batches = plan.batches.len(),
            batch_size = config.batch_size,
            dry_run = config.dry_run,
            "Rollout planned"
        );

        let status = self.read_status().await?;
        match epoch {
            Some(epoch) => check_commit(&status, epoch)?,
            None => check_pending(&status, root)?,
        }

        if !config.dry_run && !config.force_skip_confirmation {
            if !self.confirmation.confirm(&plan).await {
                return Err(RolloutError::ConfirmationDeclined.into());
            }
            debug!("Operator confirmed rollout");
        }

        let mut phase = match epoch {
            Some(epoch) => {
                self.commit_for_run(recorder, root, epoch).await?;
                RolloutPhase::NoPending.commit(root, Some(epoch))?
            }
            None => RolloutPhase::NoPending.commit(root, Some(status.pending_epoch))?,
        };
        recorder.set_phase(phase);

        phase = phase.begin_applying()?;
        recorder.set_phase(phase);

        for batch in &plan.batches {
            if self.cancellation.is_cancelled() {
                warn!(
                    batch = batch.index,
                    "Cancellation requested; no further batches submitted"
                );
                return Err(RolloutError::Cancelled {
                    applied_batches: phase.applied_batches(),
                }
                .into());
            }
            self.apply_batch(recorder, batch).await?;
            phase = phase.batch_applied()?;
            recorder.set_phase(phase);
        }

        if self.cancellation.is_cancelled() {
            warn!("Cancellation requested; root not activated");
            return Err(RolloutError::Cancelled {
                applied_batches: phase.applied_batches(),
            }
            .into());
        }

        if config.dry_run {
            info!("Dry run: activateCommittedRoot not sent");
        } else {
            let outcome = self
                .policy()
                .execute_with_context(|| self.router.activate_committed_root())
                .await;
            let attempts = outcome.attempts;
            match outcome.into_result() {
                Ok(receipt) => {
                    recorder.record_call(attempts, receipt.gas_used);
                    info!(tx = %receipt.tx_hash, "Root activated");
                }
                Err(source) => {
                    recorder.record_call(attempts, 0);
                    return Err(RolloutError::Router {
                        call: "activate_committed_root",
                        source,
                    }
                    .into());
                }
            }
        }
        phase = phase.activate()?;
        recorder.set_phase(phase);

        self.verify_samples(recorder, manifest).await?;
        Ok(RunStatus::Succeeded)
    }

    async fn commit_for_run(
        &self,
        recorder: &mut ReportRecorder,
        root: Hash32,
        epoch: u64,
    ) -> Result<(), Halt> {
        if self.config.dry_run {
            info!(epoch, "Dry run: commitRoot not sent");
            return Ok(());
        }

        let outcome = self.submit_commit(root, epoch).await;
        let gas_used = outcome.result.as_ref().map_or(0, |r| r.gas_used);
        recorder.record_call(outcome.attempts, gas_used);
        outcome.into_result()?;
        self.confirm_committed(root, epoch).await?;
        Ok(())
    }

    /// `commitRoot` under the retry policy
    async fn submit_commit(
        &self,
        root: Hash32,
        epoch: u64,
    ) -> RetryResult<TxReceipt, RolloutError> {
        let outcome = self
            .policy()
            .execute_with_context(|| self.router.commit_root(root, epoch))
            .await;
        let attempts = outcome.attempts;
        match &outcome.result {
            Ok(receipt) => {
                info!(epoch, attempts, tx = %receipt.tx_hash, "Root committed");
            }
            Err(err) => {
                error!(epoch, attempts, error = %err, "commitRoot failed");
            }
        }
        outcome.map_err(|source| RolloutError::Router {
            call: "commit_root",
            source,
        })
    }

    /// The router must now report `root` pending under `epoch`
    async fn confirm_committed(&self, root: Hash32, epoch: u64) -> Result<(), RolloutError> {
        let status = self.read_status().await?;
        check_pending(&status, root)?;
        if status.pending_epoch != epoch {
            return Err(PreconditionError::PendingEpochMismatch {
                expected: epoch,
                found: status.pending_epoch,
            }
            .into());
        }
        Ok(())
    }

    async fn apply_batch(
        &self,
        recorder: &mut ReportRecorder,
        batch: &RouteBatch,
    ) -> Result<(), Halt> {
        if self.config.dry_run {
            debug!(
                batch = batch.index,
                size = batch.len(),
                "Dry run: applyRoutes not sent"
            );
            return Ok(());
        }

        let started = Instant::now();
        let outcome = self
            .policy()
            .execute_with_context(|| {
                self.router.apply_routes(
                    &batch.selectors,
                    &batch.facets,
                    &batch.codehashes,
                    &batch.proofs,
                    &batch.is_right,
                )
            })
            .await;
        let attempts = outcome.attempts;
        let mut errors = outcome.failures;

        match outcome.result {
            Ok(receipt) => {
                info!(
                    batch = batch.index,
                    size = batch.len(),
                    attempts,
                    gas_used = receipt.gas_used,
                    tx = %receipt.tx_hash,
                    "Batch applied"
                );
                recorder.batch_applied(
                    batch.index,
                    attempts,
                    receipt.tx_hash,
                    receipt.gas_used,
                    errors,
                    started.elapsed(),
                );
                Ok(())
            }
            Err(source) => {
                error!(
                    batch = batch.index,
                    size = batch.len(),
                    attempts,
                    error = %source,
                    "Batch failed; earlier batches remain applied"
                );
                errors.push(source.to_string());
                recorder.batch_failed(batch.index, attempts, errors, started.elapsed());
                Err(Halt {
                    error: RolloutError::BatchFailed {
                        batch: batch.index,
                        attempts,
                        source,
                    },
                    batch: Some(batch.clone()),
                })
            }
        }
    }

    async fn verify_samples(
        &self,
        recorder: &mut ReportRecorder,
        manifest: &ValidatedManifest,
    ) -> Result<(), Halt> {
        let mut mismatches = 0;
        for index in sample_indices(manifest.len()) {
            let route = &manifest.routes()[index].route;
            let mut check = SampleCheck {
                selector: route.selector,
                expected: route.facet,
                found: None,
                status: SampleStatus::NotChecked,
            };

            if !self.config.dry_run {
                let selector = route.selector;
                let outcome = self
                    .policy()
                    .execute_with_context(|| self.router.routes(selector))
                    .await;
                match outcome.into_result() {
                    Ok(found) if found == route.facet => {
                        check.found = Some(found);
                        check.status = SampleStatus::Match;
                    }
                    Ok(found) => {
                        warn!(
                            selector = %selector,
                            expected = %route.facet,
                            found = %found,
                            "Sampled route disagrees with manifest"
                        );
                        check.found = Some(found);
                        check.status = SampleStatus::Mismatch;
                        recorder.warn(format!(
                            "route {selector} points to {found}, manifest expects {}",
                            route.facet
                        ));
                        mismatches += 1;
                    }
                    Err(err) => {
                        warn!(
                            selector = %selector,
                            error = %err,
                            "Sampled route could not be read"
                        );
                        check.status = SampleStatus::LookupFailed;
                        recorder.warn(format!("route {selector} could not be read back: {err}"));
                        mismatches += 1;
                    }
                }
            }
            recorder.sample(check);
        }

        if mismatches > 0 {
            return Err(RolloutError::PostVerification { mismatches }.into());
        }
        Ok(())
    }

    async fn read_status(&self) -> Result<RouterStatus, RolloutError> {
        let router = self.router.as_ref();
        self.policy()
            .execute_with_context(|| RouterStatus::read(router))
            .await
            .into_result()
            .map_err(|source: RouterError| RolloutError::Router {
                call: "status",
                source,
            })
    }

    fn policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }
}

/// Router must accept a commit for `epoch`
fn check_commit(status: &RouterStatus, epoch: u64) -> Result<(), PreconditionError> {
    if status.frozen {
        return Err(PreconditionError::RouterFrozen);
    }
    if epoch <= status.active_epoch {
        return Err(PreconditionError::StaleEpoch {
            requested: epoch,
            active: status.active_epoch,
        });
    }
    Ok(())
}

/// `root` must be pending on an unfrozen router
fn check_pending(status: &RouterStatus, root: Hash32) -> Result<(), PreconditionError> {
    if status.frozen {
        return Err(PreconditionError::RouterFrozen);
    }
    if !status.has_pending() {
        return Err(PreconditionError::NoPendingRoot { expected: root });
    }
    if status.pending_root != root {
        return Err(PreconditionError::PendingRootMismatch {
            expected: root,
            found: status.pending_root,
        });
    }
    Ok(())
}

/// First, middle and last positions, without repeats
fn sample_indices(len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut indices = vec![0, len / 2, len - 1];
    indices.dedup();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(pending: Hash32, active_epoch: u64, frozen: bool) -> RouterStatus {
        RouterStatus {
            pending_root: pending,
            pending_epoch: active_epoch + 1,
            active_root: Hash32::ZERO,
            active_epoch,
            frozen,
        }
    }

    #[test]
    fn test_sample_indices() {
        assert!(sample_indices(0).is_empty());
        assert_eq!(sample_indices(1), vec![0]);
        assert_eq!(sample_indices(2), vec![0, 1]);
        assert_eq!(sample_indices(5), vec![0, 2, 4]);
    }

    #[test]
    fn test_pending_checks_name_the_discrepancy() {
        let root = Hash32::new([1; 32]);
        assert_eq!(
            check_pending(&status(Hash32::ZERO, 0, false), root),
            Err(PreconditionError::NoPendingRoot { expected: root })
        );
        assert_eq!(
            check_pending(&status(Hash32::new([2; 32]), 0, false), root),
            Err(PreconditionError::PendingRootMismatch {
                expected: root,
                found: Hash32::new([2; 32]),
            })
        );
        assert_eq!(
            check_pending(&status(root, 0, true), root),
            Err(PreconditionError::RouterFrozen)
        );
        assert!(check_pending(&status(root, 0, false), root).is_ok());
    }

    #[test]
    fn test_commit_requires_newer_epoch() {
        assert_eq!(
            check_commit(&status(Hash32::ZERO, 4, false), 4),
            Err(PreconditionError::StaleEpoch {
                requested: 4,
                active: 4,
            })
        );
        assert!(check_commit(&status(Hash32::ZERO, 4, false), 5).is_ok());
        assert_eq!(
            check_commit(&status(Hash32::ZERO, 4, true), 5),
            Err(PreconditionError::RouterFrozen)
        );
    }
}
