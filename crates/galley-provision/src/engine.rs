//! The resumable step engine.
//!
//! Steps run in a fixed order. A step counts as done only once the progress
//! file recording it has been written; a step whose action succeeded but
//! whose record failed to persist is re-run on the next invocation, so every
//! step action must tolerate being re-applied.

use galley_core::PersistError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::error::ProvisionError;
use crate::session::{JoinTarget, ProvisioningSession, SessionStore};

/// One named unit of host provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[serde(alias = "Server OS is now up to date.")]
    OsUpdate,
    #[serde(alias = "SSH configuration is improved and more secure.")]
    SshHardening,
    #[serde(alias = "K0s is installed.")]
    RuntimeInstall,
    #[serde(alias = "K0s configuration is ready and configured.")]
    RuntimeConfigure,
    #[serde(alias = "Recommended server hardening is applied.")]
    ServerHardening,
}

impl Step {
    /// The full sequence, in execution order
    pub const SEQUENCE: [Self; 5] = [
        Self::OsUpdate,
        Self::SshHardening,
        Self::RuntimeInstall,
        Self::RuntimeConfigure,
        Self::ServerHardening,
    ];

    /// Stable key used in progress files
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::OsUpdate => "os_update",
            Self::SshHardening => "ssh_hardening",
            Self::RuntimeInstall => "runtime_install",
            Self::RuntimeConfigure => "runtime_configure",
            Self::ServerHardening => "server_hardening",
        }
    }

    /// What a completed step means for the operator
    #[must_use]
    pub const fn summary(&self) -> &'static str {
        match self {
            Self::OsUpdate => "Server OS is up to date",
            Self::SshHardening => "SSH configuration is hardened",
            Self::RuntimeInstall => "k0s is installed",
            Self::RuntimeConfigure => "k0s is configured",
            Self::ServerHardening => "Recommended server hardening is applied",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Which steps a workflow runs, a subsequence of [`Step::SEQUENCE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlan {
    /// `node prepare`: every step
    Prepare,
    /// Controller and worker joins: runtime install and role configuration
    Join,
}

impl StepPlan {
    /// Steps in execution order
    #[must_use]
    pub const fn steps(&self) -> &'static [Step] {
        match self {
            Self::Prepare => &Step::SEQUENCE,
            Self::Join => &[Step::RuntimeInstall, Step::RuntimeConfigure],
        }
    }

    /// Returns true if `step` belongs to this plan
    #[must_use]
    pub fn contains(&self, step: Step) -> bool {
        self.steps().contains(&step)
    }
}

/// Progress of a step within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Done,
    Failed,
}

/// What a step's action reports on success
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// The operator declined the step's mutation
    pub declined: bool,
    /// The host should be rebooted once provisioning finishes
    pub reboot_recommended: bool,
}

impl StepOutcome {
    /// The mutation was applied
    #[must_use]
    pub const fn applied() -> Self {
        Self {
            declined: false,
            reboot_recommended: false,
        }
    }

    /// The operator declined; the step is still complete
    #[must_use]
    pub const fn declined() -> Self {
        Self {
            declined: true,
            reboot_recommended: false,
        }
    }

    /// Applied, and a reboot is advisable
    #[must_use]
    pub const fn needs_reboot() -> Self {
        Self {
            declined: false,
            reboot_recommended: true,
        }
    }
}

/// Result of asking the engine to run a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepReport {
    /// Recorded as complete by an earlier run; the action was not invoked
    AlreadyComplete,
    /// The action ran and its completion is persisted
    Completed(StepOutcome),
}

impl StepReport {
    /// Returns true if the action ran in this invocation
    #[must_use]
    pub const fn ran(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Sequences a [`StepPlan`] over a persisted [`ProvisioningSession`]
#[derive(Debug)]
pub struct StepEngine {
    store: SessionStore,
    session: ProvisioningSession,
    plan: StepPlan,
    states: BTreeMap<Step, StepState>,
    failed: Option<Step>,
}

impl StepEngine {
    /// Load the stored session, or start an empty one
    pub fn resume(store: SessionStore, plan: StepPlan) -> Result<Self, PersistError> {
        let session = store.load()?;
        Ok(Self::with_session(store, session, plan))
    }

    /// Like [`resume`](Self::resume), but only reuses progress recorded for
    /// `target`. A session started for another role, cluster or secret is
    /// discarded and a fresh one bound to `target` is persisted.
    pub fn resume_for(
        store: SessionStore,
        plan: StepPlan,
        target: JoinTarget,
    ) -> Result<Self, PersistError> {
        let mut session = store.load()?;
        if session.target.as_ref() != Some(&target) {
            if !session.is_fresh() {
                info!(
                    role = %target.role,
                    cluster = %target.cluster_id,
                    "join target changed, starting the join over"
                );
            }
            session = ProvisioningSession {
                target: Some(target),
                ..ProvisioningSession::default()
            };
            store.save(&session)?;
        }
        Ok(Self::with_session(store, session, plan))
    }

    fn with_session(store: SessionStore, session: ProvisioningSession, plan: StepPlan) -> Self {
        let states = plan
            .steps()
            .iter()
            .map(|step| {
                let state = if session.is_complete(*step) {
                    StepState::Done
                } else {
                    StepState::Pending
                };
                (*step, state)
            })
            .collect();

        if !session.is_fresh() {
            debug!(
                path = %store.path().display(),
                completed = ?session.completed().collect::<Vec<_>>(),
                "resuming provisioning session"
            );
        }

        Self {
            store,
            session,
            plan,
            states,
            failed: None,
        }
    }

    /// The session as currently recorded
    #[must_use]
    pub const fn session(&self) -> &ProvisioningSession {
        &self.session
    }

    #[must_use]
    pub const fn plan(&self) -> StepPlan {
        self.plan
    }

    /// Returns true if `step` is durably recorded as complete
    #[must_use]
    pub fn is_complete(&self, step: Step) -> bool {
        self.session.is_complete(step)
    }

    /// State of `step` in this run; steps outside the plan are reported pending
    #[must_use]
    pub fn state(&self, step: Step) -> StepState {
        self.states.get(&step).copied().unwrap_or(StepState::Pending)
    }

    /// Returns true if the OS update asked for a reboot that was not offered yet
    #[must_use]
    pub const fn needs_reboot(&self) -> bool {
        self.session.needs_reboot
    }

    /// Returns true once every step of the plan is complete
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.plan.steps().iter().all(|step| self.is_complete(*step))
    }

    /// Record `step` as complete and persist the session.
    ///
    /// On a persistence failure the in-memory record is rolled back, so the
    /// step is neither trusted now nor on the next resume.
    pub fn mark_complete(&mut self, step: Step) -> Result<(), PersistError> {
        let previous = self.session.completed_steps.insert(step, true);
        if let Err(e) = self.store.save(&self.session) {
            match previous {
                Some(value) => self.session.completed_steps.insert(step, value),
                None => self.session.completed_steps.remove(&step),
            };
            return Err(e);
        }
        self.states.insert(step, StepState::Done);
        Ok(())
    }

    /// Run `step` unless it already completed.
    ///
    /// `action` is only awaited when the step is pending, every earlier step
    /// of the plan is complete and no step failed earlier in this run. A
    /// failed action halts the engine: later steps are refused until the
    /// workflow is invoked again.
    pub async fn run_step<F>(&mut self, step: Step, action: F) -> Result<StepReport, ProvisionError>
    where
        F: Future<Output = Result<StepOutcome, ProvisionError>>,
    {
        if !self.plan.contains(step) {
            return Err(ProvisionError::NotPlanned { step });
        }
        if let Some(failed) = self.failed {
            return Err(ProvisionError::Halted { failed });
        }
        if self.is_complete(step) {
            debug!(step = %step, "step already complete");
            return Ok(StepReport::AlreadyComplete);
        }
        if let Some(pending) = self
            .plan
            .steps()
            .iter()
            .take_while(|s| **s != step)
            .find(|s| !self.is_complete(**s))
        {
            return Err(ProvisionError::OutOfOrder {
                step,
                pending: *pending,
            });
        }

        info!(step = %step, "running step");
        self.states.insert(step, StepState::Running);

        let outcome = match action.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(step = %step, error = %e, "step failed");
                self.fail(step);
                return Err(ProvisionError::StepFailed {
                    step,
                    source: Box::new(e),
                });
            }
        };

        if outcome.reboot_recommended {
            if step == Step::OsUpdate {
                self.session.needs_reboot = true;
            } else {
                debug!(step = %step, "ignoring reboot request from a step other than the OS update");
            }
        }

        if let Err(e) = self.mark_complete(step) {
            self.fail(step);
            return Err(ProvisionError::StepFailed {
                step,
                source: Box::new(e.into()),
            });
        }

        info!(step = %step, declined = outcome.declined, "step complete");
        Ok(StepReport::Completed(outcome))
    }

    /// Close the session: drop the reboot flag and delete the progress file.
    ///
    /// Returns whether a reboot had been recommended. Call once every step
    /// of the plan is complete and the reboot decision has been made.
    pub fn finish(mut self) -> Result<bool, PersistError> {
        let needs_reboot = std::mem::take(&mut self.session.needs_reboot);
        self.store.clear()?;
        debug!(path = %self.store.path().display(), "provisioning session closed");
        Ok(needs_reboot)
    }

    fn fail(&mut self, step: Step) {
        self.states.insert(step, StepState::Failed);
        self.failed = Some(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_core::ClusterRole;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn engine(dir: &TempDir, plan: StepPlan) -> StepEngine {
        StepEngine::resume(SessionStore::new(dir.path().join("progress.json")), plan).unwrap()
    }

    async fn ok(counter: &AtomicUsize, outcome: StepOutcome) -> Result<StepOutcome, ProvisionError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }

    #[tokio::test]
    async fn test_runs_in_order_and_persists() {
        let dir = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);
        let mut engine = engine(&dir, StepPlan::Prepare);

        for step in Step::SEQUENCE {
            assert_eq!(engine.state(step), StepState::Pending);
            let report = engine
                .run_step(step, ok(&calls, StepOutcome::applied()))
                .await
                .unwrap();
            assert!(report.ran());
            assert_eq!(engine.state(step), StepState::Done);
        }
        assert!(engine.is_finished());
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let reloaded = SessionStore::new(dir.path().join("progress.json")).load().unwrap();
        assert_eq!(reloaded.completed().count(), 5);
    }

    #[tokio::test]
    async fn test_completed_step_is_not_rerun() {
        let dir = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);

        let mut first = engine(&dir, StepPlan::Prepare);
        first
            .run_step(Step::OsUpdate, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap();
        drop(first);

        let mut second = engine(&dir, StepPlan::Prepare);
        let report = second
            .run_step(Step::OsUpdate, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap();
        assert_eq!(report, StepReport::AlreadyComplete);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refuses_to_skip_ahead() {
        let dir = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);
        let mut engine = engine(&dir, StepPlan::Prepare);

        let err = engine
            .run_step(Step::RuntimeInstall, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::OutOfOrder {
                step: Step::RuntimeInstall,
                pending: Step::OsUpdate
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_halts_the_run() {
        let dir = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);
        let mut engine = engine(&dir, StepPlan::Join);

        let err = engine
            .run_step(Step::RuntimeInstall, async {
                Err(ProvisionError::precondition("no k0s", "install it"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::StepFailed { step: Step::RuntimeInstall, .. }));
        assert_eq!(engine.state(Step::RuntimeInstall), StepState::Failed);
        assert!(!engine.is_complete(Step::RuntimeInstall));

        let err = engine
            .run_step(Step::RuntimeInstall, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Halted { failed: Step::RuntimeInstall }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_join_plan_rejects_host_steps() {
        let dir = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);
        let mut engine = engine(&dir, StepPlan::Join);
        let err = engine
            .run_step(Step::OsUpdate, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NotPlanned { step: Step::OsUpdate }));
    }

    #[tokio::test]
    async fn test_only_os_update_sets_reboot_flag() {
        let dir = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);
        let mut engine = engine(&dir, StepPlan::Prepare);

        engine
            .run_step(Step::OsUpdate, ok(&calls, StepOutcome::declined()))
            .await
            .unwrap();
        assert!(!engine.needs_reboot());

        engine
            .run_step(Step::SshHardening, ok(&calls, StepOutcome::needs_reboot()))
            .await
            .unwrap();
        assert!(!engine.needs_reboot());
    }

    #[tokio::test]
    async fn test_finish_clears_session() {
        let dir = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);
        let mut engine = engine(&dir, StepPlan::Prepare);
        engine
            .run_step(Step::OsUpdate, ok(&calls, StepOutcome::needs_reboot()))
            .await
            .unwrap();
        assert!(engine.needs_reboot());

        assert!(engine.finish().unwrap());
        assert!(!dir.path().join("progress.json").exists());
    }

    #[test]
    fn test_declined_step_still_completes() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, StepPlan::Prepare);
        let report = tokio_test::block_on(
            engine.run_step(Step::OsUpdate, async { Ok(StepOutcome::declined()) }),
        )
        .unwrap();
        assert_eq!(report, StepReport::Completed(StepOutcome::declined()));
        assert!(engine.is_complete(Step::OsUpdate));
        assert_eq!(engine.state(Step::SshHardening), StepState::Pending);
    }

    #[test]
    fn test_mark_complete_rolls_back_on_persist_failure() {
        let dir = TempDir::new().unwrap();
        // A directory where the progress file should be makes every save fail
        let path = dir.path().join("progress.json");
        std::fs::create_dir(&path).unwrap();
        let store = SessionStore::new(&path);
        let mut engine = StepEngine {
            store,
            session: ProvisioningSession::default(),
            plan: StepPlan::Prepare,
            states: BTreeMap::new(),
            failed: None,
        };

        assert!(engine.mark_complete(Step::OsUpdate).is_err());
        assert!(!engine.is_complete(Step::OsUpdate));
    }

    #[tokio::test]
    async fn test_run_step_fails_when_progress_cannot_be_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::create_dir(&path).unwrap();
        let calls = AtomicUsize::new(0);
        let mut engine = StepEngine::resume(SessionStore::new(&path), StepPlan::Join).unwrap();

        let err = engine
            .run_step(Step::RuntimeInstall, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            ProvisionError::StepFailed { step: Step::RuntimeInstall, source }
                if matches!(**source, ProvisionError::Persist(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state(Step::RuntimeInstall), StepState::Failed);
        assert!(!engine.is_complete(Step::RuntimeInstall));

        let err = engine
            .run_step(Step::RuntimeConfigure, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Halted { failed: Step::RuntimeInstall }));
    }

    #[tokio::test]
    async fn test_progress_is_bound_to_its_join_target() {
        let dir = TempDir::new().unwrap();
        let store = || SessionStore::new(dir.path().join("join-progress.json"));
        let calls = AtomicUsize::new(0);
        let controller = JoinTarget::new(ClusterRole::Controller, "c-1", None);

        let mut first = StepEngine::resume_for(store(), StepPlan::Join, controller.clone()).unwrap();
        first
            .run_step(Step::RuntimeInstall, ok(&calls, StepOutcome::applied()))
            .await
            .unwrap();
        drop(first);

        let same = StepEngine::resume_for(store(), StepPlan::Join, controller).unwrap();
        assert!(same.is_complete(Step::RuntimeInstall));
        drop(same);

        let promoted = JoinTarget::new(ClusterRole::ControllerWorker, "c-1", None);
        let fresh = StepEngine::resume_for(store(), StepPlan::Join, promoted.clone()).unwrap();
        assert!(fresh.session().is_fresh());
        assert_eq!(fresh.session().target.as_ref(), Some(&promoted));
        assert_eq!(store().load().unwrap().target, Some(promoted));
    }

    #[tokio::test]
    async fn test_unbound_progress_is_not_reused_for_a_join() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("join-progress.json"));
        let mut legacy = ProvisioningSession::default();
        legacy.completed_steps.insert(Step::RuntimeInstall, true);
        store.save(&legacy).unwrap();

        let target = JoinTarget::new(ClusterRole::Worker, "c-1", None);
        let engine = StepEngine::resume_for(store, StepPlan::Join, target).unwrap();
        assert!(!engine.is_complete(Step::RuntimeInstall));
    }
}
