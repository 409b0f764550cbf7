//! Workflow tests against scripted collaborators.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use galley_client::PlatformClient;
use galley_core::token::decode_worker_token;
use galley_core::{ClusterRole, HostFacts, JoinSecret, TokenError};
use galley_provision::host::{ClusterRuntime, HostMaintenance, OperatorPrompt};
use galley_provision::{
    AgentConfig, Collaborators, Environment, Installer, JoinTarget, ProvisionError, SessionStore,
    Step, WorkflowOptions,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Ordered record of every collaborator call
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn contains(&self, entry: &str) -> bool {
        self.entries().iter().any(|e| e == entry)
    }
}

/// Answers questions containing a scripted phrase, defaults otherwise
struct ScriptedPrompt {
    answers: Vec<(&'static str, bool)>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    fn new(answers: Vec<(&'static str, bool)>) -> Arc<Self> {
        Arc::new(Self {
            answers,
            asked: Mutex::new(Vec::new()),
        })
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn confirm(&self, question: &str, default_yes: bool) -> bool {
        self.asked.lock().unwrap().push(question.to_string());
        self.answers
            .iter()
            .find(|(phrase, _)| question.contains(phrase))
            .map_or(default_yes, |(_, answer)| *answer)
    }
}

#[derive(Default)]
struct FakeRuntime {
    journal: Journal,
    active: bool,
    fail_config: AtomicBool,
    fail_start: AtomicBool,
    fail_mint: AtomicBool,
}

fn command_failure(command: &str) -> ProvisionError {
    ProvisionError::Command {
        command: command.to_string(),
        reason: "exit status 1".to_string(),
    }
}

#[async_trait]
impl ClusterRuntime for FakeRuntime {
    async fn ensure_installed(&self) -> Result<(), ProvisionError> {
        self.journal.push("ensure_installed");
        Ok(())
    }

    async fn ensure_config(&self) -> Result<bool, ProvisionError> {
        self.journal.push("ensure_config");
        if self.fail_config.load(Ordering::SeqCst) {
            return Err(command_failure("k0s config create"));
        }
        Ok(true)
    }

    async fn edit_config(&self) -> Result<(), ProvisionError> {
        self.journal.push("edit_config");
        Ok(())
    }

    async fn install_service(
        &self,
        role: ClusterRole,
        secret: Option<&JoinSecret>,
    ) -> Result<(), ProvisionError> {
        match secret {
            Some(secret) => self
                .journal
                .push(format!("install_service:{role}:{}", secret.expose())),
            None => self.journal.push(format!("install_service:{role}")),
        }
        Ok(())
    }

    async fn start_service(&self, role: ClusterRole) -> Result<(), ProvisionError> {
        self.journal.push(format!("start_service:{role}"));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(command_failure("systemctl start"));
        }
        Ok(())
    }

    async fn any_service_active(&self) -> bool {
        self.active
    }

    async fn create_join_token(&self, expiry: &str) -> Result<JoinSecret, ProvisionError> {
        self.journal.push(format!("create_join_token:{expiry}"));
        if self.fail_mint.load(Ordering::SeqCst) {
            return Err(command_failure("k0s token create"));
        }
        Ok(JoinSecret::new("k0s-join-secret"))
    }

    async fn version(&self) -> Option<String> {
        Some("v1.31.1+k0s.0".to_string())
    }
}

struct FakeHost {
    journal: Journal,
    fail_ssh: bool,
    fail_server: bool,
}

#[async_trait]
impl HostMaintenance for FakeHost {
    async fn update_os(&self, _prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        self.journal.push("update_os");
        Ok(())
    }

    async fn harden_ssh(&self, _prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        self.journal.push("harden_ssh");
        if self.fail_ssh {
            return Err(ProvisionError::Command {
                command: "sshd -t".to_string(),
                reason: "exit status 255".to_string(),
            });
        }
        Ok(())
    }

    async fn harden_server(&self, _prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        self.journal.push("harden_server");
        if self.fail_server {
            return Err(ProvisionError::Io {
                context: "cannot read /etc/login.defs".to_string(),
                source: std::io::ErrorKind::NotFound.into(),
            });
        }
        Ok(())
    }

    async fn host_facts(&self) -> Result<HostFacts, ProvisionError> {
        self.journal.push("host_facts");
        Ok(HostFacts {
            cores: 4,
            total_memory: 8_000_000_000,
            total_storage: 100_000_000_000,
            used_storage: 20_000_000_000,
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            distro: "Ubuntu".to_string(),
            version: "24.04.1 LTS (Noble Numbat)".to_string(),
        })
    }

    async fn reboot(&self) -> Result<(), ProvisionError> {
        self.journal.push("reboot");
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    journal: Journal,
    runtime: Arc<FakeRuntime>,
    fail_server: AtomicBool,
}

impl Harness {
    fn new() -> Self {
        Self::with_runtime(true)
    }

    fn with_runtime(active: bool) -> Self {
        let journal = Journal::default();
        Self {
            dir: TempDir::new().unwrap(),
            runtime: Arc::new(FakeRuntime {
                journal: journal.clone(),
                active,
                ..FakeRuntime::default()
            }),
            journal,
            fail_server: AtomicBool::new(false),
        }
    }

    fn env(&self) -> Environment {
        Environment::rooted(self.dir.path())
    }

    fn installer(
        &self,
        platform: &str,
        prompt: Arc<dyn OperatorPrompt>,
        fail_ssh: bool,
        options: WorkflowOptions,
    ) -> Installer {
        let collaborators = Collaborators {
            prompt,
            runtime: self.runtime.clone(),
            host: Arc::new(FakeHost {
                journal: self.journal.clone(),
                fail_ssh,
                fail_server: self.fail_server.load(Ordering::SeqCst),
            }),
        };
        Installer::new(self.env(), PlatformClient::new(platform).unwrap(), collaborators)
            .with_options(options)
    }

    fn offline(&self) -> Installer {
        self.installer("", ScriptedPrompt::new(vec![]), false, WorkflowOptions::default())
    }
}

fn auth_token(subject: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{subject}","iat":1700000000}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

fn node_envelope(id: &str, node_type: &str) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "id": id,
            "type": "vesselEngineNode",
            "attributes": {
                "vesselEngineRegionId": "ams-1",
                "nodeType": node_type,
                "vesselEngineId": "engine-42",
                "name": "ams-node-1",
                "ipAddress": "10.0.0.4",
                "cpu": "",
                "memory": "",
                "storage": "",
                "provisioning": true
            }
        }
    })
}

#[tokio::test]
async fn test_declined_os_update_completes_step_without_reboot() {
    let harness = Harness::new();
    let prompt = ScriptedPrompt::new(vec![("Update the operating system", false)]);
    let installer = harness.installer("", prompt, true, WorkflowOptions::default());

    let err = installer.prepare_node().await.unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::StepFailed {
            step: Step::SshHardening,
            ..
        }
    ));

    // The update was declined, so the host was never touched; SSH was next
    assert_eq!(harness.journal.entries(), vec!["harden_ssh"]);

    let session = SessionStore::new(harness.env().prepare_progress_path())
        .load()
        .unwrap();
    assert!(session.is_complete(Step::OsUpdate));
    assert!(!session.is_complete(Step::SshHardening));
    assert!(!session.needs_reboot);
}

#[tokio::test]
async fn test_skip_os_update_flag() {
    let harness = Harness::new();
    let options = WorkflowOptions {
        skip_os_update: true,
        ..WorkflowOptions::default()
    };
    let prompt = ScriptedPrompt::new(vec![]);
    let installer = harness.installer("", prompt.clone(), false, options);

    let outcome = installer.prepare_node().await.unwrap();
    assert_eq!(outcome.declined, vec![Step::OsUpdate]);
    assert!(!outcome.reboot_recommended);
    assert!(!harness.journal.contains("update_os"));
    assert!(!prompt
        .asked
        .lock()
        .unwrap()
        .iter()
        .any(|q| q.contains("Update the operating system")));
}

#[tokio::test]
async fn test_prepare_runs_every_step_and_offers_reboot() {
    let harness = Harness::new();
    let installer = harness.offline();

    let outcome = installer.prepare_node().await.unwrap();
    assert_eq!(outcome.ran, Step::SEQUENCE.to_vec());
    assert!(outcome.resumed.is_empty());
    assert!(outcome.reboot_recommended);
    assert!(outcome.reboot_requested);
    assert_eq!(outcome.runtime_version.as_deref(), Some("v1.31.1+k0s.0"));

    assert_eq!(
        harness.journal.entries(),
        vec![
            "update_os",
            "harden_ssh",
            "ensure_installed",
            "ensure_config",
            "harden_server",
            "reboot"
        ]
    );
    assert!(!harness.env().prepare_progress_path().exists());
}

#[tokio::test]
async fn test_reboot_can_be_declined() {
    let harness = Harness::new();
    let prompt = ScriptedPrompt::new(vec![("Reboot now", false), ("Edit the k0s", true)]);
    let installer = harness.installer("", prompt, false, WorkflowOptions::default());

    let outcome = installer.prepare_node().await.unwrap();
    assert!(outcome.reboot_recommended);
    assert!(!outcome.reboot_requested);
    assert!(harness.journal.contains("edit_config"));
    assert!(!harness.journal.contains("reboot"));
    assert!(!harness.env().prepare_progress_path().exists());
}

#[tokio::test]
async fn test_rerun_resumes_after_last_completed_step() {
    let harness = Harness::new();
    harness.runtime.fail_config.store(true, Ordering::SeqCst);

    let err = harness.offline().prepare_node().await.unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::StepFailed {
            step: Step::RuntimeConfigure,
            ..
        }
    ));
    assert_eq!(
        harness.journal.entries(),
        vec!["update_os", "harden_ssh", "ensure_installed", "ensure_config"]
    );

    let second = Harness {
        dir: harness.dir,
        journal: Journal::default(),
        runtime: Arc::new(FakeRuntime {
            active: true,
            ..FakeRuntime::default()
        }),
        fail_server: AtomicBool::new(false),
    };
    let second_journal = second.runtime.journal.clone();
    let outcome = second.installer(
        "",
        ScriptedPrompt::new(vec![]),
        false,
        WorkflowOptions::default(),
    )
    .prepare_node()
    .await
    .unwrap();

    assert_eq!(
        outcome.resumed,
        vec![Step::OsUpdate, Step::SshHardening, Step::RuntimeInstall]
    );
    assert_eq!(
        outcome.ran,
        vec![Step::RuntimeConfigure, Step::ServerHardening]
    );
    // The reboot flag set by the first run's OS update survives the failure
    assert!(outcome.reboot_recommended);

    assert_eq!(second_journal.entries(), vec!["ensure_config"]);
    let host_calls = second.journal.entries();
    assert_eq!(host_calls, vec!["harden_server", "reboot"]);
}

#[tokio::test]
async fn test_worker_join_rejects_controller_token_without_mutation() {
    let harness = Harness::new();
    let token = STANDARD.encode("engine-42.controller.k0s-join-secret");

    let err = harness.offline().worker_join(&token).await.unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Token(TokenError::WrongTokenRole { .. })
    ));
    assert!(err.hint().is_some());

    assert!(harness.journal.entries().is_empty());
    assert!(!harness.env().config_path.exists());
    assert!(!harness.env().state_dir.exists());
}

#[tokio::test]
async fn test_worker_join_installs_with_embedded_secret() {
    let harness = Harness::new();
    let token = STANDARD.encode("engine-42.worker.k0s-join-secret");

    let outcome = harness.offline().worker_join(&token).await.unwrap();
    assert_eq!(outcome.role, ClusterRole::Worker);
    assert_eq!(outcome.cluster_id, "engine-42");
    assert!(outcome.invite.is_none());

    assert_eq!(
        harness.journal.entries(),
        vec![
            "ensure_installed",
            "install_service:worker:k0s-join-secret",
            "start_service:worker"
        ]
    );

    let config = AgentConfig::load(&harness.env().config_path).unwrap();
    assert_eq!(config.vessel_engine_id.as_deref(), Some("engine-42"));
    assert_eq!(config.node_type, Some(ClusterRole::Worker));
    assert!(!harness.env().join_progress_path().exists());
}

#[tokio::test]
async fn test_controller_join_without_platform_still_mints_invite() {
    let harness = Harness::new();

    let outcome = harness
        .offline()
        .controller_join(&auth_token("engine-42"))
        .await
        .unwrap();
    assert_eq!(outcome.role, ClusterRole::Controller);
    assert_eq!(outcome.cluster_id, "engine-42");

    let invite = outcome.invite.unwrap();
    assert_eq!(invite.expiry, "1h");
    let identity = decode_worker_token(&invite.token).unwrap();
    assert_eq!(identity.cluster_id, "engine-42");
    assert_eq!(identity.secret.expose(), "k0s-join-secret");

    assert_eq!(
        harness.journal.entries(),
        vec![
            "ensure_installed",
            "ensure_config",
            "install_service:controller",
            "start_service:controller",
            "host_facts",
            "create_join_token:1h"
        ]
    );

    let config = AgentConfig::load(&harness.env().config_path).unwrap();
    assert_eq!(config.vessel_engine_id.as_deref(), Some("engine-42"));
    assert_eq!(config.node_type, Some(ClusterRole::Controller));
}

#[tokio::test]
async fn test_controller_join_uses_platform_role_and_reports_ready() {
    let server = MockServer::start().await;
    let token = auth_token("engine-42");

    Mock::given(method("GET"))
        .and(path("/vessels/engine/node"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(node_envelope("node-7", "controller+worker")),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/vessels/engine/node/node-7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let harness = Harness::new();
    let installer = harness.installer(
        &server.uri(),
        ScriptedPrompt::new(vec![]),
        false,
        WorkflowOptions::default(),
    );

    let outcome = installer.controller_join(&token).await.unwrap();
    assert_eq!(outcome.role, ClusterRole::ControllerWorker);
    assert!(harness
        .journal
        .contains("install_service:controller+worker"));
    assert!(outcome.invite.is_some());
}

#[tokio::test]
async fn test_controller_join_rejects_worker_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vessels/engine/node"))
        .respond_with(ResponseTemplate::new(200).set_body_json(node_envelope("node-7", "worker")))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let installer = harness.installer(
        &server.uri(),
        ScriptedPrompt::new(vec![]),
        false,
        WorkflowOptions::default(),
    );

    let err = installer
        .controller_join(&auth_token("engine-42"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::RoleMismatch {
            found: ClusterRole::Worker
        }
    ));
    assert!(harness.journal.entries().is_empty());
    assert!(!harness.env().config_path.exists());
}

#[tokio::test]
async fn test_controller_join_surfaces_platform_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vessels/engine/node"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let installer = harness.installer(
        &server.uri(),
        ScriptedPrompt::new(vec![]),
        false,
        WorkflowOptions::default(),
    );

    let err = installer
        .controller_join(&auth_token("engine-42"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Attest(_)));
    assert!(harness.journal.entries().is_empty());
}

#[tokio::test]
async fn test_malformed_auth_token_is_rejected() {
    let harness = Harness::new();
    let err = harness
        .offline()
        .controller_join("not-a-token")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Token(TokenError::MalformedToken(_))
    ));
    assert!(harness.journal.entries().is_empty());
}

#[tokio::test]
async fn test_dry_run_mutates_nothing() {
    let harness = Harness::new();
    let options = WorkflowOptions {
        dry_run: true,
        ..WorkflowOptions::default()
    };
    let installer = harness.installer("", ScriptedPrompt::new(vec![]), false, options);

    let outcome = installer
        .controller_join(&auth_token("engine-42"))
        .await
        .unwrap();
    assert!(outcome.dry_run);
    assert!(outcome.invite.is_none());

    let prepared = installer.prepare_node().await.unwrap();
    assert_eq!(prepared.pending, Step::SEQUENCE.to_vec());

    assert!(harness.journal.entries().is_empty());
    assert!(!harness.env().config_path.exists());
    assert!(!harness.env().state_dir.exists());
}

#[tokio::test]
async fn test_worker_invite_preconditions() {
    let harness = Harness::with_runtime(false);
    let installer = harness.offline();

    let err = installer.worker_invite().await.unwrap_err();
    assert!(matches!(err, ProvisionError::Precondition { .. }));
    assert_eq!(err.hint(), Some("run `galley controller join <token>` first"));

    let mut config = AgentConfig::default();
    config.record_join("engine-42", ClusterRole::Controller);
    config.save(&harness.env().config_path).unwrap();

    let err = installer.worker_invite().await.unwrap_err();
    assert!(err.to_string().contains("no k0s service is running"));
    assert!(!harness.journal.contains("create_join_token:1h"));
}

#[tokio::test]
async fn test_worker_invite_mints_with_configured_expiry() {
    let harness = Harness::new();
    let mut config = AgentConfig::default();
    config.record_join("engine-42", ClusterRole::ControllerWorker);
    config.save(&harness.env().config_path).unwrap();

    let options = WorkflowOptions {
        invite_expiry: "24h".to_string(),
        ..WorkflowOptions::default()
    };
    let installer = harness.installer("", ScriptedPrompt::new(vec![]), false, options);

    let invite = installer.worker_invite().await.unwrap().unwrap();
    assert_eq!(invite.expiry, "24h");
    assert_eq!(
        decode_worker_token(&invite.token).unwrap().cluster_id,
        "engine-42"
    );
    assert_eq!(harness.journal.entries(), vec!["create_join_token:24h"]);
}

#[tokio::test]
async fn test_worker_cannot_invite() {
    let harness = Harness::new();
    let mut config = AgentConfig::default();
    config.record_join("engine-42", ClusterRole::Worker);
    config.save(&harness.env().config_path).unwrap();

    let err = harness.offline().worker_invite().await.unwrap_err();
    assert!(matches!(err, ProvisionError::Precondition { .. }));
}

#[tokio::test]
async fn test_failed_server_hardening_is_retried_on_rerun() {
    let harness = Harness::new();
    harness.fail_server.store(true, Ordering::SeqCst);

    let err = harness.offline().prepare_node().await.unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::StepFailed {
            step: Step::ServerHardening,
            ..
        }
    ));
    let session = SessionStore::new(harness.env().prepare_progress_path())
        .load()
        .unwrap();
    assert!(session.is_complete(Step::RuntimeConfigure));
    assert!(!session.is_complete(Step::ServerHardening));
    assert!(!harness.journal.contains("reboot"));

    harness.fail_server.store(false, Ordering::SeqCst);
    let outcome = harness.offline().prepare_node().await.unwrap();
    assert_eq!(outcome.ran, vec![Step::ServerHardening]);
    assert!(!harness.env().prepare_progress_path().exists());
}

#[tokio::test]
async fn test_interrupted_controller_join_starts_over_for_a_new_role() {
    let harness = Harness::new();
    harness.runtime.fail_start.store(true, Ordering::SeqCst);
    let token = auth_token("engine-42");

    let err = harness.offline().controller_join(&token).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Command { .. }));
    let session = SessionStore::new(harness.env().join_progress_path())
        .load()
        .unwrap();
    assert!(session.is_complete(Step::RuntimeConfigure));
    assert_eq!(
        session.target,
        Some(JoinTarget::new(ClusterRole::Controller, "engine-42", None))
    );

    // The platform now wants the node to schedule workloads too
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vessels/engine/node"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(node_envelope("node-7", "controller+worker")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/vessels/engine/node/node-7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    harness.runtime.fail_start.store(false, Ordering::SeqCst);
    let before = harness.journal.entries().len();
    let installer = harness.installer(
        &server.uri(),
        ScriptedPrompt::new(vec![]),
        false,
        WorkflowOptions::default(),
    );
    let outcome = installer.controller_join(&token).await.unwrap();
    assert_eq!(outcome.role, ClusterRole::ControllerWorker);

    assert_eq!(
        harness.journal.entries()[before..],
        [
            "ensure_installed",
            "ensure_config",
            "install_service:controller+worker",
            "start_service:controller+worker",
            "host_facts",
            "create_join_token:1h"
        ]
    );
    let config = AgentConfig::load(&harness.env().config_path).unwrap();
    assert_eq!(config.node_type, Some(ClusterRole::ControllerWorker));
}

#[tokio::test]
async fn test_worker_join_with_fresh_invite_reinstalls_the_service() {
    let harness = Harness::new();
    harness.runtime.fail_start.store(true, Ordering::SeqCst);

    let stale = STANDARD.encode("engine-42.worker.expired-secret");
    harness.offline().worker_join(&stale).await.unwrap_err();

    // Same invite again: the recorded progress is reused
    let before = harness.journal.entries().len();
    harness.offline().worker_join(&stale).await.unwrap_err();
    assert_eq!(harness.journal.entries()[before..], ["start_service:worker"]);

    harness.runtime.fail_start.store(false, Ordering::SeqCst);
    let before = harness.journal.entries().len();
    let fresh = STANDARD.encode("engine-42.worker.fresh-secret");
    harness.offline().worker_join(&fresh).await.unwrap();
    assert_eq!(
        harness.journal.entries()[before..],
        [
            "ensure_installed",
            "install_service:worker:fresh-secret",
            "start_service:worker"
        ]
    );
    assert!(!harness.env().join_progress_path().exists());
}

#[tokio::test]
async fn test_failed_invite_after_controller_join_keeps_the_join() {
    let harness = Harness::new();
    harness.runtime.fail_mint.store(true, Ordering::SeqCst);

    let err = harness
        .offline()
        .controller_join(&auth_token("engine-42"))
        .await
        .unwrap_err();
    match &err {
        ProvisionError::InviteFailed { cluster_id, .. } => assert_eq!(cluster_id, "engine-42"),
        other => panic!("expected InviteFailed, got {other:?}"),
    }
    assert!(err.hint().unwrap().contains("galley worker invite"));

    assert!(harness.journal.contains("start_service:controller"));
    assert!(!harness.env().join_progress_path().exists());
    let config = AgentConfig::load(&harness.env().config_path).unwrap();
    assert_eq!(config.vessel_engine_id.as_deref(), Some("engine-42"));
}
