//! End-to-end job lifecycle through the orchestrator.

use async_trait::async_trait;
use reconflow_core::{
    JobId, JobStatus, ScanType, ScriptsConfig, SettingsProvider, SourcesConfig, StaticSettings,
    TargetId,
};
use reconflow_db::{targets, Database, Job};
use reconflow_engine::{AdapterRegistry, EngineError, ReconOrchestrator};
use reconflow_events::{
    BusEvent, ProgressBus, ProgressKind, ProgressPayload, ScopeKey, Subscription,
};
use reconflow_scripts::{ScriptAdapter, ScriptRunner};
use reconflow_sources::providers::{HackerTargetAdapter, WhoisAdapter};
use reconflow_sources::{build_http_client, JobContext, ScanOutcome, SourceAdapter};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    engine: ReconOrchestrator,
    db: Database,
    runner: Arc<ScriptRunner>,
    _dir: TempDir,
}

impl Harness {
    async fn new(configure: impl FnOnce(&mut AdapterRegistry, &Arc<ScriptRunner>)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let runner = Arc::new(ScriptRunner::new(scripts_config(dir.path())));
        let mut registry = AdapterRegistry::new();
        configure(&mut registry, &runner);

        let db = Database::in_memory().await.expect("db");
        let engine = ReconOrchestrator::new(
            db.clone(),
            Arc::new(ProgressBus::new(64)),
            Arc::new(registry),
            Arc::clone(&runner),
        );
        Self {
            engine,
            db,
            runner,
            _dir: dir,
        }
    }

    async fn target(&self, domain: &str) -> TargetId {
        targets::create_target(self.db.pool(), domain, None, None)
            .await
            .expect("target")
            .id
    }

    async fn install_script(&self, name: &str, body: &str) {
        let dir = &self.runner.config().script_dir;
        tokio::fs::create_dir_all(dir).await.expect("mkdir");
        tokio::fs::write(dir.join(name), body).await.expect("write script");
    }

    async fn wait_terminal(&self, job_id: &JobId) -> Job {
        tokio::time::timeout(WAIT, async {
            loop {
                let job = self.engine.get_job_status(job_id).await.expect("job");
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job reaches a terminal state")
    }
}

fn scripts_config(root: &Path) -> ScriptsConfig {
    ScriptsConfig {
        script_dir: root.join("scripts"),
        interpreter: "sh".to_string(),
        log_dir: root.join("outputs"),
        targets_dir: root.join("targets"),
        kill_grace_secs: 2,
    }
}

/// Progress events up to and including the terminal one.
async fn collect_until_terminal(sub: &mut Subscription) -> Vec<(ProgressKind, ProgressPayload)> {
    tokio::time::timeout(WAIT, async {
        let mut events = Vec::new();
        while let Some(event) = sub.recv().await {
            if let BusEvent::Progress(progress) = event {
                let terminal = progress.is_terminal();
                events.push((progress.kind, progress.payload));
                if terminal {
                    break;
                }
            }
        }
        events
    })
    .await
    .expect("terminal event")
}

fn http_client() -> reqwest::Client {
    build_http_client(&SourcesConfig::default()).expect("client")
}

fn no_settings() -> Arc<dyn SettingsProvider> {
    Arc::new(StaticSettings::new())
}

/// Sleeps far longer than any test waits.
struct StallingAdapter;

#[async_trait]
impl SourceAdapter for StallingAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::Shodan
    }

    async fn run(&self, _ctx: &JobContext) -> reconflow_sources::Result<ScanOutcome> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        ScanOutcome::from_result(&json!({}))
    }
}

struct PanickingAdapter;

#[async_trait]
impl SourceAdapter for PanickingAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::Hunter
    }

    async fn run(&self, ctx: &JobContext) -> reconflow_sources::Result<ScanOutcome> {
        ctx.update("about to fail");
        panic!("adapter bug");
    }
}

#[tokio::test]
async fn test_start_scan_unknown_target_creates_no_job() {
    let harness = Harness::new(|registry, _| {
        registry.register(Arc::new(StallingAdapter));
    })
    .await;

    let err = harness
        .engine
        .start_scan(&TargetId::generate(), ScanType::Shodan)
        .await
        .expect_err("unknown target");
    assert!(matches!(err, EngineError::TargetNotFound(_)));
    assert!(err.is_not_found());
    assert!(harness.engine.list_jobs().await.expect("list").is_empty());
}

#[tokio::test]
async fn test_start_scan_unsupported_type_creates_no_job() {
    let harness = Harness::new(|_, _| {}).await;
    let target = harness.target("example.com").await;

    let err = harness
        .engine
        .start_scan(&target, ScanType::Censys)
        .await
        .expect_err("no adapter");
    assert!(matches!(err, EngineError::UnsupportedScan(ScanType::Censys)));
    assert!(harness.engine.list_jobs().await.expect("list").is_empty());
}

#[tokio::test]
async fn test_start_scan_returns_before_adapter_finishes() {
    let harness = Harness::new(|registry, _| {
        registry.register(Arc::new(StallingAdapter));
    })
    .await;
    let target = harness.target("example.com").await;
    let mut global = harness.engine.subscribe(ScopeKey::Global);

    let job_id = tokio::time::timeout(
        Duration::from_secs(2),
        harness.engine.start_scan(&target, ScanType::Shodan),
    )
    .await
    .expect("start_scan does not wait for the adapter")
    .expect("start");

    let job = harness.engine.get_job_status(&job_id).await.expect("job");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.target_id, target);
    assert!(job.completed_at.is_none());
    assert!(job.result.is_none());

    match global.try_recv().expect("running announced") {
        BusEvent::Status(change) => {
            assert_eq!(change.job_id, job_id);
            assert_eq!(change.status, JobStatus::Running);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_credential_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let harness = Harness::new(|registry, _| {
        registry.register(Arc::new(
            WhoisAdapter::new(http_client(), no_settings()).with_base_url(uri),
        ));
    })
    .await;
    let target = harness.target("example.com").await;

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::Whois)
        .await
        .expect("start");
    let job = harness.wait_terminal(&job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message().expect("error").contains("not configured"));
}

#[tokio::test]
async fn test_remote_error_fails_job_and_is_visible_after_error_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hostsearch/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = server.uri();
    let harness = Harness::new(|registry, _| {
        registry.register(Arc::new(
            HackerTargetAdapter::new(http_client(), no_settings()).with_base_url(uri),
        ));
    })
    .await;
    let target = harness.target("example.com").await;
    let mut sub = harness.engine.subscribe(ScopeKey::Target(target.clone()));

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::HackerTarget)
        .await
        .expect("start");
    let events = collect_until_terminal(&mut sub).await;

    let (kind, payload) = events.last().expect("terminal");
    assert_eq!(*kind, ProgressKind::Error);
    assert!(payload.text().expect("message").contains("500"));

    // The store write precedes the terminal event.
    let job = harness.engine.get_job_status(&job_id).await.expect("job");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message().expect("error").contains("500"));

    let again = harness.engine.get_job_status(&job_id).await.expect("job");
    assert_eq!(
        serde_json::to_string(&job.result).expect("json"),
        serde_json::to_string(&again.result).expect("json")
    );
}

#[tokio::test]
async fn test_script_output_streams_before_complete() {
    let harness = Harness::new(|registry, runner| {
        registry.register(Arc::new(
            ScriptAdapter::new(Arc::clone(runner), ScanType::Passive).expect("script scan"),
        ));
    })
    .await;
    harness.install_script("passive-recon.sh", "printf 'A\\nB\\n'\n").await;
    let target = harness.target("example.com").await;
    let mut sub = harness.engine.subscribe(ScopeKey::Target(target.clone()));

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::Passive)
        .await
        .expect("start");
    let events = collect_until_terminal(&mut sub).await;

    let kinds: Vec<ProgressKind> = events.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        [ProgressKind::Update, ProgressKind::Update, ProgressKind::Complete]
    );
    assert_eq!(events[0].1.text(), Some("A"));
    assert_eq!(events[1].1.text(), Some("B"));

    let job = harness.engine.get_job_status(&job_id).await.expect("job");
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.expect("result");
    assert_eq!(result["exitCode"], 0);
    assert_eq!(result["stdout"], "A\nB\n");

    let files = harness
        .engine
        .get_output_files("example.com", Some(&job_id))
        .await
        .expect("files");
    assert!(files.iter().any(|f| f.name == format!("{job_id}.log")));
}

#[tokio::test]
async fn test_script_nonzero_exit_fails_with_code() {
    let harness = Harness::new(|registry, runner| {
        registry.register(Arc::new(
            ScriptAdapter::new(Arc::clone(runner), ScanType::Active).expect("script scan"),
        ));
    })
    .await;
    harness
        .install_script("active-recon.sh", "echo 'masscan: permission denied' >&2\nexit 4\n")
        .await;
    let target = harness.target("example.com").await;

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::Active)
        .await
        .expect("start");
    let job = harness.wait_terminal(&job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error_message().expect("error");
    assert!(error.contains("code 4"));
    assert!(error.contains("masscan: permission denied"));
}

#[tokio::test]
async fn test_concurrent_scans_keep_their_targets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hostsearch/"))
        .and(query_param("q", "alpha.example"))
        .respond_with(ResponseTemplate::new(200).set_body_string("www.alpha.example,192.0.2.1\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hostsearch/"))
        .and(query_param("q", "beta.example"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let uri = server.uri();
    let harness = Harness::new(|registry, _| {
        registry.register(Arc::new(
            HackerTargetAdapter::new(http_client(), no_settings()).with_base_url(uri),
        ));
    })
    .await;
    let alpha = harness.target("alpha.example").await;
    let beta = harness.target("beta.example").await;

    let (alpha_job, beta_job) = tokio::join!(
        harness.engine.start_scan(&alpha, ScanType::HackerTarget),
        harness.engine.start_scan(&beta, ScanType::HackerTarget),
    );
    let alpha_job = harness.wait_terminal(&alpha_job.expect("alpha")).await;
    let beta_job = harness.wait_terminal(&beta_job.expect("beta")).await;

    assert_eq!(alpha_job.target_id, alpha);
    assert_eq!(alpha_job.status, JobStatus::Completed);
    assert_eq!(alpha_job.result.expect("result")["count"], 1);

    assert_eq!(beta_job.target_id, beta);
    assert_eq!(beta_job.status, JobStatus::Failed);
    assert!(beta_job.error_message().expect("error").contains("503"));

    let listed = harness
        .engine
        .list_jobs_for_target(&alpha)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(harness.engine.list_jobs().await.expect("list").len(), 2);
}

#[tokio::test]
async fn test_kill_job_after_exit_returns_false() {
    let harness = Harness::new(|registry, runner| {
        registry.register(Arc::new(
            ScriptAdapter::new(Arc::clone(runner), ScanType::QuickScan).expect("script scan"),
        ));
    })
    .await;
    harness.install_script("quick-vuln-scan.sh", "echo ok\n").await;
    let target = harness.target("example.com").await;

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::QuickScan)
        .await
        .expect("start");
    let job = harness.wait_terminal(&job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(!harness.engine.kill_job(&job_id));
}

#[tokio::test]
async fn test_kill_running_script_stops_output() {
    let harness = Harness::new(|registry, runner| {
        registry.register(Arc::new(
            ScriptAdapter::new(Arc::clone(runner), ScanType::Passive).expect("script scan"),
        ));
    })
    .await;
    harness.install_script("passive-recon.sh", "echo started\nsleep 30\necho finished\n").await;
    let target = harness.target("example.com").await;
    let mut sub = harness.engine.subscribe(ScopeKey::Target(target.clone()));

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::Passive)
        .await
        .expect("start");

    let first = tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("first line")
        .expect("event");
    assert_eq!(
        first.as_progress().and_then(|p| p.payload.text()),
        Some("started")
    );
    let info = harness.engine.process_info(&job_id).expect("live process");
    assert_eq!(info.domain, "example.com");
    assert_eq!(harness.engine.active_jobs(), vec![job_id.clone()]);

    assert!(harness.engine.kill_job(&job_id));

    let rest = collect_until_terminal(&mut sub).await;
    assert!(rest
        .iter()
        .all(|(kind, _)| *kind != ProgressKind::Update));
    assert_eq!(rest.last().map(|(kind, _)| *kind), Some(ProgressKind::Error));

    let job = harness.wait_terminal(&job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message(),
        Some("Script was terminated before completion")
    );
    assert!(!harness.engine.kill_job(&job_id));
    assert!(harness.engine.active_jobs().is_empty());
}

#[tokio::test]
async fn test_adapter_panic_fails_job() {
    let harness = Harness::new(|registry, _| {
        registry.register(Arc::new(PanickingAdapter));
    })
    .await;
    let target = harness.target("example.com").await;

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::Hunter)
        .await
        .expect("start");
    let job = harness.wait_terminal(&job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message(), Some("Scan task panicked: adapter bug"));
}

#[tokio::test]
async fn test_recon_results_for_target() {
    let harness = Harness::new(|registry, runner| {
        registry.register(Arc::new(
            ScriptAdapter::new(Arc::clone(runner), ScanType::Passive).expect("script scan"),
        ));
    })
    .await;
    harness
        .install_script("passive-recon.sh", "printf 'a.%s\\nb.%s\\n' \"$1\" \"$1\" > subdomains.txt\n")
        .await;
    let target = harness.target("example.com").await;

    let job_id = harness
        .engine
        .start_scan(&target, ScanType::Passive)
        .await
        .expect("start");
    harness.wait_terminal(&job_id).await;

    let results = harness.engine.get_recon_results(&target).await.expect("results");
    assert_eq!(results.subdomains, ["a.example.com", "b.example.com"]);
    assert!(results.live_hosts.is_empty());
    assert_eq!(results.summary.total_subdomains, 2);

    let err = harness
        .engine
        .get_recon_results(&TargetId::generate())
        .await
        .expect_err("unknown target");
    assert!(matches!(err, EngineError::TargetNotFound(_)));
}

#[tokio::test]
async fn test_get_job_status_unknown_job() {
    let harness = Harness::new(|_, _| {}).await;
    let err = harness
        .engine
        .get_job_status(&JobId::generate())
        .await
        .expect_err("unknown job");
    assert!(matches!(err, EngineError::JobNotFound(_)));
}
