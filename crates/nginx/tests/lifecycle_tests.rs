//! 통합 테스트 -- 규칙 적용 생명주기 검증
//!
//! Rule 제출 → 설정 생성 → 파일 쓰기 → `nginx -t` → reload/롤백
//! 시나리오를 실제 파일시스템(임시 디렉토리)과 테스트용 nginx 프로세스로 검증합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dockgate_core::error::{DockgateError, NginxError};
use dockgate_nginx::{
    NginxManagerConfig, NginxManagerConfigBuilder, NginxManagerError, Protocol, RateLimit,
    ReloadController, ReloadState, Rule, generate, generate_with, load_rules_from_dir,
};

// Test nginx process that inspects the active directory like `nginx -t` would
mod mock {
    use super::*;
    use dockgate_nginx::{NginxProcess, ProcessOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    pub struct TestNginx {
        active_dir: PathBuf,
        reject_containing: Arc<Mutex<Option<String>>>,
        fail_reload: Arc<Mutex<bool>>,
        test_delay: Arc<Mutex<Duration>>,
        tests: AtomicUsize,
        reloads: AtomicUsize,
        in_flight: AtomicUsize,
        overlaps: AtomicUsize,
    }

    impl TestNginx {
        pub fn new(active_dir: &Path) -> Self {
            Self {
                active_dir: active_dir.to_path_buf(),
                reject_containing: Arc::new(Mutex::new(None)),
                fail_reload: Arc::new(Mutex::new(false)),
                test_delay: Arc::new(Mutex::new(Duration::ZERO)),
                tests: AtomicUsize::new(0),
                reloads: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                overlaps: AtomicUsize::new(0),
            }
        }

        /// 활성 설정에 이 문자열이 있으면 테스트 실패
        pub async fn reject_containing(&self, needle: &str) {
            *self.reject_containing.lock().await = Some(needle.to_owned());
        }

        pub async fn accept_all(&self) {
            *self.reject_containing.lock().await = None;
        }

        pub async fn set_fail_reload(&self, fail: bool) {
            *self.fail_reload.lock().await = fail;
        }

        pub async fn set_test_delay(&self, delay: Duration) {
            *self.test_delay.lock().await = delay;
        }

        pub fn tests(&self) -> usize {
            self.tests.load(Ordering::SeqCst)
        }

        pub fn reloads(&self) -> usize {
            self.reloads.load(Ordering::SeqCst)
        }

        pub fn overlaps(&self) -> usize {
            self.overlaps.load(Ordering::SeqCst)
        }

        fn scan(&self, needle: &str) -> Option<PathBuf> {
            for dir in [self.active_dir.clone(), self.active_dir.join("stream")] {
                let Ok(entries) = std::fs::read_dir(&dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().is_some_and(|e| e == "conf")
                        && std::fs::read_to_string(&path)
                            .map(|t| t.contains(needle))
                            .unwrap_or(false)
                    {
                        return Some(path);
                    }
                }
            }
            None
        }
    }

    impl NginxProcess for TestNginx {
        async fn test_config(&self) -> Result<ProcessOutput, NginxManagerError> {
            self.tests.fetch_add(1, Ordering::SeqCst);
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }

            let delay = *self.test_delay.lock().await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let needle = self.reject_containing.lock().await.clone();
            let result = match needle.and_then(|n| self.scan(&n).map(|p| (n, p))) {
                Some((needle, path)) => ProcessOutput::failure(
                    1,
                    format!(
                        "nginx: [emerg] host not found in \"{needle}\" in {}:3\n\
                         nginx: configuration file nginx.conf test failed\n",
                        path.display()
                    ),
                ),
                None => ProcessOutput::success(
                    "nginx: the configuration file nginx.conf syntax is ok\n\
                     nginx: configuration file nginx.conf test is successful\n",
                ),
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(result)
        }

        async fn reload(&self) -> Result<ProcessOutput, NginxManagerError> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            if *self.fail_reload.lock().await {
                return Ok(ProcessOutput::failure(
                    1,
                    "nginx: [error] open() \"/run/nginx.pid\" failed (2: No such file or directory)",
                ));
            }
            Ok(ProcessOutput::success(""))
        }

        async fn version(&self) -> Result<ProcessOutput, NginxManagerError> {
            Ok(ProcessOutput::success("nginx version: nginx/1.27.1"))
        }
    }
}

use mock::TestNginx;

struct Harness {
    _dir: tempfile::TempDir,
    root: PathBuf,
    nginx: Arc<TestNginx>,
    controller: Arc<ReloadController<TestNginx>>,
}

fn config_for(root: &Path) -> NginxManagerConfig {
    NginxManagerConfigBuilder::new()
        .main_config(root.join("nginx.conf"))
        .active_dir(root.join("conf.d"))
        .templates_dir(root.join("templates"))
        .cache_dir(root.join("cache"))
        .test_timeout_secs(2)
        .build()
        .unwrap()
}

async fn harness_with(config: impl FnOnce(&Path) -> NginxManagerConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let config = config(&root);
    let nginx = Arc::new(TestNginx::new(&config.active_dir));
    let controller = ReloadController::new(config, Arc::clone(&nginx)).unwrap();
    controller.bootstrap().await.unwrap();
    Harness {
        _dir: dir,
        root,
        nginx,
        controller: Arc::new(controller),
    }
}

async fn harness() -> Harness {
    harness_with(config_for).await
}

fn api_rule() -> Rule {
    Rule {
        name: "Public API".to_owned(),
        domain: "example.com".to_owned(),
        source_path: "/api".to_owned(),
        target_container: "api-service".to_owned(),
        target_port: 8080,
        ..Rule::with_id("api")
    }
}

fn snapshot_dir(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for sub in [dir.to_path_buf(), dir.join("stream")] {
        let Ok(entries) = std::fs::read_dir(&sub) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                files.push((
                    path.display().to_string(),
                    std::fs::read(&path).unwrap(),
                ));
            }
        }
    }
    files.sort();
    files
}

#[tokio::test]
async fn scenario_a_rendered_file_contains_host_and_target() {
    let h = harness().await;
    h.controller.apply(api_rule()).await.unwrap();

    let text = std::fs::read_to_string(h.root.join("conf.d/api.conf")).unwrap();
    assert!(text.contains("server_name example.com;"));
    assert!(text.contains("proxy_pass http://api-service:8080;"));
    assert_eq!(h.nginx.reloads(), 1);
}

#[tokio::test]
async fn scenario_b_rate_limit_uses_zone_declared_in_main_config() {
    let h = harness().await;
    let mut rule = api_rule();
    rule.advanced_config = Some(dockgate_nginx::AdvancedConfig {
        rate_limit: Some(RateLimit {
            enabled: true,
            requests_per_second: 10,
            burst_size: 10,
            nodelay: true,
            per_ip: true,
        }),
        ..Default::default()
    });
    h.controller.apply(rule).await.unwrap();

    let text = std::fs::read_to_string(h.root.join("conf.d/api.conf")).unwrap();
    assert!(text.contains("limit_req zone=one burst=10 nodelay;"));

    let main = std::fs::read_to_string(h.root.join("nginx.conf")).unwrap();
    assert!(main.contains("zone=one:10m"));
}

#[tokio::test]
async fn scenario_rules_submitted_as_json_use_field_defaults() {
    let h = harness().await;

    // domain 없이 source_host 만 지정
    let host_only: Rule = serde_json::from_str(
        r#"{
  "id": "api",
  "protocol": "HTTP",
  "source_host": "example.com",
  "source_path": "/api",
  "target_container": "api-service",
  "target_port": 8080
}"#,
    )
    .unwrap();
    h.controller.apply(host_only).await.unwrap();

    let text = std::fs::read_to_string(h.root.join("conf.d/api.conf")).unwrap();
    assert!(text.contains("server_name example.com;"), "{text}");
    assert!(text.contains("proxy_pass http://api-service:8080;"), "{text}");

    // per_ip 생략 시 클라이언트별 공유 zone 사용
    let rate_limited: Rule = serde_json::from_str(
        r#"{
  "id": "limited",
  "protocol": "HTTP",
  "source_host": "example.com",
  "source_path": "/limited",
  "target_container": "api-service",
  "target_port": 8080,
  "advanced_config": {
    "rate_limit": {
      "enabled": true,
      "requests_per_second": 10,
      "burst_size": 10,
      "nodelay": true
    }
  }
}"#,
    )
    .unwrap();
    h.controller.apply(rate_limited).await.unwrap();

    let text = std::fs::read_to_string(h.root.join("conf.d/limited.conf")).unwrap();
    assert!(text.contains("limit_req zone=one burst=10 nodelay;"), "{text}");
    assert!(!text.contains("limit_req_zone"), "{text}");
    assert_eq!(h.nginx.reloads(), 2);
}

#[tokio::test]
async fn scenario_c_failing_test_on_create_leaves_active_dir_unchanged() {
    let h = harness().await;
    let before = snapshot_dir(&h.root.join("conf.d"));
    h.nginx.reject_containing("api-service").await;

    let err = h.controller.apply(api_rule()).await.unwrap_err();

    match &err {
        NginxManagerError::TestFailed { message } => {
            assert!(message.contains("host not found"), "{message}");
        }
        other => panic!("expected TestFailed, got {other:?}"),
    }
    assert!(err.is_rejection());
    assert_eq!(h.nginx.reloads(), 0);
    assert_eq!(snapshot_dir(&h.root.join("conf.d")), before);
    assert_eq!(h.controller.state(), ReloadState::Idle);
}

#[tokio::test]
async fn scenario_d_update_domain_reloads_once_with_generated_text() {
    let h = harness().await;
    h.controller.apply(api_rule()).await.unwrap();
    let reloads_before = h.nginx.reloads();

    let mut updated = api_rule();
    updated.domain = "api.example.org".to_owned();
    h.controller.apply(updated.clone()).await.unwrap();

    assert_eq!(h.nginx.reloads() - reloads_before, 1);
    let on_disk = std::fs::read_to_string(h.root.join("conf.d/api.conf")).unwrap();
    assert_eq!(on_disk, generate(&updated).unwrap());
}

#[tokio::test]
async fn failed_update_leaves_file_byte_identical() {
    let h = harness().await;
    h.controller.apply(api_rule()).await.unwrap();
    let before = std::fs::read(h.root.join("conf.d/api.conf")).unwrap();

    h.nginx.reject_containing("broken-backend").await;
    let mut updated = api_rule();
    updated.target_container = "broken-backend".to_owned();
    assert!(h.controller.apply(updated).await.is_err());

    let after = std::fs::read(h.root.join("conf.d/api.conf")).unwrap();
    assert_eq!(before, after);
    assert_eq!(h.nginx.reloads(), 1);
    assert_eq!(h.controller.rollbacks(), 1);
}

#[tokio::test]
async fn delete_absent_rule_is_silent() {
    let h = harness().await;

    assert!(!h.controller.remove("never-created").await.unwrap());
    assert_eq!(h.nginx.tests(), 0);
    assert_eq!(h.nginx.reloads(), 0);
}

#[tokio::test]
async fn delete_existing_rule_reloads() {
    let h = harness().await;
    h.controller.apply(api_rule()).await.unwrap();

    assert!(h.controller.remove("api").await.unwrap());
    assert!(!h.root.join("conf.d/api.conf").exists());
    assert_eq!(h.nginx.reloads(), 2);
}

#[tokio::test]
async fn reload_failure_surfaces_apply_failed() {
    let h = harness().await;
    h.nginx.set_fail_reload(true).await;

    let err = h.controller.apply(api_rule()).await.unwrap_err();
    assert!(matches!(&err, NginxManagerError::ApplyFailed { message } if message.contains("nginx.pid")));
    assert!(!err.is_rejection());
    // default policy restores the previous state on any failure after the write
    assert!(!h.root.join("conf.d/api.conf").exists());
}

#[tokio::test]
async fn reload_failure_keeps_file_when_configured() {
    let h = harness_with(|root| {
        let mut config = config_for(root);
        config.rollback_on_apply_failure = false;
        config
    })
    .await;
    h.nginx.set_fail_reload(true).await;

    assert!(h.controller.apply(api_rule()).await.is_err());
    assert!(h.root.join("conf.d/api.conf").exists());
}

#[tokio::test]
async fn concurrent_applies_are_serialized() {
    let h = harness().await;
    h.nginx.set_test_delay(Duration::from_millis(30)).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let controller = Arc::clone(&h.controller);
        handles.push(tokio::spawn(async move {
            let rule = Rule {
                target_container: format!("svc-{i}"),
                target_port: 8000 + i,
                ..Rule::with_id(format!("svc-{i}"))
            };
            controller.apply(rule).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.nginx.overlaps(), 0);
    assert_eq!(h.nginx.tests(), 8);
    assert_eq!(h.nginx.reloads(), 8);
    assert_eq!(h.controller.store().list().await.unwrap().len(), 8);
}

#[tokio::test]
async fn slow_test_times_out_and_rolls_back() {
    let h = harness_with(|root| {
        let mut config = config_for(root);
        config.test_timeout_secs = 1;
        config
    })
    .await;
    h.nginx.set_test_delay(Duration::from_secs(3)).await;

    let err = h.controller.apply(api_rule()).await.unwrap_err();
    assert!(matches!(&err, NginxManagerError::TestFailed { message } if message == "timeout"));
    assert!(!h.root.join("conf.d/api.conf").exists());
    assert_eq!(h.nginx.reloads(), 0);
}

#[tokio::test]
async fn http_and_tcp_rules_live_in_separate_contexts() {
    let h = harness().await;
    let db = Rule {
        name: "Postgres".to_owned(),
        protocol: Protocol::Tcp,
        source_host: "0.0.0.0".to_owned(),
        target_container: "postgres".to_owned(),
        target_port: 5432,
        ..Rule::with_id("db")
    };

    h.controller.apply(api_rule()).await.unwrap();
    h.controller.apply(db.clone()).await.unwrap();

    assert!(h.root.join("conf.d/api.conf").is_file());
    let stream = std::fs::read_to_string(h.root.join("conf.d/stream/db.conf")).unwrap();
    assert_eq!(stream, generate(&db).unwrap());
    assert_eq!(
        h.controller.store().list().await.unwrap(),
        vec!["api", "db"]
    );
}

#[tokio::test]
async fn sync_from_rule_directory() {
    let h = harness().await;
    h.controller
        .apply(Rule {
            target_container: "legacy".to_owned(),
            target_port: 3000,
            ..Rule::with_id("legacy")
        })
        .await
        .unwrap();

    let rules_dir = h.root.join("rules");
    std::fs::create_dir_all(&rules_dir).unwrap();
    std::fs::write(
        rules_dir.join("api.toml"),
        r#"
id = "api"
name = "Public API"
domain = "example.com"
source_path = "/api"
target_container = "api-service"
target_port = 8080
"#,
    )
    .unwrap();
    std::fs::write(
        rules_dir.join("off.json"),
        r#"{"id": "off", "enabled": false, "target_container": "x", "target_port": 1}"#,
    )
    .unwrap();

    let rules = load_rules_from_dir(&rules_dir).unwrap();
    let report = h.controller.sync(&rules).await.unwrap();

    assert_eq!(report.written, vec!["api"]);
    assert_eq!(report.removed, vec!["legacy"]);
    assert!(report.reloaded);
    assert_eq!(h.controller.store().list().await.unwrap(), vec!["api"]);

    let options = h.controller.generator_options().clone();
    let on_disk = std::fs::read_to_string(h.root.join("conf.d/api.conf")).unwrap();
    assert_eq!(on_disk, generate_with(&rules[0], &options).unwrap());
}

#[tokio::test]
async fn status_reports_version() {
    let h = harness().await;
    let status = h.controller.status().await;
    assert!(status.reachable);
    assert_eq!(status.version, Some(semver::Version::new(1, 27, 1)));
}

#[tokio::test]
async fn errors_convert_into_core_error() {
    async fn apply_via_core(
        controller: &ReloadController<TestNginx>,
        rule: Rule,
    ) -> Result<Rule, DockgateError> {
        Ok(controller.apply(rule).await?)
    }

    let h = harness().await;
    h.nginx.reject_containing("api-service").await;
    let err = apply_via_core(&h.controller, api_rule()).await.unwrap_err();
    assert!(matches!(err, DockgateError::Nginx(NginxError::TestFailed(_))));

    h.nginx.accept_all().await;
    apply_via_core(&h.controller, api_rule()).await.unwrap();
}
