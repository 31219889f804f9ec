//! 리로드 컨트롤러 -- 쓰기, 검사, 적용/롤백 상태 머신
//!
//! [`ReloadController`]는 규칙 변경이 라이브 Nginx 에 도달하는 유일한 경로입니다.
//! 모든 변경 작업은 하나의 락으로 직렬화되며, 테스트를 통과한 설정만 reload 됩니다.
//!
//! # 상태 전이
//! ```text
//! Idle ──▶ Writing ──▶ Testing ──┬──▶ Applying ─────▶ Idle
//!                                └──▶ RollingBack ──▶ Idle
//! ```
//!
//! 현재 상태는 `tokio::sync::watch` 채널로 공개되며, 작업이 어떻게 끝나든
//! (에러, panic 포함) `Idle` 로 돌아갑니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use dockgate_core::metrics as m;

use crate::config::NginxManagerConfig;
use crate::error::NginxManagerError;
use crate::gate::{TIMEOUT_MESSAGE, ValidationGate};
use crate::generator::{GeneratorOptions, generate_with};
use crate::process::{CommandNginx, NginxProcess};
use crate::rule::Rule;
use crate::store::{ConfigStore, StoredConfig};

/// 컨트롤러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadState {
    /// 진행 중인 작업 없음
    Idle,
    /// 규칙 파일 쓰기/삭제 중
    Writing,
    /// `nginx -t` 실행 중
    Testing,
    /// reload 중
    Applying,
    /// 스냅샷 복원 중
    RollingBack,
}

impl ReloadState {
    /// 상태명
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Writing => "writing",
            Self::Testing => "testing",
            Self::Applying => "applying",
            Self::RollingBack => "rolling_back",
        }
    }
}

/// Nginx 상태 조회 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxStatus {
    /// `nginx -v` 실행 성공 여부
    pub reachable: bool,
    /// 파싱된 버전
    pub version: Option<semver::Version>,
    /// 원문 출력 (또는 실패 사유)
    pub raw: String,
}

/// `sync` 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// 새로 쓰거나 변경된 규칙 ID
    pub written: Vec<String>,
    /// 삭제된 규칙 ID (알 수 없거나 비활성화된 규칙)
    pub removed: Vec<String>,
    /// 내용이 같아 건드리지 않은 규칙 ID
    pub unchanged: Vec<String>,
    /// reload 수행 여부
    pub reloaded: bool,
}

impl SyncReport {
    /// 변경이 있었는지 여부
    pub fn has_changes(&self) -> bool {
        !self.written.is_empty() || !self.removed.is_empty()
    }
}

type Snapshot = (String, Option<StoredConfig>);

/// 작업이 끝나면 상태를 `Idle` 로 되돌리는 가드
struct StateGuard<'a> {
    tx: &'a watch::Sender<ReloadState>,
}

impl<'a> StateGuard<'a> {
    fn enter(tx: &'a watch::Sender<ReloadState>, state: ReloadState) -> Self {
        tx.send_replace(state);
        Self { tx }
    }

    fn set(&self, state: ReloadState) {
        debug!(state = state.as_str(), "reload state changed");
        self.tx.send_replace(state);
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.tx.send_replace(ReloadState::Idle);
    }
}

/// 리로드 컨트롤러
///
/// # 사용 예시
/// ```ignore
/// use dockgate_nginx::{NginxManagerConfig, ReloadController};
///
/// let controller = ReloadController::from_config(NginxManagerConfig::default())?;
/// controller.bootstrap().await?;
/// let applied = controller.apply(rule).await?;
/// ```
pub struct ReloadController<N: NginxProcess> {
    config: NginxManagerConfig,
    options: GeneratorOptions,
    store: ConfigStore,
    process: Arc<N>,
    gate: ValidationGate<N>,
    /// 쓰기-검사-적용 직렬화
    lock: Mutex<()>,
    state_tx: watch::Sender<ReloadState>,
    /// 성공한 변경 작업 수
    applies: AtomicU64,
    /// 롤백 수
    rollbacks: AtomicU64,
    /// 실패한 변경 작업 수
    failures: AtomicU64,
}

impl ReloadController<CommandNginx> {
    /// 실제 nginx 바이너리를 사용하는 컨트롤러를 생성합니다.
    pub fn from_config(config: NginxManagerConfig) -> Result<Self, NginxManagerError> {
        let process = Arc::new(CommandNginx::new(&config));
        Self::new(config, process)
    }
}

impl<N: NginxProcess> ReloadController<N> {
    /// 주어진 프로세스 구현으로 컨트롤러를 생성합니다.
    pub fn new(config: NginxManagerConfig, process: Arc<N>) -> Result<Self, NginxManagerError> {
        config.validate()?;
        let (state_tx, _) = watch::channel(ReloadState::Idle);
        Ok(Self {
            options: config.generator_options(),
            store: ConfigStore::new(&config),
            gate: ValidationGate::new(Arc::clone(&process), config.test_timeout()),
            process,
            config,
            lock: Mutex::new(()),
            state_tx,
            applies: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// 현재 상태
    pub fn state(&self) -> ReloadState {
        *self.state_tx.borrow()
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<ReloadState> {
        self.state_tx.subscribe()
    }

    /// 설정 저장소
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// 생성기 옵션 (메인 설정의 공유 zone 과 일치)
    pub fn generator_options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// 성공한 변경 작업 수를 반환합니다.
    pub fn applies(&self) -> u64 {
        self.applies.load(Ordering::Relaxed)
    }

    /// 롤백 수를 반환합니다.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// 실패한 변경 작업 수를 반환합니다.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// 디렉토리와 메인 설정을 준비합니다. 메인 설정을 새로 썼으면 `true`.
    pub async fn bootstrap(&self) -> Result<bool, NginxManagerError> {
        let _lock = self.lock.lock().await;
        self.store.bootstrap().await
    }

    /// 규칙을 안전하게 적용합니다.
    ///
    /// 검증과 렌더링은 락 밖에서, 파일 I/O 이전에 수행됩니다.
    /// 비활성 규칙은 삭제 흐름으로 보내고 그대로 반환합니다.
    ///
    /// # Errors
    /// - `Validation` / `Compile`: 아무것도 변경되지 않음
    /// - `TestFailed`: 이전 파일로 복원됨, reload 호출 없음
    /// - `ApplyFailed`: 테스트는 통과했지만 reload 실패
    /// - `RollbackFailed`: 복원 자체가 실패함
    pub async fn apply(&self, rule: Rule) -> Result<Rule, NginxManagerError> {
        rule.validate()?;

        if !rule.enabled {
            info!(rule_id = %rule.id, "rule disabled, removing from active configuration");
            self.remove(&rule.id).await?;
            return Ok(rule);
        }

        let text = generate_with(&rule, &self.options)?;

        let _lock = self.lock.lock().await;
        let result = self.apply_locked(&rule, &text).await;
        self.record("apply", result.is_ok()).await;
        result.map(|()| rule)
    }

    async fn apply_locked(&self, rule: &Rule, text: &str) -> Result<(), NginxManagerError> {
        let state = StateGuard::enter(&self.state_tx, ReloadState::Writing);

        let snapshot = self.store.read(&rule.id).await?;
        let snapshots = vec![(rule.id.clone(), snapshot)];
        if let Err(e) = self.store.write(&rule.id, rule.context(), text).await {
            state.set(ReloadState::RollingBack);
            self.restore_all(&snapshots, &e.to_string()).await?;
            return Err(e);
        }

        state.set(ReloadState::Testing);
        let outcome = self.gate.validate().await;
        if !outcome.ok {
            state.set(ReloadState::RollingBack);
            let err = NginxManagerError::TestFailed {
                message: outcome.message,
            };
            self.restore_all(&snapshots, &err.to_string()).await?;
            warn!(rule_id = %rule.id, "rule rejected by nginx, previous configuration restored");
            return Err(err);
        }

        state.set(ReloadState::Applying);
        if let Err(err) = self.reload().await {
            if self.config.rollback_on_apply_failure {
                state.set(ReloadState::RollingBack);
                self.restore_all(&snapshots, &err.to_string()).await?;
            }
            return Err(err);
        }

        info!(rule_id = %rule.id, context = %rule.context(), "rule applied");
        Ok(())
    }

    /// 규칙을 안전하게 삭제합니다.
    ///
    /// 파일이 없으면 프로세스 호출 없이 `Ok(false)`.
    /// 삭제 후 테스트가 실패하면 파일을 되살리지 않고 `TestFailed` 를 반환합니다.
    pub async fn remove(&self, rule_id: &str) -> Result<bool, NginxManagerError> {
        let _lock = self.lock.lock().await;
        let result = self.remove_locked(rule_id).await;
        if !matches!(result, Ok(false)) {
            self.record("remove", result.is_ok()).await;
        }
        result
    }

    async fn remove_locked(&self, rule_id: &str) -> Result<bool, NginxManagerError> {
        let state = StateGuard::enter(&self.state_tx, ReloadState::Writing);

        if !self.store.remove(rule_id).await? {
            debug!(rule_id, "no configuration for rule, nothing to remove");
            return Ok(false);
        }

        state.set(ReloadState::Testing);
        let outcome = self.gate.validate().await;
        if !outcome.ok {
            error!(rule_id, "configuration invalid after rule removal");
            return Err(NginxManagerError::TestFailed {
                message: outcome.message,
            });
        }

        state.set(ReloadState::Applying);
        self.reload().await?;
        info!(rule_id, "rule removed");
        Ok(true)
    }

    /// 활성 설정을 주어진 규칙 집합과 일치시킵니다.
    ///
    /// 모든 규칙을 먼저 검증/렌더링한 뒤 한 번의 락 안에서 쓰기, 한 번의 테스트,
    /// 한 번의 reload 를 수행합니다. 테스트가 실패하면 건드린 파일을 모두 복원합니다.
    /// 변경이 없으면 테스트와 reload 를 생략합니다.
    pub async fn sync(&self, rules: &[Rule]) -> Result<SyncReport, NginxManagerError> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(NginxManagerError::validation(
                    &rule.id,
                    "id",
                    "duplicate id in rule set",
                ));
            }
            rule.validate()?;
        }

        let mut desired = Vec::new();
        for rule in rules.iter().filter(|r| r.enabled) {
            let text = generate_with(rule, &self.options)?;
            desired.push((rule, StoredConfig {
                context: rule.context(),
                text,
            }));
        }

        let _lock = self.lock.lock().await;
        let result = self.sync_locked(&desired).await;
        if !matches!(&result, Ok(report) if !report.has_changes()) {
            self.record("sync", result.is_ok()).await;
        }
        result
    }

    async fn sync_locked(
        &self,
        desired: &[(&Rule, StoredConfig)],
    ) -> Result<SyncReport, NginxManagerError> {
        let state = StateGuard::enter(&self.state_tx, ReloadState::Writing);
        let mut report = SyncReport::default();
        let mut snapshots: Vec<Snapshot> = Vec::new();

        if let Err(e) = self
            .write_desired(desired, &mut report, &mut snapshots)
            .await
        {
            state.set(ReloadState::RollingBack);
            self.restore_all(&snapshots, &e.to_string()).await?;
            return Err(e);
        }

        if !report.has_changes() {
            debug!(rules = desired.len(), "active configuration already in sync");
            return Ok(report);
        }

        state.set(ReloadState::Testing);
        let outcome = self.gate.validate().await;
        if !outcome.ok {
            state.set(ReloadState::RollingBack);
            let err = NginxManagerError::TestFailed {
                message: outcome.message,
            };
            self.restore_all(&snapshots, &err.to_string()).await?;
            return Err(err);
        }

        state.set(ReloadState::Applying);
        if let Err(err) = self.reload().await {
            if self.config.rollback_on_apply_failure {
                state.set(ReloadState::RollingBack);
                self.restore_all(&snapshots, &err.to_string()).await?;
            }
            return Err(err);
        }
        report.reloaded = true;

        info!(
            written = report.written.len(),
            removed = report.removed.len(),
            unchanged = report.unchanged.len(),
            "active configuration synchronized"
        );
        Ok(report)
    }

    async fn write_desired(
        &self,
        desired: &[(&Rule, StoredConfig)],
        report: &mut SyncReport,
        snapshots: &mut Vec<Snapshot>,
    ) -> Result<(), NginxManagerError> {
        let mut keep = HashSet::with_capacity(desired.len());

        for (rule, stored) in desired {
            keep.insert(rule.id.as_str());
            let current = self.store.read(&rule.id).await?;
            if current.as_ref() == Some(stored) {
                report.unchanged.push(rule.id.clone());
                continue;
            }
            snapshots.push((rule.id.clone(), current));
            self.store
                .write(&rule.id, stored.context, &stored.text)
                .await?;
            report.written.push(rule.id.clone());
        }

        for id in self.store.list().await? {
            if keep.contains(id.as_str()) {
                continue;
            }
            let current = self.store.read(&id).await?;
            snapshots.push((id.clone(), current));
            self.store.remove(&id).await?;
            report.removed.push(id);
        }

        Ok(())
    }

    /// Nginx 도달 가능 여부와 버전을 조회합니다. 락을 잡지 않습니다.
    pub async fn status(&self) -> NginxStatus {
        match tokio::time::timeout(self.config.test_timeout(), self.process.version()).await {
            Ok(Ok(output)) => {
                let raw = output.diagnostic().to_owned();
                NginxStatus {
                    reachable: output.success,
                    version: parse_nginx_version(&raw),
                    raw,
                }
            }
            Ok(Err(e)) => NginxStatus {
                reachable: false,
                version: None,
                raw: e.to_string(),
            },
            Err(_elapsed) => NginxStatus {
                reachable: false,
                version: None,
                raw: TIMEOUT_MESSAGE.to_owned(),
            },
        }
    }

    async fn reload(&self) -> Result<(), NginxManagerError> {
        let message =
            match tokio::time::timeout(self.config.reload_timeout(), self.process.reload()).await {
                Ok(Ok(output)) if output.success => return Ok(()),
                Ok(Ok(output)) => output.diagnostic().to_owned(),
                Ok(Err(e)) => e.to_string(),
                Err(_elapsed) => TIMEOUT_MESSAGE.to_owned(),
            };

        metrics::counter!(m::NGINX_RELOAD_FAILURES_TOTAL).increment(1);
        error!(message = %message, "nginx reload failed after a passing configuration test");
        Err(NginxManagerError::ApplyFailed { message })
    }

    async fn restore_all(
        &self,
        snapshots: &[Snapshot],
        cause: &str,
    ) -> Result<(), NginxManagerError> {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::NGINX_ROLLBACKS_TOTAL).increment(1);

        let mut failed = Vec::new();
        for (id, snapshot) in snapshots.iter().rev() {
            if let Err(e) = self.store.restore(id, snapshot.as_ref()).await {
                failed.push(format!("{id}: {e}"));
            }
        }

        if failed.is_empty() {
            debug!(files = snapshots.len(), "rollback complete");
            Ok(())
        } else {
            let reason = failed.join("; ");
            error!(cause, reason = %reason, "rollback failed, active directory may be inconsistent");
            Err(NginxManagerError::RollbackFailed {
                cause: cause.to_owned(),
                reason,
            })
        }
    }

    async fn record(&self, operation: &'static str, ok: bool) {
        let result = if ok { "success" } else { "failure" };
        metrics::counter!(
            m::NGINX_OPERATIONS_TOTAL,
            m::LABEL_OPERATION => operation,
            m::LABEL_RESULT => result
        )
        .increment(1);

        if ok {
            self.applies.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        match self.store.list().await {
            Ok(ids) => {
                #[allow(clippy::cast_precision_loss)]
                metrics::gauge!(m::NGINX_ACTIVE_RULES).set(ids.len() as f64);
            }
            Err(e) => debug!(error = %e, "failed to count active rules"),
        }
    }
}

/// `nginx version: nginx/1.25.3` 형태의 출력에서 버전을 파싱합니다.
pub fn parse_nginx_version(raw: &str) -> Option<semver::Version> {
    let start = raw.find('/')? + 1;
    let token = raw[start..].split_whitespace().next()?;
    semver::Version::parse(token).ok()
}
