//! Nginx 프로세스 추상화
//!
//! [`NginxProcess`] trait 은 `nginx -t`, `nginx -s reload`, `nginx -v` 호출을 추상화합니다.
//! 운영 환경에서는 [`CommandNginx`]가 `tokio::process`로 실제 바이너리를 실행하고,
//! 테스트에서는 결과를 스크립트로 지정하는 mock 을 사용합니다.
//!
//! ```text
//!   ReloadController ──▶ ValidationGate
//!          │                   │
//!          ▼                   ▼
//!      ┌────────────────────────────┐
//!      │   NginxProcess (trait)     │
//!      └────────────────────────────┘
//!            │              │
//!            ▼              ▼
//!     CommandNginx        Mock
//!            │
//!            ▼
//!  [prefix...] nginx -t -c <main>
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::NginxManagerConfig;
use crate::error::NginxManagerError;

/// 외부 명령 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// 종료 코드가 0 인지 여부
    pub success: bool,
    /// 종료 코드 (시그널로 종료되면 `None`)
    pub exit_code: Option<i32>,
    /// 표준 출력
    pub stdout: String,
    /// 표준 에러
    pub stderr: String,
}

impl ProcessOutput {
    /// 성공 결과 생성
    pub fn success(stderr: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// 실패 결과 생성
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// 진단 메시지: stderr 가 비어 있으면 stdout
    ///
    /// nginx 는 진단을 stderr 로 출력하므로 원문을 그대로 돌려줍니다.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim_end()
        } else {
            self.stderr.trim_end()
        }
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Nginx 프로세스 조작 trait
///
/// `Send + Sync + 'static` 이므로 `Arc` 로 감싸 비동기 태스크 간에 공유할 수 있습니다.
/// 구현체는 종료 코드를 에러로 바꾸지 않습니다. 실행 자체가 실패한 경우에만
/// `NginxManagerError::Process` 를 반환하고, 결과 해석은 호출자가 합니다.
pub trait NginxProcess: Send + Sync + 'static {
    /// 전체 설정을 검사합니다 (`nginx -t -c <main_config>`).
    fn test_config(&self) -> impl Future<Output = Result<ProcessOutput, NginxManagerError>> + Send;

    /// 실행 중인 프로세스에 reload 신호를 보냅니다 (`nginx -c <main_config> -s reload`).
    fn reload(&self) -> impl Future<Output = Result<ProcessOutput, NginxManagerError>> + Send;

    /// 버전 문자열을 조회합니다 (`nginx -v`).
    fn version(&self) -> impl Future<Output = Result<ProcessOutput, NginxManagerError>> + Send;
}

/// `tokio::process` 기반 Nginx 프로세스 구현
///
/// `command_prefix` 가 있으면 그 명령을 통해 실행합니다
/// (예: `docker exec nginx-proxy nginx -t`).
#[derive(Debug, Clone)]
pub struct CommandNginx {
    binary: String,
    command_prefix: Vec<String>,
    main_config: PathBuf,
}

impl CommandNginx {
    /// 관리자 설정으로 생성합니다.
    pub fn new(config: &NginxManagerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            command_prefix: config.command_prefix.clone(),
            main_config: config.main_config.clone(),
        }
    }

    /// 실행될 명령줄 (로그 및 테스트용)
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        self.command_prefix
            .iter()
            .cloned()
            .chain(std::iter::once(self.binary.clone()))
            .chain(args.iter().cloned())
            .collect()
    }

    /// `nginx -t -c <main_config>` 인자
    pub fn test_args(&self) -> Vec<String> {
        vec![
            "-t".to_owned(),
            "-c".to_owned(),
            self.main_config.display().to_string(),
        ]
    }

    /// `nginx -c <main_config> -s reload` 인자
    ///
    /// master pid 는 `-c` 로 지정한 설정의 `pid` 경로에서 찾으므로,
    /// 검사한 설정과 같은 파일을 지정해야 합니다.
    pub fn reload_args(&self) -> Vec<String> {
        vec![
            "-c".to_owned(),
            self.main_config.display().to_string(),
            "-s".to_owned(),
            "reload".to_owned(),
        ]
    }

    async fn run(&self, args: &[String]) -> Result<ProcessOutput, NginxManagerError> {
        let argv = self.command_line(args);
        let Some((program, rest)) = argv.split_first() else {
            return Err(NginxManagerError::Process("empty command line".to_owned()));
        };

        tracing::debug!(command = %argv.join(" "), "running nginx command");

        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NginxManagerError::Process(format!("failed to run '{program}': {e}")))?;

        Ok(output.into())
    }
}

impl NginxProcess for CommandNginx {
    async fn test_config(&self) -> Result<ProcessOutput, NginxManagerError> {
        self.run(&self.test_args()).await
    }

    async fn reload(&self) -> Result<ProcessOutput, NginxManagerError> {
        self.run(&self.reload_args()).await
    }

    async fn version(&self) -> Result<ProcessOutput, NginxManagerError> {
        self.run(&["-v".to_owned()]).await
    }
}

/// 테스트용 Mock Nginx 프로세스
///
/// `nginx -t` 결과를 순서대로 스크립트할 수 있고 호출 횟수를 기록합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockNginx {
    test_results: std::sync::Mutex<std::collections::VecDeque<ProcessOutput>>,
    reload_result: Option<ProcessOutput>,
    test_delay: Option<std::time::Duration>,
    spawn_error: bool,
    /// `test_config` 호출 횟수
    pub test_calls: std::sync::atomic::AtomicUsize,
    /// `reload` 호출 횟수
    pub reload_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockNginx {
    /// 모든 호출이 성공하는 mock 을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `test_config` 호출 결과를 추가합니다. 스크립트가 비면 성공을 반환합니다.
    pub fn with_test_result(self, output: ProcessOutput) -> Self {
        self.test_results.lock().unwrap().push_back(output);
        self
    }

    /// `reload` 가 실패하도록 설정합니다.
    pub fn with_failing_reload(mut self, stderr: &str) -> Self {
        self.reload_result = Some(ProcessOutput::failure(1, stderr));
        self
    }

    /// `test_config` 가 지연되도록 설정합니다.
    pub fn with_test_delay(mut self, delay: std::time::Duration) -> Self {
        self.test_delay = Some(delay);
        self
    }

    /// 모든 호출이 실행 실패하도록 설정합니다.
    pub fn with_spawn_error(mut self) -> Self {
        self.spawn_error = true;
        self
    }

    /// `test_config` 호출 횟수
    pub fn tests(&self) -> usize {
        self.test_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// `reload` 호출 횟수
    pub fn reloads(&self) -> usize {
        self.reload_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl NginxProcess for MockNginx {
    async fn test_config(&self) -> Result<ProcessOutput, NginxManagerError> {
        self.test_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.test_delay {
            tokio::time::sleep(delay).await;
        }
        if self.spawn_error {
            return Err(NginxManagerError::Process("mock spawn failure".to_owned()));
        }
        let scripted = self.test_results.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| {
            ProcessOutput::success("nginx: configuration file /etc/nginx/nginx.conf test is successful")
        }))
    }

    async fn reload(&self) -> Result<ProcessOutput, NginxManagerError> {
        self.reload_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.spawn_error {
            return Err(NginxManagerError::Process("mock spawn failure".to_owned()));
        }
        Ok(self
            .reload_result
            .clone()
            .unwrap_or_else(|| ProcessOutput::success("")))
    }

    async fn version(&self) -> Result<ProcessOutput, NginxManagerError> {
        if self.spawn_error {
            return Err(NginxManagerError::Process("mock spawn failure".to_owned()));
        }
        Ok(ProcessOutput::success("nginx version: nginx/1.25.3"))
    }
}
