//! 검증 게이트 -- `nginx -t` 실행과 결과 해석
//!
//! 게이트는 아무것도 변경하지 않습니다. 메인 설정이 활성 디렉토리 전체를
//! include 하므로 한 번의 검사로 전체 설정이 검증됩니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use dockgate_core::metrics as m;

use crate::process::NginxProcess;

/// 타임아웃 시 메시지
pub const TIMEOUT_MESSAGE: &str = "timeout";

/// 설정 검사 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// 검사 통과 여부
    pub ok: bool,
    /// nginx 진단 출력 원문 (또는 실행 실패 사유)
    pub message: String,
}

impl ValidationOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// `nginx -t` 게이트
pub struct ValidationGate<N> {
    process: Arc<N>,
    timeout: Duration,
}

impl<N: NginxProcess> ValidationGate<N> {
    /// 새 게이트를 생성합니다.
    pub fn new(process: Arc<N>, timeout: Duration) -> Self {
        Self { process, timeout }
    }

    /// 전체 설정을 검사합니다.
    ///
    /// - 종료 코드 0 이외: `ok = false`, 진단 원문
    /// - 실행 실패: `ok = false`, 에러 텍스트
    /// - 타임아웃: `ok = false`, `"timeout"`
    pub async fn validate(&self) -> ValidationOutcome {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.process.test_config()).await;
        metrics::histogram!(m::NGINX_TEST_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(Ok(output)) => ValidationOutcome {
                ok: output.success,
                message: output.diagnostic().to_owned(),
            },
            Ok(Err(e)) => ValidationOutcome::failed(e.to_string()),
            Err(_elapsed) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "nginx configuration test timed out"
                );
                ValidationOutcome::failed(TIMEOUT_MESSAGE)
            }
        };

        if outcome.ok {
            debug!("nginx configuration test passed");
        } else {
            metrics::counter!(m::NGINX_TEST_FAILURES_TOTAL).increment(1);
            warn!(message = %outcome.message, "nginx configuration test failed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockNginx, ProcessOutput};

    fn gate(mock: MockNginx) -> ValidationGate<MockNginx> {
        ValidationGate::new(Arc::new(mock), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn passing_test_is_ok() {
        let outcome = gate(MockNginx::new()).validate().await;
        assert!(outcome.ok);
        assert!(outcome.message.contains("test is successful"));
    }

    #[tokio::test]
    async fn failing_test_returns_raw_diagnostic() {
        let stderr = "nginx: [emerg] unknown directive \"proxy_pas\" in /etc/nginx/conf.d/dockgate/web.conf:5\n\
                      nginx: configuration file /etc/nginx/nginx.conf test failed\n";
        let outcome = gate(MockNginx::new().with_test_result(ProcessOutput::failure(1, stderr)))
            .validate()
            .await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message, stderr.trim_end());
    }

    #[tokio::test]
    async fn failing_test_with_empty_stderr_uses_stdout() {
        let output = ProcessOutput {
            success: false,
            exit_code: Some(1),
            stdout: "stdout diagnostic".to_owned(),
            stderr: String::new(),
        };
        let outcome = gate(MockNginx::new().with_test_result(output))
            .validate()
            .await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message, "stdout diagnostic");
    }

    #[tokio::test]
    async fn spawn_failure_is_not_ok() {
        let outcome = gate(MockNginx::new().with_spawn_error()).validate().await;
        assert!(!outcome.ok);
        assert!(outcome.message.contains("mock spawn failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_test_times_out() {
        let gate = ValidationGate::new(
            Arc::new(MockNginx::new().with_test_delay(Duration::from_secs(60))),
            Duration::from_secs(1),
        );
        let outcome = gate.validate().await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message, TIMEOUT_MESSAGE);
    }
}
