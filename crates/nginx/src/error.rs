//! Nginx 설정 관리 에러 타입
//!
//! [`NginxManagerError`]는 규칙 검증, 설정 생성, 파일 저장, `nginx -t`,
//! reload 단계에서 발생하는 모든 에러를 표현합니다.
//! `From<NginxManagerError> for DockgateError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use dockgate_core::error::{DockgateError, NginxError};

/// Nginx 설정 관리 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum NginxManagerError {
    /// 규칙 유효성 검증 실패 (파일 I/O 이전)
    #[error("invalid rule '{rule_id}': {field}: {reason}")]
    Validation {
        /// 문제가 된 규칙 ID
        rule_id: String,
        /// 필드명
        field: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 생성기가 규칙을 렌더링할 수 없음
    #[error("cannot compile rule '{rule_id}': {reason}")]
    Compile {
        /// 규칙 ID
        rule_id: String,
        /// 실패 사유
        reason: String,
    },

    /// `nginx -t` 가 설정을 거부함. 롤백은 이미 수행됨
    #[error("nginx configuration test failed: {message}")]
    TestFailed {
        /// nginx 진단 출력 원문
        message: String,
    },

    /// 테스트 통과 후 reload 실패
    #[error("nginx reload failed: {message}")]
    ApplyFailed {
        /// nginx 출력 원문
        message: String,
    },

    /// 스냅샷 복원 자체가 실패함
    #[error("rollback failed after '{cause}': {reason}")]
    RollbackFailed {
        /// 롤백을 유발한 원래 에러
        cause: String,
        /// 복원 실패 사유
        reason: String,
    },

    /// 파일시스템 에러
    #[error("io error at {path}: {source}")]
    Io {
        /// 대상 경로
        path: String,
        /// 원본 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 외부 프로세스 실행 실패 (spawn/wait)
    #[error("process error: {0}")]
    Process(String),

    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl NginxManagerError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn validation(
        rule_id: &str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            rule_id: rule_id.to_owned(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 호출자가 규칙을 고쳐서 다시 시도할 수 있는 에러인지 여부
    ///
    /// 검증 실패와 `nginx -t` 실패는 라이브 프로세스에 도달하지 않으므로 복구 가능합니다.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::TestFailed { .. })
    }
}

impl From<NginxManagerError> for DockgateError {
    fn from(err: NginxManagerError) -> Self {
        let kind = match &err {
            NginxManagerError::Validation { .. } | NginxManagerError::RuleLoad { .. } => {
                NginxError::InvalidRule(err.to_string())
            }
            NginxManagerError::Compile { .. } => NginxError::Compile(err.to_string()),
            NginxManagerError::TestFailed { message } => NginxError::TestFailed(message.clone()),
            NginxManagerError::ApplyFailed { message } => {
                NginxError::ApplyFailed(message.clone())
            }
            NginxManagerError::RollbackFailed { .. }
            | NginxManagerError::Io { .. }
            | NginxManagerError::Process(_)
            | NginxManagerError::Config { .. } => NginxError::Storage(err.to_string()),
        };
        DockgateError::Nginx(kind)
    }
}
