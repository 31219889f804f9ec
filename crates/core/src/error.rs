//! 에러 타입 -- 도메인별 에러 정의

/// dockgate 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DockgateError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Nginx 설정 생명주기 에러
    #[error("nginx error: {0}")]
    Nginx(#[from] NginxError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Nginx 설정 생명주기 에러 요약
///
/// `dockgate-nginx`의 상세 에러가 이 분류로 변환됩니다.
/// 호출자(REST 계층, CLI)는 이 분류만 보고 응답 코드를 결정할 수 있습니다.
#[derive(Debug, thiserror::Error)]
pub enum NginxError {
    /// 규칙 자체가 잘못됨 (파일 I/O 이전에 거부)
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// 생성기가 규칙을 렌더링하지 못함
    #[error("compile failed: {0}")]
    Compile(String),

    /// `nginx -t` 가 설정을 거부함 (롤백 완료)
    #[error("configuration test failed: {0}")]
    TestFailed(String),

    /// 테스트 통과 후 reload 실패 (디스크와 실행 중 프로세스가 다를 수 있음)
    #[error("reload failed: {0}")]
    ApplyFailed(String),

    /// 파일시스템 또는 외부 프로세스 에러
    #[error("storage error: {0}")]
    Storage(String),
}
