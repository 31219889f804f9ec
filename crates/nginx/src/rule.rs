//! 프록시 규칙 모델 -- 하나의 라우팅 의도를 표현합니다.
//!
//! [`Rule`]은 호출자(REST 계층, CLI)가 완전한 다음 상태로 제출하는 불변 데이터입니다.
//! 부분 패치는 지원하지 않으며, 갱신은 항상 전체 교체입니다.
//!
//! 규칙의 문자열 필드는 그대로 Nginx 설정 텍스트에 들어가므로
//! [`Rule::validate`]는 포트 범위나 SSL 필드 외에도 설정 인젝션을 막기 위한
//! 문자 집합 검사를 수행합니다.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::NginxManagerError;
use crate::store::ConfigContext;

/// Maximum rule file size (1 MB)
const MAX_RULE_FILE_SIZE: u64 = 1024 * 1024;

/// Maximum rule id length
const MAX_RULE_ID_LEN: usize = 128;

/// 규칙 프로토콜
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// 평문 HTTP
    #[default]
    #[serde(alias = "HTTP")]
    Http,
    /// TLS 종료 HTTP
    #[serde(alias = "HTTPS")]
    Https,
    /// stream 컨텍스트의 TCP 프록시
    #[serde(alias = "TCP")]
    Tcp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

/// 로드밸런싱 대상
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancingTarget {
    /// 대상 컨테이너 이름 (Docker 네트워크 내 호스트명)
    pub container: String,
    /// 대상 포트
    pub port: u16,
    /// 가중치 (1 이상)
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// 로드밸런싱 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingMethod {
    /// 가중 라운드로빈 (Nginx 기본값, 지시어 없음)
    #[default]
    RoundRobin,
    /// 최소 연결
    LeastConn,
    /// 클라이언트 IP 해시 (HTTP 전용)
    IpHash,
}

/// 헬스체크 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// 검사 URI
    #[serde(default = "default_health_path")]
    pub path: String,
    /// 검사 주기 (초)
    #[serde(default = "default_health_interval")]
    pub interval: u64,
    /// 성공으로 간주할 HTTP 상태 코드
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<u16>,
    /// 검사 타임아웃 (초)
    #[serde(default = "default_health_timeout")]
    pub timeout: u64,
    /// 비정상 판정까지의 연속 실패 횟수
    #[serde(default = "default_health_retries")]
    pub retries: u32,
}

fn default_health_path() -> String {
    "/".to_owned()
}

fn default_health_interval() -> u64 {
    30
}

fn default_success_codes() -> Vec<u16> {
    vec![200]
}

fn default_health_timeout() -> u64 {
    5
}

fn default_health_retries() -> u32 {
    3
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            interval: default_health_interval(),
            success_codes: default_success_codes(),
            timeout: default_health_timeout(),
            retries: default_health_retries(),
        }
    }
}

/// `proxy_buffers <number> <size>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyBuffers {
    /// 버퍼 개수
    pub number: u32,
    /// 버퍼 크기 (예: `4k`)
    pub size: String,
}

/// 응답 캐시 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// 캐시 유효 기간 (초)
    #[serde(default = "default_cache_duration")]
    pub duration: u64,
}

fn default_cache_duration() -> u64 {
    600
}

/// CORS 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// `Access-Control-Allow-Origin`
    #[serde(default = "default_cors_origin")]
    pub allow_origin: String,
    /// `Access-Control-Allow-Methods`
    #[serde(default = "default_cors_methods")]
    pub allow_methods: String,
    /// `Access-Control-Allow-Headers`
    #[serde(default = "default_cors_headers")]
    pub allow_headers: String,
    /// `Access-Control-Allow-Credentials: true` 여부
    #[serde(default)]
    pub allow_credentials: bool,
}

fn default_cors_origin() -> String {
    "*".to_owned()
}

fn default_cors_methods() -> String {
    "GET, POST, PUT, DELETE, OPTIONS".to_owned()
}

fn default_cors_headers() -> String {
    "Content-Type, Authorization".to_owned()
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origin: default_cors_origin(),
            allow_methods: default_cors_methods(),
            allow_headers: default_cors_headers(),
            allow_credentials: false,
        }
    }
}

/// 요청 속도 제한 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// 초당 허용 요청 수
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    /// 버스트 허용량
    #[serde(default)]
    pub burst_size: u32,
    /// 버스트 요청을 지연 없이 처리할지 여부
    #[serde(default)]
    pub nodelay: bool,
    /// 클라이언트 IP 단위 제한 여부 (false 면 서버 단위)
    #[serde(default = "default_per_ip")]
    pub per_ip: bool,
}

fn default_rps() -> u32 {
    10
}

fn default_per_ip() -> bool {
    true
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: default_rps(),
            burst_size: 0,
            nodelay: false,
            per_ip: default_per_ip(),
        }
    }
}

/// rewrite 플래그
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteFlag {
    /// `last`
    #[default]
    Last,
    /// `break`
    Break,
    /// `redirect` (302)
    Redirect,
    /// `permanent` (301)
    Permanent,
}

impl RewriteFlag {
    /// Nginx 지시어 인자 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Break => "break",
            Self::Redirect => "redirect",
            Self::Permanent => "permanent",
        }
    }
}

/// rewrite 규칙
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    /// 정규식 패턴
    pub pattern: String,
    /// 치환 문자열
    pub replacement: String,
    /// 플래그
    #[serde(default)]
    pub flag: RewriteFlag,
}

/// 고급 프록시 설정
///
/// 값이 있는 필드마다 하나의 지시어로 매핑됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    /// `proxy_connect_timeout` (초)
    pub proxy_connect_timeout: Option<u64>,
    /// `proxy_send_timeout` (초)
    pub proxy_send_timeout: Option<u64>,
    /// `proxy_read_timeout` (초), TCP 에서는 `proxy_timeout`
    pub proxy_read_timeout: Option<u64>,
    /// `proxy_buffer_size`
    pub proxy_buffer_size: Option<String>,
    /// `proxy_buffers`
    pub proxy_buffers: Option<ProxyBuffers>,
    /// `client_max_body_size`
    pub client_max_body_size: Option<String>,
    /// 응답 캐시
    pub cache: Option<CacheConfig>,
    /// CORS
    pub cors: Option<CorsConfig>,
    /// 속도 제한
    pub rate_limit: Option<RateLimit>,
    /// rewrite 규칙 (목록 순서대로 출력)
    pub rewrite_rules: Vec<RewriteRule>,
}

/// 프록시 규칙
///
/// # TOML 예시
/// ```toml
/// id = "api"
/// name = "Public API"
/// protocol = "http"
/// source_host = "example.com"
/// source_path = "/api"
/// target_container = "api-service"
/// target_port = 8080
///
/// [headers]
/// X-Forwarded-Proto = "$scheme"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// 규칙 고유 ID (설정 파일 이름으로 사용)
    pub id: String,
    /// 표시용 이름
    #[serde(default)]
    pub name: String,
    /// HTTP(S) 매칭 호스트, TCP 에서는 바인드 호스트
    #[serde(default)]
    pub source_host: String,
    /// HTTP(S) 매칭 경로 (비어 있으면 `/`)
    #[serde(default)]
    pub source_path: String,
    /// 단일 대상 컨테이너
    #[serde(default)]
    pub target_container: String,
    /// 단일 대상 포트 (0 은 미설정)
    #[serde(default)]
    pub target_port: u16,
    /// 업스트림이 TLS 를 요구하는지 여부
    #[serde(default)]
    pub backend_https: bool,
    /// 로드밸런싱 대상 (비어 있지 않으면 단일 대상을 대체)
    #[serde(default)]
    pub load_balancing_targets: Vec<LoadBalancingTarget>,
    /// 로드밸런싱 방식
    #[serde(default)]
    pub load_balancing_method: LoadBalancingMethod,
    /// 프로토콜
    #[serde(default)]
    pub protocol: Protocol,
    /// TLS 활성화 여부
    #[serde(default)]
    pub ssl_enabled: bool,
    /// 인증서 경로
    #[serde(default)]
    pub ssl_cert_path: Option<String>,
    /// 개인키 경로
    #[serde(default)]
    pub ssl_key_path: Option<String>,
    /// 가상 호스트 도메인
    #[serde(default)]
    pub domain: String,
    /// 요청 헤더 오버라이드 (`proxy_set_header`)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// 응답 헤더 (`add_header`)
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    /// 헬스체크
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
    /// 고급 설정
    #[serde(default)]
    pub advanced_config: Option<AdvancedConfig>,
    /// 활성화 여부 (false 면 활성 설정에서 제외)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 생성 시각
    #[serde(default = "SystemTime::now")]
    pub created: SystemTime,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// 새 UUID v4 ID 로 빈 규칙을 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        let mut rule = Self::with_id(uuid::Uuid::new_v4().to_string());
        rule.name = name.into();
        rule
    }

    /// 지정된 ID 로 빈 규칙을 생성합니다.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            source_host: String::new(),
            source_path: String::new(),
            target_container: String::new(),
            target_port: 0,
            backend_https: false,
            load_balancing_targets: Vec::new(),
            load_balancing_method: LoadBalancingMethod::default(),
            protocol: Protocol::default(),
            ssl_enabled: false,
            ssl_cert_path: None,
            ssl_key_path: None,
            domain: String::new(),
            headers: BTreeMap::new(),
            response_headers: BTreeMap::new(),
            health_check: None,
            advanced_config: None,
            enabled: true,
            created: SystemTime::now(),
        }
    }

    /// TLS 가 적용되는지 여부 (`https` 프로토콜이거나 `ssl_enabled`)
    pub fn is_tls(&self) -> bool {
        self.protocol == Protocol::Https || self.ssl_enabled
    }

    /// 로드밸런싱 upstream 블록이 필요한지 여부
    pub fn uses_upstream(&self) -> bool {
        !self.load_balancing_targets.is_empty()
    }

    /// 단일 대상이 설정되었는지 여부
    pub fn has_single_target(&self) -> bool {
        !self.target_container.is_empty() && self.target_port != 0
    }

    /// 실제 location 경로 (빈 경로는 `/`)
    pub fn effective_path(&self) -> &str {
        if self.source_path.is_empty() {
            "/"
        } else {
            &self.source_path
        }
    }

    /// `server_name` 값: domain, source_host, `_` 순서로 선택
    pub fn server_name(&self) -> &str {
        if !self.domain.is_empty() {
            &self.domain
        } else if !self.source_host.is_empty() {
            &self.source_host
        } else {
            "_"
        }
    }

    /// TCP 규칙이 listen 할 포트
    ///
    /// 단일 대상 포트가 있으면 그 값을, 없으면 첫 번째 로드밸런싱 대상 포트를 사용합니다.
    pub fn listen_port(&self) -> Option<u16> {
        if self.target_port != 0 {
            Some(self.target_port)
        } else {
            self.load_balancing_targets.first().map(|t| t.port)
        }
    }

    /// 규칙 파일이 포함될 Nginx 컨텍스트
    pub fn context(&self) -> ConfigContext {
        match self.protocol {
            Protocol::Tcp => ConfigContext::Stream,
            Protocol::Http | Protocol::Https => ConfigContext::Http,
        }
    }

    /// 규칙의 유효성을 검증합니다.
    ///
    /// 실패 시 어떤 파일 I/O 나 외부 프로세스 호출도 하지 않아야 하므로
    /// 컨트롤러는 락을 잡기 전에 이 함수를 호출합니다.
    pub fn validate(&self) -> Result<(), NginxManagerError> {
        if !is_valid_rule_id(&self.id) {
            return Err(NginxManagerError::validation(
                &self.id,
                "id",
                format!("must be 1-{MAX_RULE_ID_LEN} characters of [A-Za-z0-9_-]"),
            ));
        }
        let id = self.id.as_str();

        check_text(id, "name", &self.name)?;

        if !self.source_host.is_empty() && !is_safe_name(&self.source_host) {
            return Err(NginxManagerError::validation(
                id,
                "source_host",
                "must contain only [A-Za-z0-9._-]",
            ));
        }

        if !self.domain.is_empty() && !is_valid_domain(&self.domain) {
            return Err(NginxManagerError::validation(
                id,
                "domain",
                "must be a hostname, optionally prefixed with '*.'",
            ));
        }

        if !self.source_path.is_empty() && !is_safe_path(&self.source_path) {
            return Err(NginxManagerError::validation(
                id,
                "source_path",
                "must start with '/' and contain no whitespace, ';', '{', '}', '#' or quotes",
            ));
        }

        self.validate_targets()?;
        self.validate_ssl()?;

        for (field, map) in [
            ("headers", &self.headers),
            ("response_headers", &self.response_headers),
        ] {
            for (name, value) in map {
                if !is_header_name(name) {
                    return Err(NginxManagerError::validation(
                        id,
                        field,
                        format!("invalid header name '{name}'"),
                    ));
                }
                check_text(id, field, value)?;
            }
        }

        if let Some(hc) = &self.health_check {
            validate_health_check(id, hc)?;
        }

        if let Some(adv) = &self.advanced_config {
            validate_advanced(id, adv)?;
        }

        Ok(())
    }

    fn validate_targets(&self) -> Result<(), NginxManagerError> {
        let id = self.id.as_str();

        if self.load_balancing_targets.is_empty() && !self.has_single_target() {
            return Err(NginxManagerError::validation(
                id,
                "target",
                "either target_container/target_port or load_balancing_targets must be set",
            ));
        }

        if !self.target_container.is_empty() && !is_safe_name(&self.target_container) {
            return Err(NginxManagerError::validation(
                id,
                "target_container",
                "must contain only [A-Za-z0-9._-]",
            ));
        }

        for (i, target) in self.load_balancing_targets.iter().enumerate() {
            let field = format!("load_balancing_targets[{i}]");
            if target.container.is_empty() || !is_safe_name(&target.container) {
                return Err(NginxManagerError::validation(
                    id,
                    field,
                    "container must be non-empty and contain only [A-Za-z0-9._-]",
                ));
            }
            if target.port == 0 {
                return Err(NginxManagerError::validation(id, field, "port must be 1-65535"));
            }
            if target.weight == 0 {
                return Err(NginxManagerError::validation(
                    id,
                    field,
                    "weight must be at least 1",
                ));
            }
        }

        if self.protocol == Protocol::Tcp
            && self.load_balancing_method == LoadBalancingMethod::IpHash
        {
            return Err(NginxManagerError::validation(
                id,
                "load_balancing_method",
                "ip_hash is only available for http rules",
            ));
        }

        Ok(())
    }

    fn validate_ssl(&self) -> Result<(), NginxManagerError> {
        let id = self.id.as_str();
        let cert = self.ssl_cert_path.as_deref().filter(|p| !p.is_empty());
        let key = self.ssl_key_path.as_deref().filter(|p| !p.is_empty());

        if self.is_tls() {
            if self.protocol == Protocol::Tcp {
                return Err(NginxManagerError::validation(
                    id,
                    "ssl_enabled",
                    "tls termination is not supported for tcp rules",
                ));
            }
            let cert = cert.ok_or_else(|| {
                NginxManagerError::validation(id, "ssl_cert_path", "required when tls is enabled")
            })?;
            let key = key.ok_or_else(|| {
                NginxManagerError::validation(id, "ssl_key_path", "required when tls is enabled")
            })?;
            check_text(id, "ssl_cert_path", cert)?;
            check_text(id, "ssl_key_path", key)?;
        } else if cert.is_some() || key.is_some() {
            return Err(NginxManagerError::validation(
                id,
                "ssl_enabled",
                "ssl_cert_path/ssl_key_path given but tls is not enabled",
            ));
        }

        Ok(())
    }
}

fn validate_health_check(id: &str, hc: &HealthCheck) -> Result<(), NginxManagerError> {
    if !is_safe_path(&hc.path) {
        return Err(NginxManagerError::validation(
            id,
            "health_check.path",
            "must start with '/' and contain no whitespace or config metacharacters",
        ));
    }
    if hc.interval == 0 {
        return Err(NginxManagerError::validation(
            id,
            "health_check.interval",
            "must be at least 1 second",
        ));
    }
    if hc.timeout == 0 {
        return Err(NginxManagerError::validation(
            id,
            "health_check.timeout",
            "must be at least 1 second",
        ));
    }
    if hc.retries == 0 {
        return Err(NginxManagerError::validation(
            id,
            "health_check.retries",
            "must be at least 1",
        ));
    }
    if hc.success_codes.is_empty() {
        return Err(NginxManagerError::validation(
            id,
            "health_check.success_codes",
            "must not be empty",
        ));
    }
    if let Some(code) = hc
        .success_codes
        .iter()
        .find(|c| !(100..=599).contains(*c))
    {
        return Err(NginxManagerError::validation(
            id,
            "health_check.success_codes",
            format!("invalid status code {code}"),
        ));
    }
    Ok(())
}

fn validate_advanced(id: &str, adv: &AdvancedConfig) -> Result<(), NginxManagerError> {
    for (field, secs) in [
        ("advanced_config.proxy_connect_timeout", adv.proxy_connect_timeout),
        ("advanced_config.proxy_send_timeout", adv.proxy_send_timeout),
        ("advanced_config.proxy_read_timeout", adv.proxy_read_timeout),
    ] {
        if secs == Some(0) {
            return Err(NginxManagerError::validation(
                id,
                field,
                "must be at least 1 second",
            ));
        }
    }

    for (field, size) in [
        ("advanced_config.proxy_buffer_size", &adv.proxy_buffer_size),
        (
            "advanced_config.client_max_body_size",
            &adv.client_max_body_size,
        ),
    ] {
        if let Some(size) = size {
            if !is_size(size) {
                return Err(NginxManagerError::validation(
                    id,
                    field,
                    format!("invalid size '{size}', expected e.g. 4k, 10m"),
                ));
            }
        }
    }

    if let Some(buffers) = &adv.proxy_buffers {
        if buffers.number == 0 || !is_size(&buffers.size) {
            return Err(NginxManagerError::validation(
                id,
                "advanced_config.proxy_buffers",
                "number must be at least 1 and size like 4k",
            ));
        }
    }

    if let Some(cache) = &adv.cache {
        if cache.enabled && cache.duration == 0 {
            return Err(NginxManagerError::validation(
                id,
                "advanced_config.cache.duration",
                "must be at least 1 second",
            ));
        }
    }

    if let Some(cors) = &adv.cors {
        check_text(id, "advanced_config.cors.allow_origin", &cors.allow_origin)?;
        check_text(id, "advanced_config.cors.allow_methods", &cors.allow_methods)?;
        check_text(id, "advanced_config.cors.allow_headers", &cors.allow_headers)?;
    }

    if let Some(rl) = &adv.rate_limit {
        if rl.enabled && rl.requests_per_second == 0 {
            return Err(NginxManagerError::validation(
                id,
                "advanced_config.rate_limit.requests_per_second",
                "must be at least 1",
            ));
        }
    }

    for (i, rewrite) in adv.rewrite_rules.iter().enumerate() {
        let field = format!("advanced_config.rewrite_rules[{i}]");
        if rewrite.pattern.is_empty() || rewrite.replacement.is_empty() {
            return Err(NginxManagerError::validation(
                id,
                field,
                "pattern and replacement must not be empty",
            ));
        }
        check_text(id, &field, &rewrite.pattern)?;
        check_text(id, &field, &rewrite.replacement)?;
    }

    Ok(())
}

/// 설정 텍스트로 들어가는 자유 문자열 검사: 줄바꿈 금지
fn check_text(id: &str, field: &str, value: &str) -> Result<(), NginxManagerError> {
    if value.contains(['\n', '\r', '\0']) {
        return Err(NginxManagerError::validation(
            id,
            field,
            "must not contain line breaks or NUL",
        ));
    }
    Ok(())
}

/// 규칙 ID 형식 검사: 파일 이름으로 쓰이므로 경로 구분자 등을 허용하지 않습니다.
pub fn is_valid_rule_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_RULE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_safe_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

fn is_valid_domain(s: &str) -> bool {
    is_safe_name(s.strip_prefix("*.").unwrap_or(s))
}

fn is_safe_path(s: &str) -> bool {
    s.starts_with('/')
        && !s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '#' | '"' | '\'' | '\\'))
}

fn is_header_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_size(s: &str) -> bool {
    let digits = s.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    let suffix_len = s.len() - digits.len();
    suffix_len <= 1 && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// 파일에서 규칙을 로드합니다.
///
/// 확장자가 `.json` 이면 JSON, 그 외에는 TOML 로 파싱합니다.
///
/// # Errors
/// - 파일 읽기 실패
/// - 파싱 실패
/// - 규칙 유효성 검증 실패
pub fn load_rule_from_file(path: &Path) -> Result<Rule, NginxManagerError> {
    let load_err = |reason: String| NginxManagerError::RuleLoad {
        path: path.display().to_string(),
        reason,
    };

    let metadata =
        std::fs::metadata(path).map_err(|e| load_err(format!("failed to read metadata: {e}")))?;
    if metadata.len() > MAX_RULE_FILE_SIZE {
        return Err(load_err(format!(
            "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
            metadata.len()
        )));
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| load_err(format!("failed to read file: {e}")))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let rule: Rule = if is_json {
        serde_json::from_str(&content).map_err(|e| load_err(format!("failed to parse JSON: {e}")))?
    } else {
        toml::from_str(&content).map_err(|e| load_err(format!("failed to parse TOML: {e}")))?
    };

    rule.validate()?;
    Ok(rule)
}

/// 디렉토리의 모든 규칙 파일(`.toml`, `.json`)을 로드합니다.
///
/// 파싱 실패한 파일은 경고 후 스킵됩니다. 디렉토리 밖을 가리키는
/// 심볼릭 링크는 무시합니다. 결과는 규칙 ID 순으로 정렬됩니다.
pub fn load_rules_from_dir(dir_path: &Path) -> Result<Vec<Rule>, NginxManagerError> {
    let entries = std::fs::read_dir(dir_path).map_err(|e| NginxManagerError::RuleLoad {
        path: dir_path.display().to_string(),
        reason: format!("failed to read directory: {e}"),
    })?;

    let canonical_dir = dir_path
        .canonicalize()
        .map_err(|e| NginxManagerError::RuleLoad {
            path: dir_path.display().to_string(),
            reason: format!("failed to canonicalize directory: {e}"),
        })?;

    let mut rules = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read directory entry");
                continue;
            }
        };

        let path = entry.path();
        let canonical_path = match path.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to canonicalize path, skipping");
                continue;
            }
        };

        if !canonical_path.starts_with(&canonical_dir) {
            tracing::warn!(
                path = %path.display(),
                canonical = %canonical_path.display(),
                "path traversal detected, skipping"
            );
            continue;
        }

        if !canonical_path.is_file() {
            continue;
        }

        let is_rule_file = canonical_path
            .extension()
            .is_some_and(|ext| ext == "toml" || ext == "json");
        if !is_rule_file {
            continue;
        }

        match load_rule_from_file(&canonical_path) {
            Ok(rule) => {
                tracing::debug!(rule_id = %rule.id, path = %canonical_path.display(), "loaded rule");
                rules.push(rule);
            }
            Err(e) => {
                tracing::warn!(path = %canonical_path.display(), error = %e, "failed to load rule file");
            }
        }
    }

    rules.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(rules)
}
