//! 설정 관리 -- dockgate.toml 파싱 및 런타임 설정
//!
//! [`DockgateConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DOCKGATE_NGINX_BINARY=/usr/sbin/nginx` 형식)
//! 3. 설정 파일 (`dockgate.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dockgate_core::error::DockgateError> {
//! use dockgate_core::config::DockgateConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DockgateConfig::load("dockgate.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DockgateConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DockgateError};

/// 외부 프로세스 타임아웃 상한 (초)
const MAX_PROCESS_TIMEOUT_SECS: u64 = 300;

/// dockgate 통합 설정
///
/// `dockgate.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockgateConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Nginx 설정 생명주기 설정
    #[serde(default)]
    pub nginx: NginxConfig,
}

impl DockgateConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DockgateError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DockgateError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DockgateError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DockgateError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DockgateError> {
        toml::from_str(toml_str).map_err(|e| {
            DockgateError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DOCKGATE_{SECTION}_{FIELD}`
    /// 예: `DOCKGATE_NGINX_ACTIVE_DIR=/etc/nginx/conf.d/dockgate`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DOCKGATE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DOCKGATE_GENERAL_LOG_FORMAT");

        // Nginx
        override_string(&mut self.nginx.binary, "DOCKGATE_NGINX_BINARY");
        override_csv(
            &mut self.nginx.command_prefix,
            "DOCKGATE_NGINX_COMMAND_PREFIX",
        );
        override_string(&mut self.nginx.main_config, "DOCKGATE_NGINX_MAIN_CONFIG");
        override_string(&mut self.nginx.active_dir, "DOCKGATE_NGINX_ACTIVE_DIR");
        override_string(
            &mut self.nginx.templates_dir,
            "DOCKGATE_NGINX_TEMPLATES_DIR",
        );
        override_string(&mut self.nginx.cache_dir, "DOCKGATE_NGINX_CACHE_DIR");
        override_string(&mut self.nginx.rules_dir, "DOCKGATE_NGINX_RULES_DIR");
        override_u64(
            &mut self.nginx.test_timeout_secs,
            "DOCKGATE_NGINX_TEST_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.nginx.reload_timeout_secs,
            "DOCKGATE_NGINX_RELOAD_TIMEOUT_SECS",
        );
        override_bool(
            &mut self.nginx.rollback_on_apply_failure,
            "DOCKGATE_NGINX_ROLLBACK_ON_APPLY_FAILURE",
        );
        override_string(&mut self.nginx.cache_zone, "DOCKGATE_NGINX_CACHE_ZONE");
        override_string(
            &mut self.nginx.rate_limit_zone,
            "DOCKGATE_NGINX_RATE_LIMIT_ZONE",
        );
        override_u32(
            &mut self.nginx.rate_limit_rps,
            "DOCKGATE_NGINX_RATE_LIMIT_RPS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DockgateError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.nginx.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "nginx.binary".to_owned(),
                reason: "binary must not be empty".to_owned(),
            }
            .into());
        }

        for (field, value) in [
            ("nginx.main_config", &self.nginx.main_config),
            ("nginx.active_dir", &self.nginx.active_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "path must not be empty".to_owned(),
                }
                .into());
            }
        }

        for (field, secs) in [
            ("nginx.test_timeout_secs", self.nginx.test_timeout_secs),
            ("nginx.reload_timeout_secs", self.nginx.reload_timeout_secs),
        ] {
            if secs == 0 || secs > MAX_PROCESS_TIMEOUT_SECS {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: format!("must be 1-{MAX_PROCESS_TIMEOUT_SECS}"),
                }
                .into());
            }
        }

        for (field, zone) in [
            ("nginx.cache_zone", &self.nginx.cache_zone),
            ("nginx.rate_limit_zone", &self.nginx.rate_limit_zone),
        ] {
            if !is_zone_name(zone) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be non-empty and contain only [A-Za-z0-9_]".to_owned(),
                }
                .into());
            }
        }

        if self.nginx.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "nginx.rate_limit_rps".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

fn is_zone_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Nginx 설정 생명주기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxConfig {
    /// nginx 실행 파일 경로
    pub binary: String,
    /// nginx 앞에 붙일 명령 (예: `["docker", "exec", "nginx-proxy"]`)
    pub command_prefix: Vec<String>,
    /// 메인 설정 파일 경로 (`nginx -t -c` 대상)
    pub main_config: String,
    /// 규칙별 설정 파일이 위치하는 활성 설정 디렉토리
    pub active_dir: String,
    /// 메인 설정 템플릿 디렉토리
    pub templates_dir: String,
    /// proxy_cache_path 디렉토리
    pub cache_dir: String,
    /// `sync` 명령의 기본 규칙 파일 디렉토리
    pub rules_dir: String,
    /// `nginx -t` 타임아웃 (초)
    pub test_timeout_secs: u64,
    /// `nginx -s reload` 타임아웃 (초)
    pub reload_timeout_secs: u64,
    /// 테스트 통과 후 reload 가 실패했을 때 디스크 파일도 되돌릴지 여부
    pub rollback_on_apply_failure: bool,
    /// 캐시 존 이름
    pub cache_zone: String,
    /// 공유 rate limit 존 이름
    pub rate_limit_zone: String,
    /// 공유 rate limit 존의 초당 요청 수
    pub rate_limit_rps: u32,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            binary: "nginx".to_owned(),
            command_prefix: Vec::new(),
            main_config: "/etc/nginx/nginx.conf".to_owned(),
            active_dir: "/etc/nginx/conf.d/dockgate".to_owned(),
            templates_dir: "/etc/dockgate/templates".to_owned(),
            cache_dir: "/var/cache/nginx/dockgate".to_owned(),
            rules_dir: "/etc/dockgate/rules".to_owned(),
            test_timeout_secs: 30,
            reload_timeout_secs: 30,
            rollback_on_apply_failure: true,
            cache_zone: "dockgate_cache".to_owned(),
            rate_limit_zone: "one".to_owned(),
            rate_limit_rps: 10,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
