//! Nginx 관리자 설정
//!
//! [`NginxManagerConfig`]는 core의 [`NginxConfig`](dockgate_core::config::NginxConfig)를
//! 기반으로 컨트롤러, 저장소, 프로세스 래퍼가 사용하는 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use dockgate_core::config::DockgateConfig;
//! use dockgate_nginx::config::NginxManagerConfig;
//!
//! let core_config = DockgateConfig::default();
//! let config = NginxManagerConfig::from_core(&core_config.nginx);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NginxManagerError;
use crate::generator::GeneratorOptions;

/// 설정 상한값 상수
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_RATE_LIMIT_RPS: u32 = 1_000_000;

/// Nginx 관리자 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxManagerConfig {
    /// nginx 실행 파일
    pub binary: String,
    /// 실행 파일 앞에 붙일 명령 (예: `docker exec nginx-proxy`)
    pub command_prefix: Vec<String>,
    /// 메인 설정 파일 (`nginx -t -c` 대상)
    pub main_config: PathBuf,
    /// 규칙 파일 디렉토리
    pub active_dir: PathBuf,
    /// 메인 설정 템플릿 디렉토리
    pub templates_dir: PathBuf,
    /// 프록시 캐시 디렉토리
    pub cache_dir: PathBuf,
    /// `nginx -t` 타임아웃 (초)
    pub test_timeout_secs: u64,
    /// `nginx -s reload` 타임아웃 (초)
    pub reload_timeout_secs: u64,
    /// 테스트 통과 후 reload 실패 시에도 롤백할지 여부
    pub rollback_on_apply_failure: bool,
    /// 공유 캐시 zone 이름
    pub cache_zone: String,
    /// 공유 rate limit zone 이름
    pub rate_limit_zone: String,
    /// 공유 rate limit zone 의 초당 요청 수
    pub rate_limit_rps: u32,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// upstream 이름 접두어
    pub upstream_prefix: String,
}

impl Default for NginxManagerConfig {
    fn default() -> Self {
        Self {
            binary: "nginx".to_owned(),
            command_prefix: Vec::new(),
            main_config: PathBuf::from("/etc/nginx/nginx.conf"),
            active_dir: PathBuf::from("/etc/nginx/conf.d/dockgate"),
            templates_dir: PathBuf::from("/etc/dockgate/templates"),
            cache_dir: PathBuf::from("/var/cache/nginx/dockgate"),
            test_timeout_secs: 30,
            reload_timeout_secs: 30,
            rollback_on_apply_failure: true,
            cache_zone: "dockgate_cache".to_owned(),
            rate_limit_zone: "one".to_owned(),
            rate_limit_rps: 10,
            upstream_prefix: "backend".to_owned(),
        }
    }
}

impl NginxManagerConfig {
    /// core의 `NginxConfig`에서 관리자 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &dockgate_core::config::NginxConfig) -> Self {
        Self {
            binary: core.binary.clone(),
            command_prefix: core.command_prefix.clone(),
            main_config: PathBuf::from(&core.main_config),
            active_dir: PathBuf::from(&core.active_dir),
            templates_dir: PathBuf::from(&core.templates_dir),
            cache_dir: PathBuf::from(&core.cache_dir),
            test_timeout_secs: core.test_timeout_secs,
            reload_timeout_secs: core.reload_timeout_secs,
            rollback_on_apply_failure: core.rollback_on_apply_failure,
            cache_zone: core.cache_zone.clone(),
            rate_limit_zone: core.rate_limit_zone.clone(),
            rate_limit_rps: core.rate_limit_rps,
            ..Self::default()
        }
    }

    /// TCP 규칙 디렉토리 (`<active_dir>/stream`)
    pub fn stream_dir(&self) -> PathBuf {
        self.active_dir.join("stream")
    }

    /// `nginx -t` 타임아웃
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    /// reload 타임아웃
    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    /// 메인 설정의 공유 zone 과 일치하는 생성기 옵션
    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            cache_zone: self.cache_zone.clone(),
            rate_limit_zone: self.rate_limit_zone.clone(),
            rate_limit_zone_rps: self.rate_limit_rps,
            upstream_prefix: self.upstream_prefix.clone(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NginxManagerError> {
        if self.binary.is_empty() {
            return Err(config_err("binary", "must not be empty"));
        }

        if self.command_prefix.iter().any(String::is_empty) {
            return Err(config_err(
                "command_prefix",
                "must not contain empty arguments",
            ));
        }

        for (field, path) in [
            ("main_config", &self.main_config),
            ("active_dir", &self.active_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(config_err(field, "must not be empty"));
            }
        }

        if self.main_config.starts_with(&self.active_dir) {
            return Err(config_err(
                "main_config",
                "must not live inside active_dir",
            ));
        }

        for (field, secs) in [
            ("test_timeout_secs", self.test_timeout_secs),
            ("reload_timeout_secs", self.reload_timeout_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(config_err(field, format!("must be 1-{MAX_TIMEOUT_SECS}")));
            }
        }

        for (field, name) in [
            ("cache_zone", &self.cache_zone),
            ("rate_limit_zone", &self.rate_limit_zone),
            ("upstream_prefix", &self.upstream_prefix),
        ] {
            if !is_identifier(name) {
                return Err(config_err(field, "must contain only [A-Za-z0-9_]"));
            }
        }

        if self.rate_limit_rps == 0 || self.rate_limit_rps > MAX_RATE_LIMIT_RPS {
            return Err(config_err(
                "rate_limit_rps",
                format!("must be 1-{MAX_RATE_LIMIT_RPS}"),
            ));
        }

        Ok(())
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> NginxManagerError {
    NginxManagerError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Nginx 관리자 설정 빌더
#[derive(Default)]
pub struct NginxManagerConfigBuilder {
    config: NginxManagerConfig,
}

impl NginxManagerConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// nginx 실행 파일을 설정합니다.
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.config.binary = binary.into();
        self
    }

    /// 명령 접두어를 설정합니다.
    pub fn command_prefix<I, S>(mut self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.command_prefix = prefix.into_iter().map(Into::into).collect();
        self
    }

    /// 메인 설정 파일 경로를 설정합니다.
    pub fn main_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.main_config = path.into();
        self
    }

    /// 규칙 파일 디렉토리를 설정합니다.
    pub fn active_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.active_dir = path.into();
        self
    }

    /// 템플릿 디렉토리를 설정합니다.
    pub fn templates_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.templates_dir = path.into();
        self
    }

    /// 캐시 디렉토리를 설정합니다.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = path.into();
        self
    }

    /// `nginx -t` 타임아웃(초)을 설정합니다.
    pub fn test_timeout_secs(mut self, secs: u64) -> Self {
        self.config.test_timeout_secs = secs;
        self
    }

    /// reload 타임아웃(초)을 설정합니다.
    pub fn reload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.reload_timeout_secs = secs;
        self
    }

    /// reload 실패 시 롤백 여부를 설정합니다.
    pub fn rollback_on_apply_failure(mut self, rollback: bool) -> Self {
        self.config.rollback_on_apply_failure = rollback;
        self
    }

    /// 공유 캐시 zone 이름을 설정합니다.
    pub fn cache_zone(mut self, zone: impl Into<String>) -> Self {
        self.config.cache_zone = zone.into();
        self
    }

    /// 공유 rate limit zone 이름과 초당 요청 수를 설정합니다.
    pub fn rate_limit_zone(mut self, zone: impl Into<String>, rps: u32) -> Self {
        self.config.rate_limit_zone = zone.into();
        self.config.rate_limit_rps = rps;
        self
    }

    /// upstream 이름 접두어를 설정합니다.
    pub fn upstream_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.upstream_prefix = prefix.into();
        self
    }

    /// 설정을 검증하고 `NginxManagerConfig`를 생성합니다.
    pub fn build(self) -> Result<NginxManagerConfig, NginxManagerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
