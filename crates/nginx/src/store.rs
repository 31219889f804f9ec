//! 설정 저장소 -- 활성 설정 디렉토리의 파일 계층
//!
//! 규칙 하나당 파일 하나를 유지합니다.
//!
//! ```text
//! <active_dir>/<id>.conf          http 컨텍스트 (HTTP/HTTPS 규칙)
//! <active_dir>/stream/<id>.conf   stream 컨텍스트 (TCP 규칙)
//! ```
//!
//! 모든 쓰기는 같은 디렉토리의 임시 파일에 쓴 뒤 rename 하므로
//! `nginx -t` 가 반쯤 쓰인 파일을 읽는 일은 없습니다.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::NginxManagerConfig;
use crate::error::NginxManagerError;
use crate::rule::is_valid_rule_id;

const CONF_EXT: &str = "conf";

/// 메인 설정 템플릿 파일 이름 (`<templates_dir>/nginx.conf`)
pub const MAIN_TEMPLATE_FILE: &str = "nginx.conf";

/// 기본 메인 설정 템플릿
pub const DEFAULT_MAIN_TEMPLATE: &str = r#"# Managed by dockgate. Rule files are included from {{active_dir}}.
worker_processes auto;

events {
    worker_connections 1024;
}

http {
    default_type application/octet-stream;
    sendfile on;
    keepalive_timeout 65;

    proxy_cache_path {{cache_dir}} levels=1:2 keys_zone={{cache_zone}}:10m max_size=1g inactive=60m use_temp_path=off;
    limit_req_zone $binary_remote_addr zone={{rate_limit_zone}}:10m rate={{rate_limit_rps}}r/s;

    include {{active_dir}}/*.conf;
}

stream {
    include {{stream_dir}}/*.conf;
}
"#;

/// 규칙 파일이 포함되는 Nginx 컨텍스트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigContext {
    /// `http { include <active_dir>/*.conf; }`
    Http,
    /// `stream { include <active_dir>/stream/*.conf; }`
    Stream,
}

impl ConfigContext {
    fn other(self) -> Self {
        match self {
            Self::Http => Self::Stream,
            Self::Stream => Self::Http,
        }
    }
}

impl std::fmt::Display for ConfigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Stream => write!(f, "stream"),
        }
    }
}

/// 저장된 규칙 설정 스냅샷 (롤백용)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    /// 파일이 위치한 컨텍스트
    pub context: ConfigContext,
    /// 파일 내용
    pub text: String,
}

/// 활성 설정 디렉토리 저장소
#[derive(Debug, Clone)]
pub struct ConfigStore {
    active_dir: PathBuf,
    stream_dir: PathBuf,
    main_config: PathBuf,
    templates_dir: PathBuf,
    replacements: Vec<(&'static str, String)>,
}

impl ConfigStore {
    /// 관리자 설정으로 저장소를 생성합니다.
    pub fn new(config: &NginxManagerConfig) -> Self {
        let stream_dir = config.stream_dir();
        let replacements = vec![
            ("{{active_dir}}", config.active_dir.display().to_string()),
            ("{{stream_dir}}", stream_dir.display().to_string()),
            ("{{cache_dir}}", config.cache_dir.display().to_string()),
            ("{{cache_zone}}", config.cache_zone.clone()),
            ("{{rate_limit_zone}}", config.rate_limit_zone.clone()),
            ("{{rate_limit_rps}}", config.rate_limit_rps.to_string()),
        ];
        Self {
            active_dir: config.active_dir.clone(),
            stream_dir,
            main_config: config.main_config.clone(),
            templates_dir: config.templates_dir.clone(),
            replacements,
        }
    }

    /// 활성 설정 디렉토리
    pub fn active_dir(&self) -> &Path {
        &self.active_dir
    }

    /// 메인 설정 파일 경로
    pub fn main_config(&self) -> &Path {
        &self.main_config
    }

    fn dir_for(&self, context: ConfigContext) -> &Path {
        match context {
            ConfigContext::Http => &self.active_dir,
            ConfigContext::Stream => &self.stream_dir,
        }
    }

    /// 규칙 파일 경로를 계산합니다. ID 는 경로 구성 요소가 되므로 다시 검증합니다.
    pub fn path_for(
        &self,
        rule_id: &str,
        context: ConfigContext,
    ) -> Result<PathBuf, NginxManagerError> {
        if !is_valid_rule_id(rule_id) {
            return Err(NginxManagerError::validation(
                rule_id,
                "id",
                "not a valid file name component",
            ));
        }
        Ok(self
            .dir_for(context)
            .join(format!("{rule_id}.{CONF_EXT}")))
    }

    /// 규칙 설정을 원자적으로 씁니다.
    ///
    /// 같은 ID 의 다른 컨텍스트 파일은 삭제되어 ID 당 파일은 하나만 남습니다.
    pub async fn write(
        &self,
        rule_id: &str,
        context: ConfigContext,
        text: &str,
    ) -> Result<(), NginxManagerError> {
        let path = self.path_for(rule_id, context)?;
        let dir = self.dir_for(context);
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| NginxManagerError::io(dir, e))?;

        write_atomic(&path, text).await?;
        debug!(rule_id, context = %context, path = %path.display(), "rule config written");

        let other = self.path_for(rule_id, context.other())?;
        remove_if_exists(&other).await?;
        Ok(())
    }

    /// 규칙 설정을 읽습니다. 파일이 없으면 `None`.
    pub async fn read(&self, rule_id: &str) -> Result<Option<StoredConfig>, NginxManagerError> {
        for context in [ConfigContext::Http, ConfigContext::Stream] {
            let path = self.path_for(rule_id, context)?;
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => return Ok(Some(StoredConfig { context, text })),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(NginxManagerError::io(&path, e)),
            }
        }
        Ok(None)
    }

    /// 규칙 설정 파일을 삭제합니다. 삭제한 파일이 있으면 `true`.
    pub async fn remove(&self, rule_id: &str) -> Result<bool, NginxManagerError> {
        let mut removed = false;
        for context in [ConfigContext::Http, ConfigContext::Stream] {
            let path = self.path_for(rule_id, context)?;
            removed |= remove_if_exists(&path).await?;
        }
        if removed {
            debug!(rule_id, "rule config removed");
        }
        Ok(removed)
    }

    /// 스냅샷을 되돌립니다. `None` 이면 파일을 삭제합니다.
    pub async fn restore(
        &self,
        rule_id: &str,
        snapshot: Option<&StoredConfig>,
    ) -> Result<(), NginxManagerError> {
        match snapshot {
            Some(stored) => self.write(rule_id, stored.context, &stored.text).await,
            None => self.remove(rule_id).await.map(|_| ()),
        }
    }

    /// 설정 파일이 있는 규칙 ID 목록 (정렬됨)
    pub async fn list(&self) -> Result<Vec<String>, NginxManagerError> {
        let mut ids = Vec::new();
        for dir in [&self.active_dir, &self.stream_dir] {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(NginxManagerError::io(dir, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| NginxManagerError::io(dir, e))?
            {
                let path = entry.path();
                if path.extension().is_none_or(|ext| ext != CONF_EXT) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if is_valid_rule_id(stem) {
                    ids.push(stem.to_owned());
                }
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// 디렉토리를 만들고 메인 설정이 없으면 기본 설정을 씁니다.
    ///
    /// 기존 메인 설정은 덮어쓰지 않습니다. 메인 설정을 새로 썼으면 `true`.
    pub async fn bootstrap(&self) -> Result<bool, NginxManagerError> {
        for dir in [&self.active_dir, &self.stream_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| NginxManagerError::io(dir, e))?;
        }

        if tokio::fs::try_exists(&self.main_config)
            .await
            .map_err(|e| NginxManagerError::io(&self.main_config, e))?
        {
            info!(path = %self.main_config.display(), "main config exists, leaving it untouched");
            return Ok(false);
        }

        let template = self.load_template().await?;
        let text = self.render_template(&template);

        if let Some(parent) = self.main_config.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| NginxManagerError::io(parent, e))?;
        }
        write_atomic(&self.main_config, &text).await?;
        info!(path = %self.main_config.display(), "main config written");
        Ok(true)
    }

    async fn load_template(&self) -> Result<String, NginxManagerError> {
        let path = self.templates_dir.join(MAIN_TEMPLATE_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(path = %path.display(), "using main config template");
                Ok(text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DEFAULT_MAIN_TEMPLATE.to_owned()),
            Err(e) => Err(NginxManagerError::io(&path, e)),
        }
    }

    /// 템플릿의 `{{placeholder}}` 를 치환합니다.
    pub fn render_template(&self, template: &str) -> String {
        self.replacements
            .iter()
            .fold(template.to_owned(), |text, (key, value)| {
                text.replace(key, value)
            })
    }
}

async fn write_atomic(path: &Path, text: &str) -> Result<(), NginxManagerError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, text)
        .await
        .map_err(|e| NginxManagerError::io(&tmp, e))?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
        }
        return Err(NginxManagerError::io(path, e));
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<bool, NginxManagerError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(NginxManagerError::io(path, e)),
    }
}
