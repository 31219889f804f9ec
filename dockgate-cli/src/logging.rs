//! dockgate 명령의 로그 출력 설정
//!
//! 로그는 항상 stderr 로 나갑니다. stdout 에는 렌더링된 설정과
//! `--output json` 보고서만 쓰이므로 파이프로 넘겨도 섞이지 않습니다.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dockgate_core::config::GeneralConfig;

/// 명령 실행 전에 한 번 호출합니다.
///
/// 레벨 우선순위는 `RUST_LOG`, `--log-level`, 설정 파일의 `general.log_level`
/// 순입니다. `--log-level` 은 호출 측에서 `config.log_level` 에 미리 덮어씁니다.
/// 설정 파일을 읽지 못하면 호출 측이 기본값을 넘기므로 로깅은 항상 켜집니다.
///
/// `log_format` 은 `"pretty"` (터미널) 또는 `"json"` (CI, 로그 수집기) 입니다.
/// 알 수 없는 형식이면 에러를 돌려주고 subscriber 는 설치하지 않습니다.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_log_format_is_rejected() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..GeneralConfig::default()
        };

        let err = init_tracing(&config).expect_err("unknown format should fail");
        assert!(err.to_string().contains("'xml'"), "{err}");
    }
}
