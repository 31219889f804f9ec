//! dockgate 공통 크레이트
//!
//! 모든 dockgate 크레이트가 공유하는 최상위 에러 타입, `dockgate.toml` 설정,
//! 메트릭 이름 상수를 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DockgateError, NginxError};

// 설정
pub use config::{DockgateConfig, GeneralConfig, NginxConfig};
