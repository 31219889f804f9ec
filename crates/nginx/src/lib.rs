//! dockgate-nginx: 프록시 규칙 컴파일러와 안전한 Nginx 설정 적용
//!
//! 구조화된 라우팅 규칙([`Rule`])을 Nginx 설정 텍스트로 변환하고,
//! `nginx -t` 를 통과한 변경만 라이브 프로세스에 reload 합니다.
//! 실패하면 활성 설정 디렉토리를 이전 상태로 되돌립니다.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`NginxManagerError`)
//! - [`config`]: Manager configuration (`NginxManagerConfig`, builder)
//! - [`rule`]: Rule model, validation and rule file loading
//! - [`generator`]: Rule to configuration text (`generate`, typed directive tree)
//! - [`store`]: Active configuration directory (`ConfigStore`)
//! - [`process`]: Nginx process abstraction (`NginxProcess` trait, `CommandNginx`)
//! - [`gate`]: Configuration test gate (`ValidationGate`)
//! - [`controller`]: Write/test/apply state machine (`ReloadController`)
//!
//! # Architecture
//!
//! ```text
//! Rule ──validate──▶ generate ──▶ ReloadController (lock)
//!                                      │
//!                                 ConfigStore.write()
//!                                      │
//!                                 ValidationGate (nginx -t)
//!                                   │           │
//!                                 pass         fail
//!                                   │           │
//!                          nginx -s reload   ConfigStore.restore()
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod generator;
pub mod process;
pub mod rule;
pub mod store;

// --- Public API Re-exports ---

// Controller (main orchestrator)
pub use controller::{NginxStatus, ReloadController, ReloadState, SyncReport};

// Configuration
pub use config::{NginxManagerConfig, NginxManagerConfigBuilder};

// Error
pub use error::NginxManagerError;

// Rule model
pub use rule::{
    AdvancedConfig, CacheConfig, CorsConfig, HealthCheck, LoadBalancingMethod,
    LoadBalancingTarget, Protocol, ProxyBuffers, RateLimit, RewriteFlag, RewriteRule, Rule,
    load_rule_from_file, load_rules_from_dir,
};

// Generator
pub use generator::{GeneratorOptions, generate, generate_with};

// Store
pub use store::{ConfigContext, ConfigStore, StoredConfig};

// Process
pub use process::{CommandNginx, NginxProcess, ProcessOutput};

// Gate
pub use gate::{ValidationGate, ValidationOutcome};
