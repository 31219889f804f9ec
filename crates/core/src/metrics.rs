//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않은 경우 매크로는 no-op 입니다.
//!
//! `dockgate` CLI 는 레코더를 설치하지 않습니다. 라이브러리를 포함하는
//! 프로세스가 자체 레코더(예: Prometheus exporter)를 설치한 뒤
//! [`describe_all`]을 호출해야 값이 수집됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dockgate_`
//! - 모듈명: `nginx_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(dockgate_core::metrics::NGINX_ROLLBACKS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 작업 레이블 키 (apply, remove, sync)
pub const LABEL_OPERATION: &str = "operation";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Nginx 메트릭 ──────────────────────────────────────────────────

/// Nginx: 완료된 설정 작업 수 (counter, label: operation, result)
pub const NGINX_OPERATIONS_TOTAL: &str = "dockgate_nginx_operations_total";

/// Nginx: `nginx -t` 실패 수 (counter)
pub const NGINX_TEST_FAILURES_TOTAL: &str = "dockgate_nginx_test_failures_total";

/// Nginx: reload 실패 수 (counter)
pub const NGINX_RELOAD_FAILURES_TOTAL: &str = "dockgate_nginx_reload_failures_total";

/// Nginx: 롤백 수행 수 (counter)
pub const NGINX_ROLLBACKS_TOTAL: &str = "dockgate_nginx_rollbacks_total";

/// Nginx: 설정 테스트 소요 시간 (histogram, 초)
pub const NGINX_TEST_DURATION_SECONDS: &str = "dockgate_nginx_test_duration_seconds";

/// Nginx: 활성 규칙 파일 수 (gauge)
pub const NGINX_ACTIVE_RULES: &str = "dockgate_nginx_active_rules";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        NGINX_OPERATIONS_TOTAL,
        "Total number of configuration operations by operation and result"
    );
    describe_counter!(
        NGINX_TEST_FAILURES_TOTAL,
        "Total number of rejected nginx configuration tests"
    );
    describe_counter!(
        NGINX_RELOAD_FAILURES_TOTAL,
        "Total number of failed nginx reloads after a passing test"
    );
    describe_counter!(
        NGINX_ROLLBACKS_TOTAL,
        "Total number of configuration rollbacks"
    );
    describe_histogram!(
        NGINX_TEST_DURATION_SECONDS,
        "Time spent running the nginx configuration test"
    );
    describe_gauge!(
        NGINX_ACTIVE_RULES,
        "Number of rule files in the active configuration directory"
    );
}
