//! 설정 생성기 -- [`Rule`]을 Nginx 설정 텍스트로 변환합니다.
//!
//! 순수 함수입니다. 파일이나 프로세스에 접근하지 않으며 같은 입력에 대해
//! 항상 바이트 단위로 같은 출력을 냅니다 (헤더 맵은 `BTreeMap`).
//!
//! HTTP/HTTPS 규칙은 `http` 컨텍스트에 포함될 `server` 블록을,
//! TCP 규칙은 `stream` 컨텍스트에 포함될 `server` 블록을 생성합니다.

pub mod directive;

use crate::error::NginxManagerError;
use crate::rule::{
    AdvancedConfig, HealthCheck, LoadBalancingMethod, Protocol, RateLimit, Rule,
};

pub use directive::{ConfigDocument, Node};

/// 헬스 체크 upstream 그룹의 공유 메모리 크기
const UPSTREAM_ZONE_SIZE: &str = "64k";

/// 생성기 옵션
///
/// 메인 설정에 선언된 공유 zone 이름과 일치해야 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// `proxy_cache` 가 참조하는 캐시 zone
    pub cache_zone: String,
    /// 공유 `limit_req_zone` 이름
    pub rate_limit_zone: String,
    /// 공유 zone 의 초당 요청 수
    pub rate_limit_zone_rps: u32,
    /// upstream 이름 접두어
    pub upstream_prefix: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            cache_zone: "dockgate_cache".to_owned(),
            rate_limit_zone: "one".to_owned(),
            rate_limit_zone_rps: 10,
            upstream_prefix: "backend".to_owned(),
        }
    }
}

/// 기본 옵션으로 규칙을 렌더링합니다.
pub fn generate(rule: &Rule) -> Result<String, NginxManagerError> {
    generate_with(rule, &GeneratorOptions::default())
}

/// 주어진 옵션으로 규칙을 렌더링합니다.
///
/// # Errors
/// 대상(단일 대상 또는 로드밸런싱 대상)이 하나도 없으면 `Compile` 에러.
/// 검증을 통과한 규칙에서는 발생하지 않습니다.
pub fn generate_with(rule: &Rule, options: &GeneratorOptions) -> Result<String, NginxManagerError> {
    build_document(rule, options).map(|doc| doc.render())
}

/// 규칙의 설정 트리를 만듭니다.
pub fn build_document(
    rule: &Rule,
    options: &GeneratorOptions,
) -> Result<ConfigDocument, NginxManagerError> {
    if !rule.uses_upstream() && !rule.has_single_target() {
        return Err(NginxManagerError::Compile {
            rule_id: rule.id.clone(),
            reason: "rule has no target".to_owned(),
        });
    }

    let mut doc = ConfigDocument::new();
    if rule.name.is_empty() {
        doc.push(Node::comment(format!("({})", rule.id)));
    } else {
        doc.push(Node::comment(format!("{} ({})", rule.name, rule.id)));
    }

    match rule.protocol {
        Protocol::Tcp => build_stream(rule, options, &mut doc)?,
        Protocol::Http | Protocol::Https => build_http(rule, options, &mut doc),
    }

    Ok(doc)
}

fn upstream_name(rule: &Rule, options: &GeneratorOptions) -> String {
    format!("{}_{}", options.upstream_prefix, rule.id)
}

/// 헬스 체크는 upstream 그룹의 공유 메모리 zone 을 요구하므로,
/// 단일 타깃 규칙도 헬스 체크가 있으면 서버 하나짜리 그룹으로 렌더링합니다.
fn needs_upstream(rule: &Rule) -> bool {
    rule.uses_upstream() || rule.health_check.is_some()
}

fn upstream_block(rule: &Rule, options: &GeneratorOptions) -> Node {
    let name = upstream_name(rule, options);
    let mut servers = Vec::with_capacity(rule.load_balancing_targets.len() + 2);
    if rule.health_check.is_some() {
        servers.push(Node::directive(
            "zone",
            [name.clone(), UPSTREAM_ZONE_SIZE.to_owned()],
        ));
    }
    match rule.load_balancing_method {
        LoadBalancingMethod::RoundRobin => {}
        LoadBalancingMethod::LeastConn => {
            servers.push(Node::directive("least_conn", Vec::<String>::new()));
        }
        LoadBalancingMethod::IpHash => {
            servers.push(Node::directive("ip_hash", Vec::<String>::new()));
        }
    }
    if rule.uses_upstream() {
        for target in &rule.load_balancing_targets {
            servers.push(Node::directive(
                "server",
                [
                    format!("{}:{}", target.container, target.port),
                    format!("weight={}", target.weight),
                ],
            ));
        }
    } else {
        servers.push(Node::directive(
            "server",
            [format!("{}:{}", rule.target_container, rule.target_port)],
        ));
    }
    Node::block("upstream", [name], servers)
}

fn secs(n: u64) -> String {
    format!("{n}s")
}

fn build_http(rule: &Rule, options: &GeneratorOptions, doc: &mut ConfigDocument) {
    let advanced = rule.advanced_config.as_ref();
    let rate_limit = advanced
        .and_then(|a| a.rate_limit.as_ref())
        .filter(|rl| rl.enabled);

    // limit_req_zone/match/upstream 은 http 컨텍스트 지시어라 server 블록 앞에 둡니다.
    let rate_zone = rate_limit.map(|rl| {
        if rl.per_ip && rl.requests_per_second == options.rate_limit_zone_rps {
            options.rate_limit_zone.clone()
        } else {
            let zone = format!("rl_{}", rule.id);
            let key = if rl.per_ip {
                "$binary_remote_addr"
            } else {
                "$server_name"
            };
            doc.push(Node::directive(
                "limit_req_zone",
                [
                    key.to_owned(),
                    format!("zone={zone}:10m"),
                    format!("rate={}r/s", rl.requests_per_second),
                ],
            ));
            zone
        }
    });

    if let Some(hc) = &rule.health_check {
        doc.push(Node::block(
            "match",
            [format!("hc_{}", rule.id)],
            vec![Node::directive(
                "status",
                hc.success_codes.iter().map(u16::to_string),
            )],
        ));
    }

    if needs_upstream(rule) {
        doc.push(upstream_block(rule, options));
    }
    doc.push(Node::Blank);

    let mut server = Vec::new();
    if rule.is_tls() {
        server.push(Node::directive("listen", ["443", "ssl"]));
    } else {
        server.push(Node::directive("listen", ["80"]));
    }
    server.push(Node::directive("server_name", [rule.server_name()]));
    if rule.is_tls() {
        if let Some(cert) = &rule.ssl_cert_path {
            server.push(Node::directive("ssl_certificate", [cert.as_str()]));
        }
        if let Some(key) = &rule.ssl_key_path {
            server.push(Node::directive("ssl_certificate_key", [key.as_str()]));
        }
    }
    if let Some(adv) = advanced {
        push_buffer_directives(adv, &mut server);
    }

    let scheme = if rule.backend_https { "https" } else { "http" };
    let pass = if needs_upstream(rule) {
        format!("{scheme}://{}", upstream_name(rule, options))
    } else {
        format!(
            "{scheme}://{}:{}",
            rule.target_container, rule.target_port
        )
    };

    let mut location = vec![Node::directive("proxy_pass", [pass])];
    for (name, value) in &rule.headers {
        location.push(Node::directive(
            "proxy_set_header",
            [name.as_str(), value.as_str()],
        ));
    }
    for (name, value) in &rule.response_headers {
        location.push(Node::directive("add_header", [name.as_str(), value.as_str()]));
    }

    if let Some(adv) = advanced {
        push_location_advanced(adv, options, &mut location);
    }
    if let (Some(rl), Some(zone)) = (rate_limit, rate_zone) {
        location.push(limit_req(rl, &zone));
    }
    if let Some(adv) = advanced {
        for rw in &adv.rewrite_rules {
            location.push(Node::directive(
                "rewrite",
                [
                    rw.pattern.as_str(),
                    rw.replacement.as_str(),
                    rw.flag.as_str(),
                ],
            ));
        }
    }
    if let Some(hc) = &rule.health_check {
        push_http_health_check(rule, hc, advanced, &mut location);
    }

    server.push(Node::block("location", [rule.effective_path()], location));
    doc.push(Node::block("server", Vec::<String>::new(), server));
}

fn push_buffer_directives(adv: &AdvancedConfig, server: &mut Vec<Node>) {
    if let Some(size) = &adv.client_max_body_size {
        server.push(Node::directive("client_max_body_size", [size.as_str()]));
    }
    if let Some(size) = &adv.proxy_buffer_size {
        server.push(Node::directive("proxy_buffer_size", [size.as_str()]));
    }
    if let Some(buffers) = &adv.proxy_buffers {
        server.push(Node::directive(
            "proxy_buffers",
            [buffers.number.to_string(), buffers.size.clone()],
        ));
    }
}

fn push_location_advanced(adv: &AdvancedConfig, options: &GeneratorOptions, out: &mut Vec<Node>) {
    for (name, value) in [
        ("proxy_connect_timeout", adv.proxy_connect_timeout),
        ("proxy_send_timeout", adv.proxy_send_timeout),
        ("proxy_read_timeout", adv.proxy_read_timeout),
    ] {
        if let Some(n) = value {
            out.push(Node::directive(name, [secs(n)]));
        }
    }

    if let Some(cache) = adv.cache.as_ref().filter(|c| c.enabled) {
        out.push(Node::directive("proxy_cache", [options.cache_zone.as_str()]));
        out.push(Node::directive(
            "proxy_cache_valid",
            ["200".to_owned(), "302".to_owned(), secs(cache.duration)],
        ));
    }

    if let Some(cors) = adv.cors.as_ref().filter(|c| c.enabled) {
        for (header, value) in [
            ("Access-Control-Allow-Origin", &cors.allow_origin),
            ("Access-Control-Allow-Methods", &cors.allow_methods),
            ("Access-Control-Allow-Headers", &cors.allow_headers),
        ] {
            out.push(Node::directive(
                "add_header",
                [header, value.as_str(), "always"],
            ));
        }
        if cors.allow_credentials {
            out.push(Node::directive(
                "add_header",
                ["Access-Control-Allow-Credentials", "true", "always"],
            ));
        }
        out.push(Node::block(
            "if",
            ["($request_method", "=", "OPTIONS)"],
            vec![Node::directive("return", ["204"])],
        ));
    }
}

fn limit_req(rl: &RateLimit, zone: &str) -> Node {
    let mut args = vec![format!("zone={zone}"), format!("burst={}", rl.burst_size)];
    if rl.nodelay {
        args.push("nodelay".to_owned());
    }
    Node::directive("limit_req", args)
}

fn push_http_health_check(
    rule: &Rule,
    hc: &HealthCheck,
    advanced: Option<&AdvancedConfig>,
    out: &mut Vec<Node>,
) {
    out.push(Node::directive(
        "health_check",
        [
            format!("uri={}", hc.path),
            format!("interval={}", secs(hc.interval)),
            format!("fails={}", hc.retries),
            "passes=1".to_owned(),
            format!("match=hc_{}", rule.id),
        ],
    ));
    // http 헬스 체크 요청은 location 의 proxy_*_timeout 을 따릅니다.
    // 같은 지시어가 두 번 나오면 nginx -t 가 실패하므로 명시 값이 우선합니다.
    let connect_set = advanced.is_some_and(|a| a.proxy_connect_timeout.is_some());
    let read_set = advanced.is_some_and(|a| a.proxy_read_timeout.is_some());
    if !connect_set {
        out.push(Node::directive("proxy_connect_timeout", [secs(hc.timeout)]));
    }
    if !read_set {
        out.push(Node::directive("proxy_read_timeout", [secs(hc.timeout)]));
    }
}

fn build_stream(
    rule: &Rule,
    options: &GeneratorOptions,
    doc: &mut ConfigDocument,
) -> Result<(), NginxManagerError> {
    let port = rule.listen_port().ok_or_else(|| NginxManagerError::Compile {
        rule_id: rule.id.clone(),
        reason: "tcp rule has no port to listen on".to_owned(),
    })?;

    if needs_upstream(rule) {
        doc.push(upstream_block(rule, options));
    }
    doc.push(Node::Blank);

    let listen = if rule.source_host.is_empty() {
        port.to_string()
    } else {
        format!("{}:{port}", rule.source_host)
    };
    let pass = if needs_upstream(rule) {
        upstream_name(rule, options)
    } else {
        format!("{}:{}", rule.target_container, rule.target_port)
    };

    let mut server = vec![
        Node::directive("listen", [listen]),
        Node::directive("proxy_pass", [pass]),
    ];

    if let Some(adv) = &rule.advanced_config {
        if let Some(n) = adv.proxy_connect_timeout {
            server.push(Node::directive("proxy_connect_timeout", [secs(n)]));
        }
        if let Some(n) = adv.proxy_read_timeout {
            server.push(Node::directive("proxy_timeout", [secs(n)]));
        }
    }

    if let Some(hc) = &rule.health_check {
        server.push(Node::directive(
            "health_check",
            [
                format!("interval={}", secs(hc.interval)),
                format!("fails={}", hc.retries),
                "passes=1".to_owned(),
            ],
        ));
        server.push(Node::directive("health_check_timeout", [secs(hc.timeout)]));
    }

    doc.push(Node::block("server", Vec::<String>::new(), server));
    Ok(())
}
