//! Nginx 설정 문법의 타입 트리
//!
//! 문자열 이어붙이기 대신 [`Node`] 트리를 만들고 [`ConfigDocument::render`]로
//! 한 번에 직렬화합니다. 들여쓰기와 인용 규칙은 이 모듈 한 곳에서만 결정됩니다.

use std::fmt::Write as _;

const INDENT: &str = "    ";

/// 설정 트리 노드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `name arg1 arg2;`
    Directive {
        /// 지시어 이름
        name: String,
        /// 인자 (필요 시 직렬화 단계에서 인용)
        args: Vec<String>,
    },
    /// `name args { ... }`
    Block {
        /// 블록 이름 (`server`, `location`, `upstream`, ...)
        name: String,
        /// 블록 인자
        args: Vec<String>,
        /// 하위 노드
        children: Vec<Node>,
    },
    /// `# text`
    Comment(String),
    /// 빈 줄
    Blank,
}

impl Node {
    /// 지시어 노드 생성
    pub fn directive<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Directive {
            name: name.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// 블록 노드 생성
    pub fn block<I, S>(name: &str, args: I, children: Vec<Node>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Block {
            name: name.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            children,
        }
    }

    /// 주석 노드 생성
    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment(text.into())
    }

    fn write_to(&self, out: &mut String, depth: usize) {
        let pad = INDENT.repeat(depth);
        match self {
            Self::Directive { name, args } => {
                out.push_str(&pad);
                out.push_str(name);
                write_args(out, args);
                out.push_str(";\n");
            }
            Self::Block {
                name,
                args,
                children,
            } => {
                out.push_str(&pad);
                out.push_str(name);
                write_args(out, args);
                out.push_str(" {\n");
                for child in children {
                    child.write_to(out, depth + 1);
                }
                out.push_str(&pad);
                out.push_str("}\n");
            }
            Self::Comment(text) => {
                let _ = writeln!(out, "{pad}# {text}");
            }
            Self::Blank => out.push('\n'),
        }
    }
}

fn write_args(out: &mut String, args: &[String]) {
    for arg in args {
        out.push(' ');
        out.push_str(&quote_arg(arg));
    }
}

/// 인자에 공백이나 Nginx 메타문자가 있으면 큰따옴표로 감쌉니다.
///
/// 따옴표 안에서는 `\`와 `"`를 이스케이프합니다.
pub fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '"' | '\'' | '#'));
    if !needs_quotes {
        return arg.to_owned();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// 최상위 노드 목록 (하나의 규칙 파일)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    nodes: Vec<Node>,
}

impl ConfigDocument {
    /// 빈 문서 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 최상위 노드 추가
    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// 최상위 노드 목록
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// 설정 텍스트로 직렬화
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_to(&mut out, 0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_blocks_with_four_space_indent() {
        let mut doc = ConfigDocument::new();
        doc.push(Node::comment("web (web)"));
        doc.push(Node::block(
            "server",
            Vec::<String>::new(),
            vec![
                Node::directive("listen", ["80"]),
                Node::block(
                    "location",
                    ["/"],
                    vec![Node::directive("proxy_pass", ["http://web:80"])],
                ),
            ],
        ));

        let expected = "# web (web)\n\
server {\n\
\x20   listen 80;\n\
\x20   location / {\n\
\x20       proxy_pass http://web:80;\n\
\x20   }\n\
}\n";
        assert_eq!(doc.render(), expected);
    }

    #[test]
    fn quotes_whitespace_and_metacharacters() {
        assert_eq!(quote_arg("$scheme"), "$scheme");
        assert_eq!(quote_arg("GET, POST"), "\"GET, POST\"");
        assert_eq!(quote_arg("a;b"), "\"a;b\"");
        assert_eq!(quote_arg("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_arg(""), "\"\"");
    }

    #[test]
    fn regex_with_quantifier_is_quoted_and_escaped() {
        assert_eq!(quote_arg(r"^/a{2}\.html$"), r#""^/a{2}\\.html$""#);
        assert_eq!(quote_arg(r"^/old/(.*)$"), r"^/old/(.*)$");
    }

    #[test]
    fn blank_and_empty_args() {
        let mut doc = ConfigDocument::new();
        doc.push(Node::directive("least_conn", Vec::<String>::new()));
        doc.push(Node::Blank);
        assert_eq!(doc.render(), "least_conn;\n\n");
        assert_eq!(doc.nodes().len(), 2);
    }
}
