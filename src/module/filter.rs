//! 属性过滤器表达式
//!
//! 实现需求对能力属性的文本过滤器匹配，语法为 LDAP 风格的前缀表达式：
//!
//! ```text
//! (&(vendor=acme)(|(version>=1.0)(!(stability=alpha))))
//! ```
//!
//! 支持 `=`（含 `*` 通配）、`>=`、`<=` 三种比较；比较时优先按版本号、
//! 其次按数值、最后按字符串比较。

use std::collections::BTreeMap;

use crate::module::descriptor::parse_version;
use crate::utils::{CoreError, Result};

/// 已解析的过滤器表达式
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    root: Node,
    source: String,
}

/// 语法树节点
#[derive(Debug, Clone, PartialEq)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Compare { attr: String, op: Op, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ge,
    Le,
}

impl Filter {
    /// 解析过滤器表达式
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser {
            input: source.as_bytes(),
            pos: 0,
        };
        parser.skip_whitespace();
        let root = parser.parse_node()?;
        parser.skip_whitespace();
        if parser.pos != parser.input.len() {
            return Err(CoreError::InvalidFilter(format!(
                "'{}' 位置 {} 处有多余内容",
                source, parser.pos
            )));
        }
        Ok(Self {
            root,
            source: source.to_string(),
        })
    }

    /// 对属性表求值
    pub fn matches(&self, attributes: &BTreeMap<String, String>) -> bool {
        Self::eval(&self.root, attributes)
    }

    /// 原始表达式文本
    pub fn source(&self) -> &str {
        &self.source
    }

    fn eval(node: &Node, attrs: &BTreeMap<String, String>) -> bool {
        match node {
            Node::And(children) => children.iter().all(|c| Self::eval(c, attrs)),
            Node::Or(children) => children.iter().any(|c| Self::eval(c, attrs)),
            Node::Not(child) => !Self::eval(child, attrs),
            Node::Compare { attr, op, value } => match attrs.get(attr) {
                None => false,
                Some(actual) => compare(actual, *op, value),
            },
        }
    }
}

/// 比较实际属性值与期望值
///
/// `=` 支持 `*` 通配；`>=`/`<=` 依次尝试版本号、数值、字符串序比较。
fn compare(actual: &str, op: Op, expected: &str) -> bool {
    match op {
        Op::Eq => wildcard_match(actual, expected),
        Op::Ge | Op::Le => {
            let ordering = if let (Ok(a), Ok(b)) = (parse_version(actual), parse_version(expected)) {
                a.cmp(&b)
            } else if let (Ok(a), Ok(b)) = (actual.parse::<f64>(), expected.parse::<f64>()) {
                a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                actual.cmp(expected)
            };
            match op {
                Op::Ge => ordering != std::cmp::Ordering::Less,
                Op::Le => ordering != std::cmp::Ordering::Greater,
                Op::Eq => unreachable!(),
            }
        }
    }
}

/// `*` 通配匹配（`acme*`、`*impl`、`a*b*c`）
fn wildcard_match(actual: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return actual == pattern;
    }
    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = actual;

    // 首段必须是前缀
    if let Some(first) = segments.first() {
        match rest.strip_prefix(first) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    // 末段必须是后缀
    if let Some(last) = segments.last() {
        if segments.len() > 1 {
            match rest.strip_suffix(last) {
                Some(r) => rest = r,
                None => return false,
            }
        }
    }
    // 中间段依序出现
    for segment in &segments[1..segments.len().saturating_sub(1)] {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    true
}

/// 递归下降解析器
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_node(&mut self) -> Result<Node> {
        self.expect(b'(')?;
        let node = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Node::And(self.parse_children()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Node::Or(self.parse_children()?)
            }
            Some(b'!') => {
                self.pos += 1;
                self.skip_whitespace();
                let child = self.parse_node()?;
                Node::Not(Box::new(child))
            }
            _ => self.parse_compare()?,
        };
        self.expect(b')')?;
        Ok(node)
    }

    fn parse_children(&mut self) -> Result<Vec<Node>> {
        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'(') => children.push(self.parse_node()?),
                _ => break,
            }
        }
        if children.is_empty() {
            return Err(self.error("组合操作符缺少子表达式"));
        }
        Ok(children)
    }

    fn parse_compare(&mut self) -> Result<Node> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'=' || c == b'>' || c == b'<' || c == b')' {
                break;
            }
            self.pos += 1;
        }
        let attr = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("属性名不是合法 UTF-8"))?
            .trim()
            .to_string();
        if attr.is_empty() {
            return Err(self.error("缺少属性名"));
        }

        let op = match self.peek() {
            Some(b'=') => {
                self.pos += 1;
                Op::Eq
            }
            Some(b'>') => {
                self.pos += 1;
                self.expect(b'=')?;
                Op::Ge
            }
            Some(b'<') => {
                self.pos += 1;
                self.expect(b'=')?;
                Op::Le
            }
            _ => return Err(self.error("缺少比较操作符")),
        };

        let value_start = self.pos;
        while let Some(c) = self.peek() {
            if c == b')' {
                break;
            }
            self.pos += 1;
        }
        let value = std::str::from_utf8(&self.input[value_start..self.pos])
            .map_err(|_| self.error("属性值不是合法 UTF-8"))?
            .trim()
            .to_string();

        Ok(Node::Compare { attr, op, value })
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("期望 '{}'", c as char)))
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> CoreError {
        CoreError::InvalidFilter(format!(
            "{} (位置 {})",
            message, self.pos
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_equality() {
        let f = Filter::parse("(vendor=acme)").unwrap();
        assert!(f.matches(&attrs(&[("vendor", "acme")])));
        assert!(!f.matches(&attrs(&[("vendor", "other")])));
        assert!(!f.matches(&attrs(&[])));
    }

    #[test]
    fn test_and_or_not() {
        let f = Filter::parse("(&(vendor=acme)(tier=core))").unwrap();
        assert!(f.matches(&attrs(&[("vendor", "acme"), ("tier", "core")])));
        assert!(!f.matches(&attrs(&[("vendor", "acme")])));

        let f = Filter::parse("(|(vendor=acme)(vendor=other))").unwrap();
        assert!(f.matches(&attrs(&[("vendor", "other")])));

        let f = Filter::parse("(!(stability=alpha))").unwrap();
        assert!(f.matches(&attrs(&[("stability", "stable")])));
        assert!(!f.matches(&attrs(&[("stability", "alpha")])));
    }

    #[test]
    fn test_nested_expression() {
        let f = Filter::parse("(&(vendor=acme)(|(version>=2.0)(stability=beta)))").unwrap();
        assert!(f.matches(&attrs(&[("vendor", "acme"), ("version", "2.1.0")])));
        assert!(f.matches(&attrs(&[("vendor", "acme"), ("stability", "beta")])));
        assert!(!f.matches(&attrs(&[("vendor", "acme"), ("version", "1.0.0")])));
    }

    #[test]
    fn test_version_comparison() {
        let f = Filter::parse("(version>=1.5)").unwrap();
        assert!(f.matches(&attrs(&[("version", "1.5.0")])));
        assert!(f.matches(&attrs(&[("version", "1.10.0")])));
        assert!(!f.matches(&attrs(&[("version", "1.4.9")])));

        let f = Filter::parse("(version<=2.0)").unwrap();
        assert!(f.matches(&attrs(&[("version", "2.0.0")])));
        assert!(!f.matches(&attrs(&[("version", "2.0.1")])));
    }

    #[test]
    fn test_wildcard() {
        let f = Filter::parse("(name=com.acme.*)").unwrap();
        assert!(f.matches(&attrs(&[("name", "com.acme.widgets")])));
        assert!(!f.matches(&attrs(&[("name", "org.other")])));

        let f = Filter::parse("(name=*impl)").unwrap();
        assert!(f.matches(&attrs(&[("name", "widget.impl")])));

        let f = Filter::parse("(name=a*c)").unwrap();
        assert!(f.matches(&attrs(&[("name", "abc")])));
        assert!(f.matches(&attrs(&[("name", "ac")])));
        assert!(!f.matches(&attrs(&[("name", "ab")])));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Filter::parse("(a=").is_err());
        assert!(Filter::parse("a=b").is_err());
        assert!(Filter::parse("(&)").is_err());
        assert!(Filter::parse("(=v)").is_err());
        assert!(Filter::parse("(a=b)(c=d)").is_err());
    }

    #[test]
    fn test_source_preserved() {
        let f = Filter::parse("(vendor=acme)").unwrap();
        assert_eq!(f.source(), "(vendor=acme)");
    }
}
