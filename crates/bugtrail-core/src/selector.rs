//! Compound selector parsing for sanitize patterns
//!
//! Syntax (a single compound selector, no combinators):
//!   .card-number             - class match
//!   #ssn                     - id match
//!   [data-private]           - attribute present
//!   [name="pin"]             - attribute equals
//!   [name*=card]             - attribute contains
//!   [name^=cc] [name$=cvc]   - attribute prefix / suffix
//!   input.secret[type=text]  - tag plus any of the above

use crate::element::Element;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub target: Target,
    pub op: MatchOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Id,
    Class,
    Attr(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
}

/// Patterns starting with one of these are treated as selectors.
pub fn looks_like_selector(pattern: &str) -> bool {
    matches!(pattern.trim_start().chars().next(), Some('.' | '#' | '['))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

impl Selector {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::selector_invalid(s, "empty selector"));
        }
        if s.contains(|c: char| c.is_whitespace() || c == '>' || c == '+' || c == '~')
            && !s.contains('[')
        {
            return Err(Error::selector_invalid(s, "combinators are not supported"));
        }

        let mut rest = s;
        let tag_len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        let tag = if tag_len > 0 {
            let (t, r) = rest.split_at(tag_len);
            rest = r;
            Some(t.to_ascii_lowercase())
        } else {
            None
        };

        let mut conditions = Vec::new();
        while !rest.is_empty() {
            let (condition, remaining) = Condition::parse_next(s, rest)?;
            conditions.push(condition);
            rest = remaining;
        }

        if tag.is_none() && conditions.is_empty() {
            return Err(Error::selector_invalid(s, "nothing to match"));
        }

        Ok(Self { tag, conditions })
    }

    pub fn matches<E: Element>(&self, element: &E) -> bool {
        if let Some(tag) = &self.tag {
            if element.tag_name() != *tag {
                return false;
            }
        }
        self.conditions.iter().all(|c| c.matches(element))
    }
}

impl Condition {
    /// Parse one `.x`, `#x` or `[...]` from the front of `rest`.
    fn parse_next<'a>(whole: &str, rest: &'a str) -> Result<(Self, &'a str)> {
        let mut chars = rest.chars();
        match chars.next() {
            Some(prefix @ ('.' | '#')) => {
                let body = &rest[1..];
                let len = body.find(|c: char| !is_ident_char(c)).unwrap_or(body.len());
                if len == 0 {
                    return Err(Error::selector_invalid(whole, "expected a name after '.' or '#'"));
                }
                let target = if prefix == '.' { Target::Class } else { Target::Id };
                Ok((
                    Self {
                        target,
                        op: MatchOp::Equals,
                        value: body[..len].to_string(),
                    },
                    &body[len..],
                ))
            }
            Some('[') => {
                let close = rest
                    .find(']')
                    .ok_or_else(|| Error::selector_invalid(whole, "unclosed '['"))?;
                let inner = rest[1..close].trim();
                Ok((Self::parse_attr(whole, inner)?, &rest[close + 1..]))
            }
            _ => Err(Error::selector_invalid(
                whole,
                &format!("unexpected '{}'", rest.chars().next().unwrap_or(' ')),
            )),
        }
    }

    fn parse_attr(whole: &str, inner: &str) -> Result<Self> {
        let Some(eq) = inner.find('=') else {
            if inner.is_empty() || !inner.chars().all(is_ident_char) {
                return Err(Error::selector_invalid(whole, "invalid attribute name"));
            }
            return Ok(Self {
                target: Target::Attr(inner.to_ascii_lowercase()),
                op: MatchOp::Exists,
                value: String::new(),
            });
        };

        let (name, op) = match inner[..eq].trim_end().strip_suffix(&['*', '^', '$'][..]) {
            Some(name) => {
                let op = match inner[..eq].trim_end().chars().last() {
                    Some('*') => MatchOp::Contains,
                    Some('^') => MatchOp::Prefix,
                    _ => MatchOp::Suffix,
                };
                (name.trim(), op)
            }
            None => (inner[..eq].trim(), MatchOp::Equals),
        };
        if name.is_empty() || !name.chars().all(is_ident_char) {
            return Err(Error::selector_invalid(whole, "invalid attribute name"));
        }

        let raw = inner[eq + 1..].trim();
        let value = match raw.chars().next() {
            Some(q @ ('"' | '\'')) => raw
                .strip_prefix(q)
                .and_then(|v| v.strip_suffix(q))
                .ok_or_else(|| Error::selector_invalid(whole, "unbalanced quotes"))?,
            _ => raw,
        };

        Ok(Self {
            target: Target::Attr(name.to_ascii_lowercase()),
            op,
            value: value.to_string(),
        })
    }

    pub fn matches<E: Element>(&self, element: &E) -> bool {
        match &self.target {
            Target::Class => element.class_names().iter().any(|c| *c == self.value),
            Target::Id => element.id().as_deref() == Some(self.value.as_str()),
            Target::Attr(name) => {
                let Some(actual) = element.attribute(name) else {
                    return false;
                };
                match self.op {
                    MatchOp::Exists => true,
                    MatchOp::Equals => actual == self.value,
                    MatchOp::Contains => actual.contains(&self.value),
                    MatchOp::Prefix => actual.starts_with(&self.value),
                    MatchOp::Suffix => actual.ends_with(&self.value),
                }
            }
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{}", tag)?;
        }
        for c in &self.conditions {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Target::Class => write!(f, ".{}", self.value),
            Target::Id => write!(f, "#{}", self.value),
            Target::Attr(name) => {
                let op = match self.op {
                    MatchOp::Exists => return write!(f, "[{}]", name),
                    MatchOp::Equals => "=",
                    MatchOp::Contains => "*=",
                    MatchOp::Prefix => "^=",
                    MatchOp::Suffix => "$=",
                };
                write!(f, "[{}{}\"{}\"]", name, op, self.value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementSnapshot;

    #[test]
    fn parse_class() {
        let s = Selector::parse(".card-number").unwrap();
        assert_eq!(s.tag, None);
        assert_eq!(s.conditions.len(), 1);
        assert_eq!(s.conditions[0].target, Target::Class);
        assert_eq!(s.conditions[0].value, "card-number");
    }

    #[test]
    fn parse_attribute_ops() {
        let s = Selector::parse(r#"input[name*=card][type="tel"]"#).unwrap();
        assert_eq!(s.tag.as_deref(), Some("input"));
        assert_eq!(s.conditions[0].op, MatchOp::Contains);
        assert_eq!(s.conditions[1].op, MatchOp::Equals);
        assert_eq!(s.conditions[1].value, "tel");
        assert_eq!(s.to_string(), r#"input[name*="card"][type="tel"]"#);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Selector::parse("[name=").is_err());
        assert!(Selector::parse(".").is_err());
        assert!(Selector::parse("#a > .b").is_err());
        assert!(Selector::parse(r#"[name="x]"#).is_err());
    }

    #[test]
    fn matches_elements() {
        let el = ElementSnapshot::new("input")
            .with_id("ssn")
            .with_class("private field")
            .with_attr("name", "cc-number");
        assert!(Selector::parse("#ssn").unwrap().matches(&el));
        assert!(Selector::parse(".private").unwrap().matches(&el));
        assert!(Selector::parse("[name^=cc]").unwrap().matches(&el));
        assert!(Selector::parse("[name$=number]").unwrap().matches(&el));
        assert!(!Selector::parse("textarea.private").unwrap().matches(&el));
        assert!(!Selector::parse("[data-secret]").unwrap().matches(&el));
    }

    #[test]
    fn selector_detection() {
        assert!(looks_like_selector(".x"));
        assert!(looks_like_selector("[data-x]"));
        assert!(!looks_like_selector("balance"));
    }
}
