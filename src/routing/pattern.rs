//! Path templates with typed captures.
//!
//! # Responsibilities
//! - Parse a template such as `/groups/{group_id:int}/machines/`
//! - Compile it once into an anchored regex
//! - Extract named captures from a request path
//! - Build a path back from captures (reverse routing), raw or
//!   percent-encoded for links
//!
//! # Design Decisions
//! - Compiled at startup, never at match time
//! - Matching is anchored on both ends; a template is a whole-path match
//! - Capture values are strings at this layer; views convert them

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use serde::Serialize;

use crate::routing::{CaptureError, RoutingError};

/// Bytes escaped in capture values when rendering links. `/` stays literal so
/// token captures keep their shape; `%` is escaped so decoding is lossless.
const CAPTURE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The value class a capture accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// One or more ASCII digits (`{name:int}`).
    Digits,
    /// Any run of non-whitespace characters, `/` included (`{name:token}`).
    Token,
    /// Non-whitespace characters and literal spaces (`{name:text}`).
    Text,
}

impl CaptureKind {
    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "int" => Some(Self::Digits),
            "token" => Some(Self::Token),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    fn class(self) -> &'static str {
        match self {
            Self::Digits => "[0-9]+",
            Self::Token => r"\S+",
            Self::Text => r"[\S ]+",
        }
    }

    /// Returns true if `value` could have been produced by this capture.
    pub fn accepts(self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match self {
            Self::Digits => value.bytes().all(|b| b.is_ascii_digit()),
            Self::Token => !value.chars().any(char::is_whitespace),
            Self::Text => value.chars().all(|c| c == ' ' || !c.is_whitespace()),
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Digits => "int",
            Self::Token => "token",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Capture { name: String, kind: CaptureKind },
}

/// Named values extracted from a matched path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Captures(BTreeMap<String, String>);

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for reverse routing.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw string value of a capture.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Convert a capture for a view (e.g. `pk` to an integer).
    pub fn parse<T>(&self, name: &str) -> Result<T, CaptureError>
    where
        T: FromStr,
    {
        let raw = self.get(name).ok_or_else(|| CaptureError::Missing(name.to_string()))?;
        raw.parse().map_err(|_| CaptureError::Invalid {
            name: name.to_string(),
            value: raw.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl PathPattern {
    /// Parse and compile a template.
    ///
    /// Literal text is matched exactly; `{name:kind}` introduces a capture
    /// where kind is one of `int`, `token` or `text`.
    pub fn parse(template: &str) -> Result<Self, RoutingError> {
        let invalid = |reason: &str| RoutingError::InvalidPattern {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        if !template.starts_with('/') {
            return Err(invalid("template must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            if literal.contains('}') {
                return Err(invalid("unbalanced '}'"));
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(literal.to_string()));
            }
            let close = tail.find('}').ok_or_else(|| invalid("unterminated capture"))?;
            let body = &tail[1..close];
            let (name, marker) = body
                .split_once(':')
                .ok_or_else(|| invalid("capture needs a kind, e.g. {pk:int}"))?;
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid("capture names are [A-Za-z0-9_]+"));
            }
            let kind =
                CaptureKind::from_marker(marker).ok_or_else(|| invalid("unknown capture kind"))?;
            if segments
                .iter()
                .any(|s| matches!(s, Segment::Capture { name: n, .. } if n == name))
            {
                return Err(invalid("duplicate capture name"));
            }
            segments.push(Segment::Capture {
                name: name.to_string(),
                kind,
            });
            rest = &tail[close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid("unbalanced '}'"));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        let mut source = String::from("^");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => source.push_str(&regex::escape(text)),
                Segment::Capture { name, kind } => {
                    source.push_str(&format!("(?P<{}>{})", name, kind.class()));
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            segments,
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Names and kinds of the captures, in template order.
    pub fn captures(&self) -> impl Iterator<Item = (&str, CaptureKind)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture { name, kind } => Some((name.as_str(), *kind)),
            Segment::Literal(_) => None,
        })
    }

    /// Match a whole path, returning its captures.
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let caps = self.regex.captures(path)?;
        let mut captures = Captures::new();
        for (name, _) in self.captures() {
            if let Some(m) = caps.name(name) {
                captures.insert(name, m.as_str());
            }
        }
        Some(captures)
    }

    /// Build a path from captures, values verbatim. Extra captures are ignored.
    ///
    /// The result is in the form `matches` expects, i.e. already decoded.
    pub fn build(&self, route: &str, captures: &Captures) -> Result<String, RoutingError> {
        self.render(route, captures, Cow::Borrowed)
    }

    /// Like `build`, with capture values percent-encoded for use in a URL.
    pub fn build_encoded(&self, route: &str, captures: &Captures) -> Result<String, RoutingError> {
        self.render(route, captures, |value| {
            utf8_percent_encode(value, CAPTURE_VALUE).into()
        })
    }

    fn render<'v>(
        &self,
        route: &str,
        captures: &'v Captures,
        encode: impl Fn(&'v str) -> Cow<'v, str>,
    ) -> Result<String, RoutingError> {
        let mut path = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Capture { name, kind } => {
                    let value = captures.get(name).ok_or_else(|| RoutingError::MissingCapture {
                        route: route.to_string(),
                        capture: name.clone(),
                    })?;
                    if !kind.accepts(value) {
                        return Err(RoutingError::InvalidCapture {
                            route: route.to_string(),
                            capture: name.clone(),
                            kind: *kind,
                            value: value.to_string(),
                        });
                    }
                    path.push_str(&encode(value));
                }
            }
        }
        Ok(path)
    }
}
