//! The flat token stream consumed by the index builder and dispatcher.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Whether a token opens a container, closes one, or stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Nesting {
    /// Opens a container; `+1`.
    Open,
    /// Self-contained; `0`.
    Flat,
    /// Closes the innermost open container; `-1`.
    Close,
}

impl From<Nesting> for i8 {
    fn from(nesting: Nesting) -> i8 {
        match nesting {
            Nesting::Open => 1,
            Nesting::Flat => 0,
            Nesting::Close => -1,
        }
    }
}

impl TryFrom<i8> for Nesting {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Nesting::Open),
            0 => Ok(Nesting::Flat),
            -1 => Ok(Nesting::Close),
            n => Err(format!("invalid nesting value {}", n)),
        }
    }
}

/// A half-open range of 0-based source lines, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    /// First line covered.
    pub start: usize,
    /// One past the last line covered.
    pub end: usize,
}

impl LineSpan {
    /// Construct a span; `end` is clamped so it is never before `start`.
    pub fn new(start: usize, end: usize) -> Self {
        LineSpan {
            start,
            end: end.max(start),
        }
    }

    /// Whether `line` lies within the span.
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line < self.end
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One element of the token stream.
///
/// Tokens are produced by a [`Tokenizer`](crate::Tokenizer) and are treated as
/// immutable once indexed. Block-level tokens form the top-level stream;
/// tokens of kind `"inline"` carry their inline content in `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token type, e.g. `"heading_open"`, `"inline"`, `"fence"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Open, close or flat.
    pub nesting: Nesting,

    /// HTML-ish tag, e.g. `"h2"`; empty when there is none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Attributes in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,

    /// Source lines covered, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<LineSpan>,

    /// Text content, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,

    /// Inline children, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Token>,
}

impl Token {
    /// A token with the given type and nesting and nothing else.
    pub fn new(kind: impl Into<String>, nesting: Nesting) -> Self {
        Token {
            kind: kind.into(),
            nesting,
            tag: String::new(),
            attrs: Vec::new(),
            map: None,
            content: String::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style tag setter.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Builder-style line span setter.
    pub fn with_map(mut self, start: usize, end: usize) -> Self {
        self.map = Some(LineSpan::new(start, end));
        self
    }

    /// Builder-style content setter.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Builder-style attribute appender.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Builder-style children setter.
    pub fn with_children(mut self, children: Vec<Token>) -> Self {
        self.children = children;
        self
    }

    /// Looks up the first attribute called `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The heading level encoded in an `hN` tag.
    pub fn heading_level(&self) -> Option<u8> {
        let digits = self.tag.strip_prefix('h')?;
        match digits.parse::<u8>() {
            Ok(level) if (1..=6).contains(&level) => Some(level),
            _ => None,
        }
    }

    /// The first line of the token, if mapped.
    pub fn line(&self) -> Option<usize> {
        self.map.map(|m| m.start)
    }
}
