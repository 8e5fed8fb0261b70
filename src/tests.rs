use std::cell::RefCell;
use std::time::Duration;

use crate::*;

mod api;
mod determinism;
mod dispatch;
mod url;

/// Tokenize `markdown` with the default CommonMark options.
fn tokens_of(markdown: &str) -> Vec<Token> {
    CommonMark::default().tokenize(&normalize(markdown))
}

fn indexes_of(tokens: &[Token]) -> Indexes {
    match Indexes::build(tokens, &Limits::default()) {
        Ok(indexes) => indexes,
        Err(err) => panic!("indexing failed: {}", err),
    }
}

fn open(kind: &str, tag: &str) -> Token {
    Token::new(format!("{}_open", kind), Nesting::Open).with_tag(tag)
}

fn close(kind: &str, tag: &str) -> Token {
    Token::new(format!("{}_close", kind), Nesting::Close).with_tag(tag)
}

fn flat(kind: &str) -> Token {
    Token::new(kind, Nesting::Flat)
}

/// `heading_open`, `inline`, `heading_close` for a heading on `line`.
fn heading(level: u8, line: usize, title: &str) -> Vec<Token> {
    let tag = format!("h{}", level);
    vec![
        open("heading", &tag).with_map(line, line + 1),
        flat("inline")
            .with_map(line, line + 1)
            .with_content(title),
        close("heading", &tag),
    ]
}

/// A paragraph spanning `[start, end)`.
fn paragraph(start: usize, end: usize, text: &str) -> Vec<Token> {
    vec![
        open("paragraph", "p").with_map(start, end),
        flat("inline").with_map(start, end).with_content(text),
        close("paragraph", "p"),
    ]
}

/// `depth` nested blockquotes around one paragraph.
fn nested(depth: usize) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(depth * 2 + 3);
    for _ in 0..depth {
        tokens.push(open("blockquote", "blockquote"));
    }
    tokens.extend(paragraph(0, 1, "deep"));
    for _ in 0..depth {
        tokens.push(close("blockquote", "blockquote"));
    }
    tokens
}

fn run_pipeline(markdown: &str, names: &[&str], options: &Options) -> ParseOutcome {
    let collectors = match crate::collectors::by_names(names, options) {
        Ok(collectors) => collectors,
        Err(err) => panic!("{}", err),
    };
    parse(markdown, collectors, options)
}

/// A collector that writes `(name, position)` to a shared log for every
/// token it sees.
struct Recorder<'l> {
    name: String,
    types: Vec<&'static str>,
    tags: Vec<&'static str>,
    log: &'l RefCell<Vec<(String, usize)>>,
}

impl<'l> Recorder<'l> {
    fn new(name: &str, types: &[&'static str], log: &'l RefCell<Vec<(String, usize)>>) -> Self {
        Recorder {
            name: name.to_string(),
            types: types.to_vec(),
            tags: Vec::new(),
            log,
        }
    }

    fn with_tags(mut self, tags: &[&'static str]) -> Self {
        self.tags = tags.to_vec();
        self
    }
}

impl<'l> Collector for Recorder<'l> {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles_types(&self) -> &[&str] {
        &self.types
    }

    fn handles_tags(&self) -> &[&str] {
        &self.tags
    }

    fn on_token(&mut self, pos: usize, _token: &Token, _ctx: &DispatchContext<'_>) {
        self.log.borrow_mut().push((self.name.clone(), pos));
    }

    fn finalize(&mut self) -> serde_json::Value {
        let seen = self
            .log
            .borrow()
            .iter()
            .filter(|(name, _)| *name == self.name)
            .count();
        serde_json::json!({ "seen": seen })
    }
}

macro_rules! assert_rejected {
    ($url:expr, $reason:ident) => {
        assert_rejected!($url, $reason, UrlContext::Link)
    };
    ($url:expr, $reason:ident, $context:expr) => {{
        let verdict = validate_url_with($url, &UrlPolicy::default(), $context);
        assert!(!verdict.accepted, "{:?} should be rejected", $url);
        assert_eq!(verdict.reasons, vec![Reason::$reason], "for {:?}", $url);
    }};
}

macro_rules! assert_accepted {
    ($url:expr, $normalized:expr) => {
        assert_accepted!($url, $normalized, UrlContext::Link)
    };
    ($url:expr, $normalized:expr, $context:expr) => {{
        let verdict = validate_url_with($url, &UrlPolicy::default(), $context);
        assert!(verdict.accepted, "{:?} rejected: {:?}", $url, verdict.reasons);
        assert_eq!(verdict.normalized, $normalized);
    }};
}

pub(crate) use assert_accepted;
pub(crate) use assert_rejected;
