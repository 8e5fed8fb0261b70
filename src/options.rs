//! Configuration for the pipeline.  Every group has a usable `Default`.

#[cfg(feature = "bon")]
use bon::Builder;
use std::time::Duration;

use crate::deadline::TimerStrategy;

#[derive(Default, Debug, Clone)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
/// Umbrella options struct.
pub struct Options {
    /// Size, depth and polling limits.
    pub limits: Limits,

    /// Wall-clock budget for one document.
    pub deadline: DeadlineOptions,

    /// URL and data-URI policy used by the built-in collectors.
    pub url: UrlPolicy,

    /// CommonMark extensions passed to the tokenizer.
    pub tokenizer: TokenizerOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "bon", derive(Builder))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
/// Guards against degenerate input.
pub struct Limits {
    /// Maximum depth of open tokens.  Must tolerate at least 5000.
    ///
    /// ```rust
    /// # use markpass::{Indexes, Limits, Nesting, Token};
    /// let mut tokens = Vec::new();
    /// for _ in 0..3 {
    ///     tokens.push(Token::new("blockquote_open", Nesting::Open));
    /// }
    /// for _ in 0..3 {
    ///     tokens.push(Token::new("blockquote_close", Nesting::Close));
    /// }
    /// let limits = Limits { max_nesting: 2, ..Limits::default() };
    /// assert!(Indexes::build(&tokens, &limits).is_err());
    /// ```
    #[cfg_attr(feature = "bon", builder(default = 10_000))]
    pub max_nesting: usize,

    /// Maximum raw input size in bytes.
    #[cfg_attr(feature = "bon", builder(default = 64 * 1024 * 1024))]
    pub max_input_bytes: usize,

    /// Deadline polling interval, in token visits.
    #[cfg_attr(feature = "bon", builder(default = 64))]
    pub check_interval: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_nesting: 10_000,
            max_input_bytes: 64 * 1024 * 1024,
            check_interval: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "bon", derive(Builder))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
/// Wall-clock budget.
pub struct DeadlineOptions {
    /// Budget for normalize, tokenize, index, dispatch and finalize together.
    /// `None` means unlimited.
    pub budget: Option<Duration>,

    /// Which timer backend to use.
    #[cfg_attr(feature = "bon", builder(default))]
    pub strategy: TimerStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "bon", derive(Builder))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
/// What the URL validator accepts.
pub struct UrlPolicy {
    /// Schemes accepted for links and images, lower-case.
    ///
    /// ```rust
    /// # use markpass::{validate_url_with, UrlContext, UrlPolicy};
    /// let policy = UrlPolicy {
    ///     allowed_schemes: vec!["https".to_string()],
    ///     ..UrlPolicy::default()
    /// };
    /// assert!(!validate_url_with("http://example.com", &policy, UrlContext::Link).accepted);
    /// assert!(validate_url_with("https://example.com", &policy, UrlContext::Link).accepted);
    /// ```
    #[cfg_attr(
        feature = "bon",
        builder(default = vec!["http".to_string(), "https".to_string(), "mailto".to_string()])
    )]
    pub allowed_schemes: Vec<String>,

    /// Media types accepted in `data:` URIs used as image sources.  `data:`
    /// is always rejected for links.
    #[cfg_attr(feature = "bon", builder(default = default_data_image_types()))]
    pub data_image_types: Vec<String>,

    /// Upper bound on the decoded size of an accepted `data:` URI.
    #[cfg_attr(feature = "bon", builder(default = 256 * 1024))]
    pub max_data_uri_bytes: usize,

    /// Whether relative references (no scheme) are accepted.
    #[cfg_attr(feature = "bon", builder(default = true))]
    pub allow_relative: bool,
}

fn default_data_image_types() -> Vec<String> {
    ["image/png", "image/gif", "image/jpeg", "image/webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for UrlPolicy {
    fn default() -> Self {
        UrlPolicy {
            allowed_schemes: vec!["http".to_string(), "https".to_string(), "mailto".to_string()],
            data_image_types: default_data_image_types(),
            max_data_uri_bytes: 256 * 1024,
            allow_relative: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "bon", derive(Builder))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
/// GFM extensions enabled in the CommonMark tokenizer.
pub struct TokenizerOptions {
    /// Pipe tables.
    #[cfg_attr(feature = "bon", builder(default = true))]
    pub table: bool,

    /// `~~strikethrough~~`.
    #[cfg_attr(feature = "bon", builder(default = true))]
    pub strikethrough: bool,

    /// Bare-URL autolinks.
    #[cfg_attr(feature = "bon", builder(default = true))]
    pub autolink: bool,

    /// `- [ ]` task list items.
    #[cfg_attr(feature = "bon", builder(default = true))]
    pub tasklist: bool,

    /// `[^1]` footnotes.
    #[cfg_attr(feature = "bon", builder(default = true))]
    pub footnotes: bool,

    /// `---` delimited front matter.
    #[cfg_attr(feature = "bon", builder(default))]
    pub front_matter: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        TokenizerOptions {
            table: true,
            strikethrough: true,
            autolink: true,
            tasklist: true,
            footnotes: true,
            front_matter: false,
        }
    }
}
