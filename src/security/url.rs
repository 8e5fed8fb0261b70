//! Layered URL validation.
//!
//! Each layer either passes the URL on or rejects it outright; a rejected URL
//! carries the reason of the first failing layer and nothing is partially
//! accepted. The layers, in order:
//!
//! 1. emptiness and control characters;
//! 2. protocol-relative references;
//! 3. the scheme allow-list (with the image `data:` exception);
//! 4. authority shape for hierarchical schemes;
//! 5. backslashes;
//! 6. percent-encoding in the host and traversal in the decoded path;
//! 7. internationalized host names.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::options::UrlPolicy;
use crate::security::data_uri::validate_data_uri;
use crate::security::unicode::ScriptMix;

/// Schemes that are rejected however the policy is configured.  `data` is
/// let through only for images, by its own rules.
const DANGEROUS_SCHEMES: [&str; 4] = ["javascript", "vbscript", "file", "data"];

/// Schemes whose URLs must carry a host.
const HOST_REQUIRED: [&str; 2] = ["http", "https"];

/// Where a URL appears; `data:` is only ever acceptable for images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UrlContext {
    /// A link destination.
    #[default]
    Link,
    /// An image source.
    Image,
}

/// Why a URL was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Nothing but whitespace.
    Empty,
    /// C0, DEL or C1 control character.
    ControlCharacter,
    /// Starts with `//` or a backslash variant of it.
    ProtocolRelative,
    /// `javascript:`, `vbscript:`, `file:`, or `data:` outside an image.
    DangerousScheme,
    /// A scheme not on the allow-list.
    DisallowedScheme,
    /// A relative reference where the policy wants absolute URLs.
    RelativeReference,
    /// `data:` URI without a parseable header.
    MalformedDataUri,
    /// `data:` URI whose media type is not an allowed image type.
    DisallowedMediaType,
    /// `data:` URI whose payload would decode to more than allowed.
    DataUriTooLarge,
    /// `http:` without `//host`, or with an empty host.
    MissingHost,
    /// `user@` or `user:pass@` before the host.
    EmbeddedCredentials,
    /// A port that is not a number in `0..=65535`.
    InvalidPort,
    /// A backslash in the authority or path.
    Backslash,
    /// `%2f` or `%5c` in the host.
    EncodedSeparator,
    /// Any other percent-escape in the host.
    PercentEncodedHost,
    /// A `%` in the path not followed by two hex digits, or escapes that do
    /// not decode to UTF-8.
    MalformedEscape,
    /// `/../` in the decoded path.
    PathTraversal,
    /// The host fails IDNA processing.
    InvalidIdn,
    /// A host label mixing Latin with Cyrillic or Greek.
    MixedScriptHost,
}

impl Reason {
    /// The snake-case name used in results.
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Empty => "empty",
            Reason::ControlCharacter => "control_character",
            Reason::ProtocolRelative => "protocol_relative",
            Reason::DangerousScheme => "dangerous_scheme",
            Reason::DisallowedScheme => "disallowed_scheme",
            Reason::RelativeReference => "relative_reference",
            Reason::MalformedDataUri => "malformed_data_uri",
            Reason::DisallowedMediaType => "disallowed_media_type",
            Reason::DataUriTooLarge => "data_uri_too_large",
            Reason::MissingHost => "missing_host",
            Reason::EmbeddedCredentials => "embedded_credentials",
            Reason::InvalidPort => "invalid_port",
            Reason::Backslash => "backslash",
            Reason::EncodedSeparator => "encoded_separator",
            Reason::PercentEncodedHost => "percent_encoded_host",
            Reason::MalformedEscape => "malformed_escape",
            Reason::PathTraversal => "path_traversal",
            Reason::InvalidIdn => "invalid_idn",
            Reason::MixedScriptHost => "mixed_script_host",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of URL validation.  A rejection is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlVerdict {
    /// Whether every layer passed.
    pub accepted: bool,
    /// The normalized URL when accepted; the trimmed input otherwise.
    pub normalized: String,
    /// Why it was rejected; empty when accepted.
    pub reasons: Vec<Reason>,
}

impl UrlVerdict {
    fn accept(normalized: String) -> Self {
        UrlVerdict {
            accepted: true,
            normalized,
            reasons: Vec::new(),
        }
    }

    fn reject(input: &str, reason: Reason) -> Self {
        UrlVerdict {
            accepted: false,
            normalized: input.to_string(),
            reasons: vec![reason],
        }
    }
}

/// Validate a link destination under the default [`UrlPolicy`].
///
/// ```
/// # use markpass::validate_url;
/// assert!(validate_url("http://example.com").accepted);
/// assert!(!validate_url("http:example.com").accepted);
/// assert!(!validate_url("//evil.com").accepted);
/// assert!(!validate_url("javascript:alert(1)").accepted);
/// ```
pub fn validate_url(raw: &str) -> UrlVerdict {
    validate_url_with(raw, &UrlPolicy::default(), UrlContext::Link)
}

/// Validate `raw` under `policy` as it appears in `context`.
pub fn validate_url_with(raw: &str, policy: &UrlPolicy, context: UrlContext) -> UrlVerdict {
    let input = raw.trim_matches(|c: char| c.is_ascii_whitespace());
    match check(input, policy, context) {
        Ok(normalized) => UrlVerdict::accept(normalized.into_owned()),
        Err(reason) => UrlVerdict::reject(input, reason),
    }
}

fn check<'i>(
    input: &'i str,
    policy: &UrlPolicy,
    context: UrlContext,
) -> Result<Cow<'i, str>, Reason> {
    // 1
    if input.is_empty() {
        return Err(Reason::Empty);
    }
    if input.chars().any(char::is_control) {
        return Err(Reason::ControlCharacter);
    }

    // 2
    let bytes = input.as_bytes();
    if bytes.len() >= 2 && matches!(&bytes[..2], b"//" | b"\\\\" | b"/\\" | b"\\/") {
        return Err(Reason::ProtocolRelative);
    }

    // 3
    let (scheme, rest) = match split_scheme(input) {
        Some(split) => split,
        None => return check_relative(input, policy),
    };
    let scheme = scheme.to_ascii_lowercase();

    if scheme == "data" && context == UrlContext::Image {
        validate_data_uri(input, policy)?;
        return Ok(Cow::Owned(format!("data:{}", rest)));
    }
    if DANGEROUS_SCHEMES.contains(&scheme.as_str()) {
        return Err(Reason::DangerousScheme);
    }
    if !policy
        .allowed_schemes
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&scheme))
    {
        return Err(Reason::DisallowedScheme);
    }

    // 4
    let hierarchical = match rest.strip_prefix("//") {
        Some(hierarchical) => hierarchical,
        None if HOST_REQUIRED.contains(&scheme.as_str()) => return Err(Reason::MissingHost),
        None => {
            if rest.contains('\\') {
                return Err(Reason::Backslash);
            }
            return Ok(Cow::Owned(format!("{}:{}", scheme, rest)));
        }
    };

    let authority_end = hierarchical
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(hierarchical.len());
    let (authority, tail) = hierarchical.split_at(authority_end);
    if authority.contains('@') {
        return Err(Reason::EmbeddedCredentials);
    }
    let (host, port) = split_port(authority)?;
    if host.is_empty() {
        return Err(Reason::MissingHost);
    }

    // 5
    if authority.contains('\\') || tail.contains('\\') {
        return Err(Reason::Backslash);
    }

    // 6
    check_host_escapes(host)?;
    check_path(path_of(tail))?;

    // 7
    let ascii_host = if host.starts_with('[') {
        host.to_ascii_lowercase()
    } else {
        idna_host(host)?
    };

    let mut normalized = String::with_capacity(input.len() + 8);
    normalized.push_str(&scheme);
    normalized.push_str("://");
    normalized.push_str(&ascii_host);
    if let Some(port) = port {
        normalized.push(':');
        normalized.push_str(port);
    }
    normalized.push_str(tail);
    Ok(Cow::Owned(normalized))
}

/// Layers 5 and 6 for references without a scheme.
fn check_relative<'i>(input: &'i str, policy: &UrlPolicy) -> Result<Cow<'i, str>, Reason> {
    if !policy.allow_relative {
        return Err(Reason::RelativeReference);
    }
    if input.contains('\\') {
        return Err(Reason::Backslash);
    }
    check_path(path_of(input))?;
    Ok(Cow::Borrowed(input))
}

/// `scheme ":" rest`, where the scheme is `ALPHA *( ALPHA / DIGIT / "+" /
/// "-" / "." )` and comes before any `/`, `?` or `#`.
fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let colon = input.find(|c| matches!(c, ':' | '/' | '?' | '#'))?;
    if input.as_bytes()[colon] != b':' {
        return None;
    }
    let scheme = &input[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some((scheme, &input[colon + 1..]))
}

fn split_port(authority: &str) -> Result<(&str, Option<&str>), Reason> {
    let (host, port) = if authority.starts_with('[') {
        match authority.find(']') {
            Some(close) => {
                let (host, after) = authority.split_at(close + 1);
                match after.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None if after.is_empty() => (host, None),
                    None => return Err(Reason::InvalidPort),
                }
            }
            None => return Err(Reason::MissingHost),
        }
    } else {
        match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    match port {
        None | Some("") => Ok((host, None)),
        Some(port) if port.len() <= 5 && port.bytes().all(|b| b.is_ascii_digit()) => {
            match port.parse::<u32>() {
                Ok(n) if n <= 65535 => Ok((host, Some(port))),
                _ => Err(Reason::InvalidPort),
            }
        }
        Some(_) => Err(Reason::InvalidPort),
    }
}

fn check_host_escapes(host: &str) -> Result<(), Reason> {
    if !host.contains('%') {
        return Ok(());
    }
    let lower = host.to_ascii_lowercase();
    if lower.contains("%2f") || lower.contains("%5c") {
        Err(Reason::EncodedSeparator)
    } else {
        Err(Reason::PercentEncodedHost)
    }
}

/// The path: everything before the query or fragment.
fn path_of(tail: &str) -> &str {
    match tail.find(|c| matches!(c, '?' | '#')) {
        Some(end) => &tail[..end],
        None => tail,
    }
}

fn check_path(path: &str) -> Result<(), Reason> {
    let decoded = if path.contains('%') {
        percent_encoding_rfc3986::percent_decode_str(path)
            .map_err(|_| Reason::MalformedEscape)?
            .decode_utf8()
            .map_err(|_| Reason::MalformedEscape)?
    } else {
        Cow::Borrowed(path)
    };

    // An escaped backslash is a separator to some servers.
    let unified: Cow<'_, str> = if decoded.contains('\\') {
        Cow::Owned(decoded.replace('\\', "/"))
    } else {
        decoded
    };
    if unified.split('/').any(|segment| segment == "..") {
        return Err(Reason::PathTraversal);
    }
    Ok(())
}

fn idna_host(host: &str) -> Result<String, Reason> {
    let ascii = idna::domain_to_ascii(host).map_err(|_| Reason::InvalidIdn)?;
    if ascii.is_empty() {
        return Err(Reason::InvalidIdn);
    }

    // Check labels as they would be displayed, which also catches
    // look-alikes smuggled in pre-encoded as `xn--`.
    let (unicode, result) = idna::domain_to_unicode(&ascii);
    if result.is_err() {
        return Err(Reason::InvalidIdn);
    }
    for label in unicode.split('.') {
        let mut mix = ScriptMix::default();
        label.chars().for_each(|c| mix.add(c));
        if mix.is_mixed() {
            return Err(Reason::MixedScriptHost);
        }
    }
    Ok(ascii)
}
