//! `data:` URIs, sized without decoding.
//!
//! Every operation here is bounded by the header limit or by the caller's
//! size cap, never by the length of the payload.

use std::fmt;

use crate::options::UrlPolicy;
use crate::security::url::Reason;

/// The media type and parameters before the comma may not be longer than
/// this.
pub const MAX_HEADER_BYTES: usize = 256;

const PREFIX: &str = "data:";

/// Why a string is not a well-formed `data:` URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataUriError {
    /// Does not start with `data:`.
    NotDataUri,
    /// No comma within [`MAX_HEADER_BYTES`] of the prefix.
    HeaderTooLong,
    /// No comma at all.
    MissingComma,
}

impl fmt::Display for DataUriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataUriError::NotDataUri => f.write_str("not a data URI"),
            DataUriError::HeaderTooLong => {
                write!(f, "data URI header longer than {} bytes", MAX_HEADER_BYTES)
            }
            DataUriError::MissingComma => f.write_str("data URI has no payload separator"),
        }
    }
}

impl std::error::Error for DataUriError {}

/// A `data:` URI split into header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri<'a> {
    /// Lower-cased media type; `text/plain` when omitted.
    pub media_type: String,
    /// Parameters between the media type and the payload, in order.
    pub parameters: Vec<&'a str>,
    /// Whether the payload is base64.
    pub base64: bool,
    /// Everything after the comma, still encoded.
    pub payload: &'a str,
}

impl<'a> DataUri<'a> {
    /// Split `uri`.  Only the header is inspected.
    pub fn parse(uri: &'a str) -> Result<DataUri<'a>, DataUriError> {
        let rest = match uri.get(..PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => &uri[PREFIX.len()..],
            _ => return Err(DataUriError::NotDataUri),
        };

        let window = &rest.as_bytes()[..rest.len().min(MAX_HEADER_BYTES + 1)];
        let comma = match window.iter().position(|&b| b == b',') {
            Some(ix) => ix,
            None if rest.len() > MAX_HEADER_BYTES => return Err(DataUriError::HeaderTooLong),
            None => return Err(DataUriError::MissingComma),
        };

        let header = &rest[..comma];
        let payload = &rest[comma + 1..];

        let mut parts = header.split(';');
        let media_type = match parts.next().map(str::trim) {
            Some(media_type) if !media_type.is_empty() => media_type.to_ascii_lowercase(),
            _ => "text/plain".to_string(),
        };
        let mut parameters = parts.collect::<Vec<_>>();
        let base64 = match parameters.last() {
            Some(last) if last.trim().eq_ignore_ascii_case("base64") => {
                parameters.pop();
                true
            }
            _ => false,
        };

        Ok(DataUri {
            media_type,
            parameters,
            base64,
            payload,
        })
    }

    /// Estimated decoded size, stopping once it exceeds `max_size`.
    pub fn estimated_size(&self, max_size: usize) -> usize {
        if self.base64 {
            base64_size(self.payload)
        } else {
            percent_size(self.payload, max_size)
        }
    }
}

/// Estimate the decoded size of a `data:` URI's payload without decoding it.
///
/// Base64 payloads use the closed form. Percent-encoded payloads are scanned,
/// but the scan returns as soon as the count passes `max_size`, so the result
/// is exact up to `max_size` and merely "more than `max_size`" above it.
/// Strings that do not parse as `data:` URIs are scanned whole as
/// percent-encoded text.
///
/// ```
/// # use markpass::estimate_size;
/// assert_eq!(estimate_size("data:image/png;base64,AAAA", 1024), 3);
/// assert_eq!(estimate_size("data:,a%20b", 1024), 3);
/// let huge = format!("data:,{}", "%41".repeat(10_000));
/// assert!(estimate_size(&huge, 1_000) > 1_000);
/// ```
pub fn estimate_size(uri: &str, max_size: usize) -> usize {
    match DataUri::parse(uri) {
        Ok(data) => data.estimated_size(max_size),
        Err(_) => percent_size(uri, max_size),
    }
}

fn base64_size(payload: &str) -> usize {
    let trimmed = payload.trim_end();
    let padding = trimmed
        .bytes()
        .rev()
        .take(2)
        .take_while(|&b| b == b'=')
        .count();
    (trimmed.len() - padding) * 3 / 4
}

fn percent_size(payload: &str, max_size: usize) -> usize {
    let bytes = payload.as_bytes();
    let mut count = 0;
    let mut ix = 0;
    while ix < bytes.len() {
        let escaped = bytes[ix] == b'%'
            && bytes.get(ix + 1).map_or(false, u8::is_ascii_hexdigit)
            && bytes.get(ix + 2).map_or(false, u8::is_ascii_hexdigit);
        ix += if escaped { 3 } else { 1 };
        count += 1;
        if count > max_size {
            return count;
        }
    }
    count
}

/// Apply the image `data:` policy: known media type, bounded size.
pub fn validate_data_uri<'a>(uri: &'a str, policy: &UrlPolicy) -> Result<DataUri<'a>, Reason> {
    let data = DataUri::parse(uri).map_err(|_| Reason::MalformedDataUri)?;
    if !policy
        .data_image_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&data.media_type))
    {
        return Err(Reason::DisallowedMediaType);
    }
    if data.estimated_size(policy.max_data_uri_bytes) > policy.max_data_uri_bytes {
        return Err(Reason::DataUriTooLarge);
    }
    Ok(data)
}
