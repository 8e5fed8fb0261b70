//! Pure validators for untrusted content found while collecting.
//!
//! None of these functions fail: rejections are reported as data for the
//! calling collector to represent however it sees fit.

pub mod data_uri;
pub mod unicode;
pub mod url;

pub use self::data_uri::{estimate_size, validate_data_uri, DataUri, DataUriError};
pub use self::unicode::{scan_text, skeleton, Finding, FindingKind, UnicodeReport};
pub use self::url::{validate_url, validate_url_with, Reason, UrlContext, UrlVerdict};
