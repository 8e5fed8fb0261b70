//! A single-pass indexing, dispatch and validation engine for Markdown token
//! streams.
//!
//! Raw text is [normalized](normalize()), [tokenized](Tokenizer),
//! [indexed](Indexes) once, and then every token is dispatched exactly once
//! to the [collectors](Collector) interested in it. Collectors read the
//! document only through random access, and call into the [`security`]
//! validators for anything untrusted. The whole run is bounded by a
//! [`Deadline`], and can be moved into a separate process with
//! [`run_isolated`].
//!
//! ```
//! use markpass::{collectors, parse, to_canonical_json, Options, Status};
//!
//! let options = Options::default();
//! let outcome = parse(
//!     "# Intro\n\n[home](https://example.com) and [bad](javascript:alert(1))\n",
//!     collectors::by_names(&["links"], &options).unwrap(),
//!     &options,
//! );
//!
//! assert_eq!(outcome.status, Status::Completed);
//! let links = outcome.result("links").unwrap();
//! assert_eq!(links["total"], 2);
//! assert_eq!(links["rejected"], 1);
//! assert!(to_canonical_json(&outcome).starts_with("{\"error\":null,"));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations)]

pub mod canonical;
pub mod collectors;
pub mod deadline;
pub mod dispatch;
mod error;
pub mod index;
pub mod isolate;
mod normalize;
mod options;
pub mod pipeline;
pub mod security;
#[cfg(test)]
mod tests;
mod token;
mod tokenizer;

pub use crate::canonical::{canonical_string, to_canonical_json};
pub use crate::deadline::{Deadline, TimerStrategy};
pub use crate::dispatch::{
    Collector, CollectorResult, DispatchContext, DispatchStats, Dispatcher, Registration,
};
pub use crate::error::Error;
pub use crate::index::{IndexBuilder, Indexes, Section, SectionLocator};
pub use crate::isolate::{run_isolated, run_worker, serve_worker, WorkerConfig, WorkerRequest, WorkerResponse};
pub use crate::normalize::{line_count, normalize, Source};
pub use crate::options::{DeadlineOptions, Limits, Options, TokenizerOptions, UrlPolicy};
pub use crate::pipeline::{parse, parse_many, ParseOutcome, Pipeline, RunState, Status};
pub use crate::security::{
    estimate_size, scan_text, skeleton, validate_data_uri, validate_url, validate_url_with,
    DataUri, Reason, UnicodeReport, UrlContext, UrlVerdict,
};
pub use crate::token::{LineSpan, Nesting, Token};
pub use crate::tokenizer::{container_depth_bound, CommonMark, DepthBound, Tokenizer};
