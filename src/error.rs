//! Errors that stop a parse.
//!
//! Security rejections are not errors; they are reported as data by the
//! validators in [`crate::security`].

use std::error;
use std::fmt;

/// An error that aborts the current parse attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A close token arrived with no open token to match.
    UnmatchedClose {
        /// Position of the offending close token.
        position: usize,
        /// Its token type.
        kind: String,
    },

    /// A close token's type does not match the open token on top of the stack.
    MismatchedClose {
        /// Position of the open token on top of the stack.
        open: usize,
        /// Position of the close token.
        close: usize,
    },

    /// The stream ended with an open token still unclosed.
    UnclosedOpen {
        /// Position of the innermost unclosed open token.
        position: usize,
        /// Its token type.
        kind: String,
    },

    /// Nesting exceeded [`Limits::max_nesting`](crate::Limits::max_nesting).
    NestingTooDeep {
        /// Position of the open token that crossed the limit.
        position: usize,
        /// The configured limit.
        limit: usize,
    },

    /// The source could nest deeper than
    /// [`Limits::max_nesting`](crate::Limits::max_nesting); refused before
    /// tokenizing.
    SourceTooDeep {
        /// 0-based source line where the bound crosses the limit.
        line: usize,
        /// The configured limit.
        limit: usize,
    },

    /// The raw input exceeded [`Limits::max_input_bytes`](crate::Limits::max_input_bytes).
    InputTooLarge {
        /// Size of the raw input in bytes.
        size: usize,
        /// The configured limit.
        limit: usize,
    },

    /// The deadline expired.
    TimedOut,

    /// An isolated worker could not be run or gave an unreadable answer.
    Isolation {
        /// What went wrong.
        message: String,
    },
}

impl Error {
    /// Whether the caller may reasonably retry or skip the document: resource
    /// exhaustion rather than malformed input.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            Error::NestingTooDeep { .. }
                | Error::SourceTooDeep { .. }
                | Error::InputTooLarge { .. }
                | Error::TimedOut
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnmatchedClose { position, kind } => {
                write!(f, "unmatched close token `{}` at position {}", kind, position)
            }
            Error::MismatchedClose { open, close } => write!(
                f,
                "close token at position {} does not match open token at position {}",
                close, open
            ),
            Error::UnclosedOpen { position, kind } => {
                write!(f, "open token `{}` at position {} is never closed", kind, position)
            }
            Error::NestingTooDeep { position, limit } => write!(
                f,
                "nesting depth exceeds {} at position {}",
                limit, position
            ),
            Error::SourceTooDeep { line, limit } => {
                write!(f, "source may nest deeper than {} at line {}", limit, line)
            }
            Error::InputTooLarge { size, limit } => {
                write!(f, "input of {} bytes exceeds limit of {} bytes", size, limit)
            }
            Error::TimedOut => write!(f, "deadline expired"),
            Error::Isolation { message } => write!(f, "isolated worker failed: {}", message),
        }
    }
}

impl error::Error for Error {}
