//! Built-in collectors.
//!
//! Each is small on purpose: it shows the registration contract, stays within
//! random access through its [`DispatchContext`](crate::DispatchContext), and
//! calls into [`security`](crate::security) where untrusted content appears.
//! All of them can be built by name, which is how an isolated worker gets
//! them.

mod code_blocks;
mod headings;
mod images;
mod links;
mod tables;
mod unicode;

pub use self::code_blocks::CodeBlocks;
pub use self::headings::{Headings, Slugger};
pub use self::images::Images;
pub use self::links::Links;
pub use self::tables::Tables;
pub use self::unicode::UnicodeRisk;

use std::error;
use std::fmt;

use crate::dispatch::Collector;
use crate::options::Options;
use crate::token::Token;

const BUILTIN: [&str; 6] = ["headings", "links", "images", "code_blocks", "tables", "unicode"];

/// Names accepted by [`by_name`], in their default registration order.
pub fn builtin_names() -> &'static [&'static str] {
    &BUILTIN
}

/// Build the built-in collector called `name`.
pub fn by_name(name: &str, options: &Options) -> Option<Box<dyn Collector>> {
    let collector: Box<dyn Collector> = match name {
        "headings" => Box::new(Headings::new()),
        "links" => Box::new(Links::new(options.url.clone())),
        "images" => Box::new(Images::new(options.url.clone())),
        "code_blocks" => Box::new(CodeBlocks::new()),
        "tables" => Box::new(Tables::new()),
        "unicode" => Box::new(UnicodeRisk::new()),
        _ => return None,
    };
    Some(collector)
}

/// Build the named collectors, in the order given.
pub fn by_names(names: &[&str], options: &Options) -> Result<Vec<Box<dyn Collector>>, UnknownCollector> {
    names
        .iter()
        .map(|&name| by_name(name, options).ok_or_else(|| UnknownCollector(name.to_string())))
        .collect()
}

/// Every built-in collector, in [`builtin_names`] order.
pub fn all(options: &Options) -> Vec<Box<dyn Collector>> {
    BUILTIN
        .iter()
        .filter_map(|name| by_name(name, options))
        .collect()
}

/// A name that [`by_name`] does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollector(pub String);

impl fmt::Display for UnknownCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown collector `{}`; expected one of {}",
            self.0,
            BUILTIN.join(", ")
        )
    }
}

impl error::Error for UnknownCollector {}

/// Text of the inline tokens between `children[open]` and its matching
/// close, for link text.  Walks only this inline token's own children.
fn text_until_close(children: &[Token], open: usize) -> String {
    let mut text = String::new();
    let mut depth = 0usize;
    for child in &children[open + 1..] {
        match child.nesting {
            crate::Nesting::Open => depth += 1,
            crate::Nesting::Close if depth == 0 => break,
            crate::Nesting::Close => depth -= 1,
            crate::Nesting::Flat => match child.kind.as_str() {
                "text" | "code_inline" => text.push_str(&child.content),
                "softbreak" | "hardbreak" => text.push(' '),
                "image" => text.push_str(&child.content),
                _ => {}
            },
        }
    }
    text
}

/// The line of an inline child, falling back to its inline token's line.
fn line_of(child: &Token, inline: &Token) -> Option<usize> {
    child.line().or_else(|| inline.line())
}
