//! Random-access structure over a token stream.
//!
//! [`Indexes`] is built in one pass with an explicit stack, so arbitrarily
//! deep nesting costs heap rather than call stack. Once built it is
//! read-only; if the token stream changes, build a new one.

mod locator;

pub use self::locator::SectionLocator;

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use crate::deadline::{Deadline, Poller};
use crate::error::Error;
use crate::options::Limits;
use crate::token::{Nesting, Token};

/// A heading-delimited range of the document.
///
/// Lines are 0-based; `end_line` is inclusive. The field set is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Line of the heading.
    pub start_line: usize,
    /// Last line belonging to the section.  Always `Some` once indexing
    /// completes.
    pub end_line: Option<usize>,
    /// Position of the `heading_open` token.
    pub token_index: usize,
    /// Heading level, 1–6.
    pub level: u8,
    /// Text of the heading's own inline content.
    pub title: String,
}

impl Section {
    /// Whether `line` falls inside the section.
    pub fn contains(&self, line: usize) -> bool {
        line >= self.start_line && self.end_line.map_or(true, |end| line <= end)
    }
}

/// Direct-children lists, derived from parent links.
#[derive(Debug)]
struct ChildIndex {
    roots: Vec<usize>,
    offsets: Vec<usize>,
    items: Vec<usize>,
}

/// The index maps over one token stream.
#[derive(Debug)]
pub struct Indexes {
    len: usize,
    fingerprint: u64,
    by_type: FxHashMap<String, Vec<usize>>,
    pairs: FxHashMap<usize, usize>,
    pairs_rev: FxHashMap<usize, usize>,
    parents: Vec<Option<usize>>,
    closes: Vec<bool>,
    sections: Vec<Section>,
    max_depth: usize,
    children: OnceLock<ChildIndex>,
}

impl Indexes {
    /// Index `tokens` with no deadline.
    ///
    /// ```
    /// # use markpass::{Indexes, Limits, Nesting, Token};
    /// let tokens = vec![
    ///     Token::new("paragraph_open", Nesting::Open),
    ///     Token::new("inline", Nesting::Flat),
    ///     Token::new("paragraph_close", Nesting::Close),
    /// ];
    /// let indexes = Indexes::build(&tokens, &Limits::default()).unwrap();
    /// assert_eq!(indexes.pair(0), Some(2));
    /// assert_eq!(indexes.parent(1), Some(0));
    /// ```
    pub fn build(tokens: &[Token], limits: &Limits) -> Result<Indexes, Error> {
        IndexBuilder::new(tokens).limits(*limits).build()
    }

    /// Number of indexed tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the stream was empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `tokens` has the shape these indexes were built from: the same
    /// length, and the same type and nesting at every position.
    pub fn was_built_from(&self, tokens: &[Token]) -> bool {
        tokens.len() == self.len && fingerprint(tokens.iter()) == self.fingerprint
    }

    /// Positions of every token of type `kind`, in stream order.
    pub fn positions(&self, kind: &str) -> &[usize] {
        self.by_type.get(kind).map_or(&[], |v| v.as_slice())
    }

    /// Every token type present, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds = self.by_type.keys().map(|k| k.as_str()).collect::<Vec<_>>();
        kinds.sort_unstable();
        kinds
    }

    /// The close token matching the open token at `open`.
    pub fn pair(&self, open: usize) -> Option<usize> {
        self.pairs.get(&open).copied()
    }

    /// The open token matching the close token at `close`.
    pub fn pair_rev(&self, close: usize) -> Option<usize> {
        self.pairs_rev.get(&close).copied()
    }

    /// Enclosing open token.  `None` only for tokens at document root.
    pub fn parent(&self, pos: usize) -> Option<usize> {
        self.parents.get(pos).copied().flatten()
    }

    /// `open..=close` for a paired open token.
    pub fn range(&self, open: usize) -> Option<RangeInclusive<usize>> {
        self.pair(open).map(|close| open..=close)
    }

    /// Deepest nesting reached.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sections in `start_line` order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// A locator over [`Indexes::sections`].
    pub fn locator(&self) -> SectionLocator<'_> {
        SectionLocator::new(&self.sections)
    }

    /// Direct children of the open token at `pos`.  Close tokens are not
    /// listed.  Built on first use of any children accessor.
    pub fn children(&self, pos: usize) -> &[usize] {
        let index = self.child_index();
        match (index.offsets.get(pos), index.offsets.get(pos + 1)) {
            (Some(&start), Some(&end)) => &index.items[start..end],
            _ => &[],
        }
    }

    /// Tokens at document root, close tokens excluded.
    pub fn root_children(&self) -> &[usize] {
        &self.child_index().roots
    }

    fn child_index(&self) -> &ChildIndex {
        self.children.get_or_init(|| {
            // Counting sort by parent keeps each list in stream order.
            let mut counts = vec![0usize; self.len + 1];
            let mut roots = Vec::new();
            for (pos, parent) in self.parents.iter().enumerate() {
                if self.closes[pos] {
                    continue;
                }
                match parent {
                    Some(p) => counts[*p + 1] += 1,
                    None => roots.push(pos),
                }
            }
            for i in 1..counts.len() {
                counts[i] += counts[i - 1];
            }
            let offsets = counts.clone();
            let mut items = vec![0usize; offsets[self.len]];
            let mut cursor = counts;
            for (pos, parent) in self.parents.iter().enumerate() {
                if self.closes[pos] {
                    continue;
                }
                if let Some(p) = parent {
                    items[cursor[*p]] = pos;
                    cursor[*p] += 1;
                }
            }
            ChildIndex {
                roots,
                offsets,
                items,
            }
        })
    }
}

/// One-pass construction of [`Indexes`].
#[derive(Debug)]
pub struct IndexBuilder<'t, 'd> {
    tokens: &'t [Token],
    limits: Limits,
    line_count: Option<usize>,
    deadline: Option<&'d Deadline>,
}

impl<'t, 'd> IndexBuilder<'t, 'd> {
    /// Prepare to index `tokens`.
    pub fn new(tokens: &'t [Token]) -> Self {
        IndexBuilder {
            tokens,
            limits: Limits::default(),
            line_count: None,
            deadline: None,
        }
    }

    /// Use these limits.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Lines in the source; sections still open at the end close on the last
    /// one.  Without it, the largest token line span end is used.
    pub fn line_count(mut self, line_count: usize) -> Self {
        self.line_count = Some(line_count);
        self
    }

    /// Poll `deadline` while indexing.
    pub fn deadline(mut self, deadline: &'d Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run the pass.
    pub fn build(self) -> Result<Indexes, Error> {
        let tokens = self.tokens;
        let len = tokens.len();
        let unlimited = Deadline::unlimited();
        let mut poller = Poller::new(
            self.deadline.unwrap_or(&unlimited),
            self.limits.check_interval,
        );

        let mut by_type: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut pairs = FxHashMap::default();
        let mut pairs_rev = FxHashMap::default();
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(len);
        let mut closes = vec![false; len];
        let mut stack: Vec<usize> = Vec::new();
        let mut max_depth = 0;

        let mut sections: Vec<Section> = Vec::new();
        // Indices into `sections` that have no end yet, outermost first.
        let mut open_sections: Vec<usize> = Vec::new();
        let mut last_line = 0;
        let mut hasher = FxHasher::default();

        for (pos, token) in tokens.iter().enumerate() {
            poller.tick()?;
            hash_token(&mut hasher, token);

            match by_type.get_mut(token.kind.as_str()) {
                Some(list) => list.push(pos),
                None => {
                    by_type.insert(token.kind.clone(), vec![pos]);
                }
            }
            if let Some(map) = token.map {
                last_line = last_line.max(map.end);
            }

            match token.nesting {
                Nesting::Open => {
                    parents.push(stack.last().copied());
                    stack.push(pos);
                    if stack.len() > self.limits.max_nesting {
                        return Err(Error::NestingTooDeep {
                            position: pos,
                            limit: self.limits.max_nesting,
                        });
                    }
                    max_depth = max_depth.max(stack.len());

                    if token.kind == "heading_open" {
                        let fallback_line = sections
                            .last()
                            .map_or(last_line, |s| s.start_line.max(last_line));
                        open_section(&mut sections, &mut open_sections, token, pos, fallback_line);
                    }
                }
                Nesting::Close => {
                    let open = match stack.pop() {
                        Some(open) => open,
                        None => {
                            return Err(Error::UnmatchedClose {
                                position: pos,
                                kind: token.kind.clone(),
                            })
                        }
                    };
                    if !kinds_match(&tokens[open].kind, &token.kind) {
                        return Err(Error::MismatchedClose { open, close: pos });
                    }
                    pairs.insert(open, pos);
                    pairs_rev.insert(pos, open);
                    parents.push(Some(open));
                    closes[pos] = true;
                }
                Nesting::Flat => {
                    let parent = stack.last().copied();
                    parents.push(parent);

                    if token.kind == "inline" {
                        fill_title(&mut sections, &open_sections, tokens, parent, token);
                    }
                }
            }
            debug_assert_eq!(parents.len(), pos + 1);
        }

        if let Some(&open) = stack.last() {
            return Err(Error::UnclosedOpen {
                position: open,
                kind: tokens[open].kind.clone(),
            });
        }

        let end_of_document = self.line_count.unwrap_or(last_line).saturating_sub(1);
        for ix in open_sections.drain(..) {
            let section = &mut sections[ix];
            section.end_line = Some(end_of_document.max(section.start_line));
        }

        Ok(Indexes {
            len,
            fingerprint: hasher.finish(),
            by_type,
            pairs,
            pairs_rev,
            parents,
            closes,
            sections,
            max_depth,
            children: OnceLock::new(),
        })
    }
}

fn hash_token(hasher: &mut FxHasher, token: &Token) {
    hasher.write(token.kind.as_bytes());
    hasher.write_i8(token.nesting.into());
}

fn fingerprint<'t>(tokens: impl Iterator<Item = &'t Token>) -> u64 {
    let mut hasher = FxHasher::default();
    for token in tokens {
        hash_token(&mut hasher, token);
    }
    hasher.finish()
}

/// A `heading_open` whose tag is not `h1`..`h6` opens no section.  One with
/// no line map starts where the content before it ended.
fn open_section(
    sections: &mut Vec<Section>,
    open_sections: &mut Vec<usize>,
    token: &Token,
    pos: usize,
    fallback_line: usize,
) {
    let level = match token.heading_level() {
        Some(level) => level,
        None => return,
    };
    let start_line = token.line().unwrap_or(fallback_line);

    while let Some(&top) = open_sections.last() {
        if sections[top].level < level {
            break;
        }
        open_sections.pop();
        let section = &mut sections[top];
        section.end_line = Some(start_line.saturating_sub(1).max(section.start_line));
    }

    open_sections.push(sections.len());
    sections.push(Section {
        start_line,
        end_line: None,
        token_index: pos,
        level,
        title: String::new(),
    });
}

/// Only an inline token whose parent is the newest section's own heading may
/// title it; deeper descendants and later headings' inlines cannot.
fn fill_title(
    sections: &mut [Section],
    open_sections: &[usize],
    tokens: &[Token],
    parent: Option<usize>,
    inline: &Token,
) {
    let (parent, &newest) = match (parent, open_sections.last()) {
        (Some(parent), Some(newest)) => (parent, newest),
        _ => return,
    };
    let section = &mut sections[newest];
    if section.token_index == parent
        && tokens[parent].kind == "heading_open"
        && section.title.is_empty()
    {
        section.title = inline.content.clone();
    }
}

fn kinds_match(open: &str, close: &str) -> bool {
    match (open.strip_suffix("_open"), close.strip_suffix("_close")) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}
