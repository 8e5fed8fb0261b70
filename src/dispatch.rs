//! The single pass that routes tokens to collectors.
//!
//! Every token is visited exactly once, in stream order. For each token the
//! interested collectors are invoked in registration order. Collectors never
//! see the token list itself; they get a [`DispatchContext`] that only offers
//! random access through the indexes, and every such access is counted.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::cell::Cell;
use std::fmt;
use std::ops::RangeInclusive;

use crate::deadline::{Deadline, Poller};
use crate::error::Error;
use crate::index::{Indexes, Section, SectionLocator};
use crate::token::Token;

/// Matches every token type.
pub const WILDCARD: &str = "*";

/// A feature extractor driven by the dispatcher.
///
/// Collectors are owned by one pipeline for one document. They are invoked
/// only for tokens they registered interest in, and asked to
/// [`finalize`](Collector::finalize) once after the pass.
pub trait Collector {
    /// Unique name; also the key of this collector's result.
    fn name(&self) -> &str;

    /// Token types to receive.  [`WILDCARD`] receives every token.
    fn handles_types(&self) -> &[&str];

    /// Tags to receive, regardless of type.
    fn handles_tags(&self) -> &[&str] {
        &[]
    }

    /// Called once per routed token.
    fn on_token(&mut self, pos: usize, token: &Token, ctx: &DispatchContext<'_>);

    /// Produce the result.  Called once.
    fn finalize(&mut self) -> serde_json::Value;
}

/// What a collector registered for, captured at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The collector's name.
    pub name: String,
    /// Token types, in the order given, without repeats.
    pub handles_types: Vec<String>,
    /// Tags, in the order given, without repeats.
    pub handles_tags: Vec<String>,
}

impl Registration {
    fn of(collector: &dyn Collector) -> Self {
        Registration {
            name: collector.name().to_string(),
            handles_types: ordered_unique(collector.handles_types()),
            handles_tags: ordered_unique(collector.handles_tags()),
        }
    }
}

fn ordered_unique(items: &[&str]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::with_capacity(items.len());
    for &item in items {
        if seen.insert(item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Counters from one [`Dispatcher::dispatch_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DispatchStats {
    /// Tokens visited by the top-level loop.  Always the token count.
    pub token_visits: usize,
    /// `on_token` calls made.
    pub invocations: usize,
    /// Index accesses made by collectors through their context.
    pub accesses: usize,
}

/// One collector's finalized output.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorResult {
    /// The collector's name.
    pub name: String,
    /// What it produced.
    pub result: serde_json::Value,
}

/// Random, metered access to the document for collectors.
pub struct DispatchContext<'a> {
    tokens: &'a [Token],
    indexes: &'a Indexes,
    locator: &'a SectionLocator<'a>,
    accesses: Cell<usize>,
}

impl<'a> DispatchContext<'a> {
    fn new(tokens: &'a [Token], indexes: &'a Indexes, locator: &'a SectionLocator<'a>) -> Self {
        DispatchContext {
            tokens,
            indexes,
            locator,
            accesses: Cell::new(0),
        }
    }

    #[inline]
    fn meter(&self, n: usize) {
        self.accesses.set(self.accesses.get() + n);
    }

    /// The token at `pos`.
    pub fn token(&self, pos: usize) -> Option<&'a Token> {
        self.meter(1);
        self.tokens.get(pos)
    }

    /// The enclosing open token of `pos`.
    pub fn parent(&self, pos: usize) -> Option<usize> {
        self.meter(1);
        self.indexes.parent(pos)
    }

    /// The close token matching the open token at `open`.
    pub fn pair(&self, open: usize) -> Option<usize> {
        self.meter(1);
        self.indexes.pair(open)
    }

    /// The open token matching the close token at `close`.
    pub fn pair_rev(&self, close: usize) -> Option<usize> {
        self.meter(1);
        self.indexes.pair_rev(close)
    }

    /// Direct children of `pos`.  Costs one access per child.
    pub fn children(&self, pos: usize) -> &'a [usize] {
        let children = self.indexes.children(pos);
        self.meter(1 + children.len());
        children
    }

    /// Positions of every token of type `kind`.
    pub fn positions(&self, kind: &str) -> &'a [usize] {
        self.meter(1);
        self.indexes.positions(kind)
    }

    /// The tokens from the open token at `open` to its close, inclusive.
    /// Costs one access per token.
    pub fn subrange(&self, open: usize) -> Option<(RangeInclusive<usize>, &'a [Token])> {
        let range = self.indexes.range(open)?;
        let tokens = self.tokens.get(range.clone())?;
        self.meter(1 + tokens.len());
        Some((range, tokens))
    }

    /// The innermost section containing `line`.
    pub fn section_of(&self, line: usize) -> Option<&'a Section> {
        self.meter(1);
        self.locator.section_of(line)
    }

    /// The innermost section containing the token at `pos`, by its first
    /// line.  Unmapped tokens use their nearest mapped ancestor.
    pub fn section_at(&self, pos: usize) -> Option<&'a Section> {
        let mut current = Some(pos);
        while let Some(ix) = current {
            if let Some(line) = self.token(ix).and_then(Token::line) {
                return self.section_of(line);
            }
            current = self.parent(ix);
        }
        None
    }

    /// Number of tokens in the document.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the document has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<'a> fmt::Debug for DispatchContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("tokens", &self.tokens.len())
            .field("accesses", &self.accesses.get())
            .finish()
    }
}

type Route = SmallVec<[usize; 4]>;

/// Ordered collector registry and the dispatch loop.
pub struct Dispatcher<'c> {
    collectors: Vec<Box<dyn Collector + 'c>>,
    registrations: Vec<Registration>,
    seen: FxHashSet<String>,
    by_type: FxHashMap<String, Route>,
    by_tag: FxHashMap<String, Route>,
    wildcard: Route,
    check_interval: usize,
}

impl<'c> Default for Dispatcher<'c> {
    fn default() -> Self {
        Dispatcher::new()
    }
}

impl<'c> Dispatcher<'c> {
    /// An empty dispatcher polling deadlines every 64 visits.
    pub fn new() -> Self {
        Dispatcher {
            collectors: Vec::new(),
            registrations: Vec::new(),
            seen: FxHashSet::default(),
            by_type: FxHashMap::default(),
            by_tag: FxHashMap::default(),
            wildcard: Route::new(),
            check_interval: 64,
        }
    }

    /// Poll the deadline every `interval` token visits.
    pub fn check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    /// Register `collector`.  Returns `false`, dropping it, if a collector of
    /// the same name is already registered.
    pub fn register<C: Collector + 'c>(&mut self, collector: C) -> bool {
        self.register_boxed(Box::new(collector))
    }

    /// Register an already boxed collector.
    pub fn register_boxed(&mut self, collector: Box<dyn Collector + 'c>) -> bool {
        if !self.seen.insert(collector.name().to_string()) {
            return false;
        }

        let ix = self.collectors.len();
        let registration = Registration::of(collector.as_ref());
        for kind in &registration.handles_types {
            if kind == WILDCARD {
                self.wildcard.push(ix);
            } else {
                self.by_type.entry(kind.clone()).or_default().push(ix);
            }
        }
        for tag in &registration.handles_tags {
            self.by_tag.entry(tag.clone()).or_default().push(ix);
        }

        self.registrations.push(registration);
        self.collectors.push(collector);
        true
    }

    /// Registrations in order.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Collectors interested in `token`, in registration order.
    fn route(&self, token: &Token, out: &mut SmallVec<[usize; 8]>) {
        out.clear();
        if let Some(route) = self.by_type.get(token.kind.as_str()) {
            out.extend_from_slice(route);
        }
        if !token.tag.is_empty() {
            if let Some(route) = self.by_tag.get(token.tag.as_str()) {
                out.extend_from_slice(route);
            }
        }
        out.extend_from_slice(&self.wildcard);
        // Indices are registration positions, so sorting restores
        // registration order across the three routes.
        out.sort_unstable();
        out.dedup();
    }

    /// Visit every token once, invoking interested collectors.
    ///
    /// # Panics
    ///
    /// If `indexes` was not built from `tokens`, or the loop visits other than
    /// `tokens.len()` tokens.
    pub fn dispatch_all(
        &mut self,
        tokens: &[Token],
        indexes: &Indexes,
        locator: &SectionLocator<'_>,
        deadline: &Deadline,
    ) -> Result<DispatchStats, Error> {
        assert!(
            indexes.was_built_from(tokens),
            "indexes were built from a different token stream"
        );

        let ctx = DispatchContext::new(tokens, indexes, locator);
        let mut poller = Poller::new(deadline, self.check_interval);
        let mut stats = DispatchStats::default();
        let mut targets = SmallVec::<[usize; 8]>::new();

        for (pos, token) in tokens.iter().enumerate() {
            poller.tick()?;
            stats.token_visits += 1;

            self.route(token, &mut targets);
            for &ix in &targets {
                self.collectors[ix].on_token(pos, token, &ctx);
                stats.invocations += 1;
            }
        }

        assert_eq!(
            stats.token_visits,
            tokens.len(),
            "dispatch visited {} tokens of {}",
            stats.token_visits,
            tokens.len()
        );
        stats.accesses = ctx.accesses.get();
        Ok(stats)
    }

    /// Finalize every collector in registration order.
    pub fn finalize(mut self) -> Vec<CollectorResult> {
        self.collectors
            .iter_mut()
            .map(|collector| CollectorResult {
                name: collector.name().to_string(),
                result: collector.finalize(),
            })
            .collect()
    }
}

impl<'c> fmt::Debug for Dispatcher<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registrations", &self.registrations)
            .field("check_interval", &self.check_interval)
            .finish()
    }
}
