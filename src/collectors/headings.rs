use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{json, Value};
use unicode_categories::UnicodeCategories;

use crate::dispatch::{Collector, DispatchContext};
use crate::token::Token;

/// Converts heading text to unique, human-readable anchors, GitHub style.
///
/// Uniqueness is per slugger; use one per document.
///
/// ```
/// # use markpass::collectors::Slugger;
/// let mut slugger = Slugger::new();
/// assert_eq!("stuff", slugger.slugify("Stuff"));
/// assert_eq!("stuff-1", slugger.slugify("Stuff"));
/// assert_eq!("ticks-arent-in", slugger.slugify("Ticks aren't in"));
/// ```
#[derive(Debug, Default)]
pub struct Slugger {
    taken: FxHashSet<String>,
    /// Next suffix to try for each base that has been handed out.
    next_suffix: FxHashMap<String, usize>,
}

impl Slugger {
    /// A slugger that has handed out nothing yet.
    pub fn new() -> Self {
        Slugger::default()
    }

    /// Lower-case, keep letters, marks, numbers, connectors and hyphens,
    /// turn spaces into hyphens and drop the rest.  A repeated slug gets the
    /// smallest `-N` suffix not yet handed out.
    pub fn slugify(&mut self, heading: &str) -> String {
        let base = heading
            .chars()
            .flat_map(char::to_lowercase)
            .fold(String::with_capacity(heading.len()), |mut base, c| {
                if c == ' ' {
                    base.push('-');
                } else if c == '-'
                    || c.is_letter()
                    || c.is_mark()
                    || c.is_number()
                    || c.is_punctuation_connector()
                {
                    base.push(c);
                }
                base
            });

        if self.taken.insert(base.clone()) {
            return base;
        }

        let mut next = self.next_suffix.get(&base).copied().unwrap_or(1);
        let slug = loop {
            let candidate = format!("{}-{}", base, next);
            next += 1;
            if self.taken.insert(candidate.clone()) {
                break candidate;
            }
        };
        self.next_suffix.insert(base, next);
        slug
    }
}

/// Heading outline with anchors, duplicate titles and skipped levels.
#[derive(Debug, Default)]
pub struct Headings {
    slugger: Slugger,
    headings: Vec<Value>,
    /// Case-folded title to the lines it appears on.
    folded: FxHashMap<String, Vec<Option<usize>>>,
    previous_level: Option<u8>,
    level_jumps: usize,
}

impl Headings {
    /// An empty outline.
    pub fn new() -> Self {
        Headings::default()
    }
}

impl Collector for Headings {
    fn name(&self) -> &str {
        "headings"
    }

    fn handles_types(&self) -> &[&str] {
        &["heading_open"]
    }

    fn on_token(&mut self, pos: usize, token: &Token, ctx: &DispatchContext<'_>) {
        let level = match token.heading_level() {
            Some(level) => level,
            None => return,
        };

        // The title is the heading's own inline child, nothing deeper.
        let title = ctx
            .children(pos)
            .iter()
            .filter_map(|&child| ctx.token(child))
            .find(|child| child.kind == "inline")
            .map_or("", |inline| inline.content.as_str());

        if let Some(previous) = self.previous_level {
            if level > previous + 1 {
                self.level_jumps += 1;
            }
        }
        self.previous_level = Some(level);

        let line = token.line();
        self.folded
            .entry(caseless::default_case_fold_str(title.trim()))
            .or_default()
            .push(line);

        self.headings.push(json!({
            "level": level,
            "title": title,
            "slug": self.slugger.slugify(title),
            "line": line,
        }));
    }

    fn finalize(&mut self) -> Value {
        let mut duplicates = self
            .folded
            .iter()
            .filter(|(_, lines)| lines.len() > 1)
            .map(|(title, lines)| json!({ "title": title, "lines": lines }))
            .collect::<Vec<_>>();
        // Map iteration order is arbitrary.
        duplicates.sort_by(|a, b| {
            a["lines"][0]
                .as_u64()
                .cmp(&b["lines"][0].as_u64())
                .then_with(|| a["title"].as_str().cmp(&b["title"].as_str()))
        });

        json!({
            "headings": std::mem::take(&mut self.headings),
            "duplicates": duplicates,
            "level_jumps": self.level_jumps,
        })
    }
}
