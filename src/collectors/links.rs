use serde_json::{json, Value};

use super::{line_of, text_until_close};
use crate::dispatch::{Collector, DispatchContext};
use crate::options::UrlPolicy;
use crate::security::{validate_url_with, UrlContext};
use crate::token::Token;

/// Every link destination, validated.
#[derive(Debug)]
pub struct Links {
    policy: UrlPolicy,
    links: Vec<Value>,
    rejected: usize,
}

impl Links {
    /// Validate destinations under `policy`.
    pub fn new(policy: UrlPolicy) -> Self {
        Links {
            policy,
            links: Vec::new(),
            rejected: 0,
        }
    }
}

impl Collector for Links {
    fn name(&self) -> &str {
        "links"
    }

    fn handles_types(&self) -> &[&str] {
        &["inline"]
    }

    fn on_token(&mut self, pos: usize, token: &Token, ctx: &DispatchContext<'_>) {
        let mut section = None;
        for (ix, child) in token.children.iter().enumerate() {
            if child.kind != "link_open" {
                continue;
            }
            let href = child.attr("href").unwrap_or_default();
            let verdict = validate_url_with(href, &self.policy, UrlContext::Link);
            if !verdict.accepted {
                self.rejected += 1;
            }
            let section = *section.get_or_insert_with(|| ctx.section_at(pos));

            self.links.push(json!({
                "href": href,
                "text": text_until_close(&token.children, ix),
                "line": line_of(child, token),
                "section": section.map(|s| s.title.as_str()),
                "accepted": verdict.accepted,
                "normalized": verdict.accepted.then_some(verdict.normalized),
                "reasons": verdict.reasons,
            }));
        }
    }

    fn finalize(&mut self) -> Value {
        json!({
            "total": self.links.len(),
            "rejected": self.rejected,
            "links": std::mem::take(&mut self.links),
        })
    }
}
