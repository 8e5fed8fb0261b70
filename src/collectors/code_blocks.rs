use serde_json::{json, Value};

use crate::dispatch::{Collector, DispatchContext};
use crate::normalize::line_count;
use crate::token::Token;

/// Fenced and indented code blocks, with their languages.
#[derive(Debug, Default)]
pub struct CodeBlocks {
    blocks: Vec<Value>,
}

impl CodeBlocks {
    /// No blocks yet.
    pub fn new() -> Self {
        CodeBlocks::default()
    }
}

impl Collector for CodeBlocks {
    fn name(&self) -> &str {
        "code_blocks"
    }

    fn handles_types(&self) -> &[&str] {
        &["fence", "code_block"]
    }

    fn on_token(&mut self, pos: usize, token: &Token, ctx: &DispatchContext<'_>) {
        let language = token
            .attr("info")
            .and_then(|info| info.split_whitespace().next())
            .filter(|lang| !lang.is_empty());

        self.blocks.push(json!({
            "fenced": token.kind == "fence",
            "language": language,
            "lines": line_count(&token.content),
            "line": token.line(),
            "section": ctx.section_at(pos).map(|s| s.title.as_str()),
        }));
    }

    fn finalize(&mut self) -> Value {
        let blocks = std::mem::take(&mut self.blocks);
        let mut languages = blocks
            .iter()
            .filter_map(|b| b["language"].as_str())
            .map(str::to_string)
            .collect::<Vec<_>>();
        languages.sort_unstable();
        languages.dedup();

        json!({
            "total": blocks.len(),
            "languages": languages,
            "blocks": blocks,
        })
    }
}
