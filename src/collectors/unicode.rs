use serde_json::{json, Value};

use crate::dispatch::{Collector, DispatchContext};
use crate::security::unicode::{MAX_FINDINGS, MAX_SCORE};
use crate::security::{scan_text, UnicodeReport};
use crate::token::Token;

/// Document-wide Unicode risk: totals across prose and code, plus the worst
/// lines.
#[derive(Debug, Default)]
pub struct UnicodeRisk {
    totals: UnicodeReport,
    flagged: Vec<Value>,
    flagged_dropped: usize,
    max_score: u32,
    sum_scores: u32,
}

impl UnicodeRisk {
    /// Nothing scanned yet.
    pub fn new() -> Self {
        UnicodeRisk::default()
    }
}

impl Collector for UnicodeRisk {
    fn name(&self) -> &str {
        "unicode"
    }

    fn handles_types(&self) -> &[&str] {
        &["inline", "fence", "code_block", "html_block"]
    }

    fn on_token(&mut self, _pos: usize, token: &Token, _ctx: &DispatchContext<'_>) {
        let report = scan_text(&token.content);
        if report.is_clean() {
            return;
        }

        self.totals.bidi_controls += report.bidi_controls;
        self.totals.zero_width += report.zero_width;
        self.totals.invisible += report.invisible;
        self.totals.mixed_script_words += report.mixed_script_words;
        self.totals.confusables += report.confusables;
        self.max_score = self.max_score.max(report.score);
        self.sum_scores = self.sum_scores.saturating_add(report.score);

        if self.flagged.len() < MAX_FINDINGS {
            self.flagged.push(json!({
                "type": token.kind,
                "line": token.line(),
                "score": report.score,
                "findings": report.findings,
            }));
        } else {
            self.flagged_dropped += 1;
        }
    }

    fn finalize(&mut self) -> Value {
        json!({
            "score": self.sum_scores.min(MAX_SCORE),
            "max_token_score": self.max_score,
            "bidi_controls": self.totals.bidi_controls,
            "zero_width": self.totals.zero_width,
            "invisible": self.totals.invisible,
            "mixed_script_words": self.totals.mixed_script_words,
            "confusables": self.totals.confusables,
            "flagged": std::mem::take(&mut self.flagged),
            "flagged_dropped": self.flagged_dropped,
        })
    }
}
