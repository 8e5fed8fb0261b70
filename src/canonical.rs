//! Byte-stable JSON.
//!
//! Object keys are written in sorted order whatever map type `serde_json` was
//! built with, numbers and strings use `serde_json`'s own formatting, and
//! there is no insignificant whitespace. Two runs over identical input
//! therefore serialize to identical bytes.

use serde_json::{json, Map, Value};

use crate::pipeline::ParseOutcome;

/// The plain-data form of an outcome, as carried across the worker boundary.
pub fn outcome_value(outcome: &ParseOutcome) -> Value {
    let sections = outcome
        .sections
        .iter()
        .map(|section| {
            json!({
                "start_line": section.start_line,
                "end_line": section.end_line,
                "token_index": section.token_index,
                "level": section.level,
                "title": section.title,
            })
        })
        .collect::<Vec<_>>();

    let mut results = Map::new();
    for result in &outcome.results {
        results.insert(result.name.clone(), result.result.clone());
    }

    json!({
        "status": outcome.status,
        "sections": sections,
        "results": results,
        "stats": {
            "token_visits": outcome.stats.token_visits,
            "invocations": outcome.stats.invocations,
            "accesses": outcome.stats.accesses,
        },
        "error": outcome.error.as_ref().map(|e| e.to_string()),
    })
}

/// Canonical JSON for an outcome.
pub fn to_canonical_json(outcome: &ParseOutcome) -> String {
    canonical_string(&outcome_value(outcome))
}

enum Step<'v> {
    Value(&'v Value),
    Key(&'v str),
    Text(&'static str),
}

/// Serialize `value` canonically.  Iterative, so deeply nested values cannot
/// exhaust the stack.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Value(value)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => out.push_str(text),
            Step::Key(key) => {
                out.push_str(&Value::from(key).to_string());
                out.push(':');
            }
            Step::Value(Value::Array(items)) => {
                out.push('[');
                stack.push(Step::Text("]"));
                for (ix, item) in items.iter().enumerate().rev() {
                    stack.push(Step::Value(item));
                    if ix > 0 {
                        stack.push(Step::Text(","));
                    }
                }
            }
            Step::Value(Value::Object(map)) => {
                out.push('{');
                stack.push(Step::Text("}"));
                let mut entries = map.iter().collect::<Vec<_>>();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
                for (ix, (key, item)) in entries.into_iter().enumerate().rev() {
                    stack.push(Step::Value(item));
                    stack.push(Step::Key(key));
                    if ix > 0 {
                        stack.push(Step::Text(","));
                    }
                }
            }
            Step::Value(scalar) => out.push_str(&scalar.to_string()),
        }
    }

    out
}
