use serde_json::{json, Value};

use crate::dispatch::{Collector, DispatchContext};
use crate::token::{Nesting, Token};

/// Table shapes.  Routed by tag, and reads each table through its own
/// bounded subrange.
#[derive(Debug, Default)]
pub struct Tables {
    tables: Vec<Value>,
}

impl Tables {
    /// No tables yet.
    pub fn new() -> Self {
        Tables::default()
    }
}

impl Collector for Tables {
    fn name(&self) -> &str {
        "tables"
    }

    fn handles_types(&self) -> &[&str] {
        &[]
    }

    fn handles_tags(&self) -> &[&str] {
        &["table"]
    }

    fn on_token(&mut self, pos: usize, token: &Token, ctx: &DispatchContext<'_>) {
        if token.nesting != Nesting::Open {
            return;
        }
        let (_, span) = match ctx.subrange(pos) {
            Some(subrange) => subrange,
            None => return,
        };

        let mut rows = 0usize;
        let mut columns = 0usize;
        let mut cells = 0usize;
        let mut header = Vec::new();
        let mut in_header_cell = false;
        for inner in span {
            match (inner.kind.as_str(), inner.nesting) {
                ("tr_open", _) => {
                    rows += 1;
                    cells = 0;
                }
                ("th_open", _) | ("td_open", _) => {
                    cells += 1;
                    columns = columns.max(cells);
                    in_header_cell = inner.kind == "th_open";
                }
                ("th_close", _) | ("td_close", _) => in_header_cell = false,
                ("inline", Nesting::Flat) if in_header_cell => header.push(inner.content.clone()),
                _ => {}
            }
        }

        self.tables.push(json!({
            "line": token.line(),
            "rows": rows,
            "columns": columns,
            "header": header,
        }));
    }

    fn finalize(&mut self) -> Value {
        json!({
            "total": self.tables.len(),
            "tables": std::mem::take(&mut self.tables),
        })
    }
}
