use serde_json::{json, Value};

use super::line_of;
use crate::dispatch::{Collector, DispatchContext};
use crate::options::UrlPolicy;
use crate::security::{estimate_size, validate_url_with, DataUri, UrlContext};
use crate::token::Token;

/// Every image source, validated, with `data:` payloads sized rather than
/// copied.
#[derive(Debug)]
pub struct Images {
    policy: UrlPolicy,
    images: Vec<Value>,
    rejected: usize,
}

impl Images {
    /// Validate sources under `policy`.
    pub fn new(policy: UrlPolicy) -> Self {
        Images {
            policy,
            images: Vec::new(),
            rejected: 0,
        }
    }

    fn describe(&self, src: &str) -> (Value, Value) {
        match DataUri::parse(src) {
            Ok(data) => {
                let cap = self.policy.max_data_uri_bytes;
                let size = estimate_size(src, cap);
                let summary = json!({
                    "media_type": data.media_type,
                    "base64": data.base64,
                    "estimated_bytes": size.min(cap.saturating_add(1)),
                });
                (Value::String(format!("data:{}", data.media_type)), summary)
            }
            Err(_) => (Value::String(src.to_string()), Value::Null),
        }
    }
}

impl Collector for Images {
    fn name(&self) -> &str {
        "images"
    }

    fn handles_types(&self) -> &[&str] {
        &["inline"]
    }

    fn on_token(&mut self, _pos: usize, token: &Token, _ctx: &DispatchContext<'_>) {
        for child in token.children.iter().filter(|c| c.kind == "image") {
            let src = child.attr("src").unwrap_or_default();
            let verdict = validate_url_with(src, &self.policy, UrlContext::Image);
            if !verdict.accepted {
                self.rejected += 1;
            }
            let (display, data) = self.describe(src);

            self.images.push(json!({
                "src": display,
                "data": data,
                "alt": child.content,
                "line": line_of(child, token),
                "accepted": verdict.accepted,
                "reasons": verdict.reasons,
            }));
        }
    }

    fn finalize(&mut self) -> Value {
        json!({
            "total": self.images.len(),
            "rejected": self.rejected,
            "images": std::mem::take(&mut self.images),
        })
    }
}
