use super::*;
use serde_json::json;

const MIXED: &str = "# Über\n\n[a](https://example.com) [b](javascript:x) ![c](data:image/png;base64,AAAA)\n\n## Straße\n\n```sh\nls\n```\n\n| x | y |\n|---|---|\n| 1 | 2 |\n\n## STRASSE\n\np\u{430}ypal \u{200B}\n";

fn canonical_run(markdown: &str) -> String {
    let options = Options::default();
    let outcome = parse(markdown, crate::collectors::all(&options), &options);
    assert_eq!(outcome.status, Status::Completed);
    to_canonical_json(&outcome)
}

#[test]
fn same_input_same_bytes() {
    let first = canonical_run(MIXED);
    for _ in 0..5 {
        assert_eq!(canonical_run(MIXED), first);
    }
}

#[test]
fn line_endings_do_not_change_output() {
    let crlf = MIXED.replace('\n', "\r\n");
    assert_eq!(canonical_run(&crlf), canonical_run(MIXED));
}

#[test]
fn parallel_matches_sequential() {
    let options = Options::default();
    let documents = vec![MIXED.to_string(); 8];
    let outcomes = parse_many(&documents, || crate::collectors::all(&options), &options);

    let expected = canonical_run(MIXED);
    for outcome in &outcomes {
        assert_eq!(to_canonical_json(outcome), expected);
    }
}

#[test]
fn keys_are_sorted_at_every_level() {
    let value = json!({
        "zeta": {"b": 1, "a": [{"y": true, "x": null}]},
        "alpha": "\u{e9}\"\n",
        "mid": [3, 2.5, -1],
    });
    assert_eq!(
        canonical_string(&value),
        r#"{"alpha":"é\"\n","mid":[3,2.5,-1],"zeta":{"a":[{"x":null,"y":true}],"b":1}}"#
    );
}

#[test]
fn empty_containers() {
    assert_eq!(canonical_string(&json!({})), "{}");
    assert_eq!(canonical_string(&json!([])), "[]");
    assert_eq!(canonical_string(&json!({"a": [], "b": {}})), r#"{"a":[],"b":{}}"#);
}

#[test]
fn deep_values_do_not_recurse() {
    let mut value = json!(0);
    for _ in 0..100_000 {
        value = serde_json::Value::Array(vec![value]);
    }
    let out = canonical_string(&value);
    assert_eq!(out.len(), 200_001);
    assert!(out.starts_with("[[[["));
    // serde_json's own drop is recursive; unwind by hand.
    let mut current = value;
    while let serde_json::Value::Array(mut items) = current {
        current = items.pop().unwrap_or(serde_json::Value::Null);
    }
}

#[test]
fn outcome_layout() {
    let options = Options::default();
    let outcome = parse("# T\n\n[x](https://example.com)\n", crate::collectors::by_names(&["links"], &options).unwrap(), &options);
    let json = to_canonical_json(&outcome);

    assert!(json.starts_with(r#"{"error":null,"results":{"links":{"links":[{"accepted":true,"#));
    assert!(json.contains(r#""sections":[{"end_line":2,"level":1,"start_line":0,"title":"T","token_index":0}]"#));
    assert!(json.ends_with(r#","status":"completed"}"#));
}

#[test]
fn stopped_outcomes_serialize_without_results() {
    let outcome = ParseOutcome::stopped(Error::TimedOut);
    assert_eq!(
        to_canonical_json(&outcome),
        r#"{"error":"deadline expired","results":{},"sections":[],"stats":{"accesses":0,"invocations":0,"token_visits":0},"status":"timed_out"}"#
    );
}
