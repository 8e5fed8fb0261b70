use super::*;
use serde_json::Value;

fn run(dispatcher: &mut Dispatcher<'_>, tokens: &[Token]) -> DispatchStats {
    let indexes = indexes_of(tokens);
    let locator = indexes.locator();
    match dispatcher.dispatch_all(tokens, &indexes, &locator, &Deadline::unlimited()) {
        Ok(stats) => stats,
        Err(err) => panic!("dispatch failed: {}", err),
    }
}

fn document() -> Vec<Token> {
    let mut tokens = heading(1, 0, "Title");
    tokens.extend(paragraph(2, 3, "text"));
    tokens.push(
        flat("fence")
            .with_tag("code")
            .with_attr("info", "rust")
            .with_map(4, 7)
            .with_content("fn main() {}\n"),
    );
    tokens
}

#[test]
fn every_token_visited_once() {
    let log = RefCell::new(Vec::new());
    let tokens = document();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Recorder::new("all", &[crate::dispatch::WILDCARD], &log));

    let stats = run(&mut dispatcher, &tokens);

    assert_eq!(stats.token_visits, tokens.len());
    assert_eq!(stats.invocations, tokens.len());
    let positions = log.borrow().iter().map(|(_, pos)| *pos).collect::<Vec<_>>();
    assert_eq!(positions, (0..tokens.len()).collect::<Vec<_>>());
}

#[test]
fn routes_by_type_in_registration_order() {
    let log = RefCell::new(Vec::new());
    let tokens = document();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Recorder::new("second-inline", &["fence", "inline"], &log));
    dispatcher.register(Recorder::new("first-heading", &["heading_open"], &log));
    dispatcher.register(Recorder::new("inline-too", &["inline"], &log));

    let stats = run(&mut dispatcher, &tokens);

    assert_eq!(
        *log.borrow(),
        vec![
            ("first-heading".to_string(), 0),
            ("second-inline".to_string(), 1),
            ("inline-too".to_string(), 1),
            ("second-inline".to_string(), 4),
            ("inline-too".to_string(), 4),
            ("second-inline".to_string(), 6),
        ]
    );
    assert_eq!(stats.invocations, 6);
    assert_eq!(stats.token_visits, 7);
}

#[test]
fn collector_overlapping_routes_called_once() {
    let log = RefCell::new(Vec::new());
    let tokens = document();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(
        Recorder::new("greedy", &["fence", "fence", crate::dispatch::WILDCARD], &log)
            .with_tags(&["code"]),
    );

    run(&mut dispatcher, &tokens);

    let fence_calls = log.borrow().iter().filter(|(_, pos)| *pos == 6).count();
    assert_eq!(fence_calls, 1);
    assert_eq!(log.borrow().len(), tokens.len());
}

#[test]
fn duplicate_names_are_ignored() {
    let log = RefCell::new(Vec::new());
    let mut dispatcher = Dispatcher::new();

    assert!(dispatcher.register(Recorder::new("x", &["inline"], &log)));
    assert!(!dispatcher.register(Recorder::new("x", &["fence"], &log)));
    assert!(dispatcher.register(Recorder::new("y", &["fence"], &log)));

    let names = dispatcher
        .registrations()
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["x", "y"]);
    assert_eq!(dispatcher.registrations()[0].handles_types, vec!["inline"]);

    run(&mut dispatcher, &document());
    let results = dispatcher.finalize();
    assert_eq!(results.len(), 2);
    // "x" only ever saw inline tokens.
    assert_eq!(results[0].result["seen"], 2);
    assert_eq!(results[1].result["seen"], 1);
}

#[test]
fn registration_dedups_handled_types() {
    let log = RefCell::new(Vec::new());
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(
        Recorder::new("r", &["inline", "fence", "inline"], &log).with_tags(&["p", "p"]),
    );

    assert_eq!(
        dispatcher.registrations(),
        &[Registration {
            name: "r".to_string(),
            handles_types: vec!["inline".to_string(), "fence".to_string()],
            handles_tags: vec!["p".to_string()],
        }]
    );
}

#[test]
fn routes_by_tag() {
    let log = RefCell::new(Vec::new());
    let tokens = document();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Recorder::new("headings", &[], &log).with_tags(&["h1"]));

    run(&mut dispatcher, &tokens);

    // heading_open and heading_close carry the tag; the inline does not.
    let positions = log.borrow().iter().map(|(_, pos)| *pos).collect::<Vec<_>>();
    assert_eq!(positions, vec![0, 2]);
}

#[test]
fn finalize_in_registration_order() {
    let log = RefCell::new(Vec::new());
    let mut dispatcher = Dispatcher::new();
    for name in ["c", "a", "b"] {
        dispatcher.register(Recorder::new(name, &["inline"], &log));
    }
    run(&mut dispatcher, &document());

    let names = dispatcher
        .finalize()
        .into_iter()
        .map(|r| r.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["c", "a", "b"]);
}

#[test]
fn expired_deadline_stops_dispatch() {
    let log = RefCell::new(Vec::new());
    let tokens = nested(50);
    let indexes = indexes_of(&tokens);
    let locator = indexes.locator();
    let deadline = Deadline::start(Some(Duration::ZERO), TimerStrategy::Cooperative);

    let mut dispatcher = Dispatcher::new().check_interval(8);
    dispatcher.register(Recorder::new("all", &[crate::dispatch::WILDCARD], &log));
    let result = dispatcher.dispatch_all(&tokens, &indexes, &locator, &deadline);

    assert_eq!(result, Err(Error::TimedOut));
    // The first poll happens on the eighth visit, before it is counted.
    assert_eq!(log.borrow().len(), 7);
}

#[test]
#[should_panic(expected = "different token stream")]
fn indexes_must_match_tokens() {
    let tokens = document();
    let mut other = tokens.clone();
    other.extend(paragraph(9, 10, "more"));
    let indexes = indexes_of(&other);
    let locator = indexes.locator();

    let mut dispatcher = Dispatcher::new();
    let _ = dispatcher.dispatch_all(&tokens, &indexes, &locator, &Deadline::unlimited());
}

#[test]
#[should_panic(expected = "different token stream")]
fn indexes_must_match_tokens_of_the_same_length() {
    let tokens = document();
    let other = nested(2);
    assert_eq!(tokens.len(), other.len());
    let indexes = indexes_of(&other);
    let locator = indexes.locator();

    let mut dispatcher = Dispatcher::new();
    let _ = dispatcher.dispatch_all(&tokens, &indexes, &locator, &Deadline::unlimited());
}

/// Reads the document through every context accessor.
struct Inspector {
    seen: Vec<Value>,
}

impl Collector for Inspector {
    fn name(&self) -> &str {
        "inspector"
    }

    fn handles_types(&self) -> &[&str] {
        &["fence", "heading_open"]
    }

    fn on_token(&mut self, pos: usize, token: &Token, ctx: &DispatchContext<'_>) {
        let entry = match token.kind.as_str() {
            "heading_open" => {
                let close = ctx.pair(pos);
                let back = close.and_then(|c| ctx.pair_rev(c));
                let (range, span) = ctx.subrange(pos).unwrap();
                serde_json::json!({
                    "close": close,
                    "back": back,
                    "range": [range.start(), range.end()],
                    "span": span.len(),
                    "children": ctx.children(pos),
                })
            }
            _ => serde_json::json!({
                "section": ctx.section_at(pos).map(|s| s.title.clone()),
                "fences": ctx.positions("fence"),
                "parent": ctx.parent(pos),
                "token": ctx.token(pos).map(|t| t.kind.clone()),
                "len": ctx.len(),
            }),
        };
        self.seen.push(entry);
    }

    fn finalize(&mut self) -> Value {
        Value::Array(std::mem::take(&mut self.seen))
    }
}

#[test]
fn context_accessors_and_metering() {
    let tokens = document();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Inspector { seen: Vec::new() });

    let stats = run(&mut dispatcher, &tokens);
    let results = dispatcher.finalize();

    assert_eq!(
        results[0].result,
        serde_json::json!([
            {"close": 2, "back": 0, "range": [0, 2], "span": 3, "children": [1]},
            {"section": "Title", "fences": [6], "parent": null, "token": "fence", "len": 7},
        ])
    );
    // pair, pair_rev, subrange (1 + 3), children (1 + 1); then section_at
    // (token + section_of), positions, parent, token.
    assert_eq!(stats.accesses, 1 + 1 + 4 + 2 + 2 + 1 + 1 + 1);
}
