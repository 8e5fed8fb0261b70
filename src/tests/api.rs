use super::*;

// Keeps the public surface honest: everything a caller needs is reachable
// from the crate root and composes without reaching into modules.
#[test]
#[cfg(feature = "bon")]
fn exercise_full_api() {
    let options = Options {
        limits: Limits::builder().max_nesting(64).check_interval(16).build(),
        deadline: DeadlineOptions::builder()
            .budget(Duration::from_secs(30))
            .strategy(TimerStrategy::Cooperative)
            .build(),
        url: UrlPolicy::builder().allow_relative(false).build(),
        tokenizer: TokenizerOptions::builder().front_matter(true).build(),
    };
    assert_eq!(options.limits.max_input_bytes, 64 * 1024 * 1024);
    assert_eq!(options.url.allowed_schemes, vec!["http", "https", "mailto"]);
    assert!(options.tokenizer.table);

    let mut pipeline = Pipeline::new(options.clone());
    assert_eq!(pipeline.state(), RunState::Idle);
    assert!(pipeline.register(crate::collectors::Links::new(options.url.clone())));
    assert!(pipeline.register_boxed(Box::new(crate::collectors::Headings::new())));
    assert!(!pipeline.register(crate::collectors::Headings::new()));
    assert_eq!(pipeline.options().limits.max_nesting, 64);

    let outcome: ParseOutcome = pipeline.run("---\nk: v\n---\n\n# T\n\n[rel](a/b)\n");
    assert_eq!(pipeline.state(), RunState::Completed);
    assert!(pipeline.state().is_terminal());
    assert!(!pipeline.register(crate::collectors::Tables::new()));

    let _: &Status = &outcome.status;
    let _: &[Section] = &outcome.sections;
    let _: &[CollectorResult] = &outcome.results;
    let _: DispatchStats = outcome.stats;
    let _: Option<&Error> = outcome.error.as_ref();
    assert_eq!(outcome.result("links").unwrap()["rejected"], 1);
    assert_eq!(outcome.sections[0].title, "T");

    let json: String = to_canonical_json(&outcome);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(canonical_string(&value), json);

    let source = Source::new("x\r\n");
    let tokens: Vec<Token> = CommonMark::new(options.tokenizer).tokenize(source.text());
    let indexes: Indexes = IndexBuilder::new(&tokens)
        .limits(options.limits)
        .line_count(source.line_count())
        .build()
        .unwrap();
    let locator: SectionLocator<'_> = indexes.locator();
    let mut dispatcher = Dispatcher::new();
    let deadline = Deadline::start(options.deadline.budget, options.deadline.strategy);
    let _: DispatchStats = dispatcher
        .dispatch_all(&tokens, &indexes, &locator, &deadline)
        .unwrap();
    let _: Vec<CollectorResult> = dispatcher.finalize();

    let _: UrlVerdict = validate_url("https://example.com");
    let _: UrlVerdict = validate_url_with("x", &options.url, UrlContext::Image);
    let _: usize = estimate_size("data:,x", 10);
    let _: Result<DataUri<'_>, Reason> = validate_data_uri("data:image/png;base64,", &options.url);
    let _: UnicodeReport = scan_text("x");
    let _: String = skeleton("x");
    let _: LineSpan = LineSpan::new(0, 1);
    let _: Nesting = Nesting::Flat;
    let _: usize = line_count("x");
    let _: std::borrow::Cow<'_, str> = normalize("x");

    let request = WorkerRequest::new("# x", &["headings"], &options);
    let _: WorkerConfig = request.config.clone();
    let response: WorkerResponse = run_worker(&request);
    assert_eq!(response.status, Status::Completed);
    let mut out = Vec::new();
    serve_worker(serde_json::to_vec(&request).unwrap().as_slice(), &mut out).unwrap();
    let _ = run_isolated;

    let outcomes: Vec<ParseOutcome> = parse_many(
        &["# a", "# b"],
        || crate::collectors::all(&Options::default()),
        &Options::default(),
    );
    assert_eq!(outcomes.len(), 2);
}

#[test]
fn pipeline_runs_once() {
    let mut pipeline = Pipeline::new(Options::default());
    pipeline.run("x");
    let second = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pipeline.run("y")));
    assert!(second.is_err());
}

#[test]
fn custom_tokenizer() {
    let tokenizer = |_: &str| {
        let mut tokens = heading(2, 0, "Custom");
        tokens.extend(paragraph(1, 2, "body"));
        tokens
    };
    let mut pipeline = Pipeline::with_tokenizer(tokenizer, Options::default());
    pipeline.register(crate::collectors::Headings::new());

    let outcome = pipeline.run("ignored\nignored\n");
    assert_eq!(outcome.status, Status::Completed);
    assert_eq!(outcome.sections.len(), 1);
    assert_eq!(outcome.sections[0].level, 2);
    assert_eq!(outcome.sections[0].end_line, Some(1));
    assert_eq!(
        outcome.result("headings").unwrap()["headings"][0]["title"],
        "Custom"
    );
}

#[test]
fn broken_token_streams_fail() {
    let tokenizer = |_: &str| vec![open("paragraph", "p"), flat("inline")];
    let mut pipeline = Pipeline::with_tokenizer(tokenizer, Options::default());
    pipeline.register(crate::collectors::Links::new(UrlPolicy::default()));

    let outcome = pipeline.run("x");
    assert_eq!(outcome.status, Status::Failed);
    assert_eq!(pipeline.state(), RunState::Failed);
    assert!(outcome.results.is_empty());
    assert!(outcome.sections.is_empty());
    assert!(matches!(outcome.error, Some(Error::UnclosedOpen { position: 0, .. })));
}

#[test]
fn input_size_guard() {
    let options = Options {
        limits: Limits {
            max_input_bytes: 10,
            ..Limits::default()
        },
        ..Options::default()
    };
    let outcome = run_pipeline("# far too long for ten bytes", &["headings"], &options);
    assert_eq!(outcome.status, Status::Failed);
    assert_eq!(
        outcome.error,
        Some(Error::InputTooLarge { size: 28, limit: 10 })
    );
    assert!(outcome.error.unwrap().is_resource_exhaustion());
}

#[test]
fn status_and_state() {
    assert_eq!(Status::TimedOut.to_string(), "timed_out");
    assert_eq!(serde_json::to_string(&Status::Completed).unwrap(), "\"completed\"");
    assert_eq!(RunState::from(Status::Failed), RunState::Failed);
    assert!(!RunState::Running.is_terminal());
    assert!(!RunState::Idle.is_terminal());
}

#[test]
fn error_messages() {
    assert_eq!(Error::TimedOut.to_string(), "deadline expired");
    assert_eq!(
        Error::NestingTooDeep { position: 3, limit: 2 }.to_string(),
        "nesting depth exceeds 2 at position 3"
    );
    assert_eq!(
        Error::SourceTooDeep { line: 4, limit: 10 }.to_string(),
        "source may nest deeper than 10 at line 4"
    );
    assert!(Error::SourceTooDeep { line: 4, limit: 10 }.is_resource_exhaustion());
    assert!(!Error::MismatchedClose { open: 0, close: 1 }.is_resource_exhaustion());
}
