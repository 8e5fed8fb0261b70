#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use markpass::{collectors, parse, to_canonical_json, Options, Status};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    options: Options,
    markdown: &'a str,
}

fuzz_target!(|input: Input| {
    let mut options = input.options;
    // A fuzzed budget only makes runs flaky.
    options.deadline.budget = None;
    options.limits.check_interval = options.limits.check_interval.max(1);

    let outcome = parse(input.markdown, collectors::all(&options), &options);
    if outcome.status != Status::Completed {
        assert!(outcome.results.is_empty());
        assert!(outcome.sections.is_empty());
    }
    let _ = to_canonical_json(&outcome);
});
