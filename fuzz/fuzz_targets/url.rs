#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use markpass::{validate_url, validate_url_with, UrlContext, UrlPolicy};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    policy: UrlPolicy,
    image: bool,
    url: &'a str,
}

fuzz_target!(|input: Input| {
    let context = if input.image {
        UrlContext::Image
    } else {
        UrlContext::Link
    };
    let verdict = validate_url_with(input.url, &input.policy, context);
    assert_eq!(verdict.accepted, verdict.reasons.is_empty());

    let _ = validate_url(input.url);
});
