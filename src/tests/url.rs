use super::*;

#[test]
fn boundary_cases() {
    assert_rejected!("http:example.com", MissingHost);
    assert_accepted!("http://example.com", "http://example.com");
    assert_rejected!("http://ex%2fample.com", EncodedSeparator);
    assert_rejected!("//evil.com", ProtocolRelative);
    assert_rejected!("javascript:alert(1)", DangerousScheme);
}

#[test]
fn empty_and_control() {
    assert_rejected!("", Empty);
    assert_rejected!("   \t ", Empty);
    assert_rejected!("java\tscript:alert(1)", ControlCharacter);
    assert_rejected!("http://exa\u{0}mple.com", ControlCharacter);
    assert_rejected!("http://example.com/\u{85}", ControlCharacter);
}

#[test]
fn surrounding_whitespace_is_trimmed() {
    assert_accepted!("  https://example.com/a  ", "https://example.com/a");
    let verdict = validate_url("  javascript:x ");
    assert_eq!(verdict.normalized, "javascript:x");
}

#[test]
fn protocol_relative_variants() {
    assert_rejected!("//evil.com/path", ProtocolRelative);
    assert_rejected!("\\\\evil.com", ProtocolRelative);
    assert_rejected!("/\\evil.com", ProtocolRelative);
    assert_rejected!("\\/evil.com", ProtocolRelative);
}

#[test]
fn dangerous_schemes_whatever_the_case() {
    assert_rejected!("JaVaScRiPt:alert(1)", DangerousScheme);
    assert_rejected!("vbscript:msgbox", DangerousScheme);
    assert_rejected!("file:///etc/passwd", DangerousScheme);
    assert_rejected!("data:text/html,<script>", DangerousScheme);
    assert_rejected!("data:image/png;base64,AAAA", DangerousScheme);
}

#[test]
fn dangerous_even_when_allowed() {
    let policy = UrlPolicy {
        allowed_schemes: vec!["javascript".to_string(), "https".to_string()],
        ..UrlPolicy::default()
    };
    let verdict = validate_url_with("javascript:alert(1)", &policy, UrlContext::Link);
    assert_eq!(verdict.reasons, vec![Reason::DangerousScheme]);
}

#[test]
fn allow_list() {
    assert_rejected!("ftp://example.com/file", DisallowedScheme);
    assert_rejected!("irc://example.com", DisallowedScheme);
    assert_accepted!("mailto:someone@example.com", "mailto:someone@example.com");
    assert_accepted!("MAILTO:someone@example.com", "mailto:someone@example.com");
    assert_rejected!("mailto:a\\b@example.com", Backslash);
}

#[test]
fn relative_references() {
    assert_accepted!("docs/intro.md", "docs/intro.md");
    assert_accepted!("#anchor", "#anchor");
    assert_accepted!("/absolute/path?q=1", "/absolute/path?q=1");
    assert_accepted!("./here", "./here");

    let strict = UrlPolicy {
        allow_relative: false,
        ..UrlPolicy::default()
    };
    let verdict = validate_url_with("docs/intro.md", &strict, UrlContext::Link);
    assert_eq!(verdict.reasons, vec![Reason::RelativeReference]);
}

#[test]
fn colon_after_slash_is_not_a_scheme() {
    assert_accepted!("a/b:c", "a/b:c");
    assert_accepted!("?x=javascript:alert(1)", "?x=javascript:alert(1)");
}

#[test]
fn authority_shape() {
    assert_rejected!("https:/example.com", MissingHost);
    assert_rejected!("http:///path", MissingHost);
    assert_rejected!("http://user@example.com", EmbeddedCredentials);
    assert_rejected!("http://user:pw@example.com/", EmbeddedCredentials);
    assert_rejected!("http://example.com:99999", InvalidPort);
    assert_rejected!("http://example.com:80a", InvalidPort);
    assert_rejected!("http://[::1]x", InvalidPort);
    assert_rejected!("http://[::1", MissingHost);
    assert_accepted!("http://example.com:8080/x", "http://example.com:8080/x");
    assert_accepted!("http://[::1]:8080/", "http://[::1]:8080/");
    assert_accepted!("http://example.com:", "http://example.com");
}

#[test]
fn query_and_fragment_at_the_authority() {
    assert_accepted!("https://example.com?q=1", "https://example.com?q=1");
    assert_accepted!("https://example.com#top", "https://example.com#top");
    // An '@' after the authority is just data.
    assert_accepted!("https://example.com/?to=a@b", "https://example.com/?to=a@b");
}

#[test]
fn backslashes() {
    assert_rejected!("http://example.com\\evil.com", Backslash);
    assert_rejected!("http://example.com/a\\b", Backslash);
    assert_rejected!("docs\\intro.md", Backslash);
}

#[test]
fn percent_encoding_in_host() {
    assert_rejected!("http://ex%2Fample.com", EncodedSeparator);
    assert_rejected!("http://ex%5cample.com", EncodedSeparator);
    assert_rejected!("http://ex%41mple.com", PercentEncodedHost);
}

#[test]
fn traversal_after_decoding() {
    assert_rejected!("http://example.com/a/../b", PathTraversal);
    assert_rejected!("http://example.com/a/%2e%2e/b", PathTraversal);
    assert_rejected!("http://example.com/a/%2E%2E%2Fb", PathTraversal);
    assert_rejected!("http://example.com/a/..%5cb", PathTraversal);
    assert_rejected!("http://example.com/a/..", PathTraversal);
    assert_rejected!("docs/%2e%2e/secret", PathTraversal);
    assert_rejected!("..", PathTraversal);
    assert_rejected!("../secret", PathTraversal);
    assert_rejected!("%2e%2e/secret", PathTraversal);
    assert_rejected!("..%2fsecret", PathTraversal);
    assert_rejected!("..%5csecret", PathTraversal);
    assert_accepted!("...", "...");
    assert_accepted!("..secret/x", "..secret/x");
    // Dots in a query are not a path.
    assert_accepted!("http://example.com/a?p=/../", "http://example.com/a?p=/../");
    assert_accepted!("http://example.com/a..b/", "http://example.com/a..b/");
}

#[test]
fn malformed_escapes() {
    assert_rejected!("http://example.com/%zz", MalformedEscape);
    assert_rejected!("http://example.com/%", MalformedEscape);
    assert_rejected!("http://example.com/%ff%fe", MalformedEscape);
    assert_accepted!("http://example.com/caf%C3%A9", "http://example.com/caf%C3%A9");
}

#[test]
fn host_is_lowercased_and_punycoded() {
    assert_accepted!("HTTP://Example.COM/Path", "http://example.com/Path");
    assert_accepted!("http://пример.рф/", "http://xn--e1afmkfd.xn--p1ai/");
    assert_accepted!("https://bücher.example", "https://xn--bcher-kva.example");
}

#[test]
fn mixed_script_hosts() {
    // Latin "paypal" with a Cyrillic "а".
    assert_rejected!("http://p\u{430}ypal.com", MixedScriptHost);
    // The same smuggled in as punycode.
    let ascii = match idna::domain_to_ascii("p\u{430}ypal.com") {
        Ok(ascii) => ascii,
        Err(_) => panic!("idna refused the test host"),
    };
    assert!(ascii.starts_with("xn--"));
    assert_rejected!(&format!("http://{}", ascii), MixedScriptHost);
    // A whole label in one script is fine.
    assert!(validate_url("http://παράδειγμα.example").accepted);
}

#[test]
fn images_may_use_data() {
    let image = UrlContext::Image;
    assert_accepted!(
        "data:image/png;base64,iVBORw0KGgo=",
        "data:image/png;base64,iVBORw0KGgo=",
        image
    );
    assert_accepted!("DATA:image/gif;base64,R0lG", "data:image/gif;base64,R0lG", image);
    assert_rejected!("data:text/html,<script>alert(1)</script>", DisallowedMediaType, image);
    assert_rejected!("data:image/svg+xml,<svg/>", DisallowedMediaType, image);
    assert_rejected!("data:image/png;base64", MalformedDataUri, image);
    assert_rejected!("javascript:alert(1)", DangerousScheme, image);
    assert_accepted!("https://cdn.example/x.png", "https://cdn.example/x.png", image);
}

#[test]
fn oversized_data_images() {
    let policy = UrlPolicy {
        max_data_uri_bytes: 30,
        ..UrlPolicy::default()
    };
    let small = format!("data:image/png;base64,{}", "A".repeat(40));
    let large = format!("data:image/png;base64,{}", "A".repeat(44));

    assert!(validate_url_with(&small, &policy, UrlContext::Image).accepted);
    let verdict = validate_url_with(&large, &policy, UrlContext::Image);
    assert_eq!(verdict.reasons, vec![Reason::DataUriTooLarge]);
}

#[test]
fn rejection_keeps_single_reason() {
    // Both a credential and a backslash; the earlier layer wins.
    let verdict = validate_url("http://u@example.com\\x");
    assert!(!verdict.accepted);
    assert_eq!(verdict.reasons, vec![Reason::EmbeddedCredentials]);
    assert_eq!(verdict.normalized, "http://u@example.com\\x");
}

#[test]
fn reasons_serialize_snake_case() {
    assert_eq!(
        serde_json::to_string(&Reason::PathTraversal).unwrap(),
        "\"path_traversal\""
    );
    assert_eq!(Reason::MixedScriptHost.to_string(), "mixed_script_host");
    assert_eq!(Reason::Empty.as_str(), "empty");
}
