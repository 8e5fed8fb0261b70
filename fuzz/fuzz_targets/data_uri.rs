#![no_main]
use libfuzzer_sys::fuzz_target;
use markpass::{estimate_size, validate_data_uri, UrlPolicy};

fuzz_target!(|uri: &str| {
    let limit = 4096;
    let estimate = estimate_size(uri, limit);
    // Below the limit the estimate is exact.
    if estimate <= limit {
        assert_eq!(estimate_size(uri, usize::MAX), estimate);
    }

    let _ = validate_data_uri(uri, &UrlPolicy::default());
});
