use chat_api::retry::{is_retryable_http_error, retry_delay_ms, BASE_DELAY_MS, MAX_RETRIES};

#[test]
fn retryable_statuses_match_allowlist() {
    for status in [429, 500, 502, 503, 504] {
        assert!(is_retryable_http_error(status, ""), "{status} must retry");
    }
    for status in [400, 401, 403, 404, 422] {
        assert!(!is_retryable_http_error(status, ""), "{status} must not retry");
    }
}

#[test]
fn transient_error_text_triggers_retry_regardless_of_status() {
    assert!(is_retryable_http_error(400, "upstream connect error"));
    assert!(is_retryable_http_error(400, "Rate limit exceeded"));
    assert!(is_retryable_http_error(400, "service unavailable"));
    assert!(!is_retryable_http_error(400, "invalid request payload"));
}

#[test]
fn retry_delay_grows_exponentially_from_base() {
    assert_eq!(retry_delay_ms(0).as_millis() as u64, BASE_DELAY_MS);
    assert_eq!(retry_delay_ms(1).as_millis() as u64, BASE_DELAY_MS * 2);
    assert_eq!(retry_delay_ms(2).as_millis() as u64, BASE_DELAY_MS * 4);
    assert!(MAX_RETRIES >= 1);
}
