//! Wire status codes carried in `{status, value}` replies.
//!
//! Zero is the only success code. Everything the driver needs to know
//! about a failure travels in the reply value string; the code exists so
//! callers can branch without parsing prose.

/// Command completed.
pub const STATUS_OK: i64 = 0;

/// Generic failure: unknown app, closed connection, handler error.
pub const STATUS_ERROR: i64 = 1;

/// A forwarded command's reply window lapsed with no progress.
pub const STATUS_TIMEOUT: i64 = 2;

/// No handler matched the action anywhere in the routing chain.
pub const STATUS_NOT_IMPLEMENTED: i64 = 405;

pub fn is_failure(status: i64) -> bool {
    status != STATUS_OK
}

pub fn status_name(status: i64) -> &'static str {
    match status {
        STATUS_OK => "ok",
        STATUS_ERROR => "error",
        STATUS_TIMEOUT => "timeout",
        STATUS_NOT_IMPLEMENTED => "not_implemented",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_not_a_failure() {
        assert!(!is_failure(STATUS_OK));
    }

    #[test]
    fn test_nonzero_codes_are_failures() {
        assert!(is_failure(STATUS_ERROR));
        assert!(is_failure(STATUS_TIMEOUT));
        assert!(is_failure(STATUS_NOT_IMPLEMENTED));
        assert!(is_failure(-7));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_name(STATUS_OK), "ok");
        assert_eq!(status_name(STATUS_TIMEOUT), "timeout");
        assert_eq!(status_name(STATUS_NOT_IMPLEMENTED), "not_implemented");
        assert_eq!(status_name(99), "unknown");
    }
}
