//! Timestamp unit handling.
//!
//! Records arrive with integer timestamps whose unit is not declared. A value
//! with exactly ten decimal digits is taken to be epoch seconds; anything else
//! is taken to be milliseconds already. Millisecond values that happen to have
//! ten digits (instants between 1970-01-01 and 2001-09-09) are misread as
//! seconds. That range never occurs for live sensor data and is accepted.

/// Number of decimal digits in `value`, ignoring the sign.
fn digit_count(value: i64) -> u32 {
    value.unsigned_abs().checked_ilog10().map_or(1, |log| log + 1)
}

/// Convert a timestamp of unknown unit to milliseconds since the epoch.
pub fn normalize_to_millis(timestamp: i64) -> i64 {
    if digit_count(timestamp) == 10 {
        timestamp.saturating_mul(1000)
    } else {
        timestamp
    }
}

/// Floor a millisecond timestamp to whole seconds.
pub fn millis_to_seconds(millis: i64) -> i64 {
    millis.div_euclid(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_are_scaled() {
        assert_eq!(normalize_to_millis(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_to_millis(1_000_000_000), 1_000_000_000_000);
        assert_eq!(normalize_to_millis(9_999_999_999), 9_999_999_999_000);
    }

    #[test]
    fn test_millis_are_unchanged() {
        assert_eq!(normalize_to_millis(1_700_000_000_000), 1_700_000_000_000);
        assert_eq!(normalize_to_millis(999_999_999), 999_999_999);
        assert_eq!(normalize_to_millis(100), 100);
        assert_eq!(normalize_to_millis(0), 0);
    }

    #[test]
    fn test_sign_is_ignored() {
        assert_eq!(normalize_to_millis(-1_700_000_000), -1_700_000_000_000);
        assert_eq!(normalize_to_millis(-42), -42);
    }

    #[test]
    fn test_extreme_values_do_not_panic() {
        assert_eq!(normalize_to_millis(i64::MAX), i64::MAX);
        assert_eq!(normalize_to_millis(i64::MIN), i64::MIN);
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(digit_count(0), 1);
        assert_eq!(digit_count(9), 1);
        assert_eq!(digit_count(10), 2);
        assert_eq!(digit_count(-1_234_567_890), 10);
    }

    #[test]
    fn test_millis_to_seconds_floors() {
        assert_eq!(millis_to_seconds(50_000), 50);
        assert_eq!(millis_to_seconds(50_999), 50);
        assert_eq!(millis_to_seconds(1_700_000_000_123), 1_700_000_000);
        assert_eq!(millis_to_seconds(-1), -1);
    }
}
