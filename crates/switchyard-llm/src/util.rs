//! Common utilities shared by the manager and the usage ledger

/// Sensitive patterns to filter from error messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "api_key",
    "api-key",
    "apikey",
    "authorization",
    "bearer",
    "secret",
    "password",
    "credential",
];

/// Fold one sample into a count-weighted running mean.
///
/// `count` is the number of samples including this one. The result is the
/// arithmetic mean of every sample seen so far, independent of arrival order
/// up to float rounding.
#[must_use]
pub fn running_mean(current: f64, sample: f64, count: u64) -> f64 {
    if count <= 1 {
        return sample;
    }
    current + (sample - current) / count as f64
}

/// Sanitize an error message before it is kept in stats or shown to users.
///
/// Messages that mention credentials are replaced wholesale.
///
/// # Examples
/// ```
/// use switchyard_llm::util::sanitize_error_for_user;
/// assert_eq!(
///     sanitize_error_for_user("Invalid api_key provided"),
///     "An API error occurred. Please try again."
/// );
/// assert_eq!(
///     sanitize_error_for_user("Connection timeout"),
///     "Connection timeout"
/// );
/// ```
#[must_use]
pub fn sanitize_error_for_user(error: &str) -> String {
    let lower = error.to_lowercase();

    for pattern in SENSITIVE_PATTERNS {
        if lower.contains(pattern) {
            return "An API error occurred. Please try again.".to_string();
        }
    }

    error.to_string()
}
