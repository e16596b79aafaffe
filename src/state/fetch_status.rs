/// Fetch status definitions for crawl outcomes
///
/// This module defines every terminal state a URL can end in after the
/// scheduler has finished with it.
use serde::Serialize;
use std::fmt;

/// Terminal status of a single URL in a fetch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    // ===== Success =====
    /// A 2xx response was received
    Success,

    // ===== Policy =====
    /// robots.txt disallows the URL; no fetch was attempted
    RobotsDenied,

    // ===== Errors =====
    /// A non-2xx response was received
    HttpError,

    /// Transport failure (connection refused, DNS, TLS, proxy)
    NetworkError,

    /// The fetch did not complete within the configured timeout
    Timeout,

    // ===== Caller-initiated =====
    /// The run was cancelled before this URL completed
    Cancelled,
}

impl FetchStatus {
    /// Returns true if this represents a successful fetch
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for transient failures that may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }

    /// Returns true if this represents an error state
    ///
    /// A robots refusal is a policy decision and a cancellation is
    /// caller-initiated, so neither counts as an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::HttpError | Self::NetworkError | Self::Timeout)
    }

    /// Converts the status to its stored string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RobotsDenied => "robots_denied",
            Self::HttpError => "http_error",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its stored string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "robots_denied" => Some(Self::RobotsDenied),
            "http_error" => Some(Self::HttpError),
            "network_error" => Some(Self::NetworkError),
            "timeout" => Some(Self::Timeout),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 6] {
        [
            Self::Success,
            Self::RobotsDenied,
            Self::HttpError,
            Self::NetworkError,
            Self::Timeout,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "Success",
            Self::RobotsDenied => "Robots Denied",
            Self::HttpError => "HTTP Error",
            Self::NetworkError => "Network Error",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_failures_retry() {
        assert!(FetchStatus::NetworkError.is_retryable());
        assert!(FetchStatus::Timeout.is_retryable());
        assert!(!FetchStatus::HttpError.is_retryable());
        assert!(!FetchStatus::RobotsDenied.is_retryable());
        assert!(!FetchStatus::Cancelled.is_retryable());
        assert!(!FetchStatus::Success.is_retryable());
    }

    #[test]
    fn test_policy_and_cancel_are_not_errors() {
        assert!(!FetchStatus::RobotsDenied.is_error());
        assert!(!FetchStatus::Cancelled.is_error());
        assert!(FetchStatus::HttpError.is_error());
    }

    #[test]
    fn test_string_representation_is_stable() {
        for status in FetchStatus::all() {
            assert_eq!(FetchStatus::from_str_opt(status.as_str()), Some(status));
        }
        assert_eq!(FetchStatus::from_str_opt("unknown"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FetchStatus::RobotsDenied.to_string(), "Robots Denied");
        assert_eq!(FetchStatus::HttpError.to_string(), "HTTP Error");
    }
}
