//! Table-driven failure classification.
//!
//! Maps a raw `RemoteError` into one `ErrorCategory`, once, at the boundary.
//! The rules are data: supporting another backend means extending the table,
//! not adding string matching at call sites.

use serde::{Deserialize, Serialize};

use crate::error::{DomainCode, RemoteError};

/// The complete failure taxonomy surfaced by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Authorization,
    Conflict,
    Validation,
    ServerError,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Validation => "validation",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// One facet of a raw error a rule can match on.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Matcher {
    /// Any transport/timeout/cancellation failure.
    TransportAny,
    HttpExact(u16),
    HttpRange(u16, u16),
    Domain(DomainCode),
}

impl Matcher {
    fn matches(&self, error: &RemoteError) -> bool {
        match (self, error) {
            (
                Matcher::TransportAny,
                RemoteError::Transport { .. } | RemoteError::Timeout { .. } | RemoteError::Cancelled,
            ) => true,
            (Matcher::HttpExact(want), RemoteError::Http { status, .. }) => want == status,
            (Matcher::HttpRange(lo, hi), RemoteError::Http { status, .. }) => {
                (*lo..=*hi).contains(status)
            }
            (Matcher::Domain(want), RemoteError::Domain { code, .. }) => want == code,
            _ => false,
        }
    }
}

/// Ordered classification rules; first match wins, fallback is `Unknown`.
pub struct ClassificationTable {
    rules: Vec<(Matcher, ErrorCategory)>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        use ErrorCategory::*;
        let rules = vec![
            (Matcher::TransportAny, Network),
            (Matcher::HttpExact(401), Authorization),
            (Matcher::HttpExact(403), Authorization),
            (Matcher::Domain(DomainCode::Unauthenticated), Authorization),
            (Matcher::Domain(DomainCode::Unauthorized), Authorization),
            (Matcher::HttpExact(409), Conflict),
            (Matcher::Domain(DomainCode::AlreadyExists), Conflict),
            (Matcher::Domain(DomainCode::VersionMismatch), Conflict),
            (Matcher::HttpExact(400), Validation),
            (Matcher::Domain(DomainCode::ValidationFailed), Validation),
            (Matcher::HttpExact(429), ServerError),
            (Matcher::Domain(DomainCode::RateLimited), ServerError),
            (Matcher::HttpRange(500, 599), ServerError),
            (Matcher::Domain(DomainCode::Internal), ServerError),
        ];
        Self { rules }
    }
}

impl ClassificationTable {
    /// Deterministic, pure classification.
    pub fn classify(&self, error: &RemoteError) -> ErrorCategory {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(error))
            .map(|(_, category)| *category)
            .unwrap_or(ErrorCategory::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassificationTable {
        ClassificationTable::default()
    }

    fn http(status: u16) -> RemoteError {
        RemoteError::Http {
            status,
            message: None,
        }
    }

    fn domain(code: &str) -> RemoteError {
        RemoteError::Domain {
            code: DomainCode::parse(code),
            message: "msg".into(),
        }
    }

    #[test]
    fn transport_failures_are_network() {
        assert_eq!(
            table().classify(&RemoteError::Transport {
                reason: "offline".into()
            }),
            ErrorCategory::Network
        );
        assert_eq!(
            table().classify(&RemoteError::Timeout { waited_ms: 8_000 }),
            ErrorCategory::Network
        );
        assert_eq!(
            table().classify(&RemoteError::Cancelled),
            ErrorCategory::Network
        );
    }

    #[test]
    fn http_statuses_map_per_table() {
        assert_eq!(table().classify(&http(401)), ErrorCategory::Authorization);
        assert_eq!(table().classify(&http(403)), ErrorCategory::Authorization);
        assert_eq!(table().classify(&http(409)), ErrorCategory::Conflict);
        assert_eq!(table().classify(&http(400)), ErrorCategory::Validation);
        assert_eq!(table().classify(&http(500)), ErrorCategory::ServerError);
        assert_eq!(table().classify(&http(503)), ErrorCategory::ServerError);
        assert_eq!(table().classify(&http(418)), ErrorCategory::Unknown);
    }

    #[test]
    fn domain_codes_map_per_table() {
        assert_eq!(
            table().classify(&domain("version_mismatch")),
            ErrorCategory::Conflict
        );
        assert_eq!(
            table().classify(&domain("unauthenticated")),
            ErrorCategory::Authorization
        );
        assert_eq!(
            table().classify(&domain("validation_failed")),
            ErrorCategory::Validation
        );
        assert_eq!(
            table().classify(&domain("some_future_code")),
            ErrorCategory::Unknown
        );
    }
}
