//! Crate-level error surface.
//!
//! `RemoteError` is the shape repository failures arrive in; the classifier
//! maps it to an `ErrorCategory` exactly once and nothing downstream
//! re-inspects the raw error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::core::{CanonJsonError, InvalidEntityId};

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient contention/outage).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// Domain error codes carried by backend responses.
///
/// Unrecognized codes survive round-trips as `Unknown` so a newer backend
/// never breaks an older client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DomainCode {
    Unauthenticated,
    Unauthorized,
    AlreadyExists,
    VersionMismatch,
    ValidationFailed,
    NotFound,
    RateLimited,
    Internal,
    Unknown(String),
}

impl DomainCode {
    pub fn as_str(&self) -> &str {
        match self {
            DomainCode::Unauthenticated => "unauthenticated",
            DomainCode::Unauthorized => "unauthorized",
            DomainCode::AlreadyExists => "already_exists",
            DomainCode::VersionMismatch => "version_mismatch",
            DomainCode::ValidationFailed => "validation_failed",
            DomainCode::NotFound => "not_found",
            DomainCode::RateLimited => "rate_limited",
            DomainCode::Internal => "internal",
            DomainCode::Unknown(code) => code.as_str(),
        }
    }

    pub fn parse(code: &str) -> Self {
        match code {
            "unauthenticated" => DomainCode::Unauthenticated,
            "unauthorized" => DomainCode::Unauthorized,
            "already_exists" => DomainCode::AlreadyExists,
            "version_mismatch" => DomainCode::VersionMismatch,
            "validation_failed" => DomainCode::ValidationFailed,
            "not_found" => DomainCode::NotFound,
            "rate_limited" => DomainCode::RateLimited,
            "internal" => DomainCode::Internal,
            other => DomainCode::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for DomainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DomainCode::parse(s))
    }
}

impl Serialize for DomainCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DomainCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(DomainCode::parse(&raw))
    }
}

/// A failed repository call, as delivered by the transport layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    #[error("request timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// In-flight call cancelled by teardown or explicit cancel.
    #[error("call cancelled")]
    Cancelled,

    #[error("http status {status}")]
    Http {
        status: u16,
        message: Option<String>,
    },

    #[error("{code}: {message}")]
    Domain { code: DomainCode, message: String },
}

impl RemoteError {
    /// The message worth showing a user, when there is one.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            RemoteError::Domain { message, .. } => Some(message.as_str()),
            RemoteError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Crate-level convenience error.
///
/// A thin wrapper over the capability errors; not a catch-all.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    InvalidId(#[from] InvalidEntityId),

    #[error(transparent)]
    Snapshot(#[from] CanonJsonError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Ledger(_) | Error::InvalidId(_) | Error::Snapshot(_) | Error::Config(_) => {
                Transience::Permanent
            }
            Error::Remote(e) => match e {
                RemoteError::Transport { .. }
                | RemoteError::Timeout { .. }
                | RemoteError::Cancelled => Transience::Retryable,
                RemoteError::Http { status, .. } if *status >= 500 => Transience::Retryable,
                RemoteError::Http { .. } => Transience::Permanent,
                RemoteError::Domain { code, .. } => match code {
                    DomainCode::RateLimited | DomainCode::Internal => Transience::Retryable,
                    DomainCode::Unknown(_) => Transience::Unknown,
                    _ => Transience::Permanent,
                },
            },
        }
    }
}
