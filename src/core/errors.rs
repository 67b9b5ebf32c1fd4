use thiserror::Error;

/// Protocol error code the radio backend returns when a user auth token has
/// expired and the session must be re-established.
pub const INVALID_AUTH_TOKEN: i64 = 1001;

/// Closed error taxonomy for the protocol and catalog layers.
///
/// Exactly one variant is active per failure. Underlying I/O, serde, and
/// cipher causes are folded into the nearest domain variant so callers never
/// have to match on transport internals.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("partner login failed: {0}")]
    PartnerLogin(String),

    #[error("user login failed: invalid credentials ({0})")]
    UserLogin(String),

    #[error("remote call '{method}' failed: {message}")]
    RemoteCall {
        method: String,
        code: Option<i64>,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("{provider} rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { provider: String, attempts: u32 },
}

impl SourceError {
    /// Build a remote-call error for the given method or endpoint.
    pub fn remote(
        method: impl Into<String>,
        code: Option<i64>,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteCall {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// True when the backend rejected the session token (expiry signal).
    pub fn is_invalid_auth_token(&self) -> bool {
        matches!(
            self,
            Self::RemoteCall {
                code: Some(INVALID_AUTH_TOKEN),
                ..
            }
        )
    }

    /// True when a provider signalled throttling (HTTP 429/503).
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            Self::RemoteCall {
                code: Some(429 | 503),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_auth_token_detection() {
        let err = SourceError::remote("station.getPlaylist", Some(INVALID_AUTH_TOKEN), "expired");
        assert!(err.is_invalid_auth_token());
        assert!(!err.is_throttled());

        let other = SourceError::remote("station.getPlaylist", Some(1002), "denied");
        assert!(!other.is_invalid_auth_token());
    }

    #[test]
    fn throttle_detection_covers_both_statuses() {
        assert!(SourceError::remote("/search", Some(429), "slow down").is_throttled());
        assert!(SourceError::remote("/search", Some(503), "busy").is_throttled());
        assert!(!SourceError::remote("/search", Some(500), "boom").is_throttled());
        assert!(!SourceError::NotFound("x".into()).is_throttled());
    }
}
