use thiserror::Error;

/// Whether a failed item creation was the destination rejecting the payload
/// or the destination having a bad moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateErrorKind {
    /// The payload itself was rejected (HTTP 400); retrying is pointless.
    Validation,
    /// Rate limiting, write conflicts, server errors; worth retrying.
    Transient,
}

/// Errors from one tenant account, shaped by what each one aborts:
/// `Auth` aborts everything on that tenant, `VaultCreate` aborts one vault,
/// the rest abort one item.
#[derive(Debug, Clone, Error)]
pub enum AccountError {
    /// Token empty or rejected by the tenant
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Destination vault creation failed (includes name collisions)
    #[error("failed to create vault '{name}': {message}")]
    VaultCreate { name: String, message: String },

    /// Full item read from the source failed
    #[error("failed to fetch item {item_id}: {message}")]
    ItemFetch {
        item_id: String,
        message: String,
        transient: bool,
    },

    /// Item write to the destination failed
    #[error("failed to create item: {message}")]
    ItemCreate {
        message: String,
        kind: CreateErrorKind,
    },

    /// External credential-CLI bridge failed for one item
    #[error("bridge failed: {message}")]
    Bridge { message: String },

    /// Transport-level failure underneath the taxonomy above
    #[error("network error: {message}")]
    Network { message: String },

    /// The tenant answered with something we could not decode
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl AccountError {
    /// Structurally transient failures: the rate-limit/conflict class the
    /// retry executor is allowed to re-attempt. Everything else (validation
    /// rejections, auth, vault collisions, bridge failures) propagates
    /// immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            AccountError::ItemCreate {
                kind: CreateErrorKind::Transient,
                ..
            } => true,
            AccountError::ItemFetch { transient, .. } => *transient,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AccountError {
    fn from(err: reqwest::Error) -> Self {
        AccountError::Network {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AccountError {
    fn from(err: serde_json::Error) -> Self {
        AccountError::InvalidResponse {
            message: err.to_string(),
        }
    }
}

/// Result type for tenant account operations
pub type AccountResult<T> = Result<T, AccountError>;
