use std::fmt;

use thiserror::Error;

use crate::services::client::AccountError;

/// Which side of the migration an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantRole {
    Source,
    Destination,
}

impl fmt::Display for TenantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantRole::Source => write!(f, "source"),
            TenantRole::Destination => write!(f, "destination"),
        }
    }
}

/// Errors that abort a whole run before or outside per-vault processing.
///
/// Everything item- or vault-scoped is data in the run summary, never an
/// `Err`; this enum is only for the failures nothing can continue past.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{role} tenant authentication failed: {message}")]
    Authentication { role: TenantRole, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{role} tenant error: {message}")]
    Account { role: TenantRole, message: String },
}

impl RunError {
    /// Wrap an account error with the tenant role it came from.
    pub fn from_account(role: TenantRole, error: AccountError) -> Self {
        match error {
            AccountError::Auth { message } => RunError::Authentication { role, message },
            other => RunError::Account {
                role,
                message: other.to_string(),
            },
        }
    }

    /// Fold config validation findings into one error.
    pub fn invalid_config(errors: Vec<String>) -> Self {
        RunError::Configuration {
            message: errors.join("; "),
        }
    }
}

pub type RunResult<T> = Result<T, RunError>;
