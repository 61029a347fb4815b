use std::fmt;

use thiserror::Error;

/// A single desired-state precondition failure.
///
/// Validation never produces partial state: a spec either passes as a
/// whole or the caller gets every violation at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum StratusError {
    /// Desired state violates a precondition. Raised before any network
    /// call is attempted.
    #[error("validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    /// Network/auth/provider-side failure during a read or write. Carries
    /// the operation, the resource identity, and the provider's message
    /// verbatim. "Not found" is never reported this way — absence is an
    /// `Option`, not an error.
    #[error("{operation} failed for {resource}: {message}")]
    Transport {
        operation: String,
        resource: String,
        message: String,
    },

    /// Token acquisition failure (managed identity and service principal
    /// both unavailable or rejected).
    #[error("credential error: {0}")]
    Credentials(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StratusError {
    /// Transport failure with resource identity attached.
    pub fn transport(
        operation: impl Into<String>,
        resource: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            operation: operation.into(),
            resource: resource.to_string(),
            message: message.into(),
        }
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Walk the full error chain and join all causes into one string.
///
/// HTTP client errors often have terse `Display` impls but useful detail
/// in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_joins_all_errors() {
        let err = StratusError::Validation(vec![
            ValidationError::new("target", "required when state is present"),
            ValidationError::new("profiles", "must not be empty"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("target: required when state is present"));
        assert!(msg.contains("profiles: must not be empty"));
    }

    #[test]
    fn transport_carries_operation_and_resource() {
        let err = StratusError::transport("get", "rg/foobar", "403 Forbidden");
        assert_eq!(err.to_string(), "get failed for rg/foobar: 403 Forbidden");
    }
}
