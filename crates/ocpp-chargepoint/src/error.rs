//! Error types of the charge point runtime

use ocpp_types::OcppError;
use thiserror::Error;

/// Charge point runtime errors
#[derive(Error, Debug, Clone)]
pub enum ChargePointError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol violation in an inbound frame
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Message encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persistent store failure; never silently dropped
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Referenced connector does not exist
    #[error("Unknown connector: {0}")]
    UnknownConnector(u32),

    /// No active transaction where one is required
    #[error("No active transaction on connector {0}")]
    NoActiveTransaction(u32),

    /// Operation not valid in the current registration/connector state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The runtime is shutting down or already stopped
    #[error("Charge point is stopped")]
    Stopped,

    /// Timeout waiting for a response or local condition
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Feature not supported by this charge point
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChargePointError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors the caller may retry after reconnect or back-off
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Stopped
        )
    }
}

impl From<OcppError> for ChargePointError {
    fn from(err: OcppError) -> Self {
        match err {
            OcppError::Json { message } => Self::Serialization(message),
            OcppError::FormationViolation { message } => Self::ProtocolViolation(message),
            OcppError::ProtocolViolation { message } => Self::ProtocolViolation(message),
            OcppError::Transport { message } => Self::Transport(message),
            OcppError::Timeout { operation } => Self::Timeout(operation),
            OcppError::Store { message } => Self::Store(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChargePointError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for charge point operations
pub type ChargePointResult<T> = Result<T, ChargePointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ChargePointError::UnknownConnector(5);
        assert_eq!(error.to_string(), "Unknown connector: 5");

        let error = ChargePointError::transport("socket closed");
        assert_eq!(error.to_string(), "Transport error: socket closed");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ChargePointError::transport("x").is_recoverable());
        assert!(ChargePointError::Timeout("Authorize".into()).is_recoverable());
        assert!(!ChargePointError::UnknownConnector(1).is_recoverable());
        assert!(!ChargePointError::protocol_violation("x").is_recoverable());
    }

    #[test]
    fn test_from_ocpp_error() {
        let err: ChargePointError = OcppError::FormationViolation {
            message: "bad frame".into(),
        }
        .into();
        assert!(matches!(err, ChargePointError::ProtocolViolation(_)));
    }
}
