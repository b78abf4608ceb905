//! Error types for OCPP operations

use thiserror::Error;

/// Main error type for OCPP operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcppError {
    /// Invalid message type identifier
    #[error("Invalid message type id: {0}")]
    InvalidMessageTypeId(u8),

    /// JSON serialization/deserialization error
    #[error("JSON error: {message}")]
    Json { message: String },

    /// Frame did not match the OCPP-J array layout
    #[error("Formation violation: {message}")]
    FormationViolation { message: String },

    /// Protocol violation
    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// Message validation error
    #[error("Message validation error: {message}")]
    ValidationError { message: String },

    /// Transport error
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Timeout error
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Feature not supported
    #[error("Feature not supported: {feature}")]
    NotSupported { feature: String },

    /// Resource not found
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Invalid state for operation
    #[error("Invalid state for operation: {operation}, current state: {state}")]
    InvalidState { operation: String, state: String },

    /// Persistent store error
    #[error("Store error: {message}")]
    Store { message: String },
}

impl From<serde_json::Error> for OcppError {
    fn from(err: serde_json::Error) -> Self {
        OcppError::Json {
            message: err.to_string(),
        }
    }
}

/// OCPP Call Error codes as defined in the specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CallErrorCode {
    /// Requested Action is not known by receiver
    NotImplemented,

    /// Requested Action is recognized but not supported by the receiver
    NotSupported,

    /// An internal error occurred and the receiver was not able to process the requested Action
    InternalError,

    /// Payload for Action is incomplete
    ProtocolError,

    /// During processing of Action a security issue occurred
    SecurityError,

    /// Payload for Action is syntactically incorrect or does not conform to the PDU structure
    FormationViolation,

    /// Payload is syntactically correct but at least one field contains an invalid value
    PropertyConstraintViolation,

    /// Payload violates occurrence constraints
    OccurrenceConstraintViolation,

    /// Payload violates data type constraints
    TypeConstraintViolation,

    /// Any other error
    GenericError,
}

impl CallErrorCode {
    /// Wire representation as defined in OCPP-J
    pub fn as_str(&self) -> &'static str {
        match self {
            CallErrorCode::NotImplemented => "NotImplemented",
            CallErrorCode::NotSupported => "NotSupported",
            CallErrorCode::InternalError => "InternalError",
            CallErrorCode::ProtocolError => "ProtocolError",
            CallErrorCode::SecurityError => "SecurityError",
            CallErrorCode::FormationViolation => "FormationViolation",
            CallErrorCode::PropertyConstraintViolation => "PropertyConstraintViolation",
            CallErrorCode::OccurrenceConstraintViolation => "OccurrenceConstraintViolation",
            CallErrorCode::TypeConstraintViolation => "TypeConstraintViolation",
            CallErrorCode::GenericError => "GenericError",
        }
    }

    pub fn from_str_lossy(s: &str) -> CallErrorCode {
        match s {
            "NotImplemented" => CallErrorCode::NotImplemented,
            "NotSupported" => CallErrorCode::NotSupported,
            "InternalError" => CallErrorCode::InternalError,
            "ProtocolError" => CallErrorCode::ProtocolError,
            "SecurityError" => CallErrorCode::SecurityError,
            "FormationViolation" => CallErrorCode::FormationViolation,
            "PropertyConstraintViolation" => CallErrorCode::PropertyConstraintViolation,
            "OccurrenceConstraintViolation" => CallErrorCode::OccurrenceConstraintViolation,
            "TypeConstraintViolation" => CallErrorCode::TypeConstraintViolation,
            _ => CallErrorCode::GenericError,
        }
    }
}

impl std::fmt::Display for CallErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type alias for OCPP operations
pub type OcppResult<T> = Result<T, OcppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_code_wire_roundtrip() {
        for code in [
            CallErrorCode::NotImplemented,
            CallErrorCode::NotSupported,
            CallErrorCode::InternalError,
            CallErrorCode::ProtocolError,
            CallErrorCode::SecurityError,
            CallErrorCode::FormationViolation,
            CallErrorCode::PropertyConstraintViolation,
            CallErrorCode::OccurrenceConstraintViolation,
            CallErrorCode::TypeConstraintViolation,
            CallErrorCode::GenericError,
        ] {
            assert_eq!(CallErrorCode::from_str_lossy(code.as_str()), code);
        }
    }

    #[test]
    fn test_call_error_code_serialization() {
        let error = CallErrorCode::NotImplemented;
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, "\"NotImplemented\"");

        let deserialized: CallErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, CallErrorCode::NotImplemented);
    }

    #[test]
    fn test_ocpp_error_from_serde_json() {
        let json_error = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let ocpp_error = OcppError::from(json_error);

        match ocpp_error {
            OcppError::Json { message } => assert!(!message.is_empty()),
            _ => panic!("Expected Json error"),
        }
    }

    #[test]
    fn test_ocpp_error_display() {
        let error = OcppError::InvalidMessageTypeId(7);
        assert_eq!(error.to_string(), "Invalid message type id: 7");

        let error = OcppError::Timeout {
            operation: "Authorize".to_string(),
        };
        assert_eq!(error.to_string(), "Operation timed out: Authorize");
    }
}
