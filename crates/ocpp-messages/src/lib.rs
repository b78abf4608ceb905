//! # OCPP Messages
//!
//! Message definitions and wire serialization for OCPP 1.6J, including the
//! Security Whitepaper extensions. Every request/response pair is a plain
//! serde struct bound together by the [`OcppAction`] trait.

pub mod serialization;
pub mod v16j;
pub mod validation;

pub use ocpp_types::{CallErrorMessage, CallMessage, CallResultMessage, Message, MessageTypeId};
use ocpp_types::{OcppError, OcppResult};

/// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;

/// Action trait binding an OCPP request to its response type
pub trait OcppAction: Serialize + for<'de> Deserialize<'de> + Send + Sync {
    /// The action name as defined in the OCPP specification
    const ACTION_NAME: &'static str;
    /// The corresponding response type
    type Response: OcppAction;

    /// Validate the message content against the OCPP field constraints
    fn validate(&self) -> OcppResult<()> {
        Ok(())
    }
}

/// Marker trait for OCPP response messages
pub trait OcppResponse: OcppAction {}

/// Utilities for working with OCPP messages
pub mod utils {
    use super::*;

    /// Generate a unique message id (UUID v4 text)
    pub fn generate_message_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Create a Call message from an action
    pub fn create_call<T: OcppAction>(action: &T) -> OcppResult<CallMessage> {
        action.validate()?;
        CallMessage::new(T::ACTION_NAME, action)
    }

    /// Create a Call message with a caller-chosen unique id
    pub fn create_call_with_id<T: OcppAction>(
        unique_id: String,
        action: &T,
    ) -> OcppResult<CallMessage> {
        action.validate()?;
        CallMessage::with_id(unique_id, T::ACTION_NAME, action)
    }

    /// Create a CallResult message from a response
    pub fn create_call_result<T: OcppResponse>(
        unique_id: String,
        response: &T,
    ) -> OcppResult<CallResultMessage> {
        CallResultMessage::new(unique_id, response)
    }

    /// Extract an action payload from a Call message, checking the action name
    pub fn extract_payload<T: OcppAction>(call: &CallMessage) -> OcppResult<T> {
        if call.action != T::ACTION_NAME {
            return Err(OcppError::ProtocolViolation {
                message: format!(
                    "Expected action '{}', got '{}'",
                    T::ACTION_NAME,
                    call.action
                ),
            });
        }
        call.payload_as()
    }

    /// Current timestamp in OCPP wire precision
    pub fn current_timestamp() -> DateTime<Utc> {
        Utc::now()
    }

    /// Parse an OCPP (RFC 3339) timestamp string
    pub fn parse_timestamp(timestamp_str: &str) -> OcppResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| OcppError::ValidationError {
                message: format!("Invalid timestamp format: {}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v16j::{AuthorizeRequest, HeartbeatRequest};

    #[test]
    fn test_generate_message_id() {
        let id1 = utils::generate_message_id();
        let id2 = utils::generate_message_id();

        assert_ne!(id1, id2);
        assert!(!id1.is_empty());
    }

    #[test]
    fn test_create_call() {
        let action = AuthorizeRequest {
            id_tag: "TAG42".to_string(),
        };

        let call = utils::create_call(&action).unwrap();

        assert_eq!(call.action, "Authorize");
        assert!(!call.unique_id.is_empty());

        let extracted: AuthorizeRequest = utils::extract_payload(&call).unwrap();
        assert_eq!(extracted, action);
    }

    #[test]
    fn test_extract_payload_wrong_action() {
        let call = utils::create_call(&HeartbeatRequest {}).unwrap();
        let result: OcppResult<AuthorizeRequest> = utils::extract_payload(&call);

        assert!(result.is_err());
        match result.unwrap_err() {
            OcppError::ProtocolViolation { message } => {
                assert!(message.contains("Expected action 'Authorize'"));
            }
            _ => panic!("Expected ProtocolViolation error"),
        }
    }

    #[test]
    fn test_timestamp_utilities() {
        let now = utils::current_timestamp();
        let formatted = now.to_rfc3339();
        let parsed = utils::parse_timestamp(&formatted).unwrap();

        let diff = (now.timestamp_millis() - parsed.timestamp_millis()).abs();
        assert!(diff < 1000);
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        assert!(utils::parse_timestamp("invalid-timestamp").is_err());
    }
}
