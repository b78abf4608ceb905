//! Message envelope types and OCPP-J array framing
//!
//! On the wire every message is a JSON array: `[2, "<uniqueId>", "<Action>",
//! {payload}]` for a CALL, `[3, "<uniqueId>", {payload}]` for a CALLRESULT
//! and `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {details}]`
//! for a CALLERROR.

use crate::{CallErrorCode, MessageTypeId, OcppError, OcppResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// OCPP message envelope that wraps all three frame kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Call message (request)
    Call(CallMessage),
    /// CallResult message (successful response)
    CallResult(CallResultMessage),
    /// CallError message (error response)
    CallError(CallErrorMessage),
}

impl Message {
    pub fn message_type_id(&self) -> MessageTypeId {
        match self {
            Message::Call(_) => MessageTypeId::Call,
            Message::CallResult(_) => MessageTypeId::CallResult,
            Message::CallError(_) => MessageTypeId::CallError,
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Message::Call(msg) => &msg.unique_id,
            Message::CallResult(msg) => &msg.unique_id,
            Message::CallError(msg) => &msg.unique_id,
        }
    }

    /// Encode to the OCPP-J array frame
    pub fn to_frame(&self) -> OcppResult<String> {
        let value = match self {
            Message::Call(msg) => json!([2, msg.unique_id, msg.action, msg.payload]),
            Message::CallResult(msg) => json!([3, msg.unique_id, msg.payload]),
            Message::CallError(msg) => json!([
                4,
                msg.unique_id,
                msg.error_code.as_str(),
                msg.error_description,
                msg.error_details
            ]),
        };
        Ok(serde_json::to_string(&value)?)
    }

    /// Decode an OCPP-J array frame
    pub fn from_frame(frame: &str) -> OcppResult<Message> {
        let value: Value = serde_json::from_str(frame)?;
        let elements = value
            .as_array()
            .ok_or_else(|| formation("message is not a JSON array"))?;

        let type_id = elements
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| formation("missing message type id"))?;
        let type_id = MessageTypeId::try_from(type_id as u8)?;

        let unique_id = elements
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| formation("missing unique id"))?
            .to_string();

        match type_id {
            MessageTypeId::Call => {
                if elements.len() != 4 {
                    return Err(formation("CALL frame must have 4 elements"));
                }
                let action = elements[2]
                    .as_str()
                    .ok_or_else(|| formation("action must be a string"))?
                    .to_string();
                Ok(Message::Call(CallMessage {
                    unique_id,
                    action,
                    payload: elements[3].clone(),
                }))
            }
            MessageTypeId::CallResult => {
                if elements.len() != 3 {
                    return Err(formation("CALLRESULT frame must have 3 elements"));
                }
                Ok(Message::CallResult(CallResultMessage {
                    unique_id,
                    payload: elements[2].clone(),
                }))
            }
            MessageTypeId::CallError => {
                if elements.len() != 5 {
                    return Err(formation("CALLERROR frame must have 5 elements"));
                }
                let error_code = elements[2]
                    .as_str()
                    .map(CallErrorCode::from_str_lossy)
                    .ok_or_else(|| formation("error code must be a string"))?;
                let error_description = elements[3]
                    .as_str()
                    .ok_or_else(|| formation("error description must be a string"))?
                    .to_string();
                Ok(Message::CallError(CallErrorMessage {
                    unique_id,
                    error_code,
                    error_description,
                    error_details: elements[4].clone(),
                }))
            }
        }
    }
}

fn formation(message: &str) -> OcppError {
    OcppError::FormationViolation {
        message: message.to_string(),
    }
}

/// OCPP Call message (request)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMessage {
    /// Unique message identifier (UUID v4 text)
    pub unique_id: String,
    /// Action name (e.g. "Authorize", "StartTransaction")
    pub action: String,
    /// Message payload
    pub payload: Value,
}

impl CallMessage {
    /// Create a new Call message with a fresh unique id
    pub fn new<T>(action: &str, payload: T) -> OcppResult<Self>
    where
        T: Serialize,
    {
        Ok(CallMessage {
            unique_id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Create a Call message with a caller-chosen unique id
    pub fn with_id<T>(unique_id: String, action: &str, payload: T) -> OcppResult<Self>
    where
        T: Serialize,
    {
        Ok(CallMessage {
            unique_id,
            action: action.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Extract the payload as a specific type
    pub fn payload_as<T>(&self) -> OcppResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// OCPP CallResult message (successful response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResultMessage {
    /// Unique message identifier (same as corresponding Call)
    pub unique_id: String,
    /// Response payload
    pub payload: Value,
}

impl CallResultMessage {
    pub fn new<T>(unique_id: String, payload: T) -> OcppResult<Self>
    where
        T: Serialize,
    {
        Ok(CallResultMessage {
            unique_id,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Extract the payload as a specific type
    pub fn payload_as<T>(&self) -> OcppResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// OCPP CallError message (error response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallErrorMessage {
    /// Unique message identifier (same as corresponding Call)
    pub unique_id: String,
    /// Error code
    pub error_code: CallErrorCode,
    /// Human-readable error description
    pub error_description: String,
    /// Additional error details
    pub error_details: Value,
}

impl CallErrorMessage {
    pub fn new(
        unique_id: String,
        error_code: CallErrorCode,
        error_description: String,
        error_details: Option<Value>,
    ) -> Self {
        CallErrorMessage {
            unique_id,
            error_code,
            error_description,
            error_details: error_details.unwrap_or_else(|| json!({})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_frame_roundtrip() {
        let call = CallMessage::new("Authorize", json!({"idTag": "ABC123"})).unwrap();
        let message = Message::Call(call.clone());

        let frame = message.to_frame().unwrap();
        assert!(frame.starts_with("[2,"));

        let decoded = Message::from_frame(&frame).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.unique_id(), call.unique_id);
        assert_eq!(decoded.message_type_id(), MessageTypeId::Call);
    }

    #[test]
    fn test_call_result_frame_roundtrip() {
        let result =
            CallResultMessage::new("id-1".to_string(), json!({"status": "Accepted"})).unwrap();
        let message = Message::CallResult(result);

        let frame = message.to_frame().unwrap();
        assert!(frame.starts_with("[3,"));

        let decoded = Message::from_frame(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_call_error_frame_roundtrip() {
        let error = CallErrorMessage::new(
            "id-2".to_string(),
            CallErrorCode::NotSupported,
            "Action not supported".to_string(),
            None,
        );
        let message = Message::CallError(error);

        let frame = message.to_frame().unwrap();
        assert!(frame.starts_with("[4,"));

        let decoded = Message::from_frame(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_from_frame_rejects_malformed() {
        assert!(Message::from_frame("{}").is_err());
        assert!(Message::from_frame("[5,\"id\",{}]").is_err());
        assert!(Message::from_frame("[2,\"id\",\"Action\"]").is_err());
        assert!(Message::from_frame("[3,\"id\"]").is_err());
        assert!(Message::from_frame("not json").is_err());
    }

    #[test]
    fn test_unknown_error_code_maps_to_generic() {
        let frame = "[4,\"id\",\"SomethingNew\",\"desc\",{}]";
        let decoded = Message::from_frame(frame).unwrap();
        match decoded {
            Message::CallError(err) => assert_eq!(err.error_code, CallErrorCode::GenericError),
            _ => panic!("Expected CallError"),
        }
    }

    #[test]
    fn test_payload_extraction() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct TestPayload {
            #[serde(rename = "idTag")]
            id_tag: String,
        }

        let payload = TestPayload {
            id_tag: "TEST123".to_string(),
        };

        let msg = CallMessage::new("Authorize", &payload).unwrap();
        let extracted: TestPayload = msg.payload_as().unwrap();

        assert_eq!(extracted, payload);
    }
}
