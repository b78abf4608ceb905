//! Wire serialization helpers for OCPP-J frames
//!
//! The array framing itself lives in `ocpp_types::message`; this module adds
//! the typed layer used by the runtime: building frames from actions and
//! decoding inbound frames with a size guard.

use crate::{utils, OcppAction, OcppResponse};
use ocpp_types::{Message, OcppError, OcppResult};

/// Maximum accepted frame size in bytes
pub const MAX_FRAME_SIZE: usize = 65_536;

/// Encode a request as a CALL frame, returning the frame and its unique id
pub fn encode_call<T: OcppAction>(action: &T) -> OcppResult<(String, String)> {
    let call = utils::create_call(action)?;
    let unique_id = call.unique_id.clone();
    let frame = Message::Call(call).to_frame()?;
    check_size(&frame)?;
    Ok((frame, unique_id))
}

/// Encode a response as a CALLRESULT frame for the given unique id
pub fn encode_call_result<T: OcppResponse>(unique_id: String, response: &T) -> OcppResult<String> {
    let result = utils::create_call_result(unique_id, response)?;
    let frame = Message::CallResult(result).to_frame()?;
    check_size(&frame)?;
    Ok(frame)
}

/// Decode an inbound frame into a message envelope
pub fn decode_frame(frame: &str) -> OcppResult<Message> {
    check_size(frame)?;
    Message::from_frame(frame)
}

fn check_size(frame: &str) -> OcppResult<()> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(OcppError::ValidationError {
            message: format!(
                "Frame size {} exceeds maximum of {} bytes",
                frame.len(),
                MAX_FRAME_SIZE
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v16j::{AuthorizeRequest, AuthorizeResponse, HeartbeatRequest};
    use ocpp_types::common::IdTagInfo;

    #[test]
    fn test_encode_decode_call() {
        let request = AuthorizeRequest {
            id_tag: "DRIVER1".to_string(),
        };
        let (frame, unique_id) = encode_call(&request).unwrap();

        let decoded = decode_frame(&frame).unwrap();
        match decoded {
            Message::Call(call) => {
                assert_eq!(call.unique_id, unique_id);
                assert_eq!(call.action, "Authorize");
                let payload: AuthorizeRequest = call.payload_as().unwrap();
                assert_eq!(payload, request);
            }
            _ => panic!("Expected Call"),
        }
    }

    #[test]
    fn test_encode_call_result() {
        let response = AuthorizeResponse {
            id_tag_info: IdTagInfo::accepted(),
        };
        let frame = encode_call_result("req-1".to_string(), &response).unwrap();
        assert!(frame.starts_with("[3,\"req-1\""));
    }

    #[test]
    fn test_empty_payload_encodes_as_object() {
        let (frame, _) = encode_call(&HeartbeatRequest {}).unwrap();
        assert!(frame.ends_with("{}]"));
    }

    #[test]
    fn test_size_guard() {
        let oversized = format!("[2,\"id\",\"DataTransfer\",{{\"data\":\"{}\"}}]", "x".repeat(MAX_FRAME_SIZE));
        assert!(decode_frame(&oversized).is_err());
    }
}
