//! # OCPP Types
//!
//! Foundational types for the OCPP 1.6J charge point runtime: message
//! envelopes and wire framing, identifiers, shared domain types and the
//! error model.

pub mod common;
pub mod error;
pub mod message;
pub mod v16j;

pub use error::*;
pub use message::*;

/// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;

/// Message type identifier, the first element of every OCPP-J frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageTypeId {
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

impl TryFrom<u8> for MessageTypeId {
    type Error = OcppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(MessageTypeId::Call),
            3 => Ok(MessageTypeId::CallResult),
            4 => Ok(MessageTypeId::CallError),
            _ => Err(OcppError::InvalidMessageTypeId(value)),
        }
    }
}

impl From<MessageTypeId> for u8 {
    fn from(id: MessageTypeId) -> Self {
        id as u8
    }
}

/// Authorization token presented by the driver (RFID UID, app token, ...)
pub type IdToken = String;

/// Connector identifier. Connector 0 addresses the charge point as a whole,
/// connectors 1..N are physical outlets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectorId(pub u32);

impl ConnectorId {
    /// The whole charge point (used by ChangeAvailability, ChargePointMaxProfile)
    pub const CHARGE_POINT: ConnectorId = ConnectorId(0);

    pub fn new(id: u32) -> Self {
        ConnectorId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// True for connectors 1..N, false for the charge point itself
    pub fn is_outlet(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier assigned by the Central System.
///
/// Until the StartTransactionResponse arrives the local transaction carries
/// [`TransactionId::UNASSIGNED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i32);

impl TransactionId {
    /// Sentinel used before the Central System has assigned an id
    pub const UNASSIGNED: TransactionId = TransactionId(-1);

    pub fn new(id: i32) -> Self {
        TransactionId(id)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0 != Self::UNASSIGNED.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_id_conversion() {
        assert_eq!(MessageTypeId::try_from(2).unwrap(), MessageTypeId::Call);
        assert_eq!(
            MessageTypeId::try_from(3).unwrap(),
            MessageTypeId::CallResult
        );
        assert_eq!(MessageTypeId::try_from(4).unwrap(), MessageTypeId::CallError);
        assert!(MessageTypeId::try_from(1).is_err());
        assert!(MessageTypeId::try_from(5).is_err());

        assert_eq!(u8::from(MessageTypeId::Call), 2);
        assert_eq!(u8::from(MessageTypeId::CallResult), 3);
        assert_eq!(u8::from(MessageTypeId::CallError), 4);
    }

    #[test]
    fn test_connector_id() {
        let connector = ConnectorId::new(1);
        assert_eq!(connector.value(), 1);
        assert!(connector.is_outlet());
        assert_eq!(connector.to_string(), "1");

        assert!(!ConnectorId::CHARGE_POINT.is_outlet());
        assert_eq!(ConnectorId::CHARGE_POINT.value(), 0);
    }

    #[test]
    fn test_transaction_id() {
        let tx_id = TransactionId::new(12345);
        assert_eq!(tx_id.value(), 12345);
        assert!(tx_id.is_assigned());

        assert!(!TransactionId::UNASSIGNED.is_assigned());
        assert_eq!(TransactionId::UNASSIGNED.value(), -1);
    }
}
