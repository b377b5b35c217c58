use std::collections::HashMap;

use common::TransactionId;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Attribute carrying the saga id on every message, for correlated tracing
/// and subscription-side filtering.
pub const ATTR_TRANSACTION_ID: &str = "transaction_id";

/// A message as it travels on the bus: an opaque binary payload (the
/// JSON-serialized command or event envelope) plus string attributes.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

impl BusMessage {
    /// Encodes a payload as JSON and stamps the `transaction_id` attribute.
    pub fn encode<T: Serialize>(payload: &T, transaction_id: TransactionId) -> Result<Self> {
        let data = serde_json::to_vec(payload)?;
        let mut attributes = HashMap::new();
        attributes.insert(ATTR_TRANSACTION_ID.to_string(), transaction_id.to_string());
        Ok(Self { data, attributes })
    }

    /// Decodes the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Returns the `transaction_id` attribute, if present.
    pub fn transaction_id(&self) -> Option<&str> {
        self.attributes.get(ATTR_TRANSACTION_ID).map(String::as_str)
    }

    /// Returns the payload as lossy UTF-8, for logging rejected messages.
    pub fn data_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn encode_stamps_transaction_attribute() {
        let txn = TransactionId::new();
        let msg = BusMessage::encode(&Payload { value: 7 }, txn).unwrap();
        assert_eq!(msg.transaction_id(), Some(txn.to_string().as_str()));
    }

    #[test]
    fn decode_roundtrip() {
        let txn = TransactionId::new();
        let msg = BusMessage::encode(&Payload { value: 7 }, txn).unwrap();
        let back: Payload = msg.decode().unwrap();
        assert_eq!(back, Payload { value: 7 });
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        let msg = BusMessage {
            data: b"not json".to_vec(),
            attributes: HashMap::new(),
        };
        assert!(msg.decode::<Payload>().is_err());
    }
}
