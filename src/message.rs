use std::collections::HashMap;

use uuid::Uuid;

/// Fixed key under which the correlation property travels.
pub const CORRELATION_PROPERTY_KEY: &str = "property1";

/// One test message. Immutable once composed; a fresh instance is built per
/// scenario, so payloads and correlation tokens never collide across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMessage {
    pub payload: Vec<u8>,
    /// Set only for the device-to-cloud direction.
    pub message_id: Option<String>,
    pub properties: HashMap<String, String>,
}

/// A composed message together with the raw tokens it was built from,
/// so the sender side can hand the verifier exactly what to expect.
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub message: TestMessage,
    pub payload: String,
    pub message_id: Option<String>,
    pub property_value: String,
}

fn compose(with_message_id: bool) -> ComposedMessage {
    let payload = Uuid::new_v4().to_string();
    let property_value = Uuid::new_v4().to_string();
    let message_id = with_message_id.then(|| Uuid::new_v4().to_string());

    let mut properties = HashMap::new();
    properties.insert(CORRELATION_PROPERTY_KEY.to_string(), property_value.clone());

    ComposedMessage {
        message: TestMessage {
            payload: payload.as_bytes().to_vec(),
            message_id: message_id.clone(),
            properties,
        },
        payload,
        message_id,
        property_value,
    }
}

/// Builds a cloud-to-device message: random payload plus one correlation
/// property, no message id.
pub fn compose_outbound() -> ComposedMessage {
    compose(false)
}

/// Builds a device-to-cloud message: random payload, a message id used as
/// the correlation identifier, and one correlation property.
pub fn compose_inbound() -> ComposedMessage {
    compose(true)
}
