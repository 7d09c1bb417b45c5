use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::clients::DeviceClient;
use crate::error::{RoundTripError, TransportOp};
use crate::message::{ComposedMessage, TestMessage, CORRELATION_PROPERTY_KEY};
use crate::transport::Transport;

/// What the verifier demands of the one message it accepts.
#[derive(Debug, Clone)]
pub struct ExpectedMessage {
    pub payload: String,
    pub property_key: String,
    pub property_value: String,
}

impl ExpectedMessage {
    pub fn of(composed: &ComposedMessage) -> Self {
        Self {
            payload: composed.payload.clone(),
            property_key: CORRELATION_PROPERTY_KEY.to_string(),
            property_value: composed.property_value.clone(),
        }
    }
}

/// Payload and properties of the matched message, as observed on the wire.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub payload: Vec<u8>,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierState {
    Idle,
    Polling,
    Matched,
    TimedOut,
}

/// Bounded-time polling loop that receives, validates, and acknowledges
/// exactly one message. One instance per scenario.
///
/// The loop runs until a message arrives or the wall-clock window closes.
/// The first non-empty receive wins: its payload and single property are
/// validated against [`ExpectedMessage`], a mismatch is an immediate
/// [`RoundTripError::ValidationMismatch`] (a wrong message is a hard
/// failure, not a reason to keep waiting), and a match is completed exactly
/// once before the loop stops. The per-attempt wait comes from the
/// transport's capability flag: blocking-capable bindings wait up to
/// [`crate::transport::BLOCKING_POLL_WAIT`] per attempt, the polling-only
/// binding issues immediate non-blocking polls.
pub struct DeliveryVerifier {
    transport: Transport,
    expected: ExpectedMessage,
    window: Duration,
    state: VerifierState,
    attempts: u32,
}

impl DeliveryVerifier {
    pub fn new(transport: Transport, expected: ExpectedMessage, window: Duration) -> Self {
        Self {
            transport,
            expected,
            window,
            state: VerifierState::Idle,
            attempts: 0,
        }
    }

    pub fn state(&self) -> VerifierState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub async fn verify(
        &mut self,
        client: &mut (dyn DeviceClient + '_),
    ) -> Result<ReceivedMessage, RoundTripError> {
        self.state = VerifierState::Polling;
        let started = Instant::now();
        let wait = self.transport.poll_wait();

        loop {
            if started.elapsed() >= self.window {
                self.state = VerifierState::TimedOut;
                return Err(RoundTripError::DeliveryTimeout {
                    window: self.window,
                    attempts: self.attempts,
                });
            }

            self.attempts += 1;
            let received = client.receive(wait).await.map_err(|cause| {
                RoundTripError::TransportFailure {
                    op: TransportOp::Receive,
                    transport: self.transport,
                    cause,
                }
            })?;

            let Some(message) = received else {
                debug!(
                    transport = %self.transport,
                    attempt = self.attempts,
                    "poll attempt returned no message"
                );
                continue;
            };

            self.validate(&message)?;

            client.complete(&message).await.map_err(|cause| {
                RoundTripError::TransportFailure {
                    op: TransportOp::Complete,
                    transport: self.transport,
                    cause,
                }
            })?;

            self.state = VerifierState::Matched;
            info!(
                transport = %self.transport,
                attempts = self.attempts,
                "message matched and acknowledged"
            );
            return Ok(ReceivedMessage {
                payload: message.payload,
                properties: message.properties,
            });
        }
    }

    fn validate(&self, message: &TestMessage) -> Result<(), RoundTripError> {
        if message.payload != self.expected.payload.as_bytes() {
            return Err(RoundTripError::ValidationMismatch {
                reason: format!(
                    "payload mismatch: expected '{}', received '{}'",
                    self.expected.payload,
                    String::from_utf8_lossy(&message.payload)
                ),
            });
        }

        if message.properties.len() != 1 {
            return Err(RoundTripError::ValidationMismatch {
                reason: format!(
                    "expected exactly 1 property, received {}",
                    message.properties.len()
                ),
            });
        }

        match message.properties.get(&self.expected.property_key) {
            Some(value) if *value == self.expected.property_value => Ok(()),
            Some(value) => Err(RoundTripError::ValidationMismatch {
                reason: format!(
                    "property '{}' mismatch: expected '{}', received '{}'",
                    self.expected.property_key, self.expected.property_value, value
                ),
            }),
            None => Err(RoundTripError::ValidationMismatch {
                reason: format!("property '{}' missing", self.expected.property_key),
            }),
        }
    }
}
