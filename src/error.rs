use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::transport::Transport;

/// Which client call a transport fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Open,
    Send,
    Receive,
    Complete,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportOp::Open => "open",
            TransportOp::Send => "send",
            TransportOp::Receive => "receive",
            TransportOp::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Terminal fault of a single round-trip scenario.
///
/// Every variant aborts the owning scenario only; the execution gate keeps
/// faults from leaking into other scenarios. Cleanup faults never mask a
/// fault the body already raised; if teardown fails with no prior fault,
/// the `Cleanup` variant becomes the scenario's fault.
#[derive(Debug, Error)]
pub enum RoundTripError {
    #[error("provisioning failure for device '{device_id}': {cause:#}")]
    Provisioning {
        device_id: String,
        cause: anyhow::Error,
    },

    #[error("transport {op} failure over {transport}: {cause:#}")]
    TransportFailure {
        op: TransportOp,
        transport: Transport,
        cause: anyhow::Error,
    },

    /// A message arrived but its payload or property did not match what was
    /// sent. Raised immediately; a wrong message is never a reason to keep
    /// polling.
    #[error("validation mismatch: {reason}")]
    ValidationMismatch { reason: String },

    #[error(
        "no matching message observed within {window:?} ({attempts} poll attempts)"
    )]
    DeliveryTimeout { window: Duration, attempts: u32 },

    #[error("cleanup failure: {reason}")]
    Cleanup { reason: String },
}
