//! End-to-end message round-trip verification for edge device messaging.
//!
//! Verifies that a single correlated message survives the full path from
//! compose → send → receive → validate → acknowledge across a matrix of
//! transport bindings, using a per-scenario X.509-authenticated device
//! identity that is provisioned before use and removed on every exit path.
//! Scenario bodies are serialized by an execution gate because they mutate
//! one shared backend registry.
//!
//! The protocol stacks, certificate generation, and registry backend stay
//! outside this crate, behind the traits in [`clients`].

pub mod clients;
pub mod config;
pub mod error;
pub mod fixture;
pub mod message;
pub mod provision;
pub mod scenario;
pub mod transport;
pub mod verify;

pub use clients::{
    CertificateHandle, CertificateProvider, ConnectionInfo, DeviceClient, DeviceRegistry,
    ServiceClient,
};
pub use config::HubConfig;
pub use error::{RoundTripError, TransportOp};
pub use fixture::{ExecutionGate, GatePermit, TestFixture};
pub use message::{
    compose_inbound, compose_outbound, ComposedMessage, TestMessage, CORRELATION_PROPERTY_KEY,
};
pub use provision::{create_device, remove_device, ProvisionedDevice};
pub use scenario::{ClientFactory, RoundTrip, ScenarioOutcome};
pub use transport::{
    exclusion_for, Direction, Exclusion, Transport, BLOCKING_POLL_WAIT, EXCLUDED_SCENARIOS,
};
pub use verify::{DeliveryVerifier, ExpectedMessage, ReceivedMessage, VerifierState};

/// Initializes `tracing` for test binaries. Safe to call from every test;
/// only the first call installs a subscriber.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .ok();
}
