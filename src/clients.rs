use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::message::TestMessage;

/// X.509 credential handle as handed out by the certificate provider.
/// The private key stays inside the provider; the registry only needs
/// the public thumbprint to bind the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateHandle {
    pub thumbprint: String,
}

/// Everything a client needs to reach a provisioned device identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host_name: String,
    pub device_id: String,
}

/// Backend device registry. Create/delete are remote, fallible calls;
/// `device_exists` backs the post-teardown cleanup checks.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn create_device(
        &self,
        device_id: &str,
        certificate: &CertificateHandle,
    ) -> Result<ConnectionInfo>;

    async fn delete_device(&self, device_id: &str) -> Result<()>;

    async fn device_exists(&self, device_id: &str) -> Result<bool>;

    /// Releases registry resources. Called once at suite teardown.
    async fn close(&self) -> Result<()>;
}

/// Device-side messaging client over one transport binding.
///
/// `receive` takes an optional per-attempt wait: `Some(d)` blocks up to `d`
/// for a message, `None` is a single non-blocking poll. Transports that
/// cannot block (HTTP polling) are only ever called with `None`.
#[async_trait]
pub trait DeviceClient: Send {
    async fn open(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    async fn receive(&mut self, wait: Option<Duration>) -> Result<Option<TestMessage>>;

    /// Acknowledges (completes) a received message so the backend stops
    /// redelivering it.
    async fn complete(&mut self, message: &TestMessage) -> Result<()>;

    /// Device-to-cloud send. Only the outbound direction uses this.
    async fn send(&mut self, message: &TestMessage) -> Result<()>;
}

/// Service-side messaging client, used to send cloud-to-device messages.
#[async_trait]
pub trait ServiceClient: Send {
    async fn open(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    async fn send(&mut self, device_id: &str, message: &TestMessage) -> Result<()>;
}

/// Supplies the X.509 credential used for device identities. Certificate
/// generation and storage live outside this crate.
pub trait CertificateProvider: Send + Sync {
    fn certificate_with_private_key(&self) -> Result<CertificateHandle>;
}
