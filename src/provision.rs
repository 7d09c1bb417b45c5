use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{CertificateProvider, ConnectionInfo, DeviceRegistry};
use crate::error::RoundTripError;

/// A device identity registered for exactly one scenario. Never outlives
/// the scenario that created it; the driver removes it on every exit path.
#[derive(Debug, Clone)]
pub struct ProvisionedDevice {
    pub device_id: String,
    pub connection: ConnectionInfo,
}

/// Generates a fresh device id: prefix, a random component, and a UUID.
/// Collisions across runs and parallel suites are negligible.
pub fn unique_device_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    format!("{}-{}-{}", prefix, rng.gen::<u32>(), Uuid::new_v4())
}

/// Registers an X.509-authenticated device identity and returns enough
/// information for a client to connect to it.
pub async fn create_device(
    prefix: &str,
    registry: &dyn DeviceRegistry,
    certificates: &dyn CertificateProvider,
) -> Result<ProvisionedDevice, RoundTripError> {
    let device_id = unique_device_id(prefix);

    let certificate = certificates.certificate_with_private_key().map_err(|cause| {
        RoundTripError::Provisioning {
            device_id: device_id.clone(),
            cause,
        }
    })?;

    let connection = registry
        .create_device(&device_id, &certificate)
        .await
        .map_err(|cause| RoundTripError::Provisioning {
            device_id: device_id.clone(),
            cause,
        })?;

    info!(device_id = %device_id, "provisioned device identity");
    Ok(ProvisionedDevice {
        device_id,
        connection,
    })
}

/// Deletes a provisioned identity. Invoked exactly once per created device,
/// on every exit path; the caller decides whether a failure here surfaces
/// as the scenario fault or is only reported.
pub async fn remove_device(
    device_id: &str,
    registry: &dyn DeviceRegistry,
) -> Result<(), RoundTripError> {
    match registry.delete_device(device_id).await {
        Ok(()) => {
            info!(device_id = %device_id, "removed device identity");
            Ok(())
        }
        Err(cause) => {
            warn!(device_id = %device_id, error = %format!("{cause:#}"), "device removal failed");
            Err(RoundTripError::Cleanup {
                reason: format!("failed to delete device '{device_id}': {cause:#}"),
            })
        }
    }
}
