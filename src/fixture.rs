use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{OnceCell, Semaphore, SemaphorePermit};
use tracing::{info, warn};

use crate::clients::DeviceRegistry;
use crate::config::HubConfig;

/// Serializes scenario bodies against shared fixture state.
///
/// The backend registry and per-scenario provisioning are not safe for
/// concurrent mutation in this design, so at most one scenario body runs at
/// a time even when the outer test runner schedules tests concurrently.
/// This is a deliberate throughput/safety trade-off; do not replace it with
/// fine-grained locking without revisiting the shared-fixture assumption.
pub struct ExecutionGate {
    permits: Semaphore,
}

/// Held for the duration of one scenario body; dropping it releases the
/// single permit.
pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl ExecutionGate {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
        }
    }

    pub async fn acquire(&self) -> GatePermit<'_> {
        let permit = self
            .permits
            .acquire()
            .await
            .expect("execution gate semaphore is never closed");
        GatePermit { _permit: permit }
    }
}

impl Default for ExecutionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Suite-scoped shared state: hub configuration, the registry handle, and
/// the execution gate. Read-only after initialization; shared by every
/// scenario in the suite.
pub struct TestFixture {
    config: HubConfig,
    registry: Arc<dyn DeviceRegistry>,
    gate: ExecutionGate,
}

static GLOBAL_FIXTURE: OnceCell<TestFixture> = OnceCell::const_new();

impl TestFixture {
    pub fn initialize(config: HubConfig, registry: Arc<dyn DeviceRegistry>) -> Result<Self> {
        config.validate().context("fixture initialization failed")?;
        info!(host_name = %config.host_name, "test fixture initialized");
        Ok(Self {
            config,
            registry,
            gate: ExecutionGate::new(),
        })
    }

    /// Installs the process-wide fixture. Called once before any scenario;
    /// a failure here is fatal to the whole suite, and a second call is an
    /// error.
    pub fn install(
        config: HubConfig,
        registry: Arc<dyn DeviceRegistry>,
    ) -> Result<&'static TestFixture> {
        let fixture = Self::initialize(config, registry)?;
        GLOBAL_FIXTURE
            .set(fixture)
            .map_err(|_| anyhow!("test fixture is already installed"))?;
        GLOBAL_FIXTURE
            .get()
            .ok_or_else(|| anyhow!("test fixture missing after installation"))
    }

    pub fn global() -> Option<&'static TestFixture> {
        GLOBAL_FIXTURE.get()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &dyn DeviceRegistry {
        self.registry.as_ref()
    }

    pub fn gate(&self) -> &ExecutionGate {
        &self.gate
    }

    /// Releases backend registry resources. Called once after all
    /// scenarios; a failure is reported but there is nothing left to mask.
    pub async fn teardown(&self) -> Result<()> {
        if let Err(err) = self.registry.close().await {
            warn!(error = %format!("{err:#}"), "registry close failed during teardown");
            return Err(err);
        }
        info!("test fixture torn down");
        Ok(())
    }
}
