#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use edge_roundtrip::{
    CertificateHandle, CertificateProvider, ClientFactory, ConnectionInfo, DeviceClient,
    DeviceRegistry, HubConfig, ServiceClient, TestMessage, Transport,
};

pub const FAKE_HOST: &str = "fake-hub.local";

pub fn test_config() -> HubConfig {
    HubConfig {
        connection_string: format!(
            "HostName={FAKE_HOST};SharedAccessKeyName=owner;SharedAccessKey=fake"
        ),
        host_name: FAKE_HOST.to_string(),
        device_id_prefix: "e2e-device".to_string(),
        receive_window_secs: 5,
    }
}

/// In-memory stand-in for the backend device registry.
#[derive(Default)]
pub struct FakeRegistry {
    devices: Mutex<HashMap<String, CertificateHandle>>,
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    pub fail_delete: AtomicBool,
    pub closed: AtomicBool,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created_ids(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn live_device_count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceRegistry for FakeRegistry {
    async fn create_device(
        &self,
        device_id: &str,
        certificate: &CertificateHandle,
    ) -> Result<ConnectionInfo> {
        let mut devices = self.devices.lock().unwrap();
        if devices.contains_key(device_id) {
            return Err(anyhow!("device '{device_id}' already exists"));
        }
        devices.insert(device_id.to_string(), certificate.clone());
        self.created.lock().unwrap().push(device_id.to_string());
        Ok(ConnectionInfo {
            host_name: FAKE_HOST.to_string(),
            device_id: device_id.to_string(),
        })
    }

    async fn delete_device(&self, device_id: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(anyhow!("registry rejected delete of '{device_id}'"));
        }
        let removed = self.devices.lock().unwrap().remove(device_id);
        if removed.is_none() {
            return Err(anyhow!("device '{device_id}' not found"));
        }
        self.deleted.lock().unwrap().push(device_id.to_string());
        Ok(())
    }

    async fn device_exists(&self, device_id: &str) -> Result<bool> {
        Ok(self.devices.lock().unwrap().contains_key(device_id))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct StaticCerts;

impl CertificateProvider for StaticCerts {
    fn certificate_with_private_key(&self) -> Result<CertificateHandle> {
        Ok(CertificateHandle {
            thumbprint: "A1B2C3D4E5F60718293A4B5C6D7E8F9011223344".to_string(),
        })
    }
}

/// Message plumbing shared by the fake clients: one cloud-to-device queue
/// per device id, plus a log of device-to-cloud sends.
#[derive(Default)]
struct FakeHub {
    c2d: Mutex<HashMap<String, VecDeque<TestMessage>>>,
}

impl FakeHub {
    fn enqueue_c2d(&self, device_id: &str, message: TestMessage) {
        self.c2d
            .lock()
            .unwrap()
            .entry(device_id.to_string())
            .or_default()
            .push_back(message);
    }

    fn pop_c2d(&self, device_id: &str) -> Option<TestMessage> {
        self.c2d
            .lock()
            .unwrap()
            .get_mut(device_id)
            .and_then(VecDeque::pop_front)
    }
}

/// Fake client factory with fault-injection knobs and counters the tests
/// read back after a scenario completes.
#[derive(Default)]
pub struct FakeFactory {
    hub: Arc<FakeHub>,
    /// Swallow service-side sends so nothing ever arrives.
    pub drop_sends: AtomicBool,
    /// Deliver a corrupted payload instead of the composed one.
    pub corrupt_payload: AtomicBool,
    /// Fail the device client's `open`.
    pub fail_device_open: AtomicBool,
    pub completions: Arc<AtomicU32>,
    pub last_sent: Arc<Mutex<Option<TestMessage>>>,
    pub d2c_sent: Arc<Mutex<Vec<TestMessage>>>,
    active_clients: Arc<AtomicU32>,
    pub peak_clients: Arc<AtomicU32>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn device_client(
        &self,
        connection: &ConnectionInfo,
        _transport: Transport,
    ) -> Result<Box<dyn DeviceClient>> {
        Ok(Box::new(FakeDeviceClient {
            device_id: connection.device_id.clone(),
            hub: self.hub.clone(),
            open: false,
            fail_open: self.fail_device_open.load(Ordering::SeqCst),
            completions: self.completions.clone(),
            d2c_sent: self.d2c_sent.clone(),
            active_clients: self.active_clients.clone(),
            peak_clients: self.peak_clients.clone(),
        }))
    }

    async fn service_client(&self) -> Result<Box<dyn ServiceClient>> {
        Ok(Box::new(FakeServiceClient {
            hub: self.hub.clone(),
            open: false,
            drop_sends: self.drop_sends.load(Ordering::SeqCst),
            corrupt_payload: self.corrupt_payload.load(Ordering::SeqCst),
            last_sent: self.last_sent.clone(),
        }))
    }
}

struct FakeDeviceClient {
    device_id: String,
    hub: Arc<FakeHub>,
    open: bool,
    fail_open: bool,
    completions: Arc<AtomicU32>,
    d2c_sent: Arc<Mutex<Vec<TestMessage>>>,
    active_clients: Arc<AtomicU32>,
    peak_clients: Arc<AtomicU32>,
}

#[async_trait]
impl DeviceClient for FakeDeviceClient {
    async fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(anyhow!("device transport refused the connection"));
        }
        self.open = true;
        let active = self.active_clients.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_clients.fetch_max(active, Ordering::SeqCst);
        // Widen the race window so gate violations would be observable.
        sleep(Duration::from_millis(5)).await;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.active_clients.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn receive(&mut self, wait: Option<Duration>) -> Result<Option<TestMessage>> {
        if !self.open {
            return Err(anyhow!("receive on a closed device client"));
        }
        let deadline = wait.map(|w| Instant::now() + w);
        loop {
            if let Some(message) = self.hub.pop_c2d(&self.device_id) {
                return Ok(Some(message));
            }
            match deadline {
                None => return Ok(None),
                Some(d) if Instant::now() >= d => return Ok(None),
                Some(_) => sleep(Duration::from_millis(25)).await,
            }
        }
    }

    async fn complete(&mut self, _message: &TestMessage) -> Result<()> {
        if !self.open {
            return Err(anyhow!("complete on a closed device client"));
        }
        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&mut self, message: &TestMessage) -> Result<()> {
        if !self.open {
            return Err(anyhow!("send on a closed device client"));
        }
        self.d2c_sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct FakeServiceClient {
    hub: Arc<FakeHub>,
    open: bool,
    drop_sends: bool,
    corrupt_payload: bool,
    last_sent: Arc<Mutex<Option<TestMessage>>>,
}

#[async_trait]
impl ServiceClient for FakeServiceClient {
    async fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    async fn send(&mut self, device_id: &str, message: &TestMessage) -> Result<()> {
        if !self.open {
            return Err(anyhow!("send on a closed service client"));
        }
        *self.last_sent.lock().unwrap() = Some(message.clone());
        if self.drop_sends {
            return Ok(());
        }
        let mut delivered = message.clone();
        if self.corrupt_payload {
            delivered.payload = b"corrupted-in-flight".to_vec();
        }
        self.hub.enqueue_c2d(device_id, delivered);
        Ok(())
    }
}
