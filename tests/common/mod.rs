#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use econext::{Error, ParamValue, Parameter, Result, Snapshot, Transport};
use tokio::sync::Notify;

/// In-memory register map standing in for a gateway.
#[derive(Default)]
pub struct FakeTransport {
    params: Mutex<HashMap<String, Parameter>>,
    writes: Mutex<Vec<(String, ParamValue)>>,
    fail_writes: Mutex<bool>,
    fail_fetch: Mutex<bool>,
    hold_next_fetch: Mutex<Option<Arc<Notify>>>,
}

impl FakeTransport {
    pub fn new(params: impl IntoIterator<Item = Parameter>) -> Self {
        let fake = Self::default();
        for p in params {
            fake.put(p);
        }
        fake
    }

    pub fn put(&self, param: Parameter) {
        self.params.lock().unwrap().insert(param.id.clone(), param);
    }

    /// Change a value on the "device" without going through the store.
    pub fn set_device_value(&self, id: &str, value: impl Into<ParamValue>) {
        if let Some(p) = self.params.lock().unwrap().get_mut(id) {
            p.value = Some(value.into());
        }
    }

    pub fn writes(&self) -> Vec<(String, ParamValue)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().unwrap() = fail;
    }

    /// The next fetch captures the map, then waits on `gate` before returning it.
    pub fn hold_next_fetch(&self, gate: Arc<Notify>) {
        *self.hold_next_fetch.lock().unwrap() = Some(gate);
    }
}

impl Transport for FakeTransport {
    async fn fetch_parameters(&self) -> Result<Snapshot> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(Error::Status {
                endpoint: "/api/parameters".to_string(),
                status: 503,
            });
        }
        let snapshot = Snapshot::from_parameters(self.params.lock().unwrap().values().cloned());
        let gate = self.hold_next_fetch.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(snapshot)
    }

    async fn write_parameter(&self, param: &Parameter, value: &ParamValue) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(Error::Status {
                endpoint: format!("/api/parameters/{}", param.name),
                status: 500,
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((param.id.clone(), value.clone()));
        self.set_device_value(&param.id, value.clone());
        Ok(())
    }
}
