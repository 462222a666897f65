use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::diff::diff_parameters;
use crate::protocol::{DEFAULT_DEVICE_NAME, DEVICE_NAME_PARAM, DEVICE_UID_PARAM};
use crate::range::{self, Bounds};
use crate::transport::Transport;
use crate::types::*;
use crate::{Error, Result};

/// How often callers are expected to call [`ParameterStore::refresh`].
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&Snapshot) + Send + Sync>;

/// Read access to a register map. Implemented by the live store and by
/// plain snapshots.
pub trait ParameterLookup {
    fn parameter(&self, id: &str) -> Option<Parameter>;

    fn value(&self, id: &str) -> Option<ParamValue> {
        self.parameter(id).and_then(|p| p.value)
    }

    fn value_f64(&self, id: &str) -> Option<f64> {
        self.value(id).as_ref().and_then(ParamValue::as_f64)
    }

    fn value_i64(&self, id: &str) -> Option<i64> {
        self.value(id).as_ref().and_then(ParamValue::as_i64)
    }

    fn register(&self, id: &str) -> Option<u32> {
        self.value(id).as_ref().and_then(ParamValue::as_register)
    }
}

impl ParameterLookup for Snapshot {
    fn parameter(&self, id: &str) -> Option<Parameter> {
        self.get(id).cloned()
    }
}

#[derive(Default)]
struct Cache {
    snapshot: Snapshot,
    alarms: Vec<Alarm>,
    write_generation: u64,
    /// Confirmed writes not yet known to be reflected by a refresh.
    patches: HashMap<String, (u64, ParamValue)>,
    /// Issued to each refresh as it starts.
    next_refresh: u64,
    /// Sequence number of the refresh whose snapshot is cached.
    applied_refresh: u64,
}

/// Cached view of the controller's register map with optimistic writes.
pub struct ParameterStore<T> {
    transport: T,
    cache: RwLock<Cache>,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl<T: Transport> ParameterStore<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: RwLock::new(Cache::default()),
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
        }
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Snapshot) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Replace the cache with a fresh snapshot from the transport.
    ///
    /// On failure the previous snapshot stays in place. Writes confirmed
    /// while the fetch was in flight are re-applied on top of the new
    /// snapshot so a stale response cannot roll them back. A refresh that
    /// lands after one started later has already been applied is dropped.
    pub async fn refresh(&self) -> Result<()> {
        let (sequence, started) = {
            let mut cache = self.write_cache();
            cache.next_refresh += 1;
            (cache.next_refresh, cache.write_generation)
        };

        let mut snapshot = match self.transport.fetch_parameters().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous snapshot");
                self.emit(&Event::RefreshFailed {
                    reason: e.to_string(),
                });
                return Err(Error::Refresh(Box::new(e)));
            }
        };

        let alarms = match self.transport.fetch_alarms().await {
            Ok(alarms) => Some(alarms),
            Err(e) => {
                debug!(error = %e, "failed to fetch alarms, keeping previous list");
                None
            }
        };

        let changes = {
            let mut cache = self.write_cache();
            if sequence < cache.applied_refresh {
                debug!(
                    sequence,
                    applied = cache.applied_refresh,
                    "dropping refresh overtaken by a newer one"
                );
                return Ok(());
            }
            cache.applied_refresh = sequence;
            cache.patches.retain(|_, (generation, _)| *generation > started);
            for (id, (_, value)) in &cache.patches {
                if let Some(param) = snapshot.parameters.get_mut(id) {
                    trace!(%id, "keeping write newer than in-flight refresh");
                    param.value = Some(value.clone());
                }
            }
            let changes = diff_parameters(&cache.snapshot, &snapshot);
            cache.snapshot = snapshot;
            if let Some(alarms) = alarms {
                cache.alarms = alarms;
            }
            changes
        };

        debug!(changed = changes.len(), "refreshed parameter snapshot");
        for change in changes {
            self.emit(&change.into_event());
        }
        if !self.snapshot_callbacks.is_empty() {
            let snapshot = self.snapshot();
            for cb in &self.snapshot_callbacks {
                cb(&snapshot);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Parameter> {
        self.read_cache().snapshot.get(id).cloned()
    }

    pub fn get_value(&self, id: &str) -> Option<ParamValue> {
        self.read_cache()
            .snapshot
            .get(id)
            .and_then(|p| p.value.clone())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read_cache().snapshot.clone()
    }

    /// Write through the transport and patch the cached value on success.
    ///
    /// Unknown ids fail before anything is sent, and so do parameters the
    /// transport cannot address. On failure the cache is left as it was.
    pub async fn set(&self, id: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let param = self
            .get(id)
            .ok_or_else(|| Error::UnknownParameter(id.to_string()))?;

        match self.transport.write_parameter(&param, &value).await {
            Ok(()) => {}
            Err(e @ Error::MissingName(_)) => return Err(e),
            Err(e) => {
                warn!(id, error = %e, "parameter write failed");
                return Err(Error::Write {
                    id: id.to_string(),
                    source: Box::new(e),
                });
            }
        }

        {
            let mut cache = self.write_cache();
            cache.write_generation += 1;
            let generation = cache.write_generation;
            cache
                .patches
                .insert(id.to_string(), (generation, value.clone()));
            if let Some(cached) = cache.snapshot.parameters.get_mut(id) {
                cached.value = Some(value.clone());
            }
        }

        debug!(id, %value, "parameter patched in cache");
        self.emit(&Event::ParameterWritten {
            id: id.to_string(),
            value,
        });
        Ok(())
    }

    /// Range-checked numeric write.
    ///
    /// NaN and infinities are refused outright. Values below the resolved
    /// minimum are rejected before reaching the transport. Values above the
    /// resolved maximum are logged and sent anyway, since firmware rounds
    /// near the upper boundary. Integral values are sent as integers.
    pub async fn set_number(&self, id: &str, value: f64, fallback: Bounds) -> Result<()> {
        let param = self
            .get(id)
            .ok_or_else(|| Error::UnknownParameter(id.to_string()))?;
        if !param.writable {
            return Err(Error::ReadOnly(id.to_string()));
        }
        if !value.is_finite() {
            return Err(Error::InvalidNumber {
                id: id.to_string(),
                value,
            });
        }

        if param.as_f64() == Some(value) {
            trace!(id, value, "value unchanged, skipping write");
            return Ok(());
        }

        let min = range::resolve_min(self, &param, fallback.min);
        let max = range::resolve_max(self, &param, fallback.max);
        if value < min {
            warn!(id, value, min, "requested value below minimum");
            return Err(Error::RangeViolation {
                id: id.to_string(),
                value,
                min,
            });
        }
        if value > max {
            warn!(id, value, max, "requested value above maximum, sending anyway");
        }

        let raw = if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            ParamValue::Int(value as i64)
        } else {
            ParamValue::Float(value)
        };
        self.set(id, raw).await
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.read_cache().alarms.clone()
    }

    /// Alarms without an end date.
    pub fn active_alarms(&self) -> Vec<Alarm> {
        self.read_cache()
            .alarms
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    pub fn latest_alarm(&self) -> Option<Alarm> {
        self.read_cache().alarms.first().cloned()
    }

    pub fn device_uid(&self) -> String {
        self.value(DEVICE_UID_PARAM)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn device_name(&self) -> String {
        self.value(DEVICE_NAME_PARAM)
            .map(|v| v.to_string())
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string())
    }

    fn emit(&self, event: &Event) {
        for cb in &self.event_callbacks {
            cb(event);
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> ParameterLookup for ParameterStore<T> {
    fn parameter(&self, id: &str) -> Option<Parameter> {
        self.get(id)
    }

    fn value(&self, id: &str) -> Option<ParamValue> {
        self.get_value(id)
    }
}
