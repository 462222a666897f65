use std::future::Future;

use crate::types::{Alarm, ParamValue, Parameter, Snapshot};
use crate::Result;

/// Wire-level access to a controller's register map.
///
/// [`crate::GatewayClient`] speaks the HTTP gateway; tests plug in an
/// in-memory map.
pub trait Transport: Send + Sync {
    fn fetch_parameters(&self) -> impl Future<Output = Result<Snapshot>> + Send;

    /// Write one register. `param` is the cached entry, so implementations
    /// can address it by id or by name.
    fn write_parameter(
        &self,
        param: &Parameter,
        value: &ParamValue,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Alarm history, newest first. Transports without alarm support return
    /// an empty list.
    fn fetch_alarms(&self) -> impl Future<Output = Result<Vec<Alarm>>> + Send {
        async { Ok(Vec::new()) }
    }
}
