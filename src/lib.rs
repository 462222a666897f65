mod bitfield;
mod circuit;
mod client;
mod controller;
mod diff;
mod error;
mod logger;
mod protocol;
mod range;
pub mod schedule;
mod store;
mod transport;
mod types;

pub use bitfield::{read_bit, write_bit, FlagRegister, SettingsFlag, Switch};
pub use circuit::{
    active_circuits, detect_active_preset, match_active_preset, write_schedule, Circuit,
    WorkState, WorkStateMap, CIRCUITS, CIRCUIT_PUMP_BASE, COOLING_SUPPORT_PARAM, HEAT_SOURCE_WORK_MODE_PARAM,
    HOT_WATER_LOADING_PARAM, OPERATING_MODE_PARAM, PRESET_MATCH_TOLERANCE,
};
pub use client::{GatewayClient, GatewayClientBuilder, DEFAULT_TIMEOUT};
pub use controller::{
    CircuitController, Controller, DecoupledController, Variant, WorkStateController,
    HEATING_HYSTERESIS,
};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{DEFAULT_PORT, SENSOR_DISCONNECTED};
pub use range::{resolve_max, resolve_min, Bounds, TEMPERATURE_BOUNDS};
pub use store::{ParameterLookup, ParameterStore, DEFAULT_REFRESH_INTERVAL};
pub use transport::Transport;
pub use types::*;
