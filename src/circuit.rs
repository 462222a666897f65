use chrono::Weekday;
use tracing::debug;

use crate::bitfield::{SettingsFlag, Switch};
use crate::schedule::{self, DayHalf, TimeRange};
use crate::store::{ParameterLookup, ParameterStore};
use crate::transport::Transport;
use crate::types::ActivePreset;
use crate::Result;

/// System-wide season selector, see [`crate::OperatingMode`].
pub const OPERATING_MODE_PARAM: &str = "162";
/// Global cooling-support toggle.
pub const COOLING_SUPPORT_PARAM: &str = "485";
/// Heat source work mode: 0 standby, 1 heating, 2 cooling.
pub const HEAT_SOURCE_WORK_MODE_PARAM: &str = "1350";
/// Pump-running flag of circuit 1; circuit N lives at `base + N - 1`.
pub const CIRCUIT_PUMP_BASE: u32 = 1353;
/// Non-zero while the heat source is loading hot water.
pub const HOT_WATER_LOADING_PARAM: &str = "1361";

/// Setpoint distance under which the room setpoint counts as matching a preset.
pub const PRESET_MATCH_TOLERANCE: f64 = 0.1;

/// Parameter ids of one heating circuit.
#[derive(Debug, PartialEq, Eq)]
pub struct Circuit {
    pub number: u8,
    pub active: &'static str,
    pub name: &'static str,
    pub work_state: &'static str,
    /// Flag register with the heating/cooling enable bits. Only used by
    /// controllers with decoupled mode control.
    pub settings: &'static str,
    pub thermostat: &'static str,
    pub comfort: &'static str,
    pub eco: &'static str,
    pub room_setpoint: &'static str,
    /// Sunday AM register. The rest of the week follows consecutively,
    /// AM then PM, Sunday first.
    schedule_base: u32,
}

pub static CIRCUITS: [Circuit; 7] = [
    Circuit {
        number: 1,
        active: "279",
        name: "278",
        work_state: "236",
        settings: "231",
        thermostat: "277",
        comfort: "238",
        eco: "239",
        room_setpoint: "42",
        schedule_base: 247,
    },
    Circuit {
        number: 2,
        active: "329",
        name: "328",
        work_state: "286",
        settings: "281",
        thermostat: "327",
        comfort: "288",
        eco: "289",
        room_setpoint: "92",
        schedule_base: 297,
    },
    Circuit {
        number: 3,
        active: "901",
        name: "900",
        work_state: "336",
        settings: "331",
        thermostat: "899",
        comfort: "338",
        eco: "339",
        room_setpoint: "93",
        schedule_base: 881,
    },
    Circuit {
        number: 4,
        active: "987",
        name: "986",
        work_state: "944",
        settings: "940",
        thermostat: "985",
        comfort: "946",
        eco: "947",
        room_setpoint: "94",
        schedule_base: 955,
    },
    Circuit {
        number: 5,
        active: "1038",
        name: "1037",
        work_state: "995",
        settings: "991",
        thermostat: "1036",
        comfort: "997",
        eco: "998",
        room_setpoint: "95",
        schedule_base: 1006,
    },
    Circuit {
        number: 6,
        active: "781",
        name: "780",
        work_state: "753",
        settings: "749",
        thermostat: "779",
        comfort: "755",
        eco: "756",
        room_setpoint: "96",
        schedule_base: 867,
    },
    Circuit {
        number: 7,
        active: "831",
        name: "830",
        work_state: "803",
        settings: "799",
        thermostat: "829",
        comfort: "805",
        eco: "806",
        room_setpoint: "97",
        schedule_base: 845,
    },
];

impl Circuit {
    /// Circuit by its 1-based number.
    pub fn get(number: u8) -> Option<&'static Circuit> {
        CIRCUITS.iter().find(|c| c.number == number)
    }

    pub fn is_active(&self, lookup: &impl ParameterLookup) -> bool {
        lookup.value_i64(self.active).is_some_and(|v| v > 0)
    }

    /// User-assigned circuit name, or "Circuit N" when unset.
    pub fn display_name(&self, lookup: &impl ParameterLookup) -> String {
        lookup
            .value(self.name)
            .as_ref()
            .and_then(|v| v.as_str().map(str::trim).map(str::to_string))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("Circuit {}", self.number))
    }

    pub fn pump_param(&self) -> String {
        (CIRCUIT_PUMP_BASE + u32::from(self.number) - 1).to_string()
    }

    /// (AM, PM) schedule register ids for `day`.
    pub fn schedule_slots(&self, day: Weekday) -> (String, String) {
        let am = self.schedule_base + 2 * day.num_days_from_sunday();
        (am.to_string(), (am + 1).to_string())
    }

    pub fn schedule_slot(&self, day: Weekday, half: DayHalf) -> String {
        let (am, pm) = self.schedule_slots(day);
        match half {
            DayHalf::Am => am,
            DayHalf::Pm => pm,
        }
    }

    /// Decoded schedule for `day`, `None` until both registers are known.
    pub fn day_schedule(&self, lookup: &impl ParameterLookup, day: Weekday) -> Option<String> {
        let (am, pm) = self.schedule_slots(day);
        Some(schedule::decode_day(
            lookup.register(&am)?,
            lookup.register(&pm)?,
        ))
    }

    /// On/off switch over one of this circuit's settings bits.
    pub fn settings_switch(&self, flag: SettingsFlag) -> Switch {
        Switch::settings(self.settings, flag)
    }
}

/// Encode `ranges` and store them as the `half` register of `day`.
pub async fn write_schedule<T: Transport>(
    store: &ParameterStore<T>,
    circuit: &Circuit,
    day: Weekday,
    half: DayHalf,
    ranges: &[TimeRange],
) -> Result<()> {
    let mask = schedule::encode(ranges, half)?;
    let id = circuit.schedule_slot(day, half);
    debug!(circuit = circuit.number, %day, ?half, mask, "writing schedule");
    store.set(&id, mask).await
}

pub fn active_circuits(lookup: &impl ParameterLookup) -> Vec<&'static Circuit> {
    CIRCUITS.iter().filter(|c| c.is_active(lookup)).collect()
}

/// Circuit on/off and preset selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    Off,
    Eco,
    Comfort,
    /// Follow the weekly schedule.
    Auto,
}

/// Integer encoding of [`WorkState`]. Firmware generations disagree on
/// which of 1 and 2 means ECO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkStateMap {
    pub eco: i64,
    pub comfort: i64,
}

impl WorkStateMap {
    pub const OFF: i64 = 0;
    pub const AUTO: i64 = 3;

    /// 1 = ECO, 2 = COMFORT
    pub const LEGACY: WorkStateMap = WorkStateMap { eco: 1, comfort: 2 };
    /// 1 = COMFORT, 2 = ECO
    pub const SPLIT: WorkStateMap = WorkStateMap { eco: 2, comfort: 1 };

    pub fn decode(&self, raw: i64) -> Option<WorkState> {
        match raw {
            Self::OFF => Some(WorkState::Off),
            Self::AUTO => Some(WorkState::Auto),
            v if v == self.eco => Some(WorkState::Eco),
            v if v == self.comfort => Some(WorkState::Comfort),
            _ => None,
        }
    }

    pub fn encode(&self, state: WorkState) -> i64 {
        match state {
            WorkState::Off => Self::OFF,
            WorkState::Eco => self.eco,
            WorkState::Comfort => self.comfort,
            WorkState::Auto => Self::AUTO,
        }
    }
}

/// Guess which setpoint a scheduled circuit is following.
///
/// ECO wins when the setpoint is within tolerance of both. Without a match
/// the previous guess is kept, defaulting to COMFORT.
pub fn detect_active_preset(
    setpoint: f64,
    eco: f64,
    comfort: f64,
    previous: Option<ActivePreset>,
) -> ActivePreset {
    match_active_preset(setpoint, eco, comfort)
        .or(previous)
        .unwrap_or_default()
}

/// The preset whose setpoint `setpoint` is within tolerance of, ECO first.
pub fn match_active_preset(setpoint: f64, eco: f64, comfort: f64) -> Option<ActivePreset> {
    if (setpoint - eco).abs() < PRESET_MATCH_TOLERANCE {
        Some(ActivePreset::Eco)
    } else if (setpoint - comfort).abs() < PRESET_MATCH_TOLERANCE {
        Some(ActivePreset::Comfort)
    } else {
        None
    }
}
