use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::bitfield::{FlagRegister, SettingsFlag};
use crate::circuit::*;
use crate::protocol::SENSOR_DISCONNECTED;
use crate::range::TEMPERATURE_BOUNDS;
use crate::store::{ParameterLookup, ParameterStore};
use crate::transport::Transport;
use crate::types::*;
use crate::{Error, Result};

/// Degrees below target at which a WorkState-only circuit reports heating.
pub const HEATING_HYSTERESIS: f64 = 0.5;

/// Mode, preset and setpoint control of one heating circuit.
///
/// Reads come from the store's cache. Writes go through the store and are
/// visible to the next read without a refresh.
pub trait CircuitController: Send + Sync {
    fn circuit(&self) -> &'static Circuit;

    fn current_mode(&self) -> HvacMode;

    /// Also records the observed preset, so it can be restored later.
    fn current_preset(&mut self) -> Option<Preset>;

    fn current_action(&self) -> HvacAction;

    /// Thermostat reading; `None` when the sensor is disconnected.
    fn current_temperature(&self) -> Option<f64>;

    fn target_temperature(&self) -> Option<f64>;

    fn available_modes(&self) -> Vec<HvacMode>;

    fn set_mode(&mut self, mode: HvacMode) -> impl Future<Output = Result<()>> + Send;

    fn set_preset(&mut self, preset: Preset) -> impl Future<Output = Result<()>> + Send;

    fn set_target_temperature(&mut self, value: f64) -> impl Future<Output = Result<()>> + Send;
}

/// Firmware generation of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// WorkState alone selects on/off, preset and heating.
    WorkStateOnly,
    /// WorkState selects on/off and preset; heating and cooling are
    /// enabled separately in the circuit's settings register.
    Decoupled,
}

impl Variant {
    pub fn default_work_states(self) -> WorkStateMap {
        match self {
            Variant::WorkStateOnly => WorkStateMap::LEGACY,
            Variant::Decoupled => WorkStateMap::SPLIT,
        }
    }
}

fn thermostat_reading(lookup: &impl ParameterLookup, circuit: &Circuit) -> Option<f64> {
    lookup
        .value_f64(circuit.thermostat)
        .filter(|t| *t != SENSOR_DISCONNECTED)
}

fn cooling_supported(lookup: &impl ParameterLookup) -> Option<bool> {
    lookup.value_i64(COOLING_SUPPORT_PARAM).map(|v| v != 0)
}

pub struct WorkStateController<T> {
    circuit: &'static Circuit,
    store: Arc<ParameterStore<T>>,
    states: WorkStateMap,
    last_preset: Option<ActivePreset>,
}

impl<T: Transport> WorkStateController<T> {
    pub fn new(circuit: &'static Circuit, store: Arc<ParameterStore<T>>) -> Self {
        Self {
            circuit,
            store,
            states: Variant::WorkStateOnly.default_work_states(),
            last_preset: None,
        }
    }

    pub fn with_work_states(mut self, states: WorkStateMap) -> Self {
        self.states = states;
        self
    }

    fn raw_work_state(&self) -> i64 {
        self.store
            .value_i64(self.circuit.work_state)
            .unwrap_or(WorkStateMap::OFF)
    }

    fn observed_preset(&self) -> Option<Preset> {
        match self.states.decode(self.raw_work_state())? {
            WorkState::Eco => Some(Preset::Eco),
            WorkState::Comfort => Some(Preset::Comfort),
            WorkState::Auto => Some(Preset::Schedule),
            WorkState::Off => None,
        }
    }

    async fn write_work_state(&self, state: WorkState) -> Result<()> {
        let raw = self.states.encode(state);
        debug!(circuit = self.circuit.number, ?state, raw, "setting work state");
        self.store.set(self.circuit.work_state, raw).await
    }
}

impl<T: Transport> CircuitController for WorkStateController<T> {
    fn circuit(&self) -> &'static Circuit {
        self.circuit
    }

    fn current_mode(&self) -> HvacMode {
        match self.raw_work_state() {
            WorkStateMap::OFF => HvacMode::Off,
            WorkStateMap::AUTO => HvacMode::Auto,
            _ => HvacMode::Heat,
        }
    }

    fn current_preset(&mut self) -> Option<Preset> {
        let preset = self.observed_preset();
        if let Some(active) = preset.and_then(|p| p.as_active()) {
            self.last_preset = Some(active);
        }
        preset
    }

    fn current_action(&self) -> HvacAction {
        if self.raw_work_state() == WorkStateMap::OFF {
            return HvacAction::Off;
        }
        match (self.current_temperature(), self.target_temperature()) {
            (Some(current), Some(target)) if current < target - HEATING_HYSTERESIS => {
                HvacAction::Heating
            }
            _ => HvacAction::Idle,
        }
    }

    fn current_temperature(&self) -> Option<f64> {
        thermostat_reading(&*self.store, self.circuit)
    }

    fn target_temperature(&self) -> Option<f64> {
        let id = match self.observed_preset()? {
            Preset::Eco => self.circuit.eco,
            Preset::Comfort => self.circuit.comfort,
            Preset::Schedule => return None,
        };
        self.store.value_f64(id)
    }

    fn available_modes(&self) -> Vec<HvacMode> {
        let mut modes = vec![HvacMode::Off, HvacMode::Auto, HvacMode::Heat];
        if cooling_supported(&*self.store) == Some(true) {
            modes.push(HvacMode::Cool);
        }
        modes
    }

    async fn set_mode(&mut self, mode: HvacMode) -> Result<()> {
        let state = match mode {
            HvacMode::Off => WorkState::Off,
            HvacMode::Auto => WorkState::Auto,
            HvacMode::Cool if cooling_supported(&*self.store) != Some(true) => {
                return Err(Error::UnsupportedMode(mode));
            }
            HvacMode::Heat | HvacMode::Cool => match self.last_preset.unwrap_or_default() {
                ActivePreset::Eco => WorkState::Eco,
                ActivePreset::Comfort => WorkState::Comfort,
            },
            HvacMode::HeatCool => return Err(Error::UnsupportedMode(mode)),
        };
        self.write_work_state(state).await
    }

    async fn set_preset(&mut self, preset: Preset) -> Result<()> {
        let state = match preset {
            Preset::Eco => WorkState::Eco,
            Preset::Comfort => WorkState::Comfort,
            Preset::Schedule => WorkState::Auto,
        };
        self.write_work_state(state).await?;
        if let Some(active) = preset.as_active() {
            self.last_preset = Some(active);
        }
        Ok(())
    }

    async fn set_target_temperature(&mut self, value: f64) -> Result<()> {
        let id = match self.current_preset() {
            Some(Preset::Eco) => self.circuit.eco,
            Some(Preset::Comfort) => self.circuit.comfort,
            _ => return Err(Error::NoActivePreset),
        };
        debug!(circuit = self.circuit.number, id, value, "setting target temperature");
        self.store.set_number(id, value, TEMPERATURE_BOUNDS).await
    }
}

pub struct DecoupledController<T> {
    circuit: &'static Circuit,
    store: Arc<ParameterStore<T>>,
    states: WorkStateMap,
    /// Preset to restore when the circuit is switched back on.
    last_preset: Option<Preset>,
    /// Setpoint the schedule is believed to follow.
    active_guess: Option<ActivePreset>,
}

impl<T: Transport> DecoupledController<T> {
    pub fn new(circuit: &'static Circuit, store: Arc<ParameterStore<T>>) -> Self {
        Self {
            circuit,
            store,
            states: Variant::Decoupled.default_work_states(),
            last_preset: None,
            active_guess: None,
        }
    }

    pub fn with_work_states(mut self, states: WorkStateMap) -> Self {
        self.states = states;
        self
    }

    /// Sub-preset the last detection settled on.
    pub fn active_guess(&self) -> Option<ActivePreset> {
        self.active_guess
    }

    fn work_state(&self) -> Option<WorkState> {
        let raw = self
            .store
            .value_i64(self.circuit.work_state)
            .unwrap_or(WorkStateMap::OFF);
        self.states.decode(raw)
    }

    fn settings(&self) -> Option<FlagRegister> {
        self.store.register(self.circuit.settings).map(FlagRegister::new)
    }

    /// Preset the room setpoint currently matches, if any.
    fn matched(&self) -> Option<ActivePreset> {
        let lookup = &*self.store;
        match_active_preset(
            lookup.value_f64(self.circuit.room_setpoint)?,
            lookup.value_f64(self.circuit.eco)?,
            lookup.value_f64(self.circuit.comfort)?,
        )
    }

    /// Detection over the cached setpoints, without recording the result.
    fn detect(&self) -> ActivePreset {
        self.matched()
            .or(self.active_guess)
            .unwrap_or_default()
    }

    fn setpoint_param(&self, preset: Preset, scheduled: ActivePreset) -> &'static str {
        let active = preset.as_active().unwrap_or(scheduled);
        match active {
            ActivePreset::Eco => self.circuit.eco,
            ActivePreset::Comfort => self.circuit.comfort,
        }
    }

    fn observed_preset(&self) -> Option<Preset> {
        match self.work_state()? {
            WorkState::Eco => Some(Preset::Eco),
            WorkState::Comfort => Some(Preset::Comfort),
            WorkState::Auto => Some(Preset::Schedule),
            WorkState::Off => None,
        }
    }

    /// Work state that turns an OFF circuit back on with its last preset.
    fn restore_state(&self) -> WorkState {
        match self.last_preset {
            Some(Preset::Eco) => WorkState::Eco,
            Some(Preset::Schedule) => WorkState::Auto,
            _ => WorkState::Comfort,
        }
    }
}

impl<T: Transport> CircuitController for DecoupledController<T> {
    fn circuit(&self) -> &'static Circuit {
        self.circuit
    }

    fn current_mode(&self) -> HvacMode {
        if matches!(self.work_state(), Some(WorkState::Off)) {
            return HvacMode::Off;
        }
        let Some(settings) = self.settings() else {
            return HvacMode::Heat;
        };
        match (
            settings.flag(SettingsFlag::HeatingEnabled),
            settings.flag(SettingsFlag::CoolingEnabled),
        ) {
            (true, true) => HvacMode::HeatCool,
            (false, true) => HvacMode::Cool,
            _ => HvacMode::Heat,
        }
    }

    /// A manual preset is remembered as is. Under the schedule only a
    /// setpoint match updates the memory, so switching back on restores
    /// the matched ECO/COMFORT rather than AUTO.
    fn current_preset(&mut self) -> Option<Preset> {
        let preset = self.observed_preset()?;
        match preset.as_active() {
            Some(active) => {
                self.active_guess = Some(active);
                self.last_preset = Some(preset);
            }
            None => {
                let matched = self.matched();
                self.active_guess = Some(matched.or(self.active_guess).unwrap_or_default());
                if let Some(active) = matched {
                    self.last_preset = Some(active.into());
                }
            }
        }
        Some(preset)
    }

    fn current_action(&self) -> HvacAction {
        if matches!(self.work_state(), Some(WorkState::Off)) {
            return HvacAction::Off;
        }
        let lookup = &*self.store;
        if lookup.value_i64(&self.circuit.pump_param()) == Some(0) {
            return HvacAction::Idle;
        }
        if lookup
            .value_i64(HOT_WATER_LOADING_PARAM)
            .is_some_and(|v| v > 0)
        {
            trace!(circuit = self.circuit.number, "heat source busy with hot water");
            return HvacAction::Idle;
        }
        match lookup.value_i64(HEAT_SOURCE_WORK_MODE_PARAM).unwrap_or(0) {
            2 => HvacAction::Cooling,
            1.. => HvacAction::Heating,
            _ => HvacAction::Idle,
        }
    }

    fn current_temperature(&self) -> Option<f64> {
        thermostat_reading(&*self.store, self.circuit)
    }

    fn target_temperature(&self) -> Option<f64> {
        let preset = self.observed_preset()?;
        self.store
            .value_f64(self.setpoint_param(preset, self.detect()))
    }

    fn available_modes(&self) -> Vec<HvacMode> {
        let lookup = &*self.store;
        let mut modes = vec![HvacMode::Off];
        let operating = lookup
            .value_i64(OPERATING_MODE_PARAM)
            .map_or(OperatingMode::Auto, OperatingMode::from_raw);

        match operating {
            OperatingMode::Summer => modes.push(HvacMode::Cool),
            OperatingMode::Winter => modes.push(HvacMode::Heat),
            OperatingMode::Auto => {
                let settings = self.settings().unwrap_or_default();
                match (
                    settings.flag(SettingsFlag::HeatingEnabled),
                    settings.flag(SettingsFlag::CoolingEnabled),
                ) {
                    (true, true) => {
                        modes.extend([HvacMode::HeatCool, HvacMode::Heat, HvacMode::Cool])
                    }
                    (false, true) => modes.push(HvacMode::Cool),
                    _ => modes.push(HvacMode::Heat),
                }
            }
        }

        if cooling_supported(lookup) == Some(false) {
            modes.retain(|m| !matches!(m, HvacMode::Cool | HvacMode::HeatCool));
        }
        modes
    }

    async fn set_mode(&mut self, mode: HvacMode) -> Result<()> {
        let (heating, cooling) = match mode {
            HvacMode::Off => {
                debug!(circuit = self.circuit.number, "turning circuit off");
                let raw = self.states.encode(WorkState::Off);
                return self.store.set(self.circuit.work_state, raw).await;
            }
            HvacMode::Heat => (true, false),
            HvacMode::Cool => (false, true),
            HvacMode::HeatCool | HvacMode::Auto => (true, true),
        };

        let current = self
            .settings()
            .ok_or_else(|| Error::UnknownParameter(self.circuit.settings.to_string()))?;
        let mut next = current;
        next.set_flag(SettingsFlag::HeatingEnabled, heating);
        next.set_flag(SettingsFlag::CoolingEnabled, cooling);

        if next != current {
            debug!(
                circuit = self.circuit.number,
                ?mode,
                settings = next.raw(),
                "updating enable bits"
            );
            self.store.set(self.circuit.settings, next.raw()).await?;
        }

        if matches!(self.work_state(), Some(WorkState::Off)) {
            let state = self.restore_state();
            debug!(circuit = self.circuit.number, ?state, "turning circuit on");
            let raw = self.states.encode(state);
            self.store.set(self.circuit.work_state, raw).await?;
        }
        Ok(())
    }

    async fn set_preset(&mut self, preset: Preset) -> Result<()> {
        let state = match preset {
            Preset::Eco => WorkState::Eco,
            Preset::Comfort => WorkState::Comfort,
            Preset::Schedule => WorkState::Auto,
        };
        let raw = self.states.encode(state);
        debug!(circuit = self.circuit.number, ?preset, raw, "setting preset");
        self.store.set(self.circuit.work_state, raw).await?;
        self.last_preset = Some(preset);
        if let Some(active) = preset.as_active() {
            self.active_guess = Some(active);
        }
        Ok(())
    }

    async fn set_target_temperature(&mut self, value: f64) -> Result<()> {
        let preset = self.current_preset().ok_or(Error::NoActivePreset)?;
        let id = self.setpoint_param(preset, self.active_guess.unwrap_or_default());
        debug!(circuit = self.circuit.number, ?preset, id, value, "setting target temperature");
        self.store.set_number(id, value, TEMPERATURE_BOUNDS).await
    }
}

/// Circuit controller for either firmware generation.
pub enum Controller<T> {
    WorkState(WorkStateController<T>),
    Decoupled(DecoupledController<T>),
}

impl<T: Transport> Controller<T> {
    pub fn new(variant: Variant, circuit: &'static Circuit, store: Arc<ParameterStore<T>>) -> Self {
        match variant {
            Variant::WorkStateOnly => Controller::WorkState(WorkStateController::new(circuit, store)),
            Variant::Decoupled => Controller::Decoupled(DecoupledController::new(circuit, store)),
        }
    }

    /// Override the WorkState integer encoding for this device.
    pub fn with_work_states(self, states: WorkStateMap) -> Self {
        match self {
            Controller::WorkState(c) => Controller::WorkState(c.with_work_states(states)),
            Controller::Decoupled(c) => Controller::Decoupled(c.with_work_states(states)),
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            Controller::WorkState(_) => Variant::WorkStateOnly,
            Controller::Decoupled(_) => Variant::Decoupled,
        }
    }
}

impl<T: Transport> CircuitController for Controller<T> {
    fn circuit(&self) -> &'static Circuit {
        match self {
            Controller::WorkState(c) => c.circuit(),
            Controller::Decoupled(c) => c.circuit(),
        }
    }

    fn current_mode(&self) -> HvacMode {
        match self {
            Controller::WorkState(c) => c.current_mode(),
            Controller::Decoupled(c) => c.current_mode(),
        }
    }

    fn current_preset(&mut self) -> Option<Preset> {
        match self {
            Controller::WorkState(c) => c.current_preset(),
            Controller::Decoupled(c) => c.current_preset(),
        }
    }

    fn current_action(&self) -> HvacAction {
        match self {
            Controller::WorkState(c) => c.current_action(),
            Controller::Decoupled(c) => c.current_action(),
        }
    }

    fn current_temperature(&self) -> Option<f64> {
        match self {
            Controller::WorkState(c) => c.current_temperature(),
            Controller::Decoupled(c) => c.current_temperature(),
        }
    }

    fn target_temperature(&self) -> Option<f64> {
        match self {
            Controller::WorkState(c) => c.target_temperature(),
            Controller::Decoupled(c) => c.target_temperature(),
        }
    }

    fn available_modes(&self) -> Vec<HvacMode> {
        match self {
            Controller::WorkState(c) => c.available_modes(),
            Controller::Decoupled(c) => c.available_modes(),
        }
    }

    async fn set_mode(&mut self, mode: HvacMode) -> Result<()> {
        match self {
            Controller::WorkState(c) => c.set_mode(mode).await,
            Controller::Decoupled(c) => c.set_mode(mode).await,
        }
    }

    async fn set_preset(&mut self, preset: Preset) -> Result<()> {
        match self {
            Controller::WorkState(c) => c.set_preset(preset).await,
            Controller::Decoupled(c) => c.set_preset(preset).await,
        }
    }

    async fn set_target_temperature(&mut self, value: f64) -> Result<()> {
        match self {
            Controller::WorkState(c) => c.set_target_temperature(value).await,
            Controller::Decoupled(c) => c.set_target_temperature(value).await,
        }
    }
}
