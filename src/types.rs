use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A register value exactly as the gateway sent it.
///
/// Integers stay integers and floats stay floats, so a value read from a
/// snapshot compares equal to what was on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParamValue::Text(_) => None,
        }
    }

    /// Integer view; floats are truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            ParamValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// 32-bit register view for flag sets and schedule masks.
    pub fn as_register(&self) -> Option<u32> {
        self.as_i64().map(|v| v as u32)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// One indexed controller register plus its metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parameter {
    pub id: String,
    pub name: String,
    pub value: Option<ParamValue>,
    pub minv: Option<f64>,
    pub maxv: Option<f64>,
    /// Id of another parameter whose current value is the live minimum.
    #[serde(rename = "minvDP")]
    pub minv_dp: Option<String>,
    #[serde(rename = "maxvDP")]
    pub maxv_dp: Option<String>,
    pub writable: bool,
    pub unit: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: Option<serde_json::Value>,
}

impl Parameter {
    pub fn new(id: impl Into<String>, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, minv: f64, maxv: f64) -> Self {
        self.minv = Some(minv);
        self.maxv = Some(maxv);
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_ref().and_then(ParamValue::as_f64)
    }
}

/// Full register map as of one refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: Option<String>,
    pub parameters: HashMap<String, Parameter>,
}

impl Snapshot {
    pub fn from_parameters(params: impl IntoIterator<Item = Parameter>) -> Self {
        Self {
            timestamp: None,
            parameters: params.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Parameter> {
        self.parameters.get(id)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alarm {
    #[serde(default)]
    pub index: Option<u32>,
    pub code: u32,
    #[serde(default)]
    pub from_date: Option<NaiveDateTime>,
    /// `None` while the alarm is still active.
    #[serde(default)]
    pub to_date: Option<NaiveDateTime>,
}

impl Alarm {
    pub fn is_active(&self) -> bool {
        self.to_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub uid: String,
    pub name: String,
    pub param_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    Auto,
}

impl HvacMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::HeatCool => "heat_cool",
            HvacMode::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(HvacMode::Off),
            "heat" => Some(HvacMode::Heat),
            "cool" => Some(HvacMode::Cool),
            "heat_cool" => Some(HvacMode::HeatCool),
            "auto" => Some(HvacMode::Auto),
            _ => None,
        }
    }
}

/// User-facing preset of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Eco,
    Comfort,
    /// Device follows its own weekly schedule.
    Schedule,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Eco => "eco",
            Preset::Comfort => "comfort",
            Preset::Schedule => "schedule",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eco" => Some(Preset::Eco),
            "comfort" => Some(Preset::Comfort),
            "schedule" => Some(Preset::Schedule),
            _ => None,
        }
    }

    pub fn as_active(&self) -> Option<ActivePreset> {
        match self {
            Preset::Eco => Some(ActivePreset::Eco),
            Preset::Comfort => Some(ActivePreset::Comfort),
            Preset::Schedule => None,
        }
    }
}

/// The setpoint a circuit is currently heating towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivePreset {
    Eco,
    #[default]
    Comfort,
}

impl From<ActivePreset> for Preset {
    fn from(p: ActivePreset) -> Self {
        match p {
            ActivePreset::Eco => Preset::Eco,
            ActivePreset::Comfort => Preset::Comfort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HvacAction {
    Off,
    #[default]
    Idle,
    Heating,
    Cooling,
}

/// System-wide season setting (parameter 162).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Summer,
    Winter,
    Auto,
}

impl OperatingMode {
    pub fn from_raw(v: i64) -> Self {
        match v {
            1 => OperatingMode::Summer,
            2 => OperatingMode::Winter,
            _ => OperatingMode::Auto,
        }
    }
}

/// Events emitted by the parameter store.
#[derive(Debug, Clone)]
pub enum Event {
    ParameterChanged {
        id: String,
        name: String,
        old: Option<ParamValue>,
        new: Option<ParamValue>,
    },
    ParameterWritten { id: String, value: ParamValue },
    RefreshFailed { reason: String },
}
