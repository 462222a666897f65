use crate::store::ParameterLookup;
use crate::types::Parameter;

/// Fallback limits used when a parameter carries no usable range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Setpoint fallback for circuit temperatures, in °C.
pub const TEMPERATURE_BOUNDS: Bounds = Bounds::new(10.0, 35.0);

pub fn resolve_min(lookup: &impl ParameterLookup, param: &Parameter, fallback: f64) -> f64 {
    if let Some(v) = dynamic_limit(lookup, param.minv_dp.as_deref()) {
        return v;
    }
    static_range(param).map_or(fallback, |(min, _)| min)
}

pub fn resolve_max(lookup: &impl ParameterLookup, param: &Parameter, fallback: f64) -> f64 {
    if let Some(v) = dynamic_limit(lookup, param.maxv_dp.as_deref()) {
        return v;
    }
    static_range(param).map_or(fallback, |(_, max)| max)
}

/// Current value of the referenced parameter, if it exists and is numeric.
fn dynamic_limit(lookup: &impl ParameterLookup, pointer: Option<&str>) -> Option<f64> {
    lookup.value_f64(pointer?)
}

/// Static limits, only when both exist and form a proper range. Devices
/// report `0..0` for "no range".
fn static_range(param: &Parameter) -> Option<(f64, f64)> {
    match (param.minv, param.maxv) {
        (Some(min), Some(max)) if min < max => Some((min, max)),
        _ => None,
    }
}
