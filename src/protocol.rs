use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::types::{Alarm, ParamValue, Parameter, Snapshot};
use crate::Result;

pub const DEFAULT_PORT: u16 = 8000;

pub const PARAMETERS_PATH: &str = "/api/parameters";
pub const ALARMS_PATH: &str = "/api/alarms";

pub const DEVICE_UID_PARAM: &str = "10";
pub const DEVICE_NAME_PARAM: &str = "374";
pub const DEFAULT_DEVICE_NAME: &str = "ecoMAX360i";

/// Temperature reading the controller reports for a disconnected sensor.
pub const SENSOR_DISCONNECTED: f64 = 999.0;

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRef {
    Num(u64),
    Text(String),
}

fn id_ref<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<IdRef>::deserialize(d)?.map(|r| match r {
        IdRef::Num(n) => n.to_string(),
        IdRef::Text(s) => s,
    }))
}

#[derive(Deserialize)]
struct GatewayParameter {
    #[serde(default)]
    index: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<ParamValue>,
    #[serde(default, alias = "minv")]
    min: Option<f64>,
    #[serde(default, alias = "maxv")]
    max: Option<f64>,
    #[serde(default, rename = "minvDP", deserialize_with = "id_ref")]
    minv_dp: Option<String>,
    #[serde(default, rename = "maxvDP", deserialize_with = "id_ref")]
    maxv_dp: Option<String>,
    #[serde(default)]
    writable: Option<bool>,
    #[serde(default)]
    unit: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<Value>,
}

#[derive(Deserialize)]
struct AlarmsResponse {
    #[serde(default)]
    alarms: Vec<Alarm>,
}

pub fn parameter_path(name: &str) -> String {
    format!("{PARAMETERS_PATH}/{name}")
}

pub fn set_value_body(value: &ParamValue) -> Value {
    json!({ "value": value })
}

/// Parse a `/api/parameters` body into an id-keyed snapshot.
///
/// Accepts both `{"timestamp": .., "parameters": {..}}` and a bare map.
/// Entries keyed by name instead of index are re-keyed by their `index`.
pub fn parse_parameters_response(body: &str) -> Result<Snapshot> {
    let data: Value = serde_json::from_str(body)?;
    let timestamp = data
        .get("timestamp")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let raw = data.get("parameters").cloned().unwrap_or(data);
    let entries: HashMap<String, GatewayParameter> = serde_json::from_value(raw)?;

    let parameters = entries
        .into_iter()
        .map(|(key, entry)| {
            let keyed_by_index = key.parse::<u64>().is_ok();
            let id = match entry.index {
                Some(index) if !keyed_by_index => index.to_string(),
                _ => key.clone(),
            };
            let name = match entry.name {
                Some(name) => name,
                None if !keyed_by_index => key,
                None => String::new(),
            };
            let param = Parameter {
                id: id.clone(),
                name,
                value: entry.value,
                minv: entry.min,
                maxv: entry.max,
                minv_dp: entry.minv_dp,
                maxv_dp: entry.maxv_dp,
                writable: entry.writable.unwrap_or(false),
                unit: entry.unit,
                kind: entry.kind,
            };
            (id, param)
        })
        .collect();

    Ok(Snapshot {
        timestamp,
        parameters,
    })
}

pub fn parse_alarms_response(body: &str) -> Result<Vec<Alarm>> {
    let parsed: AlarmsResponse = serde_json::from_str(body)?;
    Ok(parsed.alarms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wrapped_parameters() {
        let body = r#"{"timestamp": "2026-02-06T12:00:00", "parameters": {
            "10": {"index": 10, "name": "UID", "value": "2L7SDPN6KQ38CIH2401K01U"},
            "288": {"index": 288, "name": "Circuit2ComfortTemp", "value": 21.5,
                    "min": 10.0, "max": 35.0, "writable": true, "type": 2, "unit": 1}
        }}"#;
        let snap = parse_parameters_response(body).unwrap();
        assert_eq!(snap.timestamp.as_deref(), Some("2026-02-06T12:00:00"));
        assert_eq!(snap.len(), 2);
        let comfort = snap.get("288").unwrap();
        assert_eq!(comfort.name, "Circuit2ComfortTemp");
        assert_eq!(comfort.value, Some(ParamValue::Float(21.5)));
        assert_eq!(comfort.minv, Some(10.0));
        assert_eq!(comfort.maxv, Some(35.0));
        assert!(comfort.writable);
        assert_eq!(
            snap.get("10").unwrap().value,
            Some(ParamValue::Text("2L7SDPN6KQ38CIH2401K01U".into()))
        );
    }

    #[test]
    fn parse_bare_map() {
        let body = r#"{"42": {"name": "TestParam", "value": 100}}"#;
        let snap = parse_parameters_response(body).unwrap();
        assert!(snap.timestamp.is_none());
        assert_eq!(snap.get("42").unwrap().value, Some(ParamValue::Int(100)));
        assert!(!snap.get("42").unwrap().writable);
    }

    #[test]
    fn name_keyed_entries_rekeyed_by_index() {
        let body = r#"{"parameters": {
            "ParamA": {"index": 10, "value": "test"},
            "ParamB": {"index": 20, "value": 42}
        }}"#;
        let snap = parse_parameters_response(body).unwrap();
        assert_eq!(snap.get("10").unwrap().name, "ParamA");
        assert_eq!(snap.get("20").unwrap().name, "ParamB");
        assert!(snap.get("ParamA").is_none());
    }

    #[test]
    fn dynamic_pointers_accept_numbers_and_strings() {
        let body = r#"{"parameters": {
            "903": {"name": "MinCool", "value": 18, "minvDP": 904, "maxvDP": "905"}
        }}"#;
        let snap = parse_parameters_response(body).unwrap();
        let p = snap.get("903").unwrap();
        assert_eq!(p.minv_dp.as_deref(), Some("904"));
        assert_eq!(p.maxv_dp.as_deref(), Some("905"));
    }

    #[test]
    fn integers_are_not_coerced_to_floats() {
        let body = r#"{"parameters": {"231": {"name": "Circuit1Settings", "value": 1179648}}}"#;
        let snap = parse_parameters_response(body).unwrap();
        assert_eq!(snap.get("231").unwrap().value, Some(ParamValue::Int(1179648)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_parameters_response("").is_err());
        assert!(parse_parameters_response(r#"{"parameters": [1, 2]}"#).is_err());
    }

    #[test]
    fn parse_alarms() {
        let body = r#"{"alarms": [
            {"index": 0, "code": 7, "from_date": "2026-02-06T10:00:00", "to_date": null},
            {"index": 1, "code": 3, "from_date": "2026-02-01T08:00:00", "to_date": "2026-02-01T09:30:00"}
        ]}"#;
        let alarms = parse_alarms_response(body).unwrap();
        assert_eq!(alarms.len(), 2);
        assert!(alarms[0].is_active());
        assert!(!alarms[1].is_active());
    }

    #[test]
    fn set_body_keeps_value_shape() {
        assert_eq!(set_value_body(&ParamValue::Int(45)), json!({"value": 45}));
        assert_eq!(set_value_body(&ParamValue::Float(22.5)), json!({"value": 22.5}));
        assert_eq!(parameter_path("dhwTarget"), "/api/parameters/dhwTarget");
    }
}
