use std::time::Duration;

use econext::{
    Error, GatewayClient, MessageLogMode, ParamValue, ParameterStore, Transport,
};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use wiremock::matchers::{body_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn parameters_body() -> Value {
    json!({
        "timestamp": "2025-01-05T12:00:00",
        "parameters": {
            "10": {"index": 10, "name": "uid", "value": "2L7SDPN6KQ38CIH2401K01U",
                   "min": 0, "max": 0, "writable": false, "type": 3, "unit": 0},
            "374": {"index": 374, "name": "DeviceName", "value": "ecoMAX360i",
                    "min": 0, "max": 0, "writable": false, "type": 3, "unit": 0},
            "281": {"index": 281, "name": "Circuit2Settings", "value": 1179648,
                    "min": 0, "max": 0, "writable": true, "type": 6, "unit": 0},
            "288": {"index": 288, "name": "Circuit2ComfortTemp", "value": 22.0,
                    "min": 10, "max": 35, "writable": true, "type": 7, "unit": 1},
            "92": {"index": 92, "name": "Circuit2RoomSetpoint", "value": 21.3,
                   "min": 0, "max": 0, "writable": false, "type": 7, "unit": 1}
        }
    })
}

async fn mount_parameters(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(parameters_body()))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> GatewayClient {
    let addr = server.address();
    GatewayClient::builder(addr.ip().to_string())
        .port(addr.port())
        .build()
        .expect("client should build")
}

async fn refreshed_store(server: &MockServer) -> ParameterStore<GatewayClient> {
    mount_parameters(server).await;
    let store = ParameterStore::new(client_for(server));
    store.refresh().await.expect("refresh should succeed");
    store
}

#[tokio::test]
async fn base_url_uses_protocol_host_and_port() {
    let client = GatewayClient::builder("192.168.1.50").build().unwrap();
    assert_eq!(client.base_url(), "http://192.168.1.50:8000");

    let client = GatewayClient::builder("gateway.local")
        .protocol("https")
        .port(8443)
        .build()
        .unwrap();
    assert_eq!(client.base_url(), "https://gateway.local:8443");
}

#[tokio::test]
async fn refresh_keeps_values_as_sent() {
    let server = MockServer::start().await;
    let store = refreshed_store(&server).await;

    assert_eq!(store.get_value("288"), Some(ParamValue::Float(22.0)));
    assert_eq!(store.get_value("281"), Some(ParamValue::Int(1179648)));
    assert_eq!(store.get_value("92"), Some(ParamValue::Float(21.3)));
    assert_eq!(
        store.get_value("10"),
        Some(ParamValue::Text("2L7SDPN6KQ38CIH2401K01U".to_string()))
    );

    let comfort = store.get("288").unwrap();
    assert_eq!(comfort.name, "Circuit2ComfortTemp");
    assert_eq!(comfort.minv, Some(10.0));
    assert!(comfort.writable);
    assert_eq!(store.device_uid(), "2L7SDPN6KQ38CIH2401K01U");
}

#[tokio::test]
async fn bare_parameter_map_is_accepted() {
    let server = MockServer::start().await;
    let body = parameters_body()["parameters"].clone();
    Mock::given(method("GET"))
        .and(path("/api/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let snapshot = client_for(&server).fetch_parameters().await.unwrap();
    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot.timestamp, None);
}

#[tokio::test]
async fn set_posts_value_by_name_and_patches_cache() {
    let server = MockServer::start().await;
    let store = refreshed_store(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/parameters/Circuit2ComfortTemp"))
        .and(body_json(json!({"value": 22.5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    store.set("288", 22.5).await.expect("write should succeed");

    assert_eq!(store.get_value("288"), Some(ParamValue::Float(22.5)));
}

#[tokio::test]
async fn integral_setpoint_is_posted_as_integer() {
    let server = MockServer::start().await;
    let store = refreshed_store(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/parameters/Circuit2ComfortTemp"))
        .and(body_json(json!({"value": 23})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    store
        .set_number("288", 23.0, econext::TEMPERATURE_BOUNDS)
        .await
        .unwrap();
    assert_eq!(store.get_value("288"), Some(ParamValue::Int(23)));
}

#[tokio::test]
async fn rejected_write_leaves_value_unchanged() {
    let server = MockServer::start().await;
    let store = refreshed_store(&server).await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/api/parameters/.+"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = store.set("288", 30.0).await.unwrap_err();

    match err {
        Error::Write { id, source } => {
            assert_eq!(id, "288");
            assert!(matches!(*source, Error::Status { status: 500, .. }));
        }
        other => panic!("expected Write, got {other:?}"),
    }
    assert_eq!(store.get_value("288"), Some(ParamValue::Float(22.0)));
}

#[tokio::test]
async fn unknown_id_sends_nothing() {
    let server = MockServer::start().await;
    let store = refreshed_store(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = store.set("4242", 1).await.unwrap_err();
    assert!(matches!(err, Error::UnknownParameter(_)));
}

#[tokio::test]
async fn nameless_parameter_cannot_be_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "parameters": {"42": {"index": 42, "value": 1, "writable": true}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = ParameterStore::new(client_for(&server));
    store.refresh().await.unwrap();
    let err = store.set("42", 0).await.unwrap_err();

    assert!(matches!(err, Error::MissingName(ref id) if id == "42"));
    assert_eq!(store.get_value("42"), Some(ParamValue::Int(1)));
}

#[tokio::test]
async fn failed_refresh_keeps_last_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(parameters_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/parameters"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = ParameterStore::new(client_for(&server));
    store.refresh().await.unwrap();
    let err = store.refresh().await.unwrap_err();

    match err {
        Error::Refresh(inner) => {
            assert!(matches!(*inner, Error::Status { status: 503, .. }))
        }
        other => panic!("expected Refresh, got {other:?}"),
    }
    assert_eq!(store.snapshot().len(), 5);
    assert_eq!(store.get_value("288"), Some(ParamValue::Float(22.0)));
}

#[tokio::test]
async fn garbage_body_is_a_refresh_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let store = ParameterStore::new(client_for(&server));
    let err = store.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Refresh(ref inner) if matches!(**inner, Error::Decode(_))));
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/parameters"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(parameters_body())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let addr = server.address();
    let client = GatewayClient::builder(addr.ip().to_string())
        .port(addr.port())
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = client.fetch_parameters().await.unwrap_err();
    assert!(matches!(err, Error::Http(ref e) if e.is_timeout()), "got {err:?}");
}

#[tokio::test]
async fn alarms_fetched_with_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alarms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alarms": [
                {"index": 0, "code": 1, "from_date": "2025-01-04T10:00:00", "to_date": null},
                {"index": 1, "code": 7, "from_date": "2025-01-02T08:00:00",
                 "to_date": "2025-01-02T09:30:00"}
            ]
        })))
        .mount(&server)
        .await;
    let store = refreshed_store(&server).await;

    assert_eq!(store.alarms().len(), 2);
    let active = store.active_alarms();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].code, 1);
    assert_eq!(store.latest_alarm().map(|a| a.code), Some(1));
}

#[tokio::test]
async fn missing_alarm_endpoint_does_not_fail_refresh() {
    let server = MockServer::start().await;
    let store = refreshed_store(&server).await;
    assert!(store.alarms().is_empty());
    assert!(store.latest_alarm().is_none());
}

#[tokio::test]
async fn test_connection_reports_device() {
    let server = MockServer::start().await;
    mount_parameters(&server).await;

    let info = client_for(&server).test_connection().await.unwrap();

    assert_eq!(info.uid, "2L7SDPN6KQ38CIH2401K01U");
    assert_eq!(info.name, "ecoMAX360i");
    assert_eq!(info.param_count, 5);
}

#[tokio::test]
async fn message_log_records_traffic() {
    let server = MockServer::start().await;
    mount_parameters(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/parameters/Circuit2ComfortTemp"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tmp = NamedTempFile::new().unwrap();
    let log_path = tmp.path().to_str().unwrap().to_string();
    let addr = server.address();
    let client = GatewayClient::builder(addr.ip().to_string())
        .port(addr.port())
        .message_log(MessageLogMode::Diffed, &log_path)
        .build()
        .unwrap();
    let store = ParameterStore::new(client);

    store.refresh().await.unwrap();
    store.set("288", 21.5).await.unwrap();
    store.refresh().await.unwrap();

    let lines: Vec<Value> = std::fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let dirs: Vec<&str> = lines.iter().map(|l| l["dir"].as_str().unwrap()).collect();
    assert_eq!(
        dirs,
        ["req", "snapshot", "req", "write", "req", "snapshot", "req"]
    );
    assert_eq!(lines[1]["full"], true);
    assert_eq!(lines[3]["body"]["value"], 21.5);
    // The mock still serves 22.0, so the second snapshot is identical.
    assert_eq!(lines[5]["changes"].as_array().unwrap().len(), 0);
}
