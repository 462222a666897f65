use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    parameter_path, parse_alarms_response, parse_parameters_response, set_value_body, ALARMS_PATH,
    DEFAULT_DEVICE_NAME, DEFAULT_PORT, DEVICE_NAME_PARAM, DEVICE_UID_PARAM, PARAMETERS_PATH,
};
use crate::transport::Transport;
use crate::types::*;
use crate::{Error, Result};

/// Upper bound for a single gateway round-trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GatewayClientBuilder {
    host: String,
    port: u16,
    protocol: String,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl GatewayClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            protocol: "http".to_string(),
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<GatewayClient> {
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(GatewayClient {
            http,
            base_url: format!("{}://{}:{}", self.protocol, self.host, self.port),
            logger,
        })
    }
}

/// HTTP client for the econext gateway's REST API.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    logger: Option<Mutex<MessageLogger>>,
}

impl GatewayClient {
    pub fn builder(host: impl Into<String>) -> GatewayClientBuilder {
        GatewayClientBuilder::new(host)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the register map once and report who answered.
    pub async fn test_connection(&self) -> Result<DeviceInfo> {
        let snapshot = self.fetch_parameters().await?;
        let text_of = |id: &str| {
            snapshot
                .get(id)
                .and_then(|p| p.value.as_ref())
                .map(|v| v.to_string())
        };
        Ok(DeviceInfo {
            uid: text_of(DEVICE_UID_PARAM).unwrap_or_else(|| "unknown".to_string()),
            name: text_of(DEVICE_NAME_PARAM).unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            param_count: snapshot.len(),
        })
    }

    fn with_logger(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(ref logger) = self.logger {
            f(&mut logger.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }

    async fn get_body(&self, path: &str) -> Result<(u16, String)> {
        let url = format!("{}{}", self.base_url, path);
        self.with_logger(|l| l.log_request("GET", path));

        let resp = self.http.get(&url).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            debug!(path, status, "gateway rejected request");
            return Err(Error::Status {
                endpoint: path.to_string(),
                status,
            });
        }
        Ok((status, resp.text().await?))
    }
}

impl Transport for GatewayClient {
    async fn fetch_parameters(&self) -> Result<Snapshot> {
        let (status, body) = self.get_body(PARAMETERS_PATH).await?;
        let snapshot = parse_parameters_response(&body)?;
        self.with_logger(|l| l.log_snapshot(status, &snapshot));
        debug!(count = snapshot.len(), "fetched parameters from gateway");
        Ok(snapshot)
    }

    async fn write_parameter(&self, param: &Parameter, value: &ParamValue) -> Result<()> {
        if param.name.is_empty() {
            return Err(Error::MissingName(param.id.clone()));
        }
        let path = parameter_path(&param.name);
        let url = format!("{}{}", self.base_url, path);
        let body = set_value_body(value);
        self.with_logger(|l| l.log_write(&param.id, &param.name, &body));

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::Status {
                endpoint: path,
                status,
            });
        }
        debug!(id = %param.id, name = %param.name, %value, "parameter written");
        Ok(())
    }

    async fn fetch_alarms(&self) -> Result<Vec<Alarm>> {
        let (_, body) = self.get_body(ALARMS_PATH).await?;
        let alarms = parse_alarms_response(&body)?;
        trace!(count = alarms.len(), "fetched alarms from gateway");
        Ok(alarms)
    }
}
