use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::diff::diff_parameters;
use crate::types::Snapshot;

pub enum MessageLogMode {
    /// Every snapshot is written in full.
    Full,
    /// First snapshot in full, then only changed parameter values.
    Diffed,
}

/// NDJSON trace of gateway traffic, one object per line.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    out: File,
    last_logged: Option<Snapshot>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let out = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            out,
            last_logged: None,
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str) {
        self.append("req", json!({ "method": method, "path": path }));
    }

    pub fn log_write(&mut self, id: &str, name: &str, body: &Value) {
        self.append("write", json!({ "id": id, "name": name, "body": body }));
    }

    pub fn log_snapshot(&mut self, status: u16, snapshot: &Snapshot) {
        let fields = match (&self.mode, self.last_logged.as_ref()) {
            (MessageLogMode::Diffed, Some(prev)) => {
                let changes: Vec<Value> = diff_parameters(prev, snapshot)
                    .into_iter()
                    .map(|c| json!({ "id": c.id, "old": c.old, "new": c.new }))
                    .collect();
                json!({ "status": status, "changes": changes })
            }
            (MessageLogMode::Diffed, None) => {
                json!({ "status": status, "full": true, "body": snapshot })
            }
            (MessageLogMode::Full, _) => json!({ "status": status, "body": snapshot }),
        };
        self.append("snapshot", fields);

        if let MessageLogMode::Diffed = self.mode {
            self.last_logged = Some(snapshot.clone());
        }
    }

    /// Stamp `fields` with time and direction and write them as one line.
    fn append(&mut self, dir: &str, fields: Value) {
        let mut entry = Map::new();
        entry.insert("ts".into(), Value::from(Utc::now().to_rfc3339()));
        entry.insert("dir".into(), Value::from(dir));
        if let Value::Object(fields) = fields {
            entry.extend(fields);
        }

        let line = Value::Object(entry).to_string();
        if let Err(e) = writeln!(self.out, "{line}") {
            warn!(error = %e, "failed to append message log entry");
        }
    }
}
