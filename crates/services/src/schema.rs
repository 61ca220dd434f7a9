//! Versioned document loader.
//!
//! Persisted documents are wrapped as `{"schema_version": N, "data": ...}`.
//! Anything without that envelope is treated as version 0. Loading runs
//! the upgrade steps from the detected version up to the current one, in
//! order, so every legacy shape goes through the same chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored schema version {found} is newer than supported version {current}")]
    UnsupportedVersion { found: u32, current: u32 },

    #[error("cannot upgrade schema v{from}: {reason}")]
    Malformed { from: u32, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub schema_version: u32,
    pub data: T,
}

/// One upgrade step: takes data at version `n`, returns data at `n + 1`.
pub type Upgrade = fn(Value) -> Result<Value, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub data: Value,
    /// Version the document was stored with.
    pub from_version: u32,
}

impl Loaded {
    pub fn migrated(&self, current: u32) -> bool {
        self.from_version != current
    }
}

pub struct SchemaLoader {
    steps: Vec<Upgrade>,
}

impl SchemaLoader {
    /// `steps[n]` upgrades version `n` to `n + 1`; the current version is
    /// `steps.len()`.
    pub fn new(steps: Vec<Upgrade>) -> Self {
        Self { steps }
    }

    pub fn current_version(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn load(&self, raw: &str) -> Result<Loaded, SchemaError> {
        let value: Value = serde_json::from_str(raw)?;
        self.upgrade(value)
    }

    pub fn upgrade(&self, value: Value) -> Result<Loaded, SchemaError> {
        let current = self.current_version();
        let (from_version, mut data) = detect_version(value);
        if from_version > current {
            return Err(SchemaError::UnsupportedVersion {
                found: from_version,
                current,
            });
        }
        for (version, step) in self.steps.iter().enumerate().skip(from_version as usize) {
            data = step(data).map_err(|reason| SchemaError::Malformed {
                from: version as u32,
                reason,
            })?;
        }
        if from_version != current {
            tracing::info!(from_version, to_version = current, "upgraded stored document");
        }
        Ok(Loaded { data, from_version })
    }

    pub fn wrap<T: Serialize>(&self, data: &T) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Envelope {
            schema_version: self.current_version(),
            data,
        })
    }
}

fn detect_version(value: Value) -> (u32, Value) {
    if let Value::Object(mut map) = value {
        let version = map
            .get("schema_version")
            .and_then(Value::as_u64)
            .filter(|_| map.contains_key("data"));
        if let Some(version) = version {
            let data = map.remove("data").unwrap_or(Value::Null);
            return (version as u32, data);
        }
        return (0, Value::Object(map));
    }
    (0, value)
}
