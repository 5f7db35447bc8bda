//! Client-facing event types.
//!
//! Every WebSocket text frame is one JSON envelope of the form
//! `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UpdateScene { scene: String },
    UpdateVolume { source: String, val: u32 },
}

impl ServerEvent {
    pub fn scene(scene: impl Into<String>) -> Self {
        ServerEvent::UpdateScene {
            scene: scene.into(),
        }
    }

    pub fn volume(source: impl Into<String>, val: u32) -> Self {
        ServerEvent::UpdateVolume {
            source: source.into(),
            val,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    CommandScene { scene: String },
    CommandVolume { source: String, val: VolumeValue },
}

/// The `val` of a volume command as browsers send it: a number or a
/// numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VolumeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl VolumeValue {
    /// Coerce to a percent in 0–100. Fractions truncate toward zero,
    /// out-of-range values clamp.
    pub fn to_percent(&self) -> Result<u8, CommandError> {
        let raw = match self {
            VolumeValue::Int(n) => *n as f64,
            VolumeValue::Float(f) => *f,
            VolumeValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CommandError::InvalidValue(s.clone()))?,
        };
        if !raw.is_finite() {
            return Err(CommandError::InvalidValue(format!("{raw}")));
        }
        Ok(raw.trunc().clamp(0.0, 100.0) as u8)
    }
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
