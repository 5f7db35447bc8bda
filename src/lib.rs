//! Keeps an OBS instance and a set of thin browser clients in sync.
//!
//! The [`bridge::BridgeEngine`] polls OBS through a [`bridge::ControlLink`],
//! diffs against its snapshot and pushes only the changes to every attached
//! client through the [`broadcast::EventHub`]. Clients send scene and volume
//! commands back over the same WebSocket.

pub mod bridge;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod obs;
pub mod session;
pub mod web;

pub use bridge::{BridgeConfig, BridgeEngine, ConnectionState};
pub use broadcast::EventHub;
pub use config::{Config, ConfigError};
pub use error::{CallError, CommandError, ConnectError};
pub use events::{ClientEvent, ServerEvent};
