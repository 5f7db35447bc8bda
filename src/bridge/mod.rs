//! # Bridge
//!
//! Keeps the control server and every attached web client eventually
//! consistent.
//!
//! ## What It Does
//!
//! 1. **Poll/diff**: on a fixed interval, queries the current scene and each
//!    configured source's volume, compares against the [`Snapshot`] and emits
//!    only the changes through the [`EventHub`](crate::broadcast::EventHub).
//! 2. **Reconnect**: any scene-query failure drops the link; the next cycle
//!    reconnects after a cooldown.
//! 3. **Commands**: client scene/volume commands are forwarded to the link
//!    and, on success, broadcast immediately.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = Arc::new(
//!     BridgeEngine::builder(target, Arc::new(ObsConnector))
//!         .sources(config.source_names())
//!         .build(),
//! );
//! let poll = engine.spawn();
//! ```

pub mod engine;
pub mod link;
pub mod snapshot;

pub use engine::{BridgeConfig, BridgeEngine, BridgeEngineBuilder, ConnectionState, CycleOutcome};
pub use link::{ConnectTarget, Connector, ControlLink};
pub use snapshot::{multiplier_to_percent, percent_to_multiplier, InitialState, Snapshot};
