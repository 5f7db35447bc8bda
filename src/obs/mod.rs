//! Control link backed by the obs-websocket v5 protocol.
//!
//! Only four requests are used: `GetCurrentProgramScene`,
//! `SetCurrentProgramScene`, `GetInputVolume` and `SetInputVolume`. Event
//! subscriptions are switched off; the bridge polls.

pub mod client;
pub mod protocol;

pub use client::{ObsConnector, ObsSession};
