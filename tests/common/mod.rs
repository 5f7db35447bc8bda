//! In-memory control server shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use obs_scene_bridge::bridge::{BridgeEngine, ConnectTarget, Connector, ControlLink};
use obs_scene_bridge::error::{CallError, ConnectError};
use obs_scene_bridge::events::ServerEvent;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct FakeState {
    pub scene: String,
    pub volumes: HashMap<String, f64>,
    pub refuse_connect: bool,
    pub fail_scene: bool,
    pub hang_scene: bool,
    pub scene_delay: Duration,
    pub reject_commands: bool,
    pub failing_sources: HashSet<String>,
    pub connects: usize,
    pub set_scene_calls: Vec<String>,
    pub set_volume_calls: Vec<(String, f64)>,
    pub connect_times: Vec<Instant>,
    pub scene_query_times: Vec<Instant>,
}

/// Scriptable stand-in for OBS. Clones share state.
#[derive(Clone, Default)]
pub struct FakeObs {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeObs {
    pub fn new(scene: &str, volumes: &[(&str, f64)]) -> Self {
        let fake = Self::default();
        {
            let mut s = fake.state.lock().unwrap();
            s.scene = scene.to_string();
            for (name, mul) in volumes {
                s.volumes.insert(name.to_string(), *mul);
            }
        }
        fake
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

#[async_trait]
impl Connector for FakeObs {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn ControlLink>, ConnectError> {
        let refused = self.with(|s| {
            s.connects += 1;
            s.connect_times.push(Instant::now());
            s.refuse_connect
        });
        if refused {
            return Err(ConnectError::Network {
                url: target.url(),
                detail: "connection refused".into(),
            });
        }
        Ok(Box::new(FakeLink { obs: self.clone() }))
    }
}

pub struct FakeLink {
    obs: FakeObs,
}

#[async_trait]
impl ControlLink for FakeLink {
    async fn get_scene(&mut self) -> Result<String, CallError> {
        let (hang, fail, scene, delay) = self.obs.with(|s| {
            s.scene_query_times.push(Instant::now());
            (s.hang_scene, s.fail_scene, s.scene.clone(), s.scene_delay)
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if hang {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if fail {
            return Err(CallError::Closed);
        }
        Ok(scene)
    }

    async fn set_scene(&mut self, name: &str) -> Result<(), CallError> {
        self.obs.with(|s| {
            if s.reject_commands {
                return Err(CallError::Rejected {
                    request: "SetCurrentProgramScene".into(),
                    code: 600,
                    comment: "No source was found".into(),
                });
            }
            s.set_scene_calls.push(name.to_string());
            s.scene = name.to_string();
            Ok(())
        })
    }

    async fn get_volume(&mut self, source: &str) -> Result<f64, CallError> {
        self.obs.with(|s| {
            if s.failing_sources.contains(source) {
                return Err(CallError::Rejected {
                    request: "GetInputVolume".into(),
                    code: 600,
                    comment: format!("no input named {source}"),
                });
            }
            s.volumes
                .get(source)
                .copied()
                .ok_or_else(|| CallError::Protocol {
                    request: "GetInputVolume".into(),
                    detail: "unknown input".into(),
                })
        })
    }

    async fn set_volume(&mut self, source: &str, multiplier: f64) -> Result<(), CallError> {
        self.obs.with(|s| {
            if s.reject_commands {
                return Err(CallError::Rejected {
                    request: "SetInputVolume".into(),
                    code: 600,
                    comment: "No source was found".into(),
                });
            }
            s.set_volume_calls.push((source.to_string(), multiplier));
            s.volumes.insert(source.to_string(), multiplier);
            Ok(())
        })
    }
}

pub fn target() -> ConnectTarget {
    ConnectTarget {
        host: "localhost".into(),
        port: 4455,
        password: String::new(),
    }
}

/// Engine over `fake` with zero cooldown/interval and a short call timeout.
pub fn engine(fake: &FakeObs, sources: &[&str]) -> Arc<BridgeEngine> {
    Arc::new(
        BridgeEngine::builder(target(), Arc::new(fake.clone()))
            .sources(sources.iter().map(|s| s.to_string()).collect())
            .poll_interval(Duration::ZERO)
            .reconnect_cooldown(Duration::ZERO)
            .call_timeout(Duration::from_millis(100))
            .build(),
    )
}

/// Engine over `fake` with real cooldown and poll interval, for paused-clock tests.
pub fn timed_engine(fake: &FakeObs, cooldown: Duration, interval: Duration) -> Arc<BridgeEngine> {
    Arc::new(
        BridgeEngine::builder(target(), Arc::new(fake.clone()))
            .reconnect_cooldown(cooldown)
            .poll_interval(interval)
            .call_timeout(Duration::from_millis(100))
            .build(),
    )
}

/// Everything currently queued on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub fn scene_events(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::UpdateScene { scene } => Some(scene.clone()),
            _ => None,
        })
        .collect()
}
