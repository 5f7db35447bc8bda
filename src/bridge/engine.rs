//! Bridge engine: connection state machine, poll/diff loop and command
//! handlers.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::link::{bounded, ConnectTarget, Connector, ControlLink};
use super::snapshot::{multiplier_to_percent, percent_to_multiplier, InitialState, Snapshot};
use crate::broadcast::EventHub;
use crate::error::{CallError, CommandError, ConnectError};
use crate::events::ServerEvent;

/// Observable connection state. There is no "connecting" state: connect
/// attempts happen synchronously inside a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Timing knobs for the engine.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Pause between poll cycles.
    pub poll_interval: Duration,
    /// Pause after every connect attempt, successful or not.
    pub reconnect_cooldown: Duration,
    /// Upper bound on a single connect or link call.
    pub call_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            reconnect_cooldown: Duration::from_secs(2),
            call_timeout: Duration::from_secs(3),
        }
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Connect attempt failed; the cooldown has already been slept.
    ConnectFailed,
    /// Scene query failed; the link was dropped.
    LinkLost,
    /// A full poll ran and emitted this many events.
    Polled { events: usize },
}

struct Shared {
    state: ConnectionState,
    snapshot: Snapshot,
}

/// Owns the link handle and the snapshot.
///
/// Share as `Arc<BridgeEngine>`: the poll loop and any number of client
/// sessions call into it concurrently. The link is locked per call, so a
/// command never waits for a whole poll cycle, only for the call in flight.
pub struct BridgeEngine {
    cfg: BridgeConfig,
    target: ConnectTarget,
    sources: Vec<String>,
    connector: Arc<dyn Connector>,
    link: Mutex<Option<Box<dyn ControlLink>>>,
    shared: RwLock<Shared>,
    hub: EventHub,
}

impl BridgeEngine {
    pub fn builder(target: ConnectTarget, connector: Arc<dyn Connector>) -> BridgeEngineBuilder {
        BridgeEngineBuilder::new(target, connector)
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.cfg
    }

    pub fn state(&self) -> ConnectionState {
        match self.shared.read() {
            Ok(g) => g.state,
            Err(poisoned) => poisoned.into_inner().state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Copy of the snapshot for a new attachment, or an empty state while
    /// disconnected.
    pub fn get_initial_state(&self) -> InitialState {
        let guard = match self.shared.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.state {
            ConnectionState::Connected => guard.snapshot.to_initial_state(&self.sources),
            ConnectionState::Disconnected => InitialState::default(),
        }
    }

    /// Spawn [`run`](Self::run) on the runtime. Abort the handle to stop it.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run().await })
    }

    /// Poll forever.
    pub async fn run(&self) {
        info!(
            url = %self.target.url(),
            sources = self.sources.len(),
            "bridge poll loop started"
        );
        loop {
            let outcome = self.poll_cycle().await;
            if outcome != CycleOutcome::ConnectFailed {
                tokio::time::sleep(self.cfg.poll_interval).await;
            }
        }
    }

    /// One pass of the reconcile loop.
    ///
    /// While disconnected this is a connect attempt followed by the
    /// cooldown; after a successful connect the poll continues in the same
    /// cycle. The scene is queried first and its failure drops the link;
    /// volume queries fail per source without touching the link.
    ///
    /// Each reading is diffed and broadcast before the link is released, so
    /// a command's update is never followed by an older reading.
    pub async fn poll_cycle(&self) -> CycleOutcome {
        if !self.link_present().await {
            match self.connect().await {
                Ok(link) => {
                    self.install(link).await;
                    tokio::time::sleep(self.cfg.reconnect_cooldown).await;
                }
                Err(e) => {
                    debug!(error = %e, url = %self.target.url(), "connect attempt failed");
                    tokio::time::sleep(self.cfg.reconnect_cooldown).await;
                    return CycleOutcome::ConnectFailed;
                }
            }
        }

        let mut events = 0;
        match self.poll_scene().await {
            Ok(true) => events += 1,
            Ok(false) => {}
            Err(e) => {
                self.demote(&e).await;
                return CycleOutcome::LinkLost;
            }
        }

        for source in &self.sources {
            match self.poll_volume(source).await {
                Ok(true) => events += 1,
                Ok(false) => {}
                Err(e) => {
                    debug!(source = %source, error = %e, "volume query failed, skipping source");
                }
            }
        }

        CycleOutcome::Polled { events }
    }

    /// Switch the program scene and broadcast it without waiting for the
    /// next poll. Failures are returned for logging only; the caller drops
    /// them and the next poll reasserts the real scene.
    pub async fn handle_scene_command(&self, name: &str) -> Result<(), CommandError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(CommandError::NotConnected)?;
        bounded("SetCurrentProgramScene", self.cfg.call_timeout, link.set_scene(name)).await?;
        self.write_snapshot(|s| s.observe_scene(name));
        self.hub.emit(ServerEvent::scene(name));
        Ok(())
    }

    /// Set a source's volume from a percent and broadcast it. Same drop
    /// policy as [`handle_scene_command`](Self::handle_scene_command).
    pub async fn handle_volume_command(&self, source: &str, percent: u8) -> Result<(), CommandError> {
        let multiplier = percent_to_multiplier(percent);
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(CommandError::NotConnected)?;
        bounded("SetInputVolume", self.cfg.call_timeout, link.set_volume(source, multiplier))
            .await?;
        let percent = u32::from(percent);
        self.write_snapshot(|s| s.observe_volume(source, percent));
        self.hub.emit(ServerEvent::volume(source, percent));
        Ok(())
    }

    async fn connect(&self) -> Result<Box<dyn ControlLink>, ConnectError> {
        match tokio::time::timeout(self.cfg.call_timeout, self.connector.connect(&self.target)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout(self.cfg.call_timeout)),
        }
    }

    async fn link_present(&self) -> bool {
        self.link.lock().await.is_some()
    }

    async fn install(&self, link: Box<dyn ControlLink>) {
        *self.link.lock().await = Some(link);
        self.with_shared(|sh| sh.state = ConnectionState::Connected);
        info!(url = %self.target.url(), "connected to control server");
    }

    /// Drop the link and forget the snapshot so the first cycle after a
    /// reconnect re-broadcasts everything.
    async fn demote(&self, cause: &CallError) {
        self.with_shared(|sh| {
            sh.state = ConnectionState::Disconnected;
            sh.snapshot.clear();
        });
        *self.link.lock().await = None;
        warn!(error = %cause, url = %self.target.url(), "lost control server, will reconnect");
    }

    /// Query the scene and broadcast it if it changed. Returns whether it did.
    async fn poll_scene(&self) -> Result<bool, CallError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(CallError::Closed)?;
        let scene = bounded("GetCurrentProgramScene", self.cfg.call_timeout, link.get_scene()).await?;
        let changed = self.write_snapshot(|s| s.observe_scene(&scene));
        if changed {
            self.hub.emit(ServerEvent::scene(scene));
        }
        Ok(changed)
    }

    async fn poll_volume(&self, source: &str) -> Result<bool, CallError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(CallError::Closed)?;
        let mul = bounded("GetInputVolume", self.cfg.call_timeout, link.get_volume(source)).await?;
        let percent = multiplier_to_percent(mul);
        let changed = self.write_snapshot(|s| s.observe_volume(source, percent));
        if changed {
            self.hub.emit(ServerEvent::volume(source, percent));
        }
        Ok(changed)
    }

    fn write_snapshot<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        self.with_shared(|sh| f(&mut sh.snapshot))
    }

    fn with_shared<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        let mut guard = match self.shared.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

/// Builder for [`BridgeEngine`].
pub struct BridgeEngineBuilder {
    cfg: BridgeConfig,
    target: ConnectTarget,
    connector: Arc<dyn Connector>,
    sources: Vec<String>,
    hub: Option<EventHub>,
}

impl BridgeEngineBuilder {
    pub fn new(target: ConnectTarget, connector: Arc<dyn Connector>) -> Self {
        Self {
            cfg: BridgeConfig::default(),
            target,
            connector,
            sources: Vec::new(),
            hub: None,
        }
    }

    /// Volume sources to track, in replay order.
    pub fn sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// Fan-out hub to emit into. A fresh one is created if not set.
    pub fn hub(mut self, hub: EventHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn config(mut self, cfg: BridgeConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.cfg.poll_interval = interval;
        self
    }

    pub fn reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.cfg.reconnect_cooldown = cooldown;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.call_timeout = timeout;
        self
    }

    pub fn build(self) -> BridgeEngine {
        BridgeEngine {
            cfg: self.cfg,
            target: self.target,
            sources: self.sources,
            connector: self.connector,
            link: Mutex::new(None),
            shared: RwLock::new(Shared {
                state: ConnectionState::Disconnected,
                snapshot: Snapshot::default(),
            }),
            hub: self.hub.unwrap_or_default(),
        }
    }
}
