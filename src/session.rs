//! Client session handling: one task per attached browser.
//!
//! ## Lifecycle
//! 1. Client upgrades to WebSocket and is attached to the event hub.
//! 2. The bridge's initial state is replayed to this client only:
//!    `update_scene` first, then one `update_volume` per known source.
//! 3. From then on, hub events are forwarded and inbound commands are
//!    dispatched to the engine. Nothing is acknowledged back.
//! 4. On close or error the attachment is dropped.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info};

use crate::bridge::{BridgeEngine, InitialState};
use crate::error::CommandError;
use crate::events::{ClientEvent, ServerEvent};

/// Events a new attachment is sent, in order.
pub fn replay_events(state: &InitialState) -> Vec<ServerEvent> {
    let mut events = Vec::with_capacity(state.volumes.len() + 1);
    if let Some(scene) = &state.scene {
        events.push(ServerEvent::scene(scene.clone()));
    }
    for (source, val) in &state.volumes {
        events.push(ServerEvent::volume(source.clone(), *val));
    }
    events
}

/// Forward one client command to the engine.
pub async fn dispatch(engine: &BridgeEngine, event: ClientEvent) -> Result<(), CommandError> {
    match event {
        ClientEvent::CommandScene { scene } => engine.handle_scene_command(&scene).await,
        ClientEvent::CommandVolume { source, val } => {
            let percent = val.to_percent()?;
            engine.handle_volume_command(&source, percent).await
        }
    }
}

/// Drive one attached client until it disconnects.
pub async fn handle_ws<S>(ws: WebSocketStream<S>, engine: Arc<BridgeEngine>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client_id = uuid::Uuid::new_v4();
    // Attach before reading the snapshot so no change slips between the two.
    let mut updates = BroadcastStream::new(engine.hub().attach());
    let (mut sink, mut inbound) = ws.split();

    info!(client = %client_id, attached = engine.hub().attached(), "client attached");

    for event in replay_events(&engine.get_initial_state()) {
        if send_event(&mut sink, &event).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            msg = inbound.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let event = match ClientEvent::parse(&text) {
                            Ok(ev) => ev,
                            Err(e) => {
                                debug!(client = %client_id, error = %e, "ignoring malformed client frame");
                                continue;
                            }
                        };
                        if let Err(e) = dispatch(&engine, event).await {
                            debug!(client = %client_id, error = %e, "command dropped");
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }

            update = updates.next() => {
                match update {
                    Some(Ok(event)) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                        debug!(client = %client_id, missed, "client lagging, events skipped");
                    }
                    None => break,
                }
            }
        }
    }

    info!(client = %client_id, "client detached");
}

async fn send_event<K>(sink: &mut K, event: &ServerEvent) -> Result<(), ()>
where
    K: Sink<WsMessage> + Unpin,
{
    let text = event.to_json().map_err(|_| ())?;
    sink.send(WsMessage::Text(text)).await.map_err(|_| ())
}
