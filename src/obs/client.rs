//! WebSocket session with an OBS instance.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::protocol::{
    auth_response, envelope, Envelope, Hello, Identify, Request, RequestResponse,
    CLOSE_AUTHENTICATION_FAILED, OP_HELLO, OP_IDENTIFIED, OP_IDENTIFY, OP_REQUEST,
    OP_REQUEST_RESPONSE, RPC_VERSION,
};
use crate::bridge::link::{ConnectTarget, Connector, ControlLink};
use crate::error::{CallError, ConnectError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens [`ObsSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObsConnector;

#[async_trait]
impl Connector for ObsConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn ControlLink>, ConnectError> {
        let session = ObsSession::open(target).await?;
        Ok(Box::new(session))
    }
}

/// An identified obs-websocket session.
pub struct ObsSession {
    ws: WsStream,
}

/// How a handshake read ended when it did not yield a frame.
enum Interrupted {
    Closed(Option<u16>),
    Transport(String),
}

impl ObsSession {
    /// Connect, answer the `Hello` and wait for `Identified`.
    pub async fn open(target: &ConnectTarget) -> Result<Self, ConnectError> {
        let url = target.url();
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ConnectError::Network {
                url: url.clone(),
                detail: e.to_string(),
            })?;
        let mut session = Self { ws };

        let hello_env = session.handshake_frame(&url).await?;
        if hello_env.op != OP_HELLO {
            return Err(ConnectError::Handshake {
                url,
                detail: format!("expected Hello, got op {}", hello_env.op),
            });
        }
        let hello: Hello = serde_json::from_value(hello_env.d).map_err(|e| ConnectError::Handshake {
            url: url.clone(),
            detail: e.to_string(),
        })?;
        debug!(
            version = hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
            rpc = hello.rpc_version,
            auth = hello.authentication.is_some(),
            "obs hello"
        );

        let identify = Identify {
            rpc_version: RPC_VERSION,
            authentication: hello
                .authentication
                .as_ref()
                .map(|c| auth_response(&target.password, c)),
            event_subscriptions: 0,
        };
        let text = envelope(OP_IDENTIFY, &identify).map_err(|e| ConnectError::Handshake {
            url: url.clone(),
            detail: e.to_string(),
        })?;
        session
            .ws
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| ConnectError::Network {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let identified = session.handshake_frame(&url).await?;
        if identified.op != OP_IDENTIFIED {
            return Err(ConnectError::Handshake {
                url,
                detail: format!("expected Identified, got op {}", identified.op),
            });
        }
        Ok(session)
    }

    async fn handshake_frame(&mut self, url: &str) -> Result<Envelope, ConnectError> {
        match self.next_envelope().await {
            Ok(env) => Ok(env),
            Err(Interrupted::Closed(Some(CLOSE_AUTHENTICATION_FAILED))) => {
                Err(ConnectError::Auth { url: url.to_string() })
            }
            Err(Interrupted::Closed(code)) => Err(ConnectError::Handshake {
                url: url.to_string(),
                detail: format!("closed during handshake (code {code:?})"),
            }),
            Err(Interrupted::Transport(detail)) => Err(ConnectError::Network {
                url: url.to_string(),
                detail,
            }),
        }
    }

    /// Next JSON frame; control frames and non-JSON text are skipped.
    async fn next_envelope(&mut self) -> Result<Envelope, Interrupted> {
        loop {
            match self.ws.next().await {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<Envelope>(&text) {
                    Ok(env) => return Ok(env),
                    Err(e) => debug!(error = %e, "skipping unparseable obs frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    return Err(Interrupted::Closed(frame.map(|f| u16::from(f.code))));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Interrupted::Transport(e.to_string())),
                None => return Err(Interrupted::Closed(None)),
            }
        }
    }

    /// Send one request and wait for its response; other frames are skipped.
    async fn request(
        &mut self,
        request_type: &'static str,
        data: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, CallError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let text = envelope(
            OP_REQUEST,
            &Request {
                request_type,
                request_id: request_id.clone(),
                request_data: data,
            },
        )
        .map_err(|e| CallError::Protocol {
            request: request_type.to_string(),
            detail: e.to_string(),
        })?;
        self.ws
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        loop {
            let env = match self.next_envelope().await {
                Ok(env) => env,
                Err(Interrupted::Closed(_)) => return Err(CallError::Closed),
                Err(Interrupted::Transport(detail)) => return Err(CallError::Transport(detail)),
            };
            if env.op != OP_REQUEST_RESPONSE {
                continue;
            }
            let resp: RequestResponse =
                serde_json::from_value(env.d).map_err(|e| CallError::Protocol {
                    request: request_type.to_string(),
                    detail: e.to_string(),
                })?;
            if resp.request_id != request_id {
                continue;
            }
            if !resp.request_status.result {
                return Err(CallError::Rejected {
                    request: resp.request_type,
                    code: resp.request_status.code,
                    comment: resp.request_status.comment.unwrap_or_default(),
                });
            }
            return Ok(resp.response_data);
        }
    }

    async fn query<T: DeserializeOwned>(
        &mut self,
        request_type: &'static str,
        data: Option<serde_json::Value>,
    ) -> Result<T, CallError> {
        let body = self.request(request_type, data).await?.ok_or_else(|| CallError::Protocol {
            request: request_type.to_string(),
            detail: "missing responseData".into(),
        })?;
        serde_json::from_value(body).map_err(|e| CallError::Protocol {
            request: request_type.to_string(),
            detail: e.to_string(),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramScene {
    current_program_scene_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputVolume {
    input_volume_mul: f64,
}

#[async_trait]
impl ControlLink for ObsSession {
    async fn get_scene(&mut self) -> Result<String, CallError> {
        let scene: ProgramScene = self.query("GetCurrentProgramScene", None).await?;
        Ok(scene.current_program_scene_name)
    }

    async fn set_scene(&mut self, name: &str) -> Result<(), CallError> {
        self.request(
            "SetCurrentProgramScene",
            Some(serde_json::json!({ "sceneName": name })),
        )
        .await
        .map(|_| ())
    }

    async fn get_volume(&mut self, source: &str) -> Result<f64, CallError> {
        let vol: InputVolume = self
            .query(
                "GetInputVolume",
                Some(serde_json::json!({ "inputName": source })),
            )
            .await?;
        Ok(vol.input_volume_mul)
    }

    async fn set_volume(&mut self, source: &str, multiplier: f64) -> Result<(), CallError> {
        self.request(
            "SetInputVolume",
            Some(serde_json::json!({ "inputName": source, "inputVolumeMul": multiplier })),
        )
        .await
        .map(|_| ())
    }
}
