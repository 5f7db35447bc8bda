//! obs-websocket v5 message shapes.
//!
//! Every frame is `{"op": <opcode>, "d": {...}}`. Only the opcodes needed
//! for a request/response session are modelled here.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const OP_HELLO: u8 = 0;
pub const OP_IDENTIFY: u8 = 1;
pub const OP_IDENTIFIED: u8 = 2;
pub const OP_REQUEST: u8 = 6;
pub const OP_REQUEST_RESPONSE: u8 = 7;

pub const RPC_VERSION: u32 = 1;

/// WebSocket close code OBS sends for a bad password.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// Any frame, before its payload is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub op: u8,
    pub d: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    /// Zero: the bridge polls and never subscribes to events.
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<'a> {
    pub request_type: &'a str,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
pub fn auth_response(password: &str, challenge: &AuthChallenge) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{password}{}", challenge.salt)));
    BASE64.encode(Sha256::digest(format!("{secret}{}", challenge.challenge)))
}

pub fn envelope<T: Serialize>(op: u8, payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        op,
        d: serde_json::to_value(payload)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> AuthChallenge {
        AuthChallenge {
            challenge: "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=".into(),
            salt: "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=".into(),
        }
    }

    #[test]
    fn test_auth_response_is_base64_sha256() {
        let auth = auth_response("supersecret", &challenge());
        assert_eq!(auth.len(), 44);
        assert_eq!(BASE64.decode(&auth).unwrap().len(), 32);
    }

    #[test]
    fn test_auth_response_known_answer() {
        // Computed with sha256sum and base64 from coreutils.
        assert_eq!(
            auth_response("supersecret", &challenge()),
            "sQBlPUYd9mki/3XVFBp4Pt08FCMWdMVIqnFWdEitUME="
        );
    }

    #[test]
    fn test_auth_response_depends_on_password() {
        assert_eq!(
            auth_response("a", &challenge()),
            auth_response("a", &challenge())
        );
        assert_ne!(
            auth_response("a", &challenge()),
            auth_response("b", &challenge())
        );
    }

    #[test]
    fn test_hello_with_auth_parses() {
        let env: Envelope = serde_json::from_str(
            r#"{"op":0,"d":{"obsWebSocketVersion":"5.1.0","rpcVersion":1,
                "authentication":{"challenge":"c","salt":"s"}}}"#,
        )
        .unwrap();
        assert_eq!(env.op, OP_HELLO);
        let hello: Hello = serde_json::from_value(env.d).unwrap();
        assert_eq!(hello.rpc_version, 1);
        let auth = hello.authentication.unwrap();
        assert_eq!(auth.challenge, "c");
        assert_eq!(auth.salt, "s");
    }

    #[test]
    fn test_identify_without_auth_omits_field() {
        let text = envelope(
            OP_IDENTIFY,
            &Identify {
                rpc_version: RPC_VERSION,
                authentication: None,
                event_subscriptions: 0,
            },
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["op"], 1);
        assert_eq!(v["d"]["rpcVersion"], 1);
        assert_eq!(v["d"]["eventSubscriptions"], 0);
        assert!(v["d"].get("authentication").is_none());
    }

    #[test]
    fn test_request_shape() {
        let text = envelope(
            OP_REQUEST,
            &Request {
                request_type: "GetInputVolume",
                request_id: "abc".into(),
                request_data: Some(serde_json::json!({"inputName": "Mic"})),
            },
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["op"], 6);
        assert_eq!(v["d"]["requestType"], "GetInputVolume");
        assert_eq!(v["d"]["requestId"], "abc");
        assert_eq!(v["d"]["requestData"]["inputName"], "Mic");
    }

    #[test]
    fn test_failed_response_parses_without_data() {
        let resp: RequestResponse = serde_json::from_str(
            r#"{"requestType":"GetInputVolume","requestId":"x",
                "requestStatus":{"result":false,"code":600,"comment":"No source was found"}}"#,
        )
        .unwrap();
        assert!(!resp.request_status.result);
        assert_eq!(resp.request_status.code, 600);
        assert!(resp.response_data.is_none());
    }
}
