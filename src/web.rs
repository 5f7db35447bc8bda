use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::bridge::BridgeEngine;
use crate::config::Config;

/// Route prefix for files served out of the assets directory.
pub const ICONS_PREFIX: &str = "/custom_icons/";

/// Peeks allowed while waiting for a complete request head.
const PEEK_ATTEMPTS: usize = 20;

/// Control page. `__BRIDGE_CONFIG__` is replaced with the page config JSON.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Stream Controller</title>
<style>
  body { margin: 0; font-family: system-ui, sans-serif; background: #0d1117; color: #c9d1d9; }
  #wrap { display: flex; height: 100vh; }
  #scenes { display: grid; gap: 10px; padding: 12px; align-content: start; }
  #audio { flex: 1; padding: 12px; border-left: 1px solid #30363d; }
  .scene-btn { padding: 18px 8px; border: 2px solid #30363d; border-radius: 8px;
               background: #161b22; color: inherit; font-size: 1rem; cursor: pointer; }
  .scene-btn img { max-width: 48px; display: block; margin: 0 auto 6px; }
  .scene-btn.active { border-color: #f85149; background: #3d1d1d; }
  .fader { margin-bottom: 18px; }
  .fader input { width: 100%; }
  #status { position: fixed; top: 6px; right: 10px; font-size: .8rem; color: #8b949e; }
  #status.live { color: #3fb950; }
</style>
</head>
<body>
<div id="status">offline</div>
<div id="wrap">
  <div id="scenes"></div>
  <div id="audio"></div>
</div>
<script>
const CFG = __BRIDGE_CONFIG__;
const scenesEl = document.getElementById('scenes');
const audioEl = document.getElementById('audio');
const statusEl = document.getElementById('status');
const layout = CFG.layout || {};
scenesEl.style.width = (layout.scene_width_percent || 65) + '%';
scenesEl.style.gridTemplateColumns = 'repeat(' + (layout.grid_columns || 3) + ', 1fr)';

let ws = null;
const buttons = new Map();
const faders = new Map();

function send(event, data) {
  if (ws && ws.readyState === WebSocket.OPEN) ws.send(JSON.stringify({ event, data }));
}

(CFG.buttons || []).forEach(b => {
  const scene = b.scene || b.name || b.label;
  const el = document.createElement('button');
  el.className = 'scene-btn';
  if (b.icon) {
    const img = document.createElement('img');
    img.src = '/custom_icons/' + encodeURIComponent(b.icon);
    el.appendChild(img);
  }
  el.appendChild(document.createTextNode(b.label || scene));
  el.onclick = () => send('command_scene', { scene });
  scenesEl.appendChild(el);
  buttons.set(scene, el);
});

(CFG.audios || []).forEach(a => {
  const row = document.createElement('div');
  row.className = 'fader';
  const label = document.createElement('label');
  const value = document.createElement('span');
  label.textContent = a.name + ' ';
  label.appendChild(value);
  const input = document.createElement('input');
  input.type = 'range'; input.min = 0; input.max = 100; input.value = 0;
  input.oninput = () => { value.textContent = input.value + '%'; send('command_volume', { source: a.name, val: input.value }); };
  row.appendChild(label); row.appendChild(input);
  audioEl.appendChild(row);
  faders.set(a.name, { input, value });
});

function onEvent(msg) {
  if (msg.event === 'update_scene') {
    buttons.forEach((el, name) => el.classList.toggle('active', name === msg.data.scene));
  } else if (msg.event === 'update_volume') {
    const f = faders.get(msg.data.source);
    if (f && document.activeElement !== f.input) { f.input.value = msg.data.val; f.value.textContent = msg.data.val + '%'; }
  }
}

function connect() {
  ws = new WebSocket((location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '/ws');
  ws.onopen = () => { statusEl.textContent = 'live'; statusEl.className = 'live'; };
  ws.onmessage = e => { try { onEvent(JSON.parse(e.data)); } catch (_) {} };
  ws.onclose = () => { statusEl.textContent = 'offline'; statusEl.className = ''; setTimeout(connect, 1000); };
}
connect();
</script>
</body>
</html>"##;

/// Everything a connection handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BridgeEngine>,
    pub page: Arc<String>,
    pub assets_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(engine: Arc<BridgeEngine>, config: &Config, assets_dir: PathBuf) -> Self {
        Self {
            engine,
            page: Arc::new(render_index(config)),
            assets_dir: Arc::new(assets_dir),
        }
    }
}

/// Fill the page template with buttons, audio sources and layout.
pub fn render_index(config: &Config) -> String {
    let page_cfg = serde_json::json!({
        "buttons": config.buttons,
        "audios": config.audio_sources,
        "layout": config.ui_settings,
    });
    // Keep `</script>` inside string values from closing the script block.
    let json = page_cfg.to_string().replace("</", "<\\/");
    INDEX_HTML.replace("__BRIDGE_CONFIG__", &json)
}

/// Guess a Content-Type from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript",
        _ => "application/octet-stream",
    }
}

/// Map a request path under [`ICONS_PREFIX`] to a file inside `root`.
///
/// Returns `None` for anything that could leave `root`.
pub fn resolve_asset(root: &Path, request_path: &str) -> Option<PathBuf> {
    let rel = request_path.strip_prefix(ICONS_PREFIX)?;
    let rel = url_decode(rel);
    if rel.is_empty() {
        return None;
    }
    let rel = Path::new(&rel);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(rel))
}

/// Percent-decoding for URL path segments.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Best guess at this machine's LAN address, for the startup banner.
pub fn local_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|s| {
            s.connect("10.255.255.255:1")?;
            s.local_addr()
        })
        .map(|a| a.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, app: AppState) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let app = app.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, app).await {
                debug!(peer = %addr, error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    app: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Peek so a WebSocket upgrade can still be handed to tungstenite intact.
    let mut peek_buf = [0u8; 1024];
    let mut peek_n = 0;
    for _ in 0..PEEK_ATTEMPTS {
        peek_n = stream.peek(&mut peek_buf).await?;
        let head_done = peek_buf[..peek_n].windows(4).any(|w| w == b"\r\n\r\n");
        if peek_n == 0 || peek_n == peek_buf.len() || head_done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let peeked = String::from_utf8_lossy(&peek_buf[..peek_n]).to_ascii_lowercase();

    if peeked.contains("upgrade: websocket") {
        let path = peeked.split_whitespace().nth(1).unwrap_or("/").to_string();
        if path == "/ws" || path.starts_with("/ws?") {
            match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => crate::session::handle_ws(ws, app.engine).await,
                Err(e) => warn!(error = %e, "websocket handshake failed"),
            }
            return Ok(());
        }
    }

    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await?;

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut req = httparse::Request::new(&mut headers);
    let path = match req.parse(&buf[..n]) {
        Ok(_) => match (req.method, req.path) {
            (Some("GET"), Some(p)) => p.to_string(),
            _ => return write_status(&mut stream, "405 Method Not Allowed").await,
        },
        Err(_) => return write_status(&mut stream, "400 Bad Request").await,
    };
    let path = path.split('?').next().unwrap_or("/");

    match path {
        "/" | "/index.html" => {
            write_body(&mut stream, "text/html; charset=utf-8", app.page.as_bytes()).await?;
        }
        p if p.starts_with(ICONS_PREFIX) => {
            let Some(file) = resolve_asset(&app.assets_dir, p) else {
                return write_status(&mut stream, "404 Not Found").await;
            };
            match tokio::fs::read(&file).await {
                Ok(bytes) => write_body(&mut stream, content_type(&file), &bytes).await?,
                Err(_) => write_status(&mut stream, "404 Not Found").await?,
            }
        }
        _ => write_status(&mut stream, "404 Not Found").await?,
    }

    Ok(())
}

async fn write_body(
    stream: &mut TcpStream,
    content_type: &str,
    body: &[u8],
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        content_type,
        body.len(),
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    Ok(())
}

async fn write_status(
    stream: &mut TcpStream,
    status: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let body = status.split_once(' ').map(|(_, r)| r).unwrap_or(status);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}
