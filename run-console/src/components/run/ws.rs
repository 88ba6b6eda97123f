use std::cell::Cell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use web_sys::{CloseEvent, ErrorEvent, Event, MessageEvent, WebSocket};

// ── WebSocket event type ─────────────────────────────────────────────────────

pub enum RunWsEvent {
    Connected,
    Message(String),
    Error(String),
    Closed,
}

// ── WebSocket runtime ────────────────────────────────────────────────────────

/// Owns one live connection. Dropping the runtime detaches every callback
/// and closes the socket, so teardown and navigation cannot leak a
/// connection; `closing` suppresses the close callback a deliberate close
/// would otherwise fire.
pub struct RunWsRuntime {
    pub ws: WebSocket,
    pub closing: Rc<Cell<bool>>,
    pub _on_open: Closure<dyn FnMut(Event)>,
    pub _on_message: Closure<dyn FnMut(MessageEvent)>,
    pub _on_error: Closure<dyn FnMut(ErrorEvent)>,
    pub _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl Drop for RunWsRuntime {
    fn drop(&mut self) {
        self.closing.set(true);
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        let _ = self.ws.close();
    }
}

// ── URL helpers ──────────────────────────────────────────────────────────────

pub fn build_run_ws_url(run_id: &str) -> String {
    let ws_base = http_to_ws_url(crate::api::api_base());
    format!("{ws_base}/api/v1/ws/runs/{run_id}")
}

pub fn http_to_ws_url(http_url: &str) -> String {
    if http_url.starts_with("http://") {
        http_url.replace("http://", "ws://")
    } else if http_url.starts_with("https://") {
        http_url.replace("https://", "wss://")
    } else if http_url.is_empty() {
        let protocol = web_sys::window()
            .and_then(|window| window.location().protocol().ok())
            .unwrap_or_else(|| "http:".to_string());
        let host = web_sys::window()
            .and_then(|window| window.location().host().ok())
            .unwrap_or_else(|| "localhost".to_string());
        if protocol == "https:" {
            format!("wss://{host}")
        } else {
            format!("ws://{host}")
        }
    } else {
        format!("ws://{http_url}")
    }
}
