//! Run Page
//!
//! Dashboard view for one orchestration run: loads the REST snapshot
//! (session, turn, run metadata, persisted outputs and diffs), then keeps
//! the per-variation output lanes live over the run WebSocket. All
//! reconciliation state lives in [`RunSyncState`]; this module wires it to
//! the transports and projects it into markup.

pub mod stream;
pub mod sync;
pub mod ws;

pub use stream::{decode_stream_event, StreamEvent};
pub use sync::{DiffPanel, OutputEntry, RunSyncState, StreamPhase, SyncAction};

use dioxus::prelude::*;
use dioxus_logger::tracing;
use futures_util::future::{join3, join_all};
use gloo_timers::future::TimeoutFuture;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, ErrorEvent, Event, MessageEvent, WebSocket};

use crate::api::{fetch_run, fetch_run_diffs, fetch_run_outputs, fetch_session, fetch_turn};
use crate::components::diff::{DiffMode, DiffTheme, DiffViewOptions, DiffViewer};
use shared_types::{Run, RunStatus, Session, Turn};
use ws::{build_run_ws_url, RunWsEvent, RunWsRuntime};

// ── Tabs ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunTab {
    Variation(u32),
    Results,
    Config,
}

// ── WebSocket event queue ────────────────────────────────────────────────────

type RunWsQueue = Rc<RefCell<VecDeque<RunWsEvent>>>;

fn enqueue_run_ws_event(queue: &RunWsQueue, event: RunWsEvent) {
    if let Ok(mut pending) = queue.try_borrow_mut() {
        pending.push_back(event);
        return;
    }

    let queue = queue.clone();
    spawn(async move {
        let mut deferred = Some(event);
        for _ in 0..3 {
            TimeoutFuture::new(1).await;
            if let Ok(mut pending) = queue.try_borrow_mut() {
                if let Some(event) = deferred.take() {
                    pending.push_back(event);
                }
                return;
            }
        }
        tracing::warn!("RunPage websocket queue busy; dropping event");
    });
}

// ── Async helpers ────────────────────────────────────────────────────────────

/// Best-effort load of persisted outputs. The backend may not have written
/// anything yet; that is not an error, the log just stays empty.
async fn load_existing_outputs(run_id: String, mut sync: Signal<RunSyncState>) {
    match fetch_run_outputs(&run_id, "llm").await {
        Ok(outputs) => {
            let count = outputs.len();
            sync.write().replace_outputs(outputs);
            tracing::info!("loaded {count} existing outputs");
        }
        Err(e) => {
            tracing::debug!("existing outputs not available yet: {e}");
        }
    }
}

/// Probe every variation for persisted diffs. Fan-out collects each lane's
/// outcome independently; one lane failing must not touch its siblings.
async fn load_existing_diffs(run_id: String, variations: u32, mut sync: Signal<RunSyncState>) {
    let fetches = (0..variations).map(|variation_id| {
        let run_id = run_id.clone();
        async move { (variation_id, fetch_run_diffs(&run_id, variation_id).await) }
    });

    for (variation_id, result) in join_all(fetches).await {
        match result {
            Ok(diffs) if !diffs.is_empty() => sync.write().store_diffs(variation_id, diffs),
            Ok(_) => {}
            Err(e) => tracing::debug!("diffs not ready for variation {variation_id}: {e}"),
        }
    }
}

/// On-demand diff fetch triggered by a readiness event. Replaces the stored
/// set on success; failure leaves prior state untouched.
fn spawn_diff_fetch(run_id: String, variation_id: u32, mut sync: Signal<RunSyncState>) {
    spawn(async move {
        match fetch_run_diffs(&run_id, variation_id).await {
            Ok(diffs) => sync.write().store_diffs(variation_id, diffs),
            Err(e) => tracing::debug!("diff fetch failed for variation {variation_id}: {e}"),
        }
    });
}

fn status_badge_style(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => {
            "font-size: 0.75rem; padding: 0.125rem 0.5rem; border-radius: 0.75rem; background: rgba(22, 163, 74, 0.15); color: #4ade80;"
        }
        RunStatus::Failed => {
            "font-size: 0.75rem; padding: 0.125rem 0.5rem; border-radius: 0.75rem; background: rgba(220, 38, 38, 0.15); color: #f87171;"
        }
        RunStatus::Running => {
            "font-size: 0.75rem; padding: 0.125rem 0.5rem; border-radius: 0.75rem; background: rgba(59, 130, 246, 0.15); color: #60a5fa;"
        }
        RunStatus::Pending | RunStatus::Unknown => {
            "font-size: 0.75rem; padding: 0.125rem 0.5rem; border-radius: 0.75rem; border: 1px solid #374151; color: #9ca3af;"
        }
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Unknown => "unknown",
    }
}

fn pretty_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ── Component ────────────────────────────────────────────────────────────────

#[component]
pub fn RunPage(session_id: String, turn_id: String, run_id: String) -> Element {
    let mut session = use_signal(|| None::<Session>);
    let mut turn = use_signal(|| None::<Turn>);
    let mut run = use_signal(|| None::<Run>);
    let mut loading = use_signal(|| true);
    let mut error = use_signal(|| None::<String>);
    let mut sync = use_signal(|| RunSyncState::new(run_id.clone()));
    let mut selected_tab = use_signal(|| RunTab::Variation(0));
    let mut ws_runtime = use_signal(|| None::<RunWsRuntime>);
    let ws_event_queue = use_hook(|| Rc::new(RefCell::new(VecDeque::<RunWsEvent>::new())));
    let mut ws_event_pump_started = use_signal(|| false);
    let ws_event_pump_alive = use_hook(|| Rc::new(Cell::new(true)));
    let mut snapshot_started = use_signal(|| false);

    // Cleanup on unmount: stop the pump and close any live socket.
    {
        let ws_event_pump_alive = ws_event_pump_alive.clone();
        use_drop(move || {
            ws_event_pump_alive.set(false);
            if let Some(runtime) = ws_runtime.write().take() {
                runtime.closing.set(true);
                let _ = runtime.ws.close();
            }
        });
    }

    // Snapshot load: session, turn and run fetched concurrently; any failure
    // is fatal to the view. Outputs and diffs are best-effort follow-ups.
    {
        let session_id = session_id.clone();
        let turn_id = turn_id.clone();
        let run_id = run_id.clone();
        use_effect(move || {
            if snapshot_started() {
                return;
            }
            snapshot_started.set(true);

            let session_id = session_id.clone();
            let turn_id = turn_id.clone();
            let run_id = run_id.clone();
            spawn(async move {
                loading.set(true);
                let (session_res, turn_res, run_res) = join3(
                    fetch_session(&session_id),
                    fetch_turn(&session_id, &turn_id),
                    fetch_run(&run_id),
                )
                .await;

                match (session_res, turn_res, run_res) {
                    (Ok(loaded_session), Ok(loaded_turn), Ok(loaded_run)) => {
                        session.set(Some(loaded_session));
                        turn.set(Some(loaded_turn));
                        error.set(None);
                        let variations = loaded_run.variations;
                        run.set(Some(loaded_run));

                        if variations > 0 {
                            spawn(load_existing_outputs(run_id.clone(), sync));
                            spawn(load_existing_diffs(run_id.clone(), variations, sync));
                        }
                    }
                    (session_res, turn_res, run_res) => {
                        let detail: Vec<String> = [
                            session_res.err(),
                            turn_res.err(),
                            run_res.err(),
                        ]
                        .into_iter()
                        .flatten()
                        .collect();
                        tracing::error!("failed to load run data: {}", detail.join("; "));
                        error.set(Some("Failed to load run data".to_string()));
                    }
                }
                loading.set(false);
            });
        });
    }

    // WebSocket event pump: drains transport callbacks on the UI event loop
    // and feeds them through the sync core.
    {
        let ws_event_queue = ws_event_queue.clone();
        let ws_event_pump_alive = ws_event_pump_alive.clone();
        let run_id = run_id.clone();
        use_effect(move || {
            if ws_event_pump_started() {
                return;
            }
            ws_event_pump_started.set(true);

            let ws_event_queue = ws_event_queue.clone();
            let ws_event_pump_alive = ws_event_pump_alive.clone();
            let run_id = run_id.clone();
            spawn(async move {
                while ws_event_pump_alive.get() {
                    let mut drained = Vec::new();
                    if let Ok(mut queue) = ws_event_queue.try_borrow_mut() {
                        while let Some(event) = queue.pop_front() {
                            drained.push(event);
                        }
                    } else {
                        TimeoutFuture::new(4).await;
                        continue;
                    }

                    for event in drained {
                        match event {
                            RunWsEvent::Connected => {
                                sync.write().stream_connected();
                            }
                            RunWsEvent::Message(text) => {
                                let Some(event) = decode_stream_event(&text) else {
                                    continue;
                                };
                                let actions = sync.write().apply_stream_event(event);
                                for SyncAction::FetchDiffs { variation_id } in actions {
                                    spawn_diff_fetch(run_id.clone(), variation_id, sync);
                                }
                            }
                            RunWsEvent::Error(message) => {
                                tracing::error!("run stream error: {message}");
                                sync.write().stream_failed();
                                ws_runtime.set(None);
                            }
                            RunWsEvent::Closed => {
                                sync.write().stream_closed();
                                ws_runtime.set(None);
                            }
                        }
                    }

                    TimeoutFuture::new(16).await;
                }
            });
        });
    }

    // Open the stream once the run is loaded and still live. Idempotent: a
    // connection is never opened while one exists, and a failed stream stays
    // down until the run state changes.
    {
        let ws_event_queue = ws_event_queue.clone();
        use_effect(move || {
            let Some(current_run) = run() else {
                return;
            };
            if ws_runtime.read().is_some() {
                return;
            }
            if !sync.read().should_connect(&current_run) {
                return;
            }

            sync.write().begin_connect();

            let ws_url = build_run_ws_url(&current_run.id);
            let ws = match WebSocket::new(&ws_url) {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::error!("WebSocket open failed: {e:?}");
                    sync.write().stream_failed();
                    return;
                }
            };
            let closing = Rc::new(Cell::new(false));

            let ws_event_queue_open = ws_event_queue.clone();
            let on_open = Closure::wrap(Box::new(move |_e: Event| {
                enqueue_run_ws_event(&ws_event_queue_open, RunWsEvent::Connected);
            }) as Box<dyn FnMut(Event)>);
            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            let ws_event_queue_message = ws_event_queue.clone();
            let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
                let Ok(text) = e.data().dyn_into::<js_sys::JsString>() else {
                    return;
                };
                let text_str = text.as_string().unwrap_or_default();
                enqueue_run_ws_event(&ws_event_queue_message, RunWsEvent::Message(text_str));
            }) as Box<dyn FnMut(MessageEvent)>);
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            let ws_event_queue_error = ws_event_queue.clone();
            let on_error = Closure::wrap(Box::new(move |e: ErrorEvent| {
                enqueue_run_ws_event(&ws_event_queue_error, RunWsEvent::Error(e.message()));
            }) as Box<dyn FnMut(ErrorEvent)>);
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            let ws_event_queue_close = ws_event_queue.clone();
            let closing_for_close = closing.clone();
            let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
                if closing_for_close.get() {
                    return;
                }
                enqueue_run_ws_event(&ws_event_queue_close, RunWsEvent::Closed);
            }) as Box<dyn FnMut(CloseEvent)>);
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

            ws_runtime.set(Some(RunWsRuntime {
                ws,
                closing,
                _on_open: on_open,
                _on_message: on_message,
                _on_error: on_error,
                _on_close: on_close,
            }));
        });
    }

    // ── View ─────────────────────────────────────────────────────────────────

    if loading() {
        return rsx! {
            div {
                style: "min-height: 100vh; background: #030712; color: #f9fafb; display: flex; align-items: center; justify-content: center;",
                div { style: "color: #9ca3af;", "Loading run..." }
            }
        };
    }

    let back_href = format!("/session/{session_id}/turn/{turn_id}");

    let (Some(current_session), Some(current_turn), Some(current_run), None) =
        (session(), turn(), run(), error())
    else {
        let message = error().unwrap_or_else(|| "Run not found".to_string());
        return rsx! {
            div {
                style: "min-height: 100vh; background: #030712; color: #f9fafb; display: flex; flex-direction: column; align-items: center; justify-content: center; gap: 1rem;",
                p { style: "color: #f87171;", "{message}" }
                a {
                    href: "{back_href}",
                    style: "padding: 0.5rem 1rem; border: 1px solid #374151; border-radius: 0.375rem; color: #d1d5db; text-decoration: none;",
                    "Back to Turn"
                }
            }
        };
    };

    let streaming = sync.read().is_streaming();
    let tab = selected_tab();

    let tab_body = match tab {
        RunTab::Variation(variation) => rsx! {
            VariationLane {
                variation,
                run_status: current_run.status,
                streaming,
                sync,
            }
        },
        RunTab::Results => rsx! {
            JsonPanel {
                title: "Run Results".to_string(),
                value: current_run.results.clone(),
                empty_text: "No results available yet.".to_string(),
            }
        },
        RunTab::Config => rsx! {
            JsonPanel {
                title: "Agent Configuration".to_string(),
                value: current_run.agent_config.clone(),
                empty_text: "No configuration recorded.".to_string(),
            }
        },
    };

    rsx! {
        div {
            style: "min-height: 100vh; background: #030712; color: #f9fafb; padding: 2rem;",
            div {
                style: "max-width: 72rem; margin: 0 auto;",

                // Header with breadcrumb and status badges
                div {
                    style: "display: flex; align-items: center; gap: 1rem; margin-bottom: 2rem;",
                    div {
                        style: "flex: 1;",
                        div {
                            style: "display: flex; align-items: center; gap: 0.5rem; margin-bottom: 0.25rem; font-size: 0.875rem; color: #9ca3af;",
                            a {
                                href: "/session/{current_session.id}",
                                style: "color: #9ca3af; text-decoration: none;",
                                "{current_session.title}"
                            }
                            span { style: "color: #4b5563;", "/" }
                            a {
                                href: "{back_href}",
                                style: "color: #9ca3af; text-decoration: none;",
                                "Turn {current_turn.turn_number}"
                            }
                            span { style: "color: #4b5563;", "/" }
                            span { style: "color: #d1d5db;", "Run" }
                        }
                        h1 { style: "font-size: 1.5rem; font-weight: 600; margin: 0;", "Run Details" }
                    }
                    div {
                        style: "display: flex; align-items: center; gap: 0.5rem;",
                        span {
                            style: status_badge_style(current_run.status),
                            "{status_label(current_run.status)}"
                        }
                        if let Some(winner) = current_run.winning_variation_id {
                            span {
                                style: "font-size: 0.75rem; padding: 0.125rem 0.5rem; border-radius: 0.75rem; background: #16a34a; color: #f0fdf4;",
                                "Winner: Variation {winner}"
                            }
                        }
                    }
                }

                // Tab bar: one lane per variation plus results and config
                div {
                    style: "display: flex; gap: 0.25rem; margin-bottom: 1rem; background: rgba(17, 24, 39, 0.5); border: 1px solid #1f2937; border-radius: 0.5rem; padding: 0.25rem; width: fit-content;",
                    for variation in 0..current_run.variations {
                        button {
                            key: "variation-{variation}",
                            style: tab_style(tab == RunTab::Variation(variation)),
                            onclick: move |_| selected_tab.set(RunTab::Variation(variation)),
                            "Model {variation + 1}"
                        }
                    }
                    button {
                        style: tab_style(tab == RunTab::Results),
                        onclick: move |_| selected_tab.set(RunTab::Results),
                        "Results"
                    }
                    button {
                        style: tab_style(tab == RunTab::Config),
                        onclick: move |_| selected_tab.set(RunTab::Config),
                        "Configuration"
                    }
                }

                {tab_body}
            }
        }
    }
}

fn tab_style(active: bool) -> &'static str {
    if active {
        "padding: 0.375rem 0.75rem; border: none; border-radius: 0.375rem; background: #1f2937; color: #f9fafb; cursor: pointer; font-size: 0.875rem;"
    } else {
        "padding: 0.375rem 0.75rem; border: none; border-radius: 0.375rem; background: transparent; color: #9ca3af; cursor: pointer; font-size: 0.875rem;"
    }
}

// ── Lane view ────────────────────────────────────────────────────────────────

#[component]
fn VariationLane(
    variation: u32,
    run_status: RunStatus,
    streaming: bool,
    sync: Signal<RunSyncState>,
) -> Element {
    let (entries, panel) = {
        let state = sync.read();
        let entries: Vec<OutputEntry> = state.outputs_for(variation).cloned().collect();
        let panel = match state.diff_panel(variation) {
            DiffPanel::Hidden => None,
            DiffPanel::Loading => Some(None),
            DiffPanel::Ready(diffs) => Some(Some(diffs.to_vec())),
        };
        (entries, panel)
    };
    let count = entries.len();

    let empty_text = if run_status == RunStatus::Pending {
        "Waiting for run to start..."
    } else {
        "No output yet"
    };

    rsx! {
        div {
            style: "display: flex; flex-direction: column; gap: 1rem;",

            // Output panel
            div {
                style: "background: rgba(17, 24, 39, 0.3); border: 1px solid #1f2937; border-radius: 0.5rem;",
                div {
                    style: "padding: 1rem; border-bottom: 1px solid #1f2937; display: flex; align-items: center; justify-content: space-between;",
                    h3 { style: "font-weight: 500; margin: 0;", "Model {variation + 1} Output" }
                    div {
                        style: "display: flex; align-items: center; gap: 0.5rem;",
                        if streaming {
                            div {
                                style: "display: flex; align-items: center; gap: 0.5rem; font-size: 0.875rem; color: #4ade80;",
                                div { style: "width: 0.5rem; height: 0.5rem; background: #4ade80; border-radius: 9999px;" }
                                "Live"
                            }
                        }
                        span {
                            style: "font-size: 0.75rem; padding: 0.125rem 0.5rem; border: 1px solid #374151; border-radius: 0.75rem; color: #9ca3af;",
                            "{count} messages"
                        }
                    }
                }
                div {
                    style: "max-height: 600px; overflow-y: auto; padding: 1rem; background: #030712; border-radius: 0 0 0.5rem 0.5rem; font-family: monospace; font-size: 0.875rem;",
                    if entries.is_empty() {
                        div {
                            style: "text-align: center; padding: 2rem 0; color: #9ca3af;",
                            "{empty_text}"
                        }
                    } else {
                        for entry in entries {
                            div {
                                key: "{entry.id}",
                                style: "color: #4ade80; white-space: pre-wrap;",
                                "{entry.content}"
                            }
                        }
                    }
                }
            }

            // Diff section: hidden until a readiness signal for this lane
            if let Some(diffs) = panel {
                div {
                    style: "background: rgba(17, 24, 39, 0.3); border: 1px solid #1f2937; border-radius: 0.5rem;",
                    div {
                        style: "padding: 1rem; border-bottom: 1px solid #1f2937; display: flex; align-items: center; justify-content: space-between;",
                        h3 { style: "font-weight: 500; margin: 0;", "Code Changes" }
                        button {
                            style: "padding: 0.375rem 0.75rem; font-size: 0.75rem; font-weight: 600; background: #1f2937; color: #f9fafb; border: none; border-radius: 0.375rem; cursor: pointer;",
                            onclick: move |_| {
                                // PR creation is handled outside this console.
                                tracing::info!("create PR clicked for variation {variation}");
                            },
                            "Create Pull Request"
                        }
                    }
                    div {
                        style: "padding: 1rem;",
                        if let Some(diffs) = diffs {
                            DiffViewer {
                                diffs,
                                options: DiffViewOptions {
                                    mode: DiffMode::Unified,
                                    theme: DiffTheme::Dark,
                                    wrap: true,
                                    highlight: true,
                                    font_size: 12,
                                },
                            }
                        } else {
                            div {
                                style: "text-align: center; padding: 2rem 0; color: #9ca3af;",
                                "Loading code changes..."
                            }
                        }
                    }
                }
            }
        }
    }
}

// ── JSON panels ──────────────────────────────────────────────────────────────

#[component]
fn JsonPanel(title: String, value: serde_json::Value, empty_text: String) -> Element {
    let is_empty = match &value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    };

    rsx! {
        div {
            style: "background: rgba(17, 24, 39, 0.3); border: 1px solid #1f2937; border-radius: 0.5rem; padding: 1.5rem;",
            h3 { style: "font-size: 1.125rem; font-weight: 500; margin: 0 0 1rem 0;", "{title}" }
            if is_empty {
                p { style: "color: #9ca3af;", "{empty_text}" }
            } else {
                pre {
                    style: "font-size: 0.875rem; background: #030712; padding: 1rem; border: 1px solid #1f2937; border-radius: 0.375rem; overflow-x: auto;",
                    "{pretty_json(&value)}"
                }
            }
        }
    }
}
