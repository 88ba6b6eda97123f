use dioxus::launch;
use dioxus::prelude::*;
use dioxus_logger::tracing::Level;

use run_console::components::run::RunPage;

fn main() {
    // Initialize logging for WASM
    wasm_logger::init(wasm_logger::Config::default());
    dioxus_logger::init(Level::INFO).ok();

    launch(App);
}

/// Extract `(session, turn, run)` ids from the current location. Routing
/// proper lives outside this console; the page only needs its three ids.
fn run_route_from_location() -> Option<(String, String, String)> {
    let pathname = web_sys::window()?.location().pathname().ok()?;
    parse_run_route(&pathname)
}

fn parse_run_route(pathname: &str) -> Option<(String, String, String)> {
    let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["session", session_id, "turn", turn_id, "run", run_id] => Some((
            (*session_id).to_string(),
            (*turn_id).to_string(),
            (*run_id).to_string(),
        )),
        _ => None,
    }
}

#[component]
fn App() -> Element {
    match run_route_from_location() {
        Some((session_id, turn_id, run_id)) => rsx! {
            RunPage {
                session_id,
                turn_id,
                run_id,
            }
        },
        None => rsx! {
            div {
                style: "min-height: 100vh; background: #030712; color: #9ca3af; display: flex; align-items: center; justify-content: center;",
                "No run selected. Open a run from a session turn to view it here."
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::parse_run_route;

    #[test]
    fn test_parse_run_route() {
        assert_eq!(
            parse_run_route("/session/s1/turn/t1/run/r1"),
            Some(("s1".to_string(), "t1".to_string(), "r1".to_string()))
        );
        assert_eq!(parse_run_route("/session/s1/turn/t1"), None);
        assert_eq!(parse_run_route("/"), None);
    }
}
