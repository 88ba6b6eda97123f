use serde::Deserialize;

// ── Wire envelope ────────────────────────────────────────────────────────────

/// Raw message envelope as delivered over the run WebSocket:
/// `{type, message_id?, data: {variation_id, content, timestamp, status?, metadata?}}`
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

// ── Decoded events ───────────────────────────────────────────────────────────

/// A run stream message, decoded exactly once at the transport boundary.
/// Everything the reconciler does not understand collapses into `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Llm {
        message_id: Option<String>,
        variation_id: u32,
        content: String,
        timestamp: Option<String>,
    },
    DiffsReady {
        variation_id: Option<u32>,
    },
    Other,
}

/// Decode one WebSocket text frame. Returns `None` for frames that are not
/// JSON objects with a `type` field; callers drop those silently.
pub fn decode_stream_event(text: &str) -> Option<StreamEvent> {
    let envelope: WsEnvelope = serde_json::from_str(text).ok()?;

    let event = match envelope.kind.as_str() {
        "llm" => StreamEvent::Llm {
            message_id: envelope.message_id,
            variation_id: coerce_variation_id(envelope.data.get("variation_id")),
            content: envelope
                .data
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            timestamp: envelope
                .data
                .get("timestamp")
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
        },
        "status" => {
            let status = envelope.data.get("status").and_then(|v| v.as_str());
            if status == Some("diffs_ready") {
                let variation_id = envelope
                    .data
                    .get("metadata")
                    .and_then(|m| m.get("variation_id"))
                    .map(|v| coerce_variation_id(Some(v)));
                StreamEvent::DiffsReady { variation_id }
            } else {
                StreamEvent::Other
            }
        }
        _ => StreamEvent::Other,
    };

    Some(event)
}

/// The backend has emitted `variation_id` both as a number and as a string.
/// Anything that still fails to parse falls back to lane 0, matching the
/// historical behavior of the console; the fallback is logged so malformed
/// events stay visible.
fn coerce_variation_id(value: Option<&serde_json::Value>) -> u32 {
    let Some(value) = value else {
        return 0;
    };

    let parsed = match value {
        serde_json::Value::Number(n) => n.as_u64().map(|n| n as u32),
        serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    match parsed {
        Some(id) => id,
        None => {
            log::warn!("unparseable variation_id {value}; defaulting to lane 0");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_llm_event_with_string_variation() {
        let event = decode_stream_event(
            r#"{"type":"llm","message_id":"m1","data":{"variation_id":"1","content":"hello","timestamp":"2026-03-01T10:00:00Z"}}"#,
        );
        assert_eq!(
            event,
            Some(StreamEvent::Llm {
                message_id: Some("m1".to_string()),
                variation_id: 1,
                content: "hello".to_string(),
                timestamp: Some("2026-03-01T10:00:00Z".to_string()),
            })
        );
    }

    #[test]
    fn test_non_numeric_variation_falls_back_to_lane_zero() {
        let event = decode_stream_event(
            r#"{"type":"llm","data":{"variation_id":"not-a-number","content":"x"}}"#,
        );
        let Some(StreamEvent::Llm { variation_id, .. }) = event else {
            panic!("expected llm event");
        };
        assert_eq!(variation_id, 0);
    }

    #[test]
    fn test_decode_diffs_ready() {
        let event = decode_stream_event(
            r#"{"type":"status","data":{"status":"diffs_ready","metadata":{"variation_id":1}}}"#,
        );
        assert_eq!(
            event,
            Some(StreamEvent::DiffsReady {
                variation_id: Some(1)
            })
        );
    }

    #[test]
    fn test_diffs_ready_without_metadata() {
        let event =
            decode_stream_event(r#"{"type":"status","data":{"status":"diffs_ready"}}"#);
        assert_eq!(event, Some(StreamEvent::DiffsReady { variation_id: None }));
    }

    #[test]
    fn test_other_status_and_unknown_kinds_are_ignored() {
        assert_eq!(
            decode_stream_event(r#"{"type":"status","data":{"status":"started"}}"#),
            Some(StreamEvent::Other)
        );
        assert_eq!(
            decode_stream_event(r#"{"type":"heartbeat","data":{}}"#),
            Some(StreamEvent::Other)
        );
    }

    #[test]
    fn test_non_json_frame_is_dropped() {
        assert_eq!(decode_stream_event("not json"), None);
    }
}
