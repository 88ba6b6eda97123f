use std::collections::{BTreeMap, BTreeSet, HashSet};

use shared_types::{AgentOutput, FileDiff, Run};

use super::stream::StreamEvent;

// ── Stream connection phase ──────────────────────────────────────────────────

/// Lifecycle of the run's WebSocket, one connection at a time. `Failed` is
/// deliberately distinct from `Disconnected`: a failed stream is not reopened
/// until something external (a fresh run load) resets the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Follow-up actions ────────────────────────────────────────────────────────

/// Asynchronous work the owning component must perform after a state
/// transition. The core itself never does I/O.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncAction {
    FetchDiffs { variation_id: u32 },
}

// ── Output log entry ─────────────────────────────────────────────────────────

/// One line of agent output in the append-only log. `id` is a process-local
/// counter value assigned at ingestion; it is not stable across reloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputEntry {
    pub id: u64,
    pub variation_id: u32,
    pub content: String,
    pub timestamp: Option<String>,
}

// ── Diff panel projection ────────────────────────────────────────────────────

/// What a variation's diff section should display.
#[derive(Clone, Debug, PartialEq)]
pub enum DiffPanel<'a> {
    /// No readiness signal yet; the section is not rendered at all.
    Hidden,
    /// Readiness is known but the diff content has not arrived.
    Loading,
    /// At least one file pair to render.
    Ready(&'a [FileDiff]),
}

// ── Synchronization core ─────────────────────────────────────────────────────

/// Client-side state for one run: the ordered output log, the dedup set, the
/// per-variation diff store and readiness map, and the stream phase.
///
/// All mutation happens on the UI event loop through `&mut self`; invariants:
/// the log is append-only, readiness is monotone, and the dedup set is
/// cleared only before a snapshot output replace or a fresh connection.
pub struct RunSyncState {
    run_id: String,
    next_output_id: u64,
    seen_message_ids: HashSet<String>,
    outputs: Vec<OutputEntry>,
    diffs: BTreeMap<u32, Vec<FileDiff>>,
    diffs_ready: BTreeSet<u32>,
    phase: StreamPhase,
}

impl RunSyncState {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            next_output_id: 0,
            seen_message_ids: HashSet::new(),
            outputs: Vec::new(),
            diffs: BTreeMap::new(),
            diffs_ready: BTreeSet::new(),
            phase: StreamPhase::Disconnected,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn alloc_output_id(&mut self) -> u64 {
        let id = self.next_output_id;
        self.next_output_id += 1;
        id
    }

    // ── Snapshot ingestion ───────────────────────────────────────────────────

    /// Wholesale-replace the output log with persisted outputs from the
    /// snapshot. Every fetched row is marked seen under an `existing-` key so
    /// a stream replay of the same rows is suppressed; the index fallback
    /// keeps keys unique when the server omitted row ids.
    pub fn replace_outputs(&mut self, fetched: Vec<AgentOutput>) {
        self.seen_message_ids.clear();
        self.outputs.clear();

        for (index, output) in fetched.into_iter().enumerate() {
            let key = match output.id {
                Some(id) => format!("existing-{id}"),
                None => format!("existing-{index}"),
            };
            self.seen_message_ids.insert(key);

            let id = self.alloc_output_id();
            self.outputs.push(OutputEntry {
                id,
                variation_id: output.variation_id,
                content: output.content,
                timestamp: output.timestamp,
            });
        }
    }

    /// Replace one variation's diff set. A non-empty result doubles as a
    /// readiness signal (snapshot probing); an empty result replaces silently
    /// and leaves readiness as it was.
    pub fn store_diffs(&mut self, variation_id: u32, diffs: Vec<FileDiff>) {
        if !diffs.is_empty() {
            self.diffs_ready.insert(variation_id);
        }
        self.diffs.insert(variation_id, diffs);
    }

    // ── Stream lifecycle ─────────────────────────────────────────────────────

    /// True when the loaded run should have a stream opened for it and no
    /// connection exists or is being attempted.
    pub fn should_connect(&self, run: &Run) -> bool {
        run.status.is_live() && self.phase == StreamPhase::Disconnected
    }

    /// Called immediately before a new WebSocket is opened. Clears the dedup
    /// set so suppressions from a previous connection cannot swallow events
    /// redelivered on this one.
    pub fn begin_connect(&mut self) {
        self.seen_message_ids.clear();
        self.phase = StreamPhase::Connecting;
    }

    pub fn stream_connected(&mut self) {
        self.phase = StreamPhase::Connected;
    }

    pub fn stream_failed(&mut self) {
        self.phase = StreamPhase::Failed;
    }

    pub fn stream_closed(&mut self) {
        self.phase = StreamPhase::Disconnected;
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Drives the "Live" indicator.
    pub fn is_streaming(&self) -> bool {
        matches!(self.phase, StreamPhase::Connecting | StreamPhase::Connected)
    }

    // ── Stream ingestion ─────────────────────────────────────────────────────

    /// Apply one decoded stream event. Returns the follow-up fetches the
    /// caller must spawn.
    pub fn apply_stream_event(&mut self, event: StreamEvent) -> Vec<SyncAction> {
        // A delivered message is proof the connection is up.
        if self.phase == StreamPhase::Connecting {
            self.phase = StreamPhase::Connected;
        }

        match event {
            StreamEvent::Llm {
                message_id,
                variation_id,
                content,
                timestamp,
            } => {
                let key = message_id.unwrap_or_else(synthesized_dedup_key);
                if !self.seen_message_ids.insert(key.clone()) {
                    log::debug!("skipping duplicate stream message {key}");
                    return Vec::new();
                }

                let id = self.alloc_output_id();
                self.outputs.push(OutputEntry {
                    id,
                    variation_id,
                    content,
                    timestamp,
                });
                Vec::new()
            }
            StreamEvent::DiffsReady {
                variation_id: Some(variation_id),
            } => {
                // Fetch once per false-to-true transition; readiness never
                // goes back to false, so a repeat event is a no-op.
                if self.diffs_ready.insert(variation_id) {
                    vec![SyncAction::FetchDiffs { variation_id }]
                } else {
                    Vec::new()
                }
            }
            StreamEvent::DiffsReady { variation_id: None } | StreamEvent::Other => Vec::new(),
        }
    }

    // ── Projections ──────────────────────────────────────────────────────────

    /// Log entries for one variation lane, in ingestion order.
    pub fn outputs_for(&self, variation_id: u32) -> impl Iterator<Item = &OutputEntry> {
        self.outputs
            .iter()
            .filter(move |entry| entry.variation_id == variation_id)
    }

    pub fn message_count(&self, variation_id: u32) -> usize {
        self.outputs_for(variation_id).count()
    }

    pub fn diffs_ready(&self, variation_id: u32) -> bool {
        self.diffs_ready.contains(&variation_id)
    }

    pub fn diff_panel(&self, variation_id: u32) -> DiffPanel<'_> {
        if !self.diffs_ready.contains(&variation_id) {
            return DiffPanel::Hidden;
        }
        match self.diffs.get(&variation_id) {
            Some(diffs) if !diffs.is_empty() => DiffPanel::Ready(diffs),
            _ => DiffPanel::Loading,
        }
    }
}

/// Dedup key for stream messages that arrive without a `message_id`. The
/// uuid salt keeps two synthesized keys from colliding within one
/// millisecond.
fn synthesized_dedup_key() -> String {
    format!(
        "msg-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{DiffFile, RunStatus};

    fn llm_event(message_id: &str, variation_id: u32, content: &str) -> StreamEvent {
        StreamEvent::Llm {
            message_id: Some(message_id.to_string()),
            variation_id,
            content: content.to_string(),
            timestamp: None,
        }
    }

    fn sample_diff(name: &str) -> FileDiff {
        FileDiff {
            old_file: DiffFile {
                name: name.to_string(),
                content: "old".to_string(),
            },
            new_file: DiffFile {
                name: name.to_string(),
                content: "new".to_string(),
            },
        }
    }

    fn sample_run(status: RunStatus) -> Run {
        Run {
            id: "run-1".to_string(),
            status,
            variations: 2,
            winning_variation_id: None,
            results: serde_json::Value::Null,
            agent_config: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_duplicate_llm_events_produce_one_entry() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.begin_connect();

        state.apply_stream_event(llm_event("m1", 0, "hello"));
        state.apply_stream_event(llm_event("m1", 0, "hello"));

        let entries: Vec<_> = state.outputs_for(0).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "hello");
    }

    #[test]
    fn test_projection_partitions_log_in_order() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.begin_connect();

        state.apply_stream_event(llm_event("a", 0, "first-0"));
        state.apply_stream_event(llm_event("b", 1, "first-1"));
        state.apply_stream_event(llm_event("c", 0, "second-0"));

        let lane0: Vec<_> = state.outputs_for(0).map(|e| e.content.as_str()).collect();
        let lane1: Vec<_> = state.outputs_for(1).map(|e| e.content.as_str()).collect();
        assert_eq!(lane0, vec!["first-0", "second-0"]);
        assert_eq!(lane1, vec!["first-1"]);
        assert_eq!(state.message_count(0) + state.message_count(1), 3);
    }

    #[test]
    fn test_store_diffs_is_idempotent_and_replaces() {
        let mut state = RunSyncState::new("run-1".to_string());

        state.store_diffs(0, vec![sample_diff("a.rs")]);
        state.store_diffs(0, vec![sample_diff("a.rs")]);
        let DiffPanel::Ready(diffs) = state.diff_panel(0) else {
            panic!("expected ready panel");
        };
        assert_eq!(diffs.len(), 1);

        // A later fetch replaces, never merges.
        state.store_diffs(0, vec![sample_diff("b.rs"), sample_diff("c.rs")]);
        let DiffPanel::Ready(diffs) = state.diff_panel(0) else {
            panic!("expected ready panel");
        };
        assert_eq!(diffs.len(), 2);
    }

    #[test]
    fn test_readiness_is_monotone() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.apply_stream_event(StreamEvent::DiffsReady {
            variation_id: Some(1),
        });
        assert!(state.diffs_ready(1));

        // An empty fetch result must not clear readiness.
        state.store_diffs(1, Vec::new());
        assert!(state.diffs_ready(1));
        assert_eq!(state.diff_panel(1), DiffPanel::Loading);
    }

    #[test]
    fn test_diffs_ready_event_triggers_one_fetch() {
        let mut state = RunSyncState::new("run-1".to_string());

        let actions = state.apply_stream_event(StreamEvent::DiffsReady {
            variation_id: Some(1),
        });
        assert_eq!(actions, vec![SyncAction::FetchDiffs { variation_id: 1 }]);

        // Repeat delivery: already ready, nothing new to do.
        let actions = state.apply_stream_event(StreamEvent::DiffsReady {
            variation_id: Some(1),
        });
        assert!(actions.is_empty());
    }

    #[test]
    fn test_reconnect_clears_dedup_set() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.begin_connect();
        state.apply_stream_event(llm_event("m1", 0, "hello"));
        state.stream_failed();

        // Fresh connection: the same message id must be accepted again.
        state.begin_connect();
        state.apply_stream_event(llm_event("m1", 0, "hello again"));
        assert_eq!(state.message_count(0), 2);
    }

    #[test]
    fn test_snapshot_outputs_suppress_stream_replay() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.replace_outputs(vec![
            AgentOutput {
                id: Some(7),
                run_id: "run-1".to_string(),
                variation_id: 0,
                content: "persisted".to_string(),
                timestamp: None,
                output_type: "llm".to_string(),
            },
            AgentOutput {
                id: None,
                run_id: "run-1".to_string(),
                variation_id: 1,
                content: "persisted too".to_string(),
                timestamp: None,
                output_type: "llm".to_string(),
            },
        ]);
        assert_eq!(state.message_count(0), 1);
        assert_eq!(state.message_count(1), 1);

        // A replayed row arrives over the stream keyed like the snapshot did.
        state.apply_stream_event(llm_event("existing-7", 0, "persisted"));
        assert_eq!(state.message_count(0), 1);
    }

    #[test]
    fn test_snapshot_replace_is_wholesale() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.begin_connect();
        state.apply_stream_event(llm_event("m1", 0, "streamed"));

        state.replace_outputs(vec![AgentOutput {
            id: Some(1),
            run_id: "run-1".to_string(),
            variation_id: 0,
            content: "persisted".to_string(),
            timestamp: None,
            output_type: "llm".to_string(),
        }]);

        let lane0: Vec<_> = state.outputs_for(0).map(|e| e.content.as_str()).collect();
        assert_eq!(lane0, vec!["persisted"]);
    }

    #[test]
    fn test_should_connect_only_for_live_disconnected_runs() {
        let mut state = RunSyncState::new("run-1".to_string());
        assert!(state.should_connect(&sample_run(RunStatus::Pending)));
        assert!(state.should_connect(&sample_run(RunStatus::Running)));
        assert!(!state.should_connect(&sample_run(RunStatus::Completed)));
        assert!(!state.should_connect(&sample_run(RunStatus::Failed)));

        state.begin_connect();
        assert!(!state.should_connect(&sample_run(RunStatus::Running)));

        // A transport error does not re-arm the auto-connect.
        state.stream_failed();
        assert!(!state.should_connect(&sample_run(RunStatus::Running)));
        assert!(!state.is_streaming());

        // An explicit close does.
        state.stream_closed();
        assert!(state.should_connect(&sample_run(RunStatus::Running)));
    }

    #[test]
    fn test_empty_snapshot_shows_waiting_lanes() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.replace_outputs(Vec::new());

        for variation in 0..2 {
            assert_eq!(state.message_count(variation), 0);
            assert_eq!(state.diff_panel(variation), DiffPanel::Hidden);
        }
    }

    #[test]
    fn test_message_while_connecting_promotes_to_connected() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.begin_connect();
        assert_eq!(state.phase(), StreamPhase::Connecting);

        state.apply_stream_event(llm_event("m1", 0, "hello"));
        assert_eq!(state.phase(), StreamPhase::Connected);
    }

    #[test]
    fn test_synthesized_keys_never_collide_with_each_other() {
        let mut state = RunSyncState::new("run-1".to_string());
        state.begin_connect();

        let no_id = |content: &str| StreamEvent::Llm {
            message_id: None,
            variation_id: 0,
            content: content.to_string(),
            timestamp: None,
        };
        state.apply_stream_event(no_id("a"));
        state.apply_stream_event(no_id("a"));
        assert_eq!(state.message_count(0), 2);
    }
}
