//! Diff Viewer
//!
//! Renders the before/after file pairs a variation produced. Line-level
//! changes are computed client-side with `similar`; the widget only consumes
//! the ordered `FileDiff` list plus a display-options record.

use dioxus::prelude::*;
use shared_types::FileDiff;
use similar::{ChangeTag, TextDiff};

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffMode {
    Unified,
    Split,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffTheme {
    Dark,
    Light,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffViewOptions {
    pub mode: DiffMode,
    pub theme: DiffTheme,
    pub wrap: bool,
    pub highlight: bool,
    pub font_size: u32,
}

// ── Line model ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffLineKind {
    Context,
    Added,
    Removed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
    pub text: String,
}

impl DiffLine {
    pub fn marker(&self) -> char {
        match self.kind {
            DiffLineKind::Context => ' ',
            DiffLineKind::Added => '+',
            DiffLineKind::Removed => '-',
        }
    }
}

/// Line-diff two file contents, preserving original line order.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffLine> {
    let text_diff = TextDiff::from_lines(old, new);
    text_diff
        .iter_all_changes()
        .map(|change| {
            let kind = match change.tag() {
                ChangeTag::Equal => DiffLineKind::Context,
                ChangeTag::Insert => DiffLineKind::Added,
                ChangeTag::Delete => DiffLineKind::Removed,
            };
            DiffLine {
                kind,
                old_index: change.old_index(),
                new_index: change.new_index(),
                text: change.value().trim_end_matches('\n').to_string(),
            }
        })
        .collect()
}

fn line_style(line: &DiffLine, options: &DiffViewOptions) -> String {
    let background = if !options.highlight {
        "transparent"
    } else {
        match (line.kind, options.theme) {
            (DiffLineKind::Added, DiffTheme::Dark) => "rgba(22, 163, 74, 0.15)",
            (DiffLineKind::Added, DiffTheme::Light) => "#dcfce7",
            (DiffLineKind::Removed, DiffTheme::Dark) => "rgba(220, 38, 38, 0.15)",
            (DiffLineKind::Removed, DiffTheme::Light) => "#fee2e2",
            (DiffLineKind::Context, _) => "transparent",
        }
    };
    let color = match (line.kind, options.theme) {
        (DiffLineKind::Added, _) => "#4ade80",
        (DiffLineKind::Removed, _) => "#f87171",
        (DiffLineKind::Context, DiffTheme::Dark) => "#d1d5db",
        (DiffLineKind::Context, DiffTheme::Light) => "#374151",
    };
    let whitespace = if options.wrap { "pre-wrap" } else { "pre" };
    format!(
        "display: block; padding: 0 0.5rem; background: {background}; color: {color}; white-space: {whitespace};"
    )
}

fn file_label(diff: &FileDiff) -> String {
    if diff.old_file.name == diff.new_file.name {
        diff.new_file.name.clone()
    } else {
        format!("{} \u{2192} {}", diff.old_file.name, diff.new_file.name)
    }
}

// ── Component ────────────────────────────────────────────────────────────────

#[component]
pub fn DiffViewer(diffs: Vec<FileDiff>, options: DiffViewOptions) -> Element {
    let container_style = format!(
        "display: flex; flex-direction: column; gap: 1rem; font-family: monospace; font-size: {}px;",
        options.font_size
    );

    rsx! {
        div {
            style: "{container_style}",
            for (file_index, diff) in diffs.iter().enumerate() {
                div {
                    key: "{file_index}",
                    style: "border: 1px solid #1f2937; border-radius: 0.375rem; overflow: hidden;",
                    div {
                        style: "padding: 0.5rem 0.75rem; background: rgba(17, 24, 39, 0.7); border-bottom: 1px solid #1f2937; font-weight: 500;",
                        "{file_label(diff)}"
                    }
                    if options.mode == DiffMode::Split {
                        SplitPane { diff: diff.clone(), options }
                    } else {
                        UnifiedPane { diff: diff.clone(), options }
                    }
                }
            }
        }
    }
}

#[component]
fn UnifiedPane(diff: FileDiff, options: DiffViewOptions) -> Element {
    let lines = diff_lines(&diff.old_file.content, &diff.new_file.content);

    rsx! {
        div {
            style: "padding: 0.25rem 0; overflow-x: auto;",
            for (line_index, line) in lines.iter().enumerate() {
                span {
                    key: "{line_index}",
                    style: line_style(line, &options),
                    "{line.marker()} {line.text}"
                }
            }
        }
    }
}

#[component]
fn SplitPane(diff: FileDiff, options: DiffViewOptions) -> Element {
    let lines = diff_lines(&diff.old_file.content, &diff.new_file.content);
    let old_lines: Vec<DiffLine> = lines
        .iter()
        .filter(|line| line.kind != DiffLineKind::Added)
        .cloned()
        .collect();
    let new_lines: Vec<DiffLine> = lines
        .iter()
        .filter(|line| line.kind != DiffLineKind::Removed)
        .cloned()
        .collect();

    rsx! {
        div {
            style: "display: grid; grid-template-columns: 1fr 1fr; gap: 0; overflow-x: auto;",
            div {
                style: "border-right: 1px solid #1f2937; padding: 0.25rem 0;",
                for (line_index, line) in old_lines.iter().enumerate() {
                    span {
                        key: "old-{line_index}",
                        style: line_style(line, &options),
                        "{line.marker()} {line.text}"
                    }
                }
            }
            div {
                style: "padding: 0.25rem 0;",
                for (line_index, line) in new_lines.iter().enumerate() {
                    span {
                        key: "new-{line_index}",
                        style: line_style(line, &options),
                        "{line.marker()} {line.text}"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_is_all_context() {
        let lines = diff_lines("a\nb\n", "a\nb\n");
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.kind == DiffLineKind::Context));
    }

    #[test]
    fn test_change_produces_removed_then_added() {
        let lines = diff_lines("a\nold\nc\n", "a\nnew\nc\n");
        let kinds: Vec<DiffLineKind> = lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiffLineKind::Context,
                DiffLineKind::Removed,
                DiffLineKind::Added,
                DiffLineKind::Context,
            ]
        );
        assert_eq!(lines[1].text, "old");
        assert_eq!(lines[2].text, "new");
    }

    #[test]
    fn test_new_file_is_all_additions() {
        let lines = diff_lines("", "line one\nline two\n");
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.kind == DiffLineKind::Added));
        assert_eq!(lines[0].old_index, None);
        assert_eq!(lines[0].new_index, Some(0));
    }

    #[test]
    fn test_markers() {
        let lines = diff_lines("gone\n", "here\n");
        assert_eq!(lines[0].marker(), '-');
        assert_eq!(lines[1].marker(), '+');
    }
}
