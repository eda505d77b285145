//! CLI output formatting.
//!
//! Stdout carries the human progress stream; stderr carries one line per
//! failed artifact. Diagnostic `tracing` output is separate (see
//! [`logging`](crate::logging)).
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! Found 2 image(s) to process.
//! b.png: 20000×100 exceeds the 16383px codec limit, scaled to 16383×82
//! [ 50%] a.jpg (1/2)
//! [100%] b.png (2/2, 1 failed)
//! Produced 13 artifact(s) from 2 image(s), 1 failed.
//! Image processing complete!
//! ```
//!
//! Failures, on stderr:
//!
//! ```text
//! Error processing b.png at 1024px (WebP): encoder rejected image
//! ```
//!
//! ## Plan
//!
//! ```text
//! a.jpg (800×600)
//!     a-480.webp      480×360     resize
//!     a-original.jpg  800×600     copy
//! 7 artifact(s) from 1 image(s)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout or stderr.
//! Format functions are pure: no I/O, no side effects.

use crate::imaging::OutputFormat;
use crate::plan::{Action, Plan};
use crate::process::{ArtifactFailure, ProcessEvent, RunSummary};

// ============================================================================
// Shared helpers
// ============================================================================

/// Display name used in human-facing lines.
fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::WebP => "WebP",
        OutputFormat::Jpeg => "JPEG",
        OutputFormat::Png => "PNG",
    }
}

fn percent(completed: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        completed * 100 / total
    }
}

// ============================================================================
// Process
// ============================================================================

/// Stdout lines for one progress event. Failures go through
/// [`format_failure`] instead.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::State(_) | ProcessEvent::ArtifactFailed(_) => Vec::new(),
        ProcessEvent::Planned { sources, .. } => {
            vec![format!("Found {sources} image(s) to process.")]
        }
        ProcessEvent::Clamped(notice) => vec![format!(
            "{}: {}×{} exceeds the {}px codec limit, scaled to {}×{}",
            notice.file_name,
            notice.original.width,
            notice.original.height,
            crate::imaging::calculations::CODEC_CEILING,
            notice.clamped.width,
            notice.clamped.height
        )],
        ProcessEvent::SourceFinished {
            file_name,
            completed,
            total,
            failed_artifacts,
        } => {
            let failed = if *failed_artifacts > 0 {
                format!(", {failed_artifacts} failed")
            } else {
                String::new()
            };
            vec![format!(
                "[{:>3}%] {file_name} ({completed}/{total}{failed})",
                percent(*completed, *total)
            )]
        }
    }
}

/// One stderr line for a failed artifact.
pub fn format_failure(failure: &ArtifactFailure) -> String {
    format!(
        "Error processing {} at {} ({}): {}",
        failure.source_file,
        failure.kind,
        format_name(failure.format),
        failure.message
    )
}

/// Print a progress event: stdout lines, or the stderr line for a failure.
pub fn print_process_event(event: &ProcessEvent) {
    if let ProcessEvent::ArtifactFailed(failure) = event {
        eprintln!("{}", format_failure(failure));
        return;
    }
    for line in format_process_event(event) {
        println!("{line}");
    }
}

pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    let mut tally = format!(
        "Produced {} artifact(s) from {} image(s)",
        summary.succeeded(),
        summary.sources
    );
    if summary.failed() > 0 {
        tally.push_str(&format!(", {} failed", summary.failed()));
    }
    tally.push('.');
    vec![tally, "Image processing complete!".to_string()]
}

pub fn print_summary(summary: &RunSummary) {
    for line in format_summary(summary) {
        println!("{line}");
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Dry-run listing: every planned artifact grouped by source.
pub fn format_plan(plan: &Plan) -> Vec<String> {
    let multi_root = plan.specs.iter().any(|s| s.root != plan.specs[0].root);
    let name_width = plan
        .specs
        .iter()
        .map(|s| s.file_name().chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::new();
    for (index, source) in plan.sources.iter().enumerate() {
        let header = match source.dimensions {
            Some(d) => format!("{} ({}×{})", source.file_name, d.width, d.height),
            None => format!("{} (unreadable)", source.file_name),
        };
        lines.push(header);

        for spec in plan.specs.iter().filter(|s| s.source == index) {
            let name = if multi_root {
                format!("[{}] {:<name_width$}", spec.root, spec.file_name())
            } else {
                format!("{:<name_width$}", spec.file_name())
            };
            let detail = match &spec.action {
                Action::Resize {
                    width,
                    height,
                    blur_sigma: Some(sigma),
                } => format!("{:<11} resize, blur {sigma}", format!("{width}×{height}")),
                Action::Resize { width, height, .. } => {
                    format!("{:<11} resize", format!("{width}×{height}"))
                }
                Action::Copy => {
                    let dims = source
                        .dimensions
                        .map(|d| format!("{}×{}", d.width, d.height))
                        .unwrap_or_default();
                    format!("{dims:<11} copy")
                }
                Action::Unreadable(message) => format!("unreadable: {message}"),
            };
            lines.push(format!("    {name}  {detail}"));
        }
    }
    lines.push(format!(
        "{} artifact(s) from {} image(s)",
        plan.specs.len(),
        plan.sources.len()
    ));
    lines
}

pub fn print_plan(plan: &Plan) {
    for line in format_plan(plan) {
        println!("{line}");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputRoot;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Dimensions, Quality};
    use crate::plan::{ArtifactKind, ClampNotice, FormatPolicy, PlaceholderPolicy};
    use crate::naming::PlaceholderNaming;
    use crate::process::ProducedArtifact;
    use crate::scan::SourceImage;
    use std::path::Path;

    fn failure(kind: ArtifactKind, format: OutputFormat) -> ArtifactFailure {
        ArtifactFailure {
            source_file: "b.png".into(),
            artifact: "b-1024.webp".into(),
            kind,
            format,
            root: "dist".into(),
            message: "encoder rejected image".into(),
        }
    }

    #[test]
    fn found_line() {
        let event = ProcessEvent::Planned {
            sources: 2,
            artifacts: 14,
            concurrency: 8,
        };
        assert_eq!(format_process_event(&event), vec!["Found 2 image(s) to process."]);
    }

    #[test]
    fn progress_line_pads_percent() {
        let event = ProcessEvent::SourceFinished {
            file_name: "a.jpg".into(),
            completed: 1,
            total: 3,
            failed_artifacts: 0,
        };
        assert_eq!(format_process_event(&event), vec!["[ 33%] a.jpg (1/3)"]);
    }

    #[test]
    fn progress_line_counts_failures() {
        let event = ProcessEvent::SourceFinished {
            file_name: "b.png".into(),
            completed: 2,
            total: 2,
            failed_artifacts: 1,
        };
        assert_eq!(format_process_event(&event), vec!["[100%] b.png (2/2, 1 failed)"]);
    }

    #[test]
    fn clamp_line() {
        let event = ProcessEvent::Clamped(ClampNotice {
            source: 1,
            file_name: "b.png".into(),
            original: Dimensions::new(20000, 100),
            clamped: Dimensions::new(16383, 82),
            scale: 0.81915,
        });
        assert_eq!(
            format_process_event(&event),
            vec!["b.png: 20000×100 exceeds the 16383px codec limit, scaled to 16383×82"]
        );
    }

    #[test]
    fn state_and_failure_events_have_no_stdout_lines() {
        assert!(format_process_event(&ProcessEvent::State(crate::process::RunState::Done)).is_empty());
        let event = ProcessEvent::ArtifactFailed(failure(ArtifactKind::Sized(1024), OutputFormat::WebP));
        assert!(format_process_event(&event).is_empty());
    }

    #[test]
    fn failure_line_names_source_size_and_format() {
        assert_eq!(
            format_failure(&failure(ArtifactKind::Sized(1024), OutputFormat::WebP)),
            "Error processing b.png at 1024px (WebP): encoder rejected image"
        );
        assert_eq!(
            format_failure(&failure(ArtifactKind::OriginalNative, OutputFormat::Png)),
            "Error processing b.png at original (PNG): encoder rejected image"
        );
    }

    #[test]
    fn summary_lines() {
        let summary = RunSummary {
            sources: 2,
            produced: vec![ProducedArtifact {
                source: 0,
                source_file: "a.jpg".into(),
                root: "dist".into(),
                file: "a-480.webp".into(),
                width: 480,
                height: 360,
                format: OutputFormat::WebP,
            }],
            failures: vec![failure(ArtifactKind::Placeholder, OutputFormat::WebP)],
            clamps: Vec::new(),
        };
        assert_eq!(
            format_summary(&summary),
            vec![
                "Produced 1 artifact(s) from 2 image(s), 1 failed.",
                "Image processing complete!"
            ]
        );
    }

    #[test]
    fn clean_summary_has_no_failure_suffix() {
        let summary = RunSummary {
            sources: 1,
            ..RunSummary::default()
        };
        assert_eq!(format_summary(&summary)[0], "Produced 0 artifact(s) from 1 image(s).");
    }

    #[test]
    fn plan_listing() {
        let backend = MockBackend::with_sizes(&[("a.jpg", 800, 600)]);
        let source = SourceImage::from_path(Path::new("/in/a.jpg")).unwrap();
        let policy = FormatPolicy {
            webp: true,
            native: false,
            placeholder: Some(PlaceholderPolicy {
                width: 20,
                naming: PlaceholderNaming::Width,
                blur_sigma: None,
            }),
            original_webp: false,
            original_copy: true,
            quality: Quality::default(),
        };
        let plan = crate::plan::build(
            &backend,
            vec![source],
            &[480],
            &policy,
            &[OutputRoot::new("dist", "/out")],
        )
        .unwrap();

        assert_eq!(
            format_plan(&plan),
            vec![
                "a.jpg (800×600)",
                "    a-480.webp      480×360     resize",
                "    a-20.webp       20×15       resize",
                "    a-original.jpg  800×600     copy",
                "3 artifact(s) from 1 image(s)",
            ]
        );
    }
}
