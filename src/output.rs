//! User-facing output: progress lines, the run summary, and the JSON report.
//!
//! Formatting is split from printing: `format_*` functions are pure and
//! return lines, `print_*` wrappers write them to stdout. Tests exercise the
//! formatters only.
//!
//! Progress arrives over an mpsc channel from the phase runner; a dedicated
//! printer thread drains it so worker threads never block on the terminal.

use crate::orchestrator::InspectReport;
use crate::runner::ProgressEvent;
use crate::types::{ItemStatus, RunResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread;

/// One line per finished phase, one per terminal item outcome.
pub fn format_progress_event(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::PhaseStarted { phase, items } => {
            Some(format!("{phase}: {items} item(s)"))
        }
        ProgressEvent::ItemFinished { phase, id, status } => match status {
            ItemStatus::Rejected => Some(format!("  {phase} #{id}: rejected")),
            ItemStatus::Failed => Some(format!("  {phase} #{id}: failed")),
            _ => None,
        },
        ProgressEvent::PhaseFinished { phase, stats } => Some(format!(
            "{phase}: done ({} ok, {} rejected, {} failed, {} skipped in {}ms)",
            stats.succeeded, stats.rejected, stats.failed, stats.skipped, stats.elapsed_ms
        )),
    }
}

/// Spawn the printer thread draining `rx` until all senders hang up.
pub fn spawn_progress_printer(rx: Receiver<ProgressEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in rx {
            if let Some(line) = format_progress_event(&event) {
                println!("{line}");
            }
        }
    })
}

/// The end-of-run summary block.
pub fn format_run_summary(result: &RunResult) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(String::new());
    if result.completed {
        lines.push(format!("Run {} complete", result.run_id));
    } else {
        lines.push(format!(
            "Run {} interrupted - re-run the same command to resume",
            result.run_id
        ));
    }
    lines.push(format!("  source:   {}", result.source));
    lines.push(format!(
        "  packaged: {}   rejected: {}   failed: {}",
        result.count(ItemStatus::Packaged),
        result.count(ItemStatus::Rejected),
        result.count(ItemStatus::Failed),
    ));
    lines.push(format!("  elapsed:  {}ms", result.elapsed_ms));

    if !result.failures.is_empty() {
        lines.push(String::new());
        lines.push(format!("{} item(s) did not make it:", result.failures.len()));
        for failure in &result.failures {
            lines.push(format!(
                "  #{} {} [{}]: {}",
                failure.id, failure.source_ref, failure.status, failure.reason
            ));
        }
    }
    lines
}

pub fn print_run_summary(result: &RunResult) {
    for line in format_run_summary(result) {
        println!("{line}");
    }
}

/// The `inspect` command's output block.
pub fn format_inspect_report(report: &InspectReport) -> Vec<String> {
    let mut lines = vec![format!("Run {}", report.run_id)];
    if report.resumable {
        match report.resume_phase {
            Some(phase) => lines.push(format!(
                "  resumable: yes, next phase {phase} ({} item(s) pending)",
                report.pending_items
            )),
            None => lines.push("  resumable: checkpoint present, all phases done".into()),
        }
    } else {
        lines.push("  resumable: no (no checkpoint on disk)".into());
    }
    if report.item_counts.is_empty() {
        lines.push("  catalog:   empty".into());
    } else {
        for (status, count) in &report.item_counts {
            lines.push(format!("  {status:>10}: {count}"));
        }
    }
    lines
}

pub fn print_inspect_report(report: &InspectReport) {
    for line in format_inspect_report(report) {
        println!("{line}");
    }
}

/// Write the machine-readable run report next to the packaged output.
pub fn write_report(result: &RunResult, output_dir: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}-report.json", result.run_id));
    let json = serde_json::to_string_pretty(result).map_err(std::io::Error::other)?;
    fs::write(&path, json)?;
    Ok(path)
}
