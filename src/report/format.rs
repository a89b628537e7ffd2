//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::SnrScale;
use crate::report::{PaneRow, RunSummary};

/// Format the run header (source, dataset stats, thresholds).
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== cv - Two-Component Error Model ===\n");
    out.push_str(&format!("Source: {}\n", summary.source));
    if let Some(records) = summary.records {
        out.push_str(&format!("Records: {records}\n"));
    }
    out.push_str(&format!(
        "Groups: {} | points={} | panes={}\n",
        summary.groups, summary.points, summary.panes
    ));
    let excluded = summary.excluded_replicates + summary.excluded_non_finite;
    if excluded > 0 {
        out.push_str(&format!(
            "Excluded groups: {excluded} (insufficient replicates={}, non-finite={})\n",
            summary.excluded_replicates, summary.excluded_non_finite
        ));
    }
    out.push_str(&format!(
        "Thresholds: p_low={} p_high={} | fit={}\n",
        summary.thresholds.p_low,
        summary.thresholds.p_high,
        if summary.fit_enabled { "on" } else { "off" }
    ));

    out
}

/// Format the per-pane results table.
pub fn format_results_table(rows: &[PaneRow], scale: SnrScale) -> String {
    let snr_header = match scale {
        SnrScale::Linear => "SNR",
        SnrScale::Db => "SNR (dB)",
    };

    let mut out = String::new();
    out.push_str(
        format!(
            "{:<28} {:>6} {:>5} {:>5} {:<36} {:>10} {:>8} {:>9}",
            "pane", "points", "low", "high", "status", "sigma0", "cv1", snr_header
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<28} {:-<6} {:-<5} {:-<5} {:-<36} {:-<10} {:-<8} {:-<9}",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:<28} {:>6} {:>5} {:>5} {:<36} {:>10} {:>8} {:>9}",
                truncate(&r.label, 28),
                r.points,
                r.low,
                r.high,
                truncate(&r.status, 36),
                fmt_opt(r.sigma0, 4),
                fmt_opt(r.cv1, 4),
                fmt_opt(r.snr, 2),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.decimals$}"),
        _ => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
