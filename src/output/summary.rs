use std::fmt::Write;

use comfy_table::Cell;

use crate::insights::{DurationReport, GroupStats, VariantStats};

use super::styling::{heading, highlight, label, name};
use super::tables::{color_coded_duration_cell, create_table, cyan_header, format_minutes};

/// Prints a human-readable summary of the duration report to stdout.
///
/// Durations are in minutes and colored against the dataset median:
/// green at or below it, yellow up to 25% above, red beyond.
pub fn print_summary(report: &DurationReport) {
    println!("{}", render_summary(report));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", heading(emoji), heading(title).underlined());
}

fn group_table(output: &mut String, emoji: &str, title: &str, groups: &[GroupStats], baseline: f64) {
    if groups.is_empty() {
        return;
    }

    add_section_header(output, emoji, title);

    let mut table = create_table();
    table.set_header(cyan_header(&["Value", "Count", "Mean", "Median"]));
    for group in groups {
        table.add_row(vec![
            Cell::new(display_key(&group.key)),
            Cell::new(group.count),
            color_coded_duration_cell(group.mean, baseline),
            Cell::new(format_minutes(group.median)),
        ]);
    }

    let _ = write!(output, "{table}\n\n");
}

fn variant_table(output: &mut String, emoji: &str, title: &str, variants: &[VariantStats], baseline: f64) {
    if variants.is_empty() {
        return;
    }

    add_section_header(output, emoji, title);

    let mut table = create_table();
    table.set_header(cyan_header(&["#", "Variant", "Count", "Mean"]));
    for (idx, variant) in variants.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(display_key(&variant.variant)),
            Cell::new(variant.count),
            color_coded_duration_cell(variant.mean, baseline),
        ]);
    }

    let _ = write!(output, "{table}\n\n");
}

fn display_key(key: &str) -> &str {
    if key.is_empty() {
        "(none)"
    } else {
        key
    }
}

pub(super) fn render_summary(report: &DurationReport) -> String {
    let mut output = String::new();
    let summary = &report.summary;

    add_section_header(&mut output, "📊", "Overview");

    let date_range = match (summary.first_date, summary.last_date) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "N/A".to_string(),
    };

    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        label("Repository:"),
        name(&report.repo),
        label("Step:"),
        name(&report.step_name),
        label("Observations:"),
        highlight(summary.total_observations),
        label("Workflow runs:"),
        highlight(summary.distinct_runs),
        label("Date range:"),
        date_range,
        label("Distinct dates:"),
        highlight(summary.distinct_dates),
        label("Generated:"),
        label(report.generated_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if summary.total_observations == 0 {
        let _ = writeln!(output, "{}", highlight("No observations in the dataset."));
        return output;
    }

    add_section_header(&mut output, "⏱", "Duration");

    let duration = &summary.duration;
    let mut duration_table = create_table();
    duration_table.set_header(cyan_header(&["Mean", "Median", "Min", "Max", "Std Dev"]));
    duration_table.add_row(vec![
        Cell::new(format_minutes(duration.mean)),
        Cell::new(format_minutes(duration.median)),
        Cell::new(format_minutes(duration.min)),
        Cell::new(format_minutes(duration.max)),
        Cell::new(duration.std_dev.map_or_else(|| "N/A".to_string(), format_minutes)),
    ]);
    let _ = write!(output, "{duration_table}\n\n");

    let baseline = duration.median;
    group_table(&mut output, "🖥", "By OS", &summary.by_os, baseline);
    group_table(&mut output, "🐍", "By Python Version", &summary.by_python_version, baseline);
    group_table(&mut output, "🔧", "By Tool Version", &summary.by_tool_version, baseline);
    variant_table(&mut output, "🚀", "Fastest Variants", &summary.fastest_variants, baseline);

    let slowest: Vec<VariantStats> = summary.slowest_variants.iter().rev().cloned().collect();
    variant_table(&mut output, "🐌", "Slowest Variants", &slowest, baseline);

    let releases = &report.combined.releases;
    if !releases.is_empty() {
        add_section_header(&mut output, "🏷", "Releases");

        let mut table = create_table();
        table.set_header(cyan_header(&["Release", "Published", "Nearest Run"]));
        for placed in releases {
            let marker = &placed.marker;
            let run_id = report
                .combined
                .runs
                .get(marker.run_index)
                .map_or("N/A", |run| run.run_id.as_str());
            table.add_row(vec![
                Cell::new(&marker.name),
                Cell::new(marker.published_at.format("%Y-%m-%d")),
                Cell::new(run_id),
            ]);
        }
        let _ = write!(output, "{table}\n\n");
    }

    output
}
