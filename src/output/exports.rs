use anyhow::Result;
use std::io::Write;

use crate::config::OutputFormat;
use crate::insights::{DurationReport, GroupStats, VariantStats};
use crate::providers::github::types::links;

use super::summary::render_summary;

/// Writes the report in the requested format.
///
/// - Summary: the terminal tables, as printed by `print_summary`
/// - JSON: the complete report, chart data included, for a rendering consumer
/// - Markdown: the summary statistics as a standalone document
pub fn export_report(
    report: &DurationReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", render_summary(report))?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Markdown => export_markdown(report, output),
    }
}

fn export_json(report: &DurationReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_markdown(report: &DurationReport, output: &mut dyn Write) -> Result<()> {
    let summary = &report.summary;

    writeln!(output, "# {} duration: {}", report.step_name, report.repo)?;
    writeln!(output)?;
    writeln!(output, "## Summary Statistics")?;
    writeln!(output)?;
    writeln!(output, "- **Observations**: {}", summary.total_observations)?;
    writeln!(output, "- **Workflow runs**: {}", summary.distinct_runs)?;
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        writeln!(output, "- **Date range**: {first} to {last}")?;
    }
    writeln!(output, "- **Distinct dates**: {}", summary.distinct_dates)?;
    writeln!(output)?;

    if summary.total_observations == 0 {
        return Ok(());
    }

    let duration = &summary.duration;
    writeln!(output, "### Duration")?;
    writeln!(output)?;
    writeln!(output, "- **Average**: {:.2} minutes", duration.mean)?;
    writeln!(output, "- **Median**: {:.2} minutes", duration.median)?;
    writeln!(output, "- **Min**: {:.2} minutes", duration.min)?;
    writeln!(output, "- **Max**: {:.2} minutes", duration.max)?;
    match duration.std_dev {
        Some(std_dev) => writeln!(output, "- **Std Dev**: {std_dev:.2} minutes")?,
        None => writeln!(output, "- **Std Dev**: N/A")?,
    }
    writeln!(output)?;

    write_group_table(output, "By Operating System", "OS", &summary.by_os)?;
    write_group_table(output, "By Python Version", "Python Version", &summary.by_python_version)?;
    write_group_table(output, "By Tool Version", "Tool Version", &summary.by_tool_version)?;

    writeln!(output, "### Variant Performance")?;
    writeln!(output)?;
    write_variant_table(output, "Fastest 5 variants (by average duration)", &summary.fastest_variants)?;
    write_variant_table(output, "Slowest 5 variants (by average duration)", &summary.slowest_variants)?;

    let releases = &report.combined.releases;
    if !releases.is_empty() {
        writeln!(output, "## Releases")?;
        writeln!(output)?;
        writeln!(output, "| Release | Published | Nearest Run |")?;
        writeln!(output, "|---|---|---|")?;
        for placed in releases {
            let marker = &placed.marker;
            let run = report.combined.runs.get(marker.run_index).map_or_else(
                || "N/A".to_string(),
                |run| format!("[{}]({})", run.run_id, run.url),
            );
            writeln!(
                output,
                "| [{}]({}) | {} | {} |",
                marker.name,
                links::release_url(&report.repo, &marker.tag),
                marker.published_at.format("%Y-%m-%d"),
                run
            )?;
        }
        writeln!(output)?;
    }

    Ok(())
}

fn write_group_table(
    output: &mut dyn Write,
    title: &str,
    column: &str,
    groups: &[GroupStats],
) -> Result<()> {
    writeln!(output, "### {title}")?;
    writeln!(output)?;
    writeln!(output, "| {column} | Observations | Avg Duration | Median Duration |")?;
    writeln!(output, "|---|---:|---:|---:|")?;
    for group in groups {
        writeln!(
            output,
            "| {} | {} | {:.2} min | {:.2} min |",
            group.key, group.count, group.mean, group.median
        )?;
    }
    writeln!(output)?;
    Ok(())
}

fn write_variant_table(output: &mut dyn Write, title: &str, variants: &[VariantStats]) -> Result<()> {
    writeln!(output, "**{title}**:")?;
    writeln!(output)?;
    writeln!(output, "| Variant | Observations | Avg Duration |")?;
    writeln!(output, "|---|---:|---:|")?;
    for variant in variants {
        writeln!(
            output,
            "| {} | {} | {:.2} min |",
            variant.variant, variant.count, variant.mean
        )?;
    }
    writeln!(output)?;
    Ok(())
}
