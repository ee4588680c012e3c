//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl results,
//! including page statistics, per-field coverage and failed pages.

use crate::output::traits::{CrawlSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown summary to a file
///
/// # Arguments
///
/// * `summary` - The crawl summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Review-Cascade Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Start URL**: {}\n", summary.start_url));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total Pages**: {}\n", summary.total_pages));
    md.push_str(&format!(
        "- **Records Extracted**: {}\n",
        summary.records_emitted
    ));
    md.push_str(&format!("- **Total Errors**: {}\n", summary.total_errors));
    if summary.tasks_dropped > 0 {
        md.push_str(&format!(
            "- **Tasks Dropped**: {}\n",
            summary.tasks_dropped
        ));
    }
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        summary.success_rate()
    ));
    md.push_str(&format!(
        "- **Error Rate**: {:.2}%\n\n",
        summary.error_rate()
    ));

    // Level breakdown
    md.push_str("## Pages by Level\n\n");
    md.push_str("| Level | Pages |\n");
    md.push_str("|-------|-------|\n");
    for (level, count) in &summary.pages_by_level {
        md.push_str(&format!("| {} | {} |\n", level, count));
    }
    md.push('\n');

    // Field coverage
    if !summary.field_coverage.is_empty() {
        md.push_str("## Field Coverage\n\n");
        md.push_str("| Field | Present | Absent | Coverage |\n");
        md.push_str("|-------|---------|--------|----------|\n");
        for (field, coverage) in &summary.field_coverage {
            md.push_str(&format!(
                "| {} | {} | {} | {:.1}% |\n",
                field,
                coverage.present,
                coverage.absent,
                coverage.percent_present()
            ));
        }
        md.push('\n');
    }

    // Error summary
    if !summary.error_summary.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");

        let mut errors: Vec<_> = summary.error_summary.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1));
        for (state, count) in errors {
            md.push_str(&format!("| {} | {} |\n", state, count));
        }
        md.push('\n');
    }

    // Failed pages
    if !summary.failed_pages.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Level | State | Message |\n");
        md.push_str("|-----|-------|-------|---------|\n");
        for page in &summary.failed_pages {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                page.url,
                page.level,
                page.state,
                page.message.as_deref().unwrap_or("")
            ));
        }
        md.push('\n');
    }

    md
}
