//! The compose module writes the combined analysis report: a JSON document for machines
//! and a Markdown file for people.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::analyze::{AnalysisOutcome, AnalysisResult};
use crate::constants::{ANALYSIS_JSON_FILE, ANALYSIS_REPORT_FILE};
use crate::error::Result;
use crate::prompt::Focus;
use crate::storage::{write_file, write_json};

/// Machine-readable rendering of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub foci: Vec<Focus>,
    pub sites_analyzed: usize,
    pub results: Vec<AnalysisResult>,
}

/// Files produced by [`compose_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writes `analysis.json` and `README.md` for `results` into `output_dir`, keeping the
/// order of `results`.
///
/// # Errors
///
/// Returns an error if either file cannot be written
pub fn compose_report(
    results: &[AnalysisResult],
    model: &str,
    foci: &[Focus],
    output_dir: &Path,
) -> Result<ReportPaths> {
    let mut sites: Vec<&str> = results.iter().map(|result| result.url.as_str()).collect();
    sites.dedup();

    let report = AnalysisReport {
        model: model.to_string(),
        generated_at: Utc::now(),
        foci: foci.to_vec(),
        sites_analyzed: sites.len(),
        results: results.to_vec(),
    };

    let paths = ReportPaths {
        json: output_dir.join(ANALYSIS_JSON_FILE),
        markdown: output_dir.join(ANALYSIS_REPORT_FILE),
    };

    write_json(&paths.json, &report)?;
    write_file(&paths.markdown, render_markdown(&report))?;

    info!(
        "Analysis saved to {} and {}",
        paths.markdown.display(),
        paths.json.display()
    );
    Ok(paths)
}

/// Human-readable rendering of `report`.
pub fn render_markdown(report: &AnalysisReport) -> String {
    let foci = report
        .foci
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let mut markdown = format!(
        "# Website Analysis Report\n\n\
         **Generated**: {}  \n\
         **Model**: {}  \n\
         **Focus**: {}  \n\
         **Sites Analyzed**: {}\n\n---\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.model,
        foci,
        report.sites_analyzed,
    );

    for result in &report.results {
        markdown.push_str(&format!(
            "## {} ({})\n<{}>\n\n",
            result.site, result.focus, result.url
        ));
        markdown.push_str(&match &result.outcome {
            AnalysisOutcome::Response(response) => format!("{response}\n\n"),
            AnalysisOutcome::Error(error) => format!("> **Error**: {error}\n\n"),
        });
    }

    markdown.push_str("---\n\n*Generated by sitescribe*\n");
    markdown
}
