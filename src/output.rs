//! Report writers
//!
//! Persist exploration results and entity records as markdown or JSON.
//! Files are written to a temporary sibling first and renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::entity::Record;
use crate::error::OutputError;
use crate::research::ExplorationResult;

#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Write an exploration's learnings and sources, with the synthesized
    /// report when there is one.
    async fn write_exploration(
        &self,
        result: &ExplorationResult,
        report: Option<&str>,
        path: &Path,
    ) -> Result<(), OutputError>;

    async fn write_records(&self, records: &[Record], path: &Path) -> Result<(), OutputError>;
}

/// Markdown documents. Records render as a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownReportWriter;

impl MarkdownReportWriter {
    pub fn render_exploration(result: &ExplorationResult, report: Option<&str>) -> String {
        if let Some(report) = report {
            let mut out = report.trim_end().to_string();
            out.push('\n');
            return out;
        }

        let mut out = String::from("# Research Findings\n\n## Learnings\n\n");
        for learning in &result.learnings {
            out.push_str(&format!("- {}\n", learning));
        }
        out.push_str("\n## Sources\n\n");
        for url in &result.visited_sources {
            out.push_str(&format!("- {}\n", url));
        }
        out
    }

    pub fn render_records(records: &[Record]) -> String {
        let mut out = String::from("# Entity Records\n\n");
        out.push_str(
            "| Name | Status | Classification | Organization | Phase | Route | Mechanism | Events | References |\n",
        );
        out.push_str("|---|---|---|---|---|---|---|---|---|\n");

        for record in records {
            let events: Vec<String> = record
                .events
                .iter()
                .map(|event| match &event.date {
                    Some(date) => format!("{}: {}", date, event.text),
                    None => event.text.clone(),
                })
                .collect();

            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                cell(&record.name),
                record.status,
                record.classification,
                cell(record.organization.as_deref().unwrap_or("unknown")),
                record.phase,
                record.administration_route,
                cell(record.mechanism.as_deref().unwrap_or("unknown")),
                cell(&events.join("<br>")),
                cell(&record.references.join("<br>")),
            ));
        }
        out
    }
}

/// Escape pipes and flatten newlines so a value fits in one table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[async_trait]
impl ReportWriter for MarkdownReportWriter {
    async fn write_exploration(
        &self,
        result: &ExplorationResult,
        report: Option<&str>,
        path: &Path,
    ) -> Result<(), OutputError> {
        write_atomic(path, Self::render_exploration(result, report).as_bytes()).await
    }

    async fn write_records(&self, records: &[Record], path: &Path) -> Result<(), OutputError> {
        write_atomic(path, Self::render_records(records).as_bytes()).await
    }
}

/// Pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportWriter;

#[derive(Serialize)]
struct ExplorationDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a str>,
    learnings: &'a indexmap::IndexSet<String>,
    visited_sources: &'a indexmap::IndexSet<String>,
}

#[async_trait]
impl ReportWriter for JsonReportWriter {
    async fn write_exploration(
        &self,
        result: &ExplorationResult,
        report: Option<&str>,
        path: &Path,
    ) -> Result<(), OutputError> {
        let document = ExplorationDocument {
            report,
            learnings: &result.learnings,
            visited_sources: &result.visited_sources,
        };
        let json = serde_json::to_string_pretty(&document)?;
        write_atomic(path, json.as_bytes()).await
    }

    async fn write_records(&self, records: &[Record], path: &Path) -> Result<(), OutputError> {
        let json = serde_json::to_string_pretty(records)?;
        write_atomic(path, json.as_bytes()).await
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let temp = temp_path(path);
    fs::write(&temp, contents).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }

    info!(path = %path.display(), bytes = contents.len(), "Report written");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
