//! Per-run evaluation records and the on-disk report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::Approach;
use crate::runner::ExecutionResult;
use crate::scoring::AggregatedScore;

/// Outcome of one (case, approach) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    pub case_name: String,
    pub approach: Approach,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    pub scores: AggregatedScore,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Set when the run failed before it could be scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvalRecord {
    /// Record for a run that failed at the case boundary.
    pub fn failed(case_name: impl Into<String>, approach: Approach, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            case_name: case_name.into(),
            approach,
            generated_code: None,
            execution: None,
            scores: AggregatedScore::failed(error.clone()),
            metadata: Map::new(),
            error: Some(error),
        }
    }

    pub fn compound_score(&self) -> Option<f64> {
        self.scores.compound_score()
    }
}

/// Per-approach rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachSummary {
    pub approach: Approach,
    pub cases: usize,
    pub errors: usize,
    /// Mean compound over records that have one.
    pub mean_compound: Option<f64>,
}

/// Full record of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub model: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub records: Vec<EvalRecord>,
    #[serde(default)]
    pub summary: Vec<ApproachSummary>,
}

impl RunReport {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            model: model.into(),
            started_at: Utc::now(),
            finished_at: None,
            records: Vec::new(),
            summary: Vec::new(),
        }
    }

    pub fn push(&mut self, record: EvalRecord) {
        self.records.push(record);
    }

    /// Stamp the end time and compute the summary.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.summary = self.summarize();
    }

    pub fn records_for(&self, approach: Approach) -> impl Iterator<Item = &EvalRecord> {
        self.records.iter().filter(move |r| r.approach == approach)
    }

    pub fn record(&self, case_name: &str, approach: Approach) -> Option<&EvalRecord> {
        self.records
            .iter()
            .find(|r| r.case_name == case_name && r.approach == approach)
    }

    /// One summary per approach that has records, in run order.
    pub fn summarize(&self) -> Vec<ApproachSummary> {
        Approach::ALL
            .iter()
            .filter_map(|&approach| {
                let records: Vec<&EvalRecord> = self.records_for(approach).collect();
                if records.is_empty() {
                    return None;
                }
                let compounds: Vec<f64> =
                    records.iter().filter_map(|r| r.compound_score()).collect();
                let mean_compound = if compounds.is_empty() {
                    None
                } else {
                    Some(compounds.iter().sum::<f64>() / compounds.len() as f64)
                };
                Some(ApproachSummary {
                    approach,
                    cases: records.len(),
                    errors: records.iter().filter(|r| r.error.is_some()).count(),
                    mean_compound,
                })
            })
            .collect()
    }

    /// Write the report as pretty JSON to `<dir>/<run_id>.json`.
    pub fn write_json(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Plain-text table of per-case compounds by approach.
    pub fn render_table(&self) -> String {
        let mut case_names: Vec<&str> = Vec::new();
        for record in &self.records {
            if !case_names.contains(&record.case_name.as_str()) {
                case_names.push(&record.case_name);
            }
        }
        let width = case_names
            .iter()
            .map(|n| n.len())
            .chain(std::iter::once("case".len()))
            .max()
            .unwrap_or(4);

        let mut out = format!("{:<width$}", "case", width = width);
        for approach in Approach::ALL {
            out.push_str(&format!("  {:>18}", approach.display_name()));
        }
        out.push('\n');

        for name in &case_names {
            out.push_str(&format!("{:<width$}", name, width = width));
            for approach in Approach::ALL {
                let cell = match self.record(name, approach) {
                    None => "-".to_string(),
                    Some(r) if r.error.is_some() => "error".to_string(),
                    Some(r) => format_score(r.compound_score()),
                };
                out.push_str(&format!("  {:>18}", cell));
            }
            out.push('\n');
        }

        out.push_str(&format!("{:<width$}", "mean", width = width));
        let summary = self.summarize();
        for approach in Approach::ALL {
            let cell = summary
                .iter()
                .find(|s| s.approach == approach)
                .map_or("-".to_string(), |s| format_score(s.mean_compound));
            out.push_str(&format!("  {:>18}", cell));
        }
        out.push('\n');
        out
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or("n/a".to_string(), |s| format!("{:.3}", s))
}
