use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const REPORT_VERSION: u32 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Content,
    Outline,
    Entities,
}

impl FileRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Outline => "outline",
            Self::Entities => "entities",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub role: FileRole,
    pub sha256_before: String,
    pub sha256_after: String,
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub written: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepSummary {
    pub step: String,
    pub replacements: usize,
    pub files_touched: Vec<String>,
    pub counts: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
}

impl StepSummary {
    pub fn new(step: &str) -> Self {
        Self {
            step: step.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, path: &Path, replacements: usize) {
        if replacements == 0 {
            return;
        }
        self.replacements += replacements;
        let display = path.display().to_string();
        if !self.files_touched.contains(&display) {
            self.files_touched.push(display);
        }
    }

    pub fn count(&mut self, key: &str, amount: usize) {
        if amount == 0 {
            return;
        }
        *self.counts.entry(key.to_string()).or_insert(0) += amount;
    }

    pub fn warn(&mut self, message: String) {
        warn!(step = %self.step, "{message}");
        self.warnings.push(message);
    }

    pub fn warn_in(&mut self, path: &Path, message: &str) {
        self.warn(format!("{}: {message}", path.display()));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub report_version: u32,
    pub run_id: String,
    pub command: String,
    pub started_at: String,
    pub finished_at: String,
    pub dry_run: bool,
    pub steps: Vec<StepSummary>,
    pub files: Vec<FileChange>,
}

impl RunReport {
    pub fn total_replacements(&self) -> usize {
        self.steps.iter().map(|step| step.replacements).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.steps.iter().map(|step| step.warnings.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfPage {
    pub page: usize,
    pub char_count: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfTextDump {
    pub source: String,
    pub sha256: String,
    pub page_count: usize,
    pub empty_page_count: usize,
    pub pages: Vec<PdfPage>,
}
