use std::fmt::Display;
use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::cli::OutputArgs;
use crate::model::{REPORT_VERSION, RunReport, StepSummary};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    pub fn new(subcommand: &str) -> Self {
        Self(vec!["bookfix".to_string(), subcommand.to_string()])
    }

    pub fn flag(mut self, name: &str, value: impl Display) -> Self {
        self.0.push(format!("--{name}"));
        self.0.push(value.to_string());
        self
    }

    pub fn switch(mut self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.0.push(format!("--{name}"));
        }
        self
    }

    pub fn output(self, output: &OutputArgs) -> Self {
        let command = self
            .switch("dry-run", output.dry_run)
            .switch("json", output.json);
        match &output.report_path {
            Some(path) => command.flag("report-path", path.display()),
            None => command,
        }
    }

    pub fn render(&self) -> String {
        self.0.join(" ")
    }
}

pub fn finish(
    workspace: &mut Workspace,
    command: CommandLine,
    started: DateTime<Utc>,
    steps: Vec<StepSummary>,
    output: &OutputArgs,
) -> Result<RunReport> {
    let files = workspace.flush(output.dry_run)?;

    let report = RunReport {
        report_version: REPORT_VERSION,
        run_id: format!("run-{}", utc_compact_string(started)),
        command: command.render(),
        started_at: started.to_rfc3339_opts(SecondsFormat::Secs, true),
        finished_at: now_utc_string(),
        dry_run: output.dry_run,
        steps,
        files,
    };

    if let Some(path) = &output.report_path {
        write_json_pretty(path, &report)?;
        info!(path = %path.display(), "wrote run report");
    }

    if output.json {
        write_json_report(&report)?;
    } else {
        write_text_report(&report)?;
    }

    info!(
        run_id = %report.run_id,
        replacements = report.total_replacements(),
        files_changed = report.files.len(),
        warnings = report.warning_count(),
        dry_run = report.dry_run,
        "run completed"
    );

    Ok(report)
}

fn write_json_report(report: &RunReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    output.write_all(render_json_report(report)?.as_bytes())?;
    output.flush()?;
    Ok(())
}

fn render_json_report(report: &RunReport) -> Result<String> {
    let mut rendered =
        serde_json::to_string_pretty(report).context("failed to serialize run report")?;
    rendered.push('\n');
    Ok(rendered)
}

fn write_text_report(report: &RunReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    output.write_all(render_text_report(report).as_bytes())?;
    output.flush()?;
    Ok(())
}

pub fn render_text_report(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Run {}{}\n",
        report.run_id,
        if report.dry_run { " (dry run)" } else { "" }
    ));

    for step in &report.steps {
        out.push_str(&format!(
            "{}: {} replacement(s) in {} file(s)",
            step.step,
            step.replacements,
            step.files_touched.len()
        ));
        if !step.counts.is_empty() {
            let counts = step
                .counts
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<String>>()
                .join(" ");
            out.push_str(&format!(" [{counts}]"));
        }
        out.push('\n');
    }

    let verb = if report.dry_run {
        "would change"
    } else {
        "changed"
    };
    for file in &report.files {
        out.push_str(&format!("{verb}: {} ({})\n", file.path, file.role.as_str()));
    }
    if report.files.is_empty() {
        out.push_str("No files changed.\n");
    }

    let warning_count = report.warning_count();
    if warning_count > 0 {
        out.push_str(&format!("Warnings: {warning_count}\n"));
        for step in &report.steps {
            for warning in &step.warnings {
                out.push_str(&format!("  {}: {warning}\n", step.step));
            }
        }
    }

    out
}
