use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info};

use crate::cli::FixTocLevelsArgs;
use crate::commands::report::{self, CommandLine};
use crate::markup::{LevelTagScanner, RetagOutcome, condense_whitespace, strip_tags};
use crate::model::StepSummary;
use crate::toc::OutlineScanner;
use crate::workspace::Workspace;

pub const STEP: &str = "fix-toc-levels";

pub fn run(args: FixTocLevelsArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_outline(&args.outline.toc)?;

    let summary = apply(&mut workspace, &OutlineScanner::new()?)?;

    let command = CommandLine::new(STEP)
        .flag("toc", args.outline.toc.display())
        .output(&args.output);
    report::finish(&mut workspace, command, started, vec![summary], &args.output)?;
    Ok(())
}

pub fn apply(workspace: &mut Workspace, scanner: &OutlineScanner) -> Result<StepSummary> {
    let path = workspace.outline_path()?;
    let levels = LevelTagScanner::new("toclevel")?;
    let leading_entry = Regex::new(r"(?s)^\s*<tocentry\b[^>]*>(.*?)</tocentry>")
        .context("failed to compile leading entry regex")?;
    let mut summary = StepSummary::new(STEP);

    let outcome = retag_levels(workspace.text(&path)?, &levels, &leading_entry, scanner);

    for change in &outcome.changes {
        debug!(line = change.line, from = change.from, to = change.to, "retagged outline level");
        summary.count(&format!("level{}_to_level{}", change.from, change.to), 1);
    }
    for warning in &outcome.warnings {
        summary.warn_in(&path, warning);
    }
    summary.record(&path, outcome.changes.len());

    if !outcome.changes.is_empty() {
        workspace.replace(&path, outcome.text)?;
    }

    info!(levels_retagged = summary.replacements, "outline level repair finished");
    Ok(summary)
}

fn retag_levels(
    text: &str,
    levels: &LevelTagScanner,
    leading_entry: &Regex,
    scanner: &OutlineScanner,
) -> RetagOutcome {
    levels.retag(text, |open| {
        let captures = leading_entry.captures(open.tail)?;
        let label_text = condense_whitespace(&strip_tags(captures.get(1)?.as_str()));
        let label = scanner.numeric_label(&label_text)?;
        let components = label.components.len();
        (components >= 2).then(|| components - 1)
    })
}
