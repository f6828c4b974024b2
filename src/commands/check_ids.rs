use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::CheckIdsArgs;
use crate::commands::report::{self, CommandLine};
use crate::markup::{IdFinder, IdOccurrence, apply_edits};
use crate::model::StepSummary;
use crate::workspace::Workspace;

pub const STEP: &str = "check-ids";

pub fn run(args: CheckIdsArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_content_dir(&args.layout.dir, Some(&args.layout.toc))?;

    let summary = apply(&mut workspace, args.fix)?;

    let command = CommandLine::new(STEP)
        .flag("dir", args.layout.dir.display())
        .flag("toc", args.layout.toc.display())
        .switch("fix", args.fix)
        .output(&args.output);
    report::finish(&mut workspace, command, started, vec![summary], &args.output)?;
    Ok(())
}

pub fn apply(workspace: &mut Workspace, fix: bool) -> Result<StepSummary> {
    let finder = IdFinder::new()?;
    let mut summary = StepSummary::new(STEP);
    let paths = workspace.content_paths();

    let mut occurrences: BTreeMap<String, Vec<(usize, IdOccurrence)>> = BTreeMap::new();
    let mut seen_order: Vec<String> = Vec::new();
    for (file_index, path) in paths.iter().enumerate() {
        for occurrence in finder.find_all(workspace.text(path)?) {
            let entry = occurrences.entry(occurrence.value.clone()).or_default();
            if entry.is_empty() {
                seen_order.push(occurrence.value.clone());
            }
            entry.push((file_index, occurrence));
        }
    }

    let mut taken: HashSet<String> = occurrences.keys().cloned().collect();
    let mut edits: BTreeMap<usize, Vec<(Range<usize>, String)>> = BTreeMap::new();
    let mut duplicated = 0;

    for value in &seen_order {
        let Some(found) = occurrences.get(value) else {
            continue;
        };
        if found.len() < 2 {
            continue;
        }
        duplicated += 1;

        let locations = found
            .iter()
            .map(|(file_index, occurrence)| {
                format!("{}:{}", display_name(&paths[*file_index]), occurrence.line)
            })
            .collect::<Vec<String>>()
            .join(", ");
        summary.warn(format!(
            "id {value} used {} times: {locations}",
            found.len()
        ));

        if !fix {
            continue;
        }
        for (file_index, occurrence) in found.iter().skip(1) {
            let fresh = next_free_suffix(value, &taken);
            debug!(
                path = %paths[*file_index].display(),
                line = occurrence.line,
                from = %value,
                to = %fresh,
                "suffixing duplicate id"
            );
            taken.insert(fresh.clone());
            edits
                .entry(*file_index)
                .or_default()
                .push((occurrence.span.clone(), fresh));
        }
    }
    summary.count("duplicated_ids", duplicated);

    for (file_index, file_edits) in edits {
        let path = &paths[file_index];
        let count = file_edits.len();
        let updated = apply_edits(workspace.text(path)?, file_edits);
        workspace.replace(path, updated)?;
        summary.record(path, count);
        summary.count("suffixed", count);
    }

    info!(
        duplicated_ids = duplicated,
        suffixed = summary.replacements,
        "identifier uniqueness check finished"
    );
    Ok(summary)
}

fn next_free_suffix(value: &str, taken: &HashSet<String>) -> String {
    let mut counter = 1;
    loop {
        let candidate = format!("{value}-dup{counter}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| path.display().to_string())
}
