use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info};

use crate::cli::FixEntitiesArgs;
use crate::commands::report::{self, CommandLine};
use crate::ident::IdScheme;
use crate::markup::{LineCounter, apply_edits};
use crate::model::StepSummary;
use crate::workspace::Workspace;

pub const STEP: &str = "fix-entities";

pub fn run(args: FixEntitiesArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_content_dir(&args.layout.dir, Some(&args.layout.toc))?;
    workspace.add_entities(&args.entities)?;

    let summary = apply(&mut workspace)?;

    let command = CommandLine::new(STEP)
        .flag("dir", args.layout.dir.display())
        .flag("toc", args.layout.toc.display())
        .flag("entities", args.entities.display())
        .output(&args.output);
    report::finish(&mut workspace, command, started, vec![summary], &args.output)?;
    Ok(())
}

struct EntityPatterns {
    declaration: Regex,
    reference: Regex,
}

impl EntityPatterns {
    fn new() -> Result<Self> {
        Ok(Self {
            declaration: Regex::new(r"<!ENTITY\s+(%\s+)?([A-Za-z_][-\w.]*)")
                .context("failed to compile entity declaration regex")?,
            reference: Regex::new(r"&([A-Za-z_][-\w.]*);")
                .context("failed to compile entity reference regex")?,
        })
    }
}

pub fn apply(workspace: &mut Workspace) -> Result<StepSummary> {
    let entities_path = workspace
        .entities_path()
        .context("no entity file loaded for this pass")?;
    let patterns = EntityPatterns::new()?;
    let ids = IdScheme::new()?;
    let mut summary = StepSummary::new(STEP);

    let planned = plan_renames(workspace.text(&entities_path)?, &patterns, &ids);
    for warning in &planned.warnings {
        summary.warn_in(&entities_path, warning);
    }
    if planned.renames.is_empty() {
        info!("no legacy entity names found");
        return Ok(summary);
    }

    let declarations = planned.edits.len();
    let updated = apply_edits(workspace.text(&entities_path)?, planned.edits);
    workspace.replace(&entities_path, updated)?;
    summary.record(&entities_path, declarations);
    summary.count("declarations_renamed", declarations);

    let content: Vec<PathBuf> = workspace.content_paths();
    for path in content {
        let (text, replaced) = rewrite_references(workspace.text(&path)?, &patterns, &planned.renames);
        if replaced > 0 {
            debug!(path = %path.display(), replaced, "rewrote entity references");
            workspace.replace(&path, text)?;
            summary.record(&path, replaced);
            summary.count("references_rewritten", replaced);
        }
    }

    info!(
        entities_renamed = declarations,
        replacements = summary.replacements,
        "entity repair finished"
    );
    Ok(summary)
}

#[derive(Debug, Default)]
struct EntityPlan {
    renames: BTreeMap<String, String>,
    edits: Vec<(std::ops::Range<usize>, String)>,
    warnings: Vec<String>,
}

fn plan_renames(text: &str, patterns: &EntityPatterns, ids: &IdScheme) -> EntityPlan {
    let mut plan = EntityPlan::default();

    let declared: Vec<(std::ops::Range<usize>, String)> = patterns
        .declaration
        .captures_iter(text)
        .filter(|captures| captures.get(1).is_none())
        .filter_map(|captures| {
            let name = captures.get(2)?;
            Some((name.range(), name.as_str().to_string()))
        })
        .collect();
    let mut taken: HashSet<String> = declared.iter().map(|(_, name)| name.clone()).collect();
    let mut lines = LineCounter::new(text);

    for (span, name) in declared {
        let Some((_, canonical)) = ids.classify_legacy(&name) else {
            continue;
        };
        if taken.contains(&canonical) {
            plan.warnings.push(format!(
                "line {}: entity {name} would become {canonical}, which is already declared",
                lines.line_at(span.start)
            ));
            continue;
        }
        taken.insert(canonical.clone());
        plan.edits.push((span, canonical.clone()));
        plan.renames.insert(name, canonical);
    }

    plan
}

fn rewrite_references(
    text: &str,
    patterns: &EntityPatterns,
    renames: &BTreeMap<String, String>,
) -> (String, usize) {
    let mut replaced = 0;
    let result = patterns
        .reference
        .replace_all(text, |captures: &regex::Captures<'_>| {
            let whole = captures.get(0).map(|m| m.as_str()).unwrap_or("");
            match captures.get(1).and_then(|name| renames.get(name.as_str())) {
                Some(canonical) => {
                    replaced += 1;
                    format!("&{canonical};")
                }
                None => whole.to_string(),
            }
        });
    (result.into_owned(), replaced)
}
