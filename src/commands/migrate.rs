use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::cli::{FrontMatterArgs, MatchArgs, MigrateArgs};
use crate::commands::report::{self, CommandLine};
use crate::commands::{
    check_ids, entities, fix_depth, fix_xrefs, front_matter, reconcile, toc_levels, toc_titles,
};
use crate::model::StepSummary;
use crate::toc::OutlineScanner;
use crate::workspace::Workspace;

pub const STEP: &str = "migrate";

pub fn run(args: MigrateArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_content_dir(&args.layout.dir, Some(&args.layout.toc))?;
    workspace.add_outline(&args.layout.toc)?;
    if args.entities.is_file() {
        workspace.add_entities(&args.entities)?;
    } else {
        info!(path = %args.entities.display(), "entity file missing; entity repair skipped");
    }

    let scanner = match &args.placeholder {
        Some(pattern) => OutlineScanner::with_placeholder(pattern)?,
        None => OutlineScanner::new()?,
    };
    let steps = run_sequence(&mut workspace, &scanner, &args.front_matter, &args.matching)?;

    let mut command = CommandLine::new(STEP)
        .flag("dir", args.layout.dir.display())
        .flag("toc", args.layout.toc.display())
        .flag("entities", args.entities.display())
        .flag("front-matter-title", format!("{:?}", args.front_matter.title))
        .flag("front-matter-linkend", &args.front_matter.linkend)
        .flag("first-chapter", args.front_matter.first_chapter)
        .flag("min-match-chars", args.matching.min_match_chars)
        .switch("ignore-depth", args.matching.ignore_depth)
        .switch("no-update-references", args.matching.no_update_references);
    if let Some(pattern) = &args.placeholder {
        command = command.flag("placeholder", pattern);
    }
    report::finish(
        &mut workspace,
        command.output(&args.output),
        started,
        steps,
        &args.output,
    )?;
    Ok(())
}

/// The fixed repair order. Every pass sees the edits of the passes before it;
/// nothing is written until the caller flushes the workspace.
pub fn run_sequence(
    workspace: &mut Workspace,
    scanner: &OutlineScanner,
    front_matter_options: &FrontMatterArgs,
    matching: &MatchArgs,
) -> Result<Vec<StepSummary>> {
    let mut steps = Vec::new();

    info!(step = fix_xrefs::STEP, "running step");
    steps.push(fix_xrefs::apply(workspace, true)?);

    if workspace.entities_path().is_some() {
        info!(step = entities::STEP, "running step");
        steps.push(entities::apply(workspace)?);
    }

    info!(step = fix_depth::STEP, "running step");
    steps.push(fix_depth::apply(workspace)?);

    info!(step = toc_levels::STEP, "running step");
    steps.push(toc_levels::apply(workspace, scanner)?);

    info!(step = toc_titles::STEP, "running step");
    steps.push(toc_titles::apply(workspace, scanner)?);

    info!(step = front_matter::STEP, "running step");
    steps.push(front_matter::apply(workspace, scanner, front_matter_options)?);

    info!(step = reconcile::STEP, "running step");
    steps.push(reconcile::apply(workspace, scanner, matching)?);

    // final patch: uniqueness is restored after every rename above
    info!(step = check_ids::STEP, "running step");
    steps.push(check_ids::apply(workspace, true)?);

    Ok(steps)
}
