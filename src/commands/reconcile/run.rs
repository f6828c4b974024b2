use super::*;

pub fn run(args: ReconcileIdsArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_content_dir(&args.layout.dir, Some(&args.layout.toc))?;
    workspace.add_outline(&args.layout.toc)?;

    let scanner = match &args.placeholder {
        Some(pattern) => OutlineScanner::with_placeholder(pattern)?,
        None => OutlineScanner::new()?,
    };
    let summary = apply(&mut workspace, &scanner, &args.matching)?;

    let mut command = CommandLine::new(STEP)
        .flag("dir", args.layout.dir.display())
        .flag("toc", args.layout.toc.display())
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
        vec![summary],
        &args.output,
    )?;
    Ok(())
}

pub fn apply(
    workspace: &mut Workspace,
    scanner: &OutlineScanner,
    options: &MatchArgs,
) -> Result<StepSummary> {
    let mut summary = StepSummary::new(STEP);
    let outline_path = workspace.outline_path()?;
    let index = TitleIndex::build(scanner, workspace.text(&outline_path)?);

    if index.is_empty() {
        summary.warn_in(&outline_path, "outline has no titled entries with linkends");
        return Ok(summary);
    }
    info!(entries = index.len(), "built outline title index");

    let ids = IdScheme::new()?;
    let matcher = TitleMatcher {
        index: &index,
        ids: &ids,
        min_match_chars: options.min_match_chars,
        check_depth: !options.ignore_depth,
    };
    let id_finder = IdFinder::new()?;
    let finder = TitledElementFinder::new()?;
    let paths = workspace.content_paths();

    let mut in_use: HashMap<String, usize> = HashMap::new();
    for path in &paths {
        for occurrence in id_finder.find_all(workspace.text(path)?) {
            *in_use.entry(occurrence.value).or_insert(0) += 1;
        }
    }

    let mut claimed: HashSet<String> = HashSet::new();
    let mut renames: Vec<(String, String)> = Vec::new();

    for path in &paths {
        let text = workspace.text(path)?;
        let mut edits = Vec::new();

        for element in finder.find_all(text) {
            let key = scanner.title_key(&element.title);
            if key.is_empty() {
                continue;
            }

            let Some((entry, kind)) = matcher.best_match(&element, &key, &claimed) else {
                debug!(path = %path.display(), line = element.line, id = %element.id, "no outline match");
                summary.count("unmatched", 1);
                continue;
            };

            if entry.linkend == element.id {
                claimed.insert(entry.linkend.clone());
                summary.count("confirmed", 1);
                continue;
            }

            if in_use.get(&entry.linkend).copied().unwrap_or(0) > 0 {
                summary.warn_in(
                    path,
                    &format!(
                        "line {}: {:?} matches outline entry {:?} but id {} is already in use",
                        element.line, element.title, entry.text, entry.linkend
                    ),
                );
                summary.count("conflicts", 1);
                continue;
            }

            debug!(
                path = %path.display(),
                line = element.line,
                from = %element.id,
                to = %entry.linkend,
                kind = kind.as_str(),
                "renaming element id"
            );
            edits.push((element.id_span.clone(), entry.linkend.clone()));
            claimed.insert(entry.linkend.clone());
            *in_use.entry(entry.linkend.clone()).or_insert(0) += 1;
            if let Some(count) = in_use.get_mut(&element.id) {
                *count = count.saturating_sub(1);
            }
            renames.push((element.id.clone(), entry.linkend.clone()));
            summary.count(kind.as_str(), 1);
        }

        let renamed = edits.len();
        if renamed > 0 {
            let updated = apply_edits(text, edits);
            workspace.replace(path, updated)?;
            summary.record(path, renamed);
        }
    }

    if !options.no_update_references {
        update_references(workspace, &paths, &renames, &in_use, &mut summary)?;
    }

    info!(
        renamed = renames.len(),
        replacements = summary.replacements,
        "identifier reconciliation finished"
    );
    Ok(summary)
}

/// Points references at renamed ids in one pass, so a rename chain never
/// cascades. Ids still carried by another element keep their references.
fn update_references(
    workspace: &mut Workspace,
    paths: &[std::path::PathBuf],
    renames: &[(String, String)],
    in_use: &HashMap<String, usize>,
    summary: &mut StepSummary,
) -> Result<()> {
    let mut targets: HashMap<&str, &str> = HashMap::new();
    for (old, new) in renames {
        if in_use.get(old).copied().unwrap_or(0) > 0 {
            continue;
        }
        targets.entry(old.as_str()).or_insert(new.as_str());
    }
    if targets.is_empty() {
        return Ok(());
    }

    let rewriter = AttrRewriter::new(&["linkend", "endterm"])?;
    for path in paths {
        let (text, replaced) = rewriter.rewrite(workspace.text(path)?, |_, value| {
            targets.get(value).map(|target| (*target).to_string())
        });
        if replaced > 0 {
            workspace.replace(path, text)?;
            summary.record(path, replaced);
            summary.count("references_updated", replaced);
        }
    }
    Ok(())
}
