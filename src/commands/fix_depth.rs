use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::FixDepthArgs;
use crate::commands::report::{self, CommandLine};
use crate::ident::IdScheme;
use crate::markup::{AttrScanner, LevelTagScanner, RetagOutcome};
use crate::model::StepSummary;
use crate::workspace::Workspace;

pub const STEP: &str = "fix-depth";

pub fn run(args: FixDepthArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_content_dir(&args.layout.dir, Some(&args.layout.toc))?;

    let summary = apply(&mut workspace)?;

    let command = CommandLine::new(STEP)
        .flag("dir", args.layout.dir.display())
        .flag("toc", args.layout.toc.display())
        .output(&args.output);
    report::finish(&mut workspace, command, started, vec![summary], &args.output)?;
    Ok(())
}

pub fn apply(workspace: &mut Workspace) -> Result<StepSummary> {
    let scanner = LevelTagScanner::new("sect")?;
    let attrs = AttrScanner::new()?;
    let ids = IdScheme::new()?;
    let mut summary = StepSummary::new(STEP);

    for path in workspace.content_paths() {
        let outcome = retag_sections(workspace.text(&path)?, &scanner, &attrs, &ids);

        for change in &outcome.changes {
            debug!(
                path = %path.display(),
                line = change.line,
                from = change.from,
                to = change.to,
                "retagged section"
            );
            summary.count(&format!("sect{}_to_sect{}", change.from, change.to), 1);
        }
        for warning in &outcome.warnings {
            summary.warn_in(&path, warning);
        }

        summary.record(&path, outcome.changes.len());
        if !outcome.changes.is_empty() {
            workspace.replace(&path, outcome.text)?;
        }
    }

    info!(
        sections_retagged = summary.replacements,
        files = summary.files_touched.len(),
        "section depth correction finished"
    );
    Ok(summary)
}

fn retag_sections(
    text: &str,
    scanner: &LevelTagScanner,
    attrs: &AttrScanner,
    ids: &IdScheme,
) -> RetagOutcome {
    // a tag only ever moves deeper
    scanner.retag(text, |open| {
        let id = attrs.get(open.attrs, "id")?;
        let depth = ids.parse(id)?.depth();
        (depth > open.level).then_some(depth)
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn retag(text: &str) -> RetagOutcome {
        retag_sections(
            text,
            &LevelTagScanner::new("sect").expect("scanner"),
            &AttrScanner::new().expect("attrs"),
            &IdScheme::new().expect("ids"),
        )
    }

    #[test]
    fn sect2_with_three_component_id_becomes_sect3() {
        let outcome = retag("<sect2 id=\"ch0001s0001s0001\"><title>A</title></sect2>");
        assert_eq!(
            outcome.text,
            "<sect3 id=\"ch0001s0001s0001\"><title>A</title></sect3>"
        );
        assert_eq!(outcome.changes.len(), 1);
    }

    #[test]
    fn nested_sections_keep_their_own_close_tags() {
        let text = concat!(
            "<sect2 id=\"ch0002s0001\">\n",
            "  <sect2 id=\"ch0002s0001s0001\">\n",
            "    <para>x</para>\n",
            "  </sect2>\n",
            "</sect2>\n"
        );
        let outcome = retag(text);
        assert_eq!(
            outcome.text,
            concat!(
                "<sect2 id=\"ch0002s0001\">\n",
                "  <sect3 id=\"ch0002s0001s0001\">\n",
                "    <para>x</para>\n",
                "  </sect3>\n",
                "</sect2>\n"
            )
        );
        assert_eq!(outcome.changes[0].line, 2);
    }

    #[test]
    fn unparsable_and_shallower_ids_are_left_alone() {
        let text = concat!(
            "<sect1 id=\"intro\"></sect1>",
            "<sect2 id=\"ch0003\"></sect2>",
            "<sect3 id=\"ch0003s0001\"></sect3>",
            "<sect1></sect1>"
        );
        let outcome = retag(text);
        assert_eq!(outcome.text, text);
        assert!(outcome.changes.is_empty());
    }

    #[test]
    fn ids_deeper_than_five_levels_are_reported() {
        let text = "<sect5 id=\"ch0001s0001s0001s0001s0001s0001\"></sect5>";
        let outcome = retag(text);
        assert_eq!(outcome.text, text);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn apply_updates_workspace_and_counts_transitions() {
        let dir = TempDir::new().expect("temp dir");
        let chapter = dir.path().join("ch01.xml");
        fs::write(
            &chapter,
            "<chapter id=\"ch0001\"><sect1 id=\"ch0001s0001s0001\"></sect1></chapter>",
        )
        .expect("write chapter");

        let mut workspace = Workspace::default();
        workspace
            .add_content_dir(dir.path(), None)
            .expect("content loads");

        let summary = apply(&mut workspace).expect("apply");
        assert_eq!(summary.replacements, 1);
        assert_eq!(summary.counts.get("sect1_to_sect3"), Some(&1));
        assert_eq!(
            workspace.text(&chapter).expect("text"),
            "<chapter id=\"ch0001\"><sect3 id=\"ch0001s0001s0001\"></sect3></chapter>"
        );

        let again = apply(&mut workspace).expect("second apply");
        assert_eq!(again.replacements, 0);
    }
}
