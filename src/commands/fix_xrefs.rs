use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::FixXrefsArgs;
use crate::commands::report::{self, CommandLine};
use crate::ident::{IdScheme, LegacyForm};
use crate::markup::AttrRewriter;
use crate::model::StepSummary;
use crate::workspace::Workspace;

pub const STEP: &str = "fix-xrefs";

const REFERENCE_ATTRIBUTES: [&str; 2] = ["linkend", "endterm"];

pub fn run(args: FixXrefsArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_content_dir(&args.layout.dir, Some(&args.layout.toc))?;
    if args.layout.toc.is_file() {
        workspace.add_outline(&args.layout.toc)?;
    }

    let summary = apply(&mut workspace, args.include_ids)?;

    let command = CommandLine::new(STEP)
        .flag("dir", args.layout.dir.display())
        .flag("toc", args.layout.toc.display())
        .switch("include-ids", args.include_ids)
        .output(&args.output);
    report::finish(&mut workspace, command, started, vec![summary], &args.output)?;
    Ok(())
}

pub fn apply(workspace: &mut Workspace, include_ids: bool) -> Result<StepSummary> {
    let mut names = REFERENCE_ATTRIBUTES.to_vec();
    if include_ids {
        names.push("id");
    }
    let rewriter = AttrRewriter::new(&names)?;
    let ids = IdScheme::new()?;
    let mut summary = StepSummary::new(STEP);

    let mut paths: Vec<PathBuf> = workspace.content_paths();
    if let Ok(outline) = workspace.outline_path() {
        paths.push(outline);
    }

    for path in paths {
        let mut forms: BTreeMap<LegacyForm, usize> = BTreeMap::new();
        let (text, replaced) = rewrite_references(workspace.text(&path)?, &rewriter, &ids, &mut forms);

        for (form, count) in &forms {
            summary.count(form.as_str(), *count);
        }
        debug!(path = %path.display(), replaced, "rewrote legacy references");

        summary.record(&path, replaced);
        if replaced > 0 {
            workspace.replace(&path, text)?;
        }
    }

    info!(
        references_rewritten = summary.replacements,
        files = summary.files_touched.len(),
        "cross-reference repair finished"
    );
    Ok(summary)
}

fn rewrite_references(
    text: &str,
    rewriter: &AttrRewriter,
    ids: &IdScheme,
    forms: &mut BTreeMap<LegacyForm, usize>,
) -> (String, usize) {
    rewriter.rewrite(text, |_, value| {
        let (form, canonical) = ids.classify_legacy(value)?;
        *forms.entry(form).or_insert(0) += 1;
        Some(canonical)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(text: &str, include_ids: bool) -> (String, BTreeMap<LegacyForm, usize>) {
        let mut names = REFERENCE_ATTRIBUTES.to_vec();
        if include_ids {
            names.push("id");
        }
        let mut forms = BTreeMap::new();
        let (text, _) = rewrite_references(
            text,
            &AttrRewriter::new(&names).expect("rewriter"),
            &IdScheme::new().expect("ids"),
            &mut forms,
        );
        (text, forms)
    }

    #[test]
    fn six_digit_reference_becomes_four_digit_padded() {
        let (text, forms) = rewrite("<xref linkend=\"ch000001s000002\"/>", false);
        assert_eq!(text, "<xref linkend=\"ch0001s0002\"/>");
        assert_eq!(forms.get(&LegacyForm::SixDigit), Some(&1));
    }

    #[test]
    fn all_three_legacy_forms_converge_on_one_pattern() {
        let (text, forms) = rewrite(
            concat!(
                "<xref linkend=\"ch000003\"/>",
                "<link linkend=\"ch3-1\">a</link>",
                "<xref linkend=\"ch3s1s02\" endterm=\"ch03_01_02\"/>"
            ),
            false,
        );
        assert_eq!(
            text,
            concat!(
                "<xref linkend=\"ch0003\"/>",
                "<link linkend=\"ch0003s0001\">a</link>",
                "<xref linkend=\"ch0003s0001s0002\" endterm=\"ch0003s0001s0002\"/>"
            )
        );
        assert_eq!(forms.get(&LegacyForm::SixDigit), Some(&1));
        assert_eq!(forms.get(&LegacyForm::Separated), Some(&2));
        assert_eq!(forms.get(&LegacyForm::MisPadded), Some(&1));
    }

    #[test]
    fn ids_are_only_touched_on_request() {
        let text = "<sect1 id=\"ch1s1\"><xref linkend=\"ch1s1\"/></sect1>";

        let (references_only, _) = rewrite(text, false);
        assert_eq!(
            references_only,
            "<sect1 id=\"ch1s1\"><xref linkend=\"ch0001s0001\"/></sect1>"
        );

        let (with_ids, _) = rewrite(text, true);
        assert_eq!(
            with_ids,
            "<sect1 id=\"ch0001s0001\"><xref linkend=\"ch0001s0001\"/></sect1>"
        );
    }

    #[test]
    fn unrelated_targets_are_untouched() {
        let text = "<xref linkend=\"fig-3\"/><xref linkend=\"ch0001s0002\"/><ulink url=\"ch1s1\"/>";
        let (rewritten, forms) = rewrite(text, false);
        assert_eq!(rewritten, text);
        assert!(forms.is_empty());
    }
}
