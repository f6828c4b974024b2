use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::FixTocTitlesArgs;
use crate::commands::report::{self, CommandLine};
use crate::markup::apply_edits;
use crate::model::StepSummary;
use crate::toc::{OutlineEvent, OutlineScanner};
use crate::workspace::Workspace;

pub const STEP: &str = "fix-toc-titles";

pub fn run(args: FixTocTitlesArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_outline(&args.outline.toc)?;

    let scanner = match &args.placeholder {
        Some(pattern) => OutlineScanner::with_placeholder(pattern)?,
        None => OutlineScanner::new()?,
    };
    let summary = apply(&mut workspace, &scanner)?;

    let mut command = CommandLine::new(STEP).flag("toc", args.outline.toc.display());
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

pub fn apply(workspace: &mut Workspace, scanner: &OutlineScanner) -> Result<StepSummary> {
    let path = workspace.outline_path()?;
    let mut summary = StepSummary::new(STEP);

    let repaired = repair_titles(workspace.text(&path)?, scanner);

    for repair in &repaired.repairs {
        debug!(
            line = repair.line,
            placeholder = %repair.placeholder,
            title = %repair.title,
            "replaced placeholder label"
        );
    }
    for warning in &repaired.warnings {
        summary.warn_in(&path, warning);
    }
    summary.count("unresolved", repaired.warnings.len());
    summary.record(&path, repaired.repairs.len());

    if !repaired.repairs.is_empty() {
        workspace.replace(&path, repaired.text)?;
    }

    info!(
        titles_repaired = summary.replacements,
        unresolved = repaired.warnings.len(),
        "outline title repair finished"
    );
    Ok(summary)
}

#[derive(Debug)]
struct TitleRepair {
    line: usize,
    placeholder: String,
    title: String,
}

#[derive(Debug)]
struct RepairedOutline {
    text: String,
    repairs: Vec<TitleRepair>,
    warnings: Vec<String>,
}

fn repair_titles(text: &str, scanner: &OutlineScanner) -> RepairedOutline {
    let events = scanner.scan(text);
    let mut edits = Vec::new();
    let mut repairs = Vec::new();
    let mut warnings = Vec::new();

    for (index, event) in events.iter().enumerate() {
        let OutlineEvent::Entry(entry) = event else {
            continue;
        };
        if !scanner.is_placeholder(&entry.text) {
            continue;
        }

        match first_nested_title(&events[index + 1..], entry.depth, scanner) {
            Some(title) => {
                edits.push((entry.text_span.clone(), title.clone()));
                repairs.push(TitleRepair {
                    line: entry.line,
                    placeholder: entry.text.clone(),
                    title,
                });
            }
            None => warnings.push(format!(
                "line {}: placeholder {:?} has no nested title",
                entry.line, entry.text
            )),
        }
    }

    RepairedOutline {
        text: apply_edits(text, edits),
        repairs,
        warnings,
    }
}

/// First real title nested below `depth`, searching only until the block
/// holding the placeholder closes.
fn first_nested_title(
    events: &[OutlineEvent],
    depth: usize,
    scanner: &OutlineScanner,
) -> Option<String> {
    let mut current = depth;
    for event in events {
        match event {
            OutlineEvent::Open { .. } => current += 1,
            OutlineEvent::Close { .. } => {
                if current <= depth {
                    return None;
                }
                current -= 1;
            }
            OutlineEvent::Entry(entry)
                if entry.depth > depth && !scanner.is_placeholder(&entry.text) =>
            {
                return Some(scanner.strip_label(&entry.text));
            }
            OutlineEvent::Entry(_) => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repair(text: &str) -> RepairedOutline {
        repair_titles(text, &OutlineScanner::new().expect("scanner"))
    }

    #[test]
    fn placeholder_takes_first_nested_title() {
        let outline = concat!(
            "<toc><tocchap>\n",
            "<tocentry linkend=\"ch0003\">Chapter 3</tocentry>\n",
            "<toclevel1><tocentry linkend=\"ch0003s0001\">3.1 Storage &amp; Layout</tocentry></toclevel1>\n",
            "<toclevel1><tocentry linkend=\"ch0003s0002\">3.2 Indexes</tocentry></toclevel1>\n",
            "</tocchap></toc>\n"
        );

        let repaired = repair(outline);
        assert_eq!(repaired.repairs.len(), 1);
        assert!(repaired.warnings.is_empty());
        assert!(
            repaired
                .text
                .contains("<tocentry linkend=\"ch0003\">Storage &amp; Layout</tocentry>")
        );
        assert!(repaired.text.contains("3.1 Storage &amp; Layout"));
    }

    #[test]
    fn search_stops_at_the_end_of_the_block() {
        let outline = concat!(
            "<toc>",
            "<tocchap><tocentry linkend=\"ch0001\">Untitled</tocentry></tocchap>",
            "<tocchap><tocentry linkend=\"ch0002\">Real</tocentry>",
            "<toclevel1><tocentry linkend=\"ch0002s0001\">2.1 Nested</tocentry></toclevel1>",
            "</tocchap></toc>"
        );

        let repaired = repair(outline);
        assert!(repaired.repairs.is_empty());
        assert_eq!(repaired.warnings.len(), 1);
        assert_eq!(repaired.text, outline);
    }

    #[test]
    fn link_wrapped_placeholder_keeps_its_link() {
        let outline = concat!(
            "<toc><tocchap>",
            "<tocentry><link linkend=\"ch0004\"></link></tocentry>",
            "<toclevel1><tocentry><link linkend=\"ch0004s0001\">4.1 Queues</link></tocentry></toclevel1>",
            "</tocchap></toc>"
        );

        let repaired = repair(outline);
        assert!(
            repaired
                .text
                .contains("<tocentry><link linkend=\"ch0004\">Queues</link></tocentry>")
        );
    }

    #[test]
    fn nested_placeholders_are_skipped_when_searching() {
        let outline = concat!(
            "<toc><tocchap><tocentry linkend=\"ch0005\">Chapter 5</tocentry>",
            "<toclevel1><tocentry linkend=\"ch0005s0001\">Section 5.1</tocentry>",
            "<toclevel2><tocentry linkend=\"ch0005s0001s0001\">5.1.1 Retries</tocentry></toclevel2>",
            "</toclevel1></tocchap></toc>"
        );

        let repaired = repair(outline);
        assert_eq!(repaired.repairs.len(), 2);
        assert!(repaired.text.contains(">Retries</tocentry><toclevel1>"));
        assert!(
            repaired
                .text
                .contains("<tocentry linkend=\"ch0005s0001\">Retries</tocentry>")
        );
    }

    #[test]
    fn placeholder_pattern_can_be_overridden() {
        let outline = concat!(
            "<toc><tocchap><tocentry linkend=\"ch0006\">TBD</tocentry>",
            "<toclevel1><tocentry linkend=\"ch0006s0001\">6.1 Caching</tocentry></toclevel1>",
            "</tocchap><tocchap><tocentry linkend=\"ch0007\">Chapter 7</tocentry></tocchap></toc>"
        );
        let scanner = OutlineScanner::with_placeholder(r"(?i)^tbd$").expect("scanner");

        let repaired = repair_titles(outline, &scanner);
        assert_eq!(repaired.repairs.len(), 1);
        assert!(repaired.warnings.is_empty());
        assert!(repaired.text.contains("<tocentry linkend=\"ch0006\">Caching</tocentry>"));
        assert!(repaired.text.contains("<tocentry linkend=\"ch0007\">Chapter 7</tocentry>"));
    }
}
