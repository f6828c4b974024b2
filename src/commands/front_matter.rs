use std::ops::Range;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::cli::{FrontMatterArgs, GroupFrontMatterArgs};
use crate::commands::report::{self, CommandLine};
use crate::ident::IdScheme;
use crate::markup::apply_edits;
use crate::model::StepSummary;
use crate::toc::{OutlineEvent, OutlineScanner};
use crate::workspace::Workspace;

pub const STEP: &str = "group-front-matter";

const CHAPTER_CONTAINER: &str = "tocchap";

pub fn run(args: GroupFrontMatterArgs) -> Result<()> {
    let started = Utc::now();

    let mut workspace = Workspace::default();
    workspace.add_outline(&args.outline.toc)?;

    let summary = apply(&mut workspace, &OutlineScanner::new()?, &args.front_matter)?;

    let command = CommandLine::new(STEP)
        .flag("toc", args.outline.toc.display())
        .flag("front-matter-title", format!("{:?}", args.front_matter.title))
        .flag("front-matter-linkend", &args.front_matter.linkend)
        .flag("first-chapter", args.front_matter.first_chapter)
        .output(&args.output);
    report::finish(&mut workspace, command, started, vec![summary], &args.output)?;
    Ok(())
}

pub fn apply(
    workspace: &mut Workspace,
    scanner: &OutlineScanner,
    options: &FrontMatterArgs,
) -> Result<StepSummary> {
    let path = workspace.outline_path()?;
    let ids = IdScheme::new()?;
    let mut summary = StepSummary::new(STEP);

    match group_front_matter(workspace.text(&path)?, scanner, &ids, options) {
        Grouping::Wrapped { text, entries } => {
            summary.count("entries_grouped", entries);
            summary.record(&path, 1);
            workspace.replace(&path, text)?;
            info!(entries, linkend = %options.linkend, "grouped front matter");
        }
        Grouping::AlreadyGrouped => {
            info!(linkend = %options.linkend, "front matter already grouped");
        }
        Grouping::NoFrontMatter => {
            info!("no leading front-matter entries found");
        }
        Grouping::NoBodyChapter => {
            summary.warn_in(&path, "every top-level entry looks like front matter; left as is");
        }
    }

    Ok(summary)
}

#[derive(Debug, PartialEq, Eq)]
enum Grouping {
    Wrapped { text: String, entries: usize },
    AlreadyGrouped,
    NoFrontMatter,
    NoBodyChapter,
}

#[derive(Debug)]
struct ChapterBlock {
    span: Range<usize>,
    linkend: Option<String>,
}

fn group_front_matter(
    text: &str,
    scanner: &OutlineScanner,
    ids: &IdScheme,
    options: &FrontMatterArgs,
) -> Grouping {
    let events = scanner.scan(text);

    let already_grouped = events.iter().any(|event| match event {
        OutlineEvent::Entry(entry) => entry.linkend.as_deref() == Some(options.linkend.as_str()),
        _ => false,
    });
    if already_grouped {
        return Grouping::AlreadyGrouped;
    }

    let blocks = top_level_chapters(&events);
    let is_body = |block: &ChapterBlock| {
        block
            .linkend
            .as_deref()
            .and_then(|linkend| ids.parse(linkend))
            .map(|id| id.prefix == "ch" && id.chapter >= options.first_chapter)
            .unwrap_or(false)
    };

    let run_len = blocks.iter().take_while(|block| !is_body(*block)).count();
    if run_len == 0 {
        return Grouping::NoFrontMatter;
    }
    if run_len == blocks.len() {
        return Grouping::NoBodyChapter;
    }

    let start = blocks[0].span.start;
    let end = blocks[run_len - 1].span.end;
    let indent = indentation_before(text, start);

    let opening = format!(
        "<tocpart>\n{indent}<tocentry linkend=\"{}\">{}</tocentry>\n{indent}",
        escape_text(&options.linkend),
        escape_text(&options.title)
    );
    let closing = format!("\n{indent}</tocpart>");

    Grouping::Wrapped {
        text: apply_edits(text, vec![(start..start, opening), (end..end, closing)]),
        entries: run_len,
    }
}

/// `tocchap` blocks at the shallowest depth any `tocchap` occurs, each with
/// the linkend of its own entry.
fn top_level_chapters(events: &[OutlineEvent]) -> Vec<ChapterBlock> {
    let Some(top_depth) = events
        .iter()
        .filter_map(|event| match event {
            OutlineEvent::Open { name, depth, .. } if name == CHAPTER_CONTAINER => Some(*depth),
            _ => None,
        })
        .min()
    else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    let mut open: Option<(usize, Option<String>)> = None;
    let mut depth = 0_usize;

    for event in events {
        match event {
            OutlineEvent::Open {
                name,
                span,
                depth: open_depth,
            } => {
                depth = *open_depth;
                if open.is_none() && name == CHAPTER_CONTAINER && *open_depth == top_depth {
                    open = Some((span.start, None));
                }
            }
            OutlineEvent::Entry(entry) => {
                if let Some((_, linkend)) = open.as_mut() {
                    if linkend.is_none() && entry.depth == top_depth {
                        *linkend = entry.linkend.clone();
                    }
                }
            }
            OutlineEvent::Close { name, span } => {
                if depth == top_depth && name == CHAPTER_CONTAINER {
                    if let Some((start, linkend)) = open.take() {
                        blocks.push(ChapterBlock {
                            span: start..span.end,
                            linkend,
                        });
                    }
                }
                depth = depth.saturating_sub(1);
            }
        }
    }

    blocks
}

fn indentation_before(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map(|index| index + 1).unwrap_or(0);
    let prefix = &text[line_start..offset];
    if prefix.chars().all(char::is_whitespace) {
        prefix
    } else {
        ""
    }
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
