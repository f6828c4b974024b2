use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::*;

const OUTLINE: &str = r#"<toc>
  <tocchap><tocentry linkend="ch0001">1 Getting Started</tocentry>
    <toclevel1><tocentry linkend="ch0001s0001">1.1 Installing the Toolchain</tocentry></toclevel1>
    <toclevel1><tocentry linkend="ch0001s0002">1.2 Configuration Files</tocentry></toclevel1>
  </tocchap>
  <tocchap><tocentry linkend="ch0002">2 Storage Engines</tocentry></tocchap>
</toc>
"#;

fn options() -> MatchArgs {
    MatchArgs {
        min_match_chars: 6,
        ignore_depth: false,
        no_update_references: false,
    }
}

fn book(chapters: &[(&str, &str)]) -> (TempDir, Workspace, Vec<PathBuf>) {
    book_with_outline(OUTLINE, chapters)
}

fn book_with_outline(
    outline: &str,
    chapters: &[(&str, &str)],
) -> (TempDir, Workspace, Vec<PathBuf>) {
    let dir = TempDir::new().expect("temp dir");
    let toc = dir.path().join("toc.xml");
    fs::write(&toc, outline).expect("write outline");

    let mut paths = Vec::new();
    for (name, body) in chapters {
        let path = dir.path().join(name);
        fs::write(&path, body).expect("write chapter");
        paths.push(path);
    }

    let mut workspace = Workspace::default();
    workspace
        .add_content_dir(dir.path(), Some(&toc))
        .expect("content loads");
    workspace.add_outline(&toc).expect("outline loads");
    (dir, workspace, paths)
}

fn text(workspace: &Workspace, path: &Path) -> String {
    workspace.text(path).expect("text").to_string()
}

fn scanner() -> OutlineScanner {
    OutlineScanner::new().expect("scanner")
}

#[test]
fn exact_title_match_renames_id_and_references() {
    let (_dir, mut workspace, paths) = book(&[
        (
            "ch01.xml",
            "<chapter id=\"c1\"><title>Getting Started</title>\n<sect2 id=\"install\"><title>1.1 Installing the Toolchain</title></sect2>\n</chapter>",
        ),
        ("ch02.xml", "<chapter id=\"ch0002\"><title>Storage Engines</title><para><xref linkend=\"install\"/></para></chapter>"),
    ]);

    let summary = apply(&mut workspace, &scanner(), &options()).expect("apply");

    assert_eq!(
        text(&workspace, &paths[0]),
        "<chapter id=\"ch0001\"><title>Getting Started</title>\n<sect2 id=\"ch0001s0001\"><title>1.1 Installing the Toolchain</title></sect2>\n</chapter>"
    );
    assert!(text(&workspace, &paths[1]).contains("<xref linkend=\"ch0001s0001\"/>"));
    assert_eq!(summary.counts.get("renamed_exact"), Some(&2));
    assert_eq!(summary.counts.get("confirmed"), Some(&1));
    assert_eq!(summary.counts.get("references_updated"), Some(&1));
}

#[test]
fn substring_match_requires_whole_words_and_minimum_length() {
    let (_dir, mut workspace, paths) = book(&[(
        "ch01.xml",
        concat!(
            "<chapter id=\"ch0001\"><title>Getting Started</title>",
            "<sect2 id=\"cfg\"><title>Configuration</title></sect2>",
            "<sect2 id=\"tool\"><title>Tool</title></sect2>",
            "</chapter>"
        ),
    )]);

    let summary = apply(&mut workspace, &scanner(), &options()).expect("apply");
    let updated = text(&workspace, &paths[0]);

    assert!(updated.contains("<sect2 id=\"ch0001s0002\"><title>Configuration</title>"));
    assert!(updated.contains("<sect2 id=\"tool\">"));
    assert_eq!(summary.counts.get("renamed_substring"), Some(&1));
    assert_eq!(summary.counts.get("unmatched"), Some(&1));
}

#[test]
fn depth_mismatch_blocks_a_match_unless_ignored() {
    let body = "<sect2 id=\"x\"><title>Storage Engines</title></sect2>";

    let (_dir, mut workspace, paths) = book(&[("ch02.xml", body)]);
    apply(&mut workspace, &scanner(), &options()).expect("apply");
    assert_eq!(text(&workspace, &paths[0]), body);

    let (_dir, mut workspace, paths) = book(&[("ch02.xml", body)]);
    let relaxed = MatchArgs {
        ignore_depth: true,
        ..options()
    };
    apply(&mut workspace, &scanner(), &relaxed).expect("apply");
    assert_eq!(
        text(&workspace, &paths[0]),
        "<sect2 id=\"ch0002\"><title>Storage Engines</title></sect2>"
    );
}

#[test]
fn linkend_already_carried_by_another_element_is_not_reused() {
    let (_dir, mut workspace, paths) = book(&[
        ("a.xml", "<chapter id=\"dup\"><title>Storage Engines</title></chapter>"),
        ("b.xml", "<chapter id=\"ch0002\"><title>Something Else</title></chapter>"),
    ]);

    let summary = apply(&mut workspace, &scanner(), &options()).expect("apply");

    assert_eq!(
        text(&workspace, &paths[0]),
        "<chapter id=\"dup\"><title>Storage Engines</title></chapter>"
    );
    assert_eq!(summary.counts.get("conflicts"), Some(&1));
    assert_eq!(summary.warnings.len(), 1);
}

#[test]
fn references_can_be_left_alone() {
    let (_dir, mut workspace, paths) = book(&[(
        "ch01.xml",
        "<chapter id=\"old\"><title>Getting Started</title><xref linkend=\"old\"/></chapter>",
    )]);
    let options = MatchArgs {
        no_update_references: true,
        ..options()
    };

    apply(&mut workspace, &scanner(), &options).expect("apply");
    assert_eq!(
        text(&workspace, &paths[0]),
        "<chapter id=\"ch0001\"><title>Getting Started</title><xref linkend=\"old\"/></chapter>"
    );
}

#[test]
fn each_linkend_is_assigned_once_per_run() {
    let (_dir, mut workspace, paths) = book(&[
        ("a.xml", "<chapter id=\"first\"><title>Storage Engines</title></chapter>"),
        ("b.xml", "<chapter id=\"second\"><title>Storage Engines</title></chapter>"),
    ]);

    let summary = apply(&mut workspace, &scanner(), &options()).expect("apply");

    assert_eq!(
        text(&workspace, &paths[0]),
        "<chapter id=\"ch0002\"><title>Storage Engines</title></chapter>"
    );
    assert_eq!(
        text(&workspace, &paths[1]),
        "<chapter id=\"second\"><title>Storage Engines</title></chapter>"
    );
    assert_eq!(summary.counts.get("renamed_exact"), Some(&1));
    assert_eq!(summary.counts.get("unmatched"), Some(&1));
}

#[test]
fn equal_substring_scores_go_to_the_earlier_outline_entry() {
    let outline = r#"<toc>
  <tocchap><tocentry linkend="ch0003">3 Storage Engines Tuning</tocentry></tocchap>
  <tocchap><tocentry linkend="ch0004">4 Storage Engines Internals</tocentry></tocchap>
</toc>
"#;
    let (_dir, mut workspace, paths) = book_with_outline(
        outline,
        &[("a.xml", "<chapter id=\"x\"><title>Storage Engines</title></chapter>")],
    );

    let summary = apply(&mut workspace, &scanner(), &options()).expect("apply");

    assert_eq!(
        text(&workspace, &paths[0]),
        "<chapter id=\"ch0003\"><title>Storage Engines</title></chapter>"
    );
    assert_eq!(summary.counts.get("renamed_substring"), Some(&1));
}

#[test]
fn custom_placeholder_pattern_keeps_entries_out_of_the_index() {
    let outline = r#"<toc>
  <tocchap><tocentry linkend="ch0001">TBD</tocentry></tocchap>
  <tocchap><tocentry linkend="ch0002">Untitled</tocentry></tocchap>
</toc>
"#;
    let (_dir, mut workspace, paths) = book_with_outline(
        outline,
        &[
            ("a.xml", "<chapter id=\"a\"><title>TBD</title></chapter>"),
            ("b.xml", "<chapter id=\"b\"><title>Untitled</title></chapter>"),
        ],
    );
    let scanner = OutlineScanner::with_placeholder(r"^TBD$").expect("scanner");

    apply(&mut workspace, &scanner, &options()).expect("apply");

    assert_eq!(
        text(&workspace, &paths[0]),
        "<chapter id=\"a\"><title>TBD</title></chapter>"
    );
    assert_eq!(
        text(&workspace, &paths[1]),
        "<chapter id=\"ch0002\"><title>Untitled</title></chapter>"
    );
}

#[test]
fn containment_score_uses_word_boundaries() {
    assert_eq!(containment_score("configuration files", "configuration"), Some(13));
    assert_eq!(containment_score("restart", "start"), None);
    assert_eq!(containment_score("", "start"), None);
}
