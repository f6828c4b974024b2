use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{info, warn};

use crate::cli::PdfTextArgs;
use crate::model::{PdfPage, PdfTextDump};
use crate::util::{sha256_hex, write_json_pretty};

pub fn run(args: PdfTextArgs) -> Result<()> {
    if args.first_page == 0 {
        bail!("--first-page counts from 1");
    }

    let raw = fs::read(&args.pdf)
        .with_context(|| format!("failed to read {}", args.pdf.display()))?;
    let pages = extract_pages(&raw)
        .with_context(|| format!("failed to extract text from {}", args.pdf.display()))?;
    let selected = select_pages(&pages, args.first_page, args.max_pages);
    let dump = PdfTextDump {
        source: args.pdf.display().to_string(),
        sha256: sha256_hex(&raw),
        page_count: pages.len(),
        empty_page_count: pages.iter().filter(|page| page.trim().is_empty()).count(),
        pages: selected,
    };

    if dump.page_count == dump.empty_page_count {
        warn!(path = %args.pdf.display(), "PDF has no extractable text layer");
    }
    info!(
        path = %args.pdf.display(),
        pages = dump.page_count,
        empty_pages = dump.empty_page_count,
        selected = dump.pages.len(),
        "extracted PDF text"
    );

    if args.json {
        return match &args.out {
            Some(path) => write_json_pretty(path, &dump),
            None => {
                let mut output = io::BufWriter::new(io::stdout().lock());
                serde_json::to_writer_pretty(&mut output, &dump)
                    .context("failed to serialize PDF text dump")?;
                writeln!(output)?;
                output.flush()?;
                Ok(())
            }
        };
    }

    let rendered = match &args.grep {
        Some(pattern) => {
            let pattern = Regex::new(pattern)
                .with_context(|| format!("failed to compile --grep regex: {pattern}"))?;
            grep_pages(&dump.pages, &pattern)
        }
        None => render_pages(&dump.pages),
    };

    match &args.out {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote PDF text dump");
        }
        None => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            output.write_all(rendered.as_bytes())?;
            output.flush()?;
        }
    }

    Ok(())
}

fn extract_pages(raw: &[u8]) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(raw)?;
    Ok(clean_pages(pages))
}

fn clean_pages(pages: Vec<String>) -> Vec<String> {
    let mut pages: Vec<String> = pages
        .into_iter()
        .map(|page| page.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

fn select_pages(pages: &[String], first_page: usize, max_pages: Option<usize>) -> Vec<PdfPage> {
    pages
        .iter()
        .enumerate()
        .skip(first_page.saturating_sub(1))
        .take(max_pages.unwrap_or(usize::MAX))
        .map(|(index, text)| PdfPage {
            page: index + 1,
            char_count: text.chars().filter(|ch| !ch.is_whitespace()).count(),
            text: text.clone(),
        })
        .collect()
}

fn render_pages(pages: &[PdfPage]) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(&format!("--- page {} ---\n", page.page));
        out.push_str(page.text.trim_end());
        out.push('\n');
    }
    out
}

fn grep_pages(pages: &[PdfPage], pattern: &Regex) -> String {
    let mut out = String::new();
    for page in pages {
        for line in page.text.lines().filter(|line| pattern.is_match(line)) {
            out.push_str(&format!("{}: {}\n", page.page, line.trim_end()));
        }
    }
    out
}
