use std::ops::Range;

use anyhow::{Context, Result};
use regex::Regex;

use crate::ident::MAX_SECTION_DEPTH;

#[derive(Debug)]
pub struct OpenTag<'a> {
    pub level: usize,
    pub attrs: &'a str,
    pub tail: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChange {
    pub line: usize,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Default)]
pub struct RetagOutcome {
    pub text: String,
    pub changes: Vec<LevelChange>,
    pub warnings: Vec<String>,
}

pub struct LevelTagScanner {
    family: String,
    tag: Regex,
}

impl LevelTagScanner {
    pub fn new(family: &str) -> Result<Self> {
        let pattern = format!(r"<(/?){}(\d+)\b([^>]*)>", regex::escape(family));
        Ok(Self {
            family: family.to_string(),
            tag: Regex::new(&pattern)
                .with_context(|| format!("failed to compile {family} tag regex"))?,
        })
    }

    /// Walks open and close tags in order. `decide` returns the level an
    /// opening tag should carry; the matching close tag follows it.
    pub fn retag<F>(&self, text: &str, mut decide: F) -> RetagOutcome
    where
        F: FnMut(&OpenTag<'_>) -> Option<usize>,
    {
        let mut outcome = RetagOutcome {
            text: String::with_capacity(text.len()),
            ..RetagOutcome::default()
        };
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut last = 0;
        let mut lines = LineCounter::new(text);

        for captures in self.tag.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let closing = captures
                .get(1)
                .map(|m| !m.as_str().is_empty())
                .unwrap_or(false);
            let Some(level) = captures
                .get(2)
                .and_then(|m| m.as_str().parse::<usize>().ok())
            else {
                continue;
            };
            let attrs = captures.get(3).map(|m| m.as_str()).unwrap_or("");
            let line = lines.line_at(whole.start());

            if closing {
                match stack.pop() {
                    Some((original, new)) if original == level => {
                        if new != original {
                            outcome.text.push_str(&text[last..whole.start()]);
                            outcome.text.push_str(&format!("</{}{}>", self.family, new));
                            last = whole.end();
                        }
                    }
                    Some((original, _)) => outcome.warnings.push(format!(
                        "line {line}: </{family}{level}> closes <{family}{original}>",
                        family = self.family
                    )),
                    None => outcome.warnings.push(format!(
                        "line {line}: </{}{}> has no opening tag",
                        self.family, level
                    )),
                }
                continue;
            }

            let open = OpenTag {
                level,
                attrs,
                tail: &text[whole.end()..],
            };
            let new_level = match decide(&open) {
                Some(target) if target == level => level,
                Some(target) if (1..=MAX_SECTION_DEPTH).contains(&target) => target,
                Some(target) => {
                    outcome.warnings.push(format!(
                        "line {line}: <{}{}> would need unsupported level {target}",
                        self.family, level
                    ));
                    level
                }
                None => level,
            };

            if new_level != level {
                outcome.text.push_str(&text[last..whole.start()]);
                outcome
                    .text
                    .push_str(&format!("<{}{}{}>", self.family, new_level, attrs));
                last = whole.end();
                outcome.changes.push(LevelChange {
                    line,
                    from: level,
                    to: new_level,
                });
            }

            if !attrs.trim_end().ends_with('/') {
                stack.push((level, new_level));
            }
        }

        outcome.text.push_str(&text[last..]);

        if !stack.is_empty() {
            outcome.warnings.push(format!(
                "{} <{}N> element(s) left unclosed",
                stack.len(),
                self.family
            ));
        }

        outcome
    }
}

pub struct AttrScanner {
    attr: Regex,
}

impl AttrScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            attr: Regex::new(r#"([A-Za-z_:][-\w:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
                .context("failed to compile attribute regex")?,
        })
    }

    pub fn get<'a>(&self, attrs: &'a str, name: &str) -> Option<&'a str> {
        self.find(attrs, name).map(|(_, value)| value)
    }

    pub fn find<'a>(&self, attrs: &'a str, name: &str) -> Option<(Range<usize>, &'a str)> {
        for captures in self.attr.captures_iter(attrs) {
            if captures.get(1).map(|m| m.as_str()) != Some(name) {
                continue;
            }
            let value = captures.get(2).or_else(|| captures.get(3))?;
            return Some((value.range(), value.as_str()));
        }
        None
    }
}

pub struct AttrRewriter {
    attr: Regex,
}

impl AttrRewriter {
    pub fn new(names: &[&str]) -> Result<Self> {
        let alternation = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<String>>()
            .join("|");
        let pattern = format!(r#"(\s)({alternation})(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#);
        Ok(Self {
            attr: Regex::new(&pattern).context("failed to compile attribute rewrite regex")?,
        })
    }

    pub fn rewrite<F>(&self, text: &str, mut rewrite: F) -> (String, usize)
    where
        F: FnMut(&str, &str) -> Option<String>,
    {
        let mut replaced = 0;
        let result = self.attr.replace_all(text, |captures: &regex::Captures<'_>| {
            let whole = captures.get(0).map(|m| m.as_str()).unwrap_or("");
            let lead = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            let name = captures.get(2).map(|m| m.as_str()).unwrap_or("");
            let equals = captures.get(3).map(|m| m.as_str()).unwrap_or("");
            let (value, quote) = match (captures.get(4), captures.get(5)) {
                (Some(value), _) => (value.as_str(), '"'),
                (None, Some(value)) => (value.as_str(), '\''),
                (None, None) => ("", '"'),
            };

            match rewrite(name, value) {
                Some(new_value) if new_value != value => {
                    replaced += 1;
                    format!("{lead}{name}{equals}{quote}{new_value}{quote}")
                }
                _ => whole.to_string(),
            }
        });
        (result.into_owned(), replaced)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdOccurrence {
    pub value: String,
    pub span: Range<usize>,
    pub line: usize,
}

pub struct IdFinder {
    id: Regex,
}

impl IdFinder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            id: Regex::new(r#"\sid\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
                .context("failed to compile id attribute regex")?,
        })
    }

    pub fn find_all(&self, text: &str) -> Vec<IdOccurrence> {
        let mut lines = LineCounter::new(text);
        self.id
            .captures_iter(text)
            .filter_map(|captures| {
                let value = captures.get(1).or_else(|| captures.get(2))?;
                Some(IdOccurrence {
                    value: value.as_str().to_string(),
                    span: value.range(),
                    line: lines.line_at(value.start()),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TitledElement {
    pub tag: String,
    pub id: String,
    pub id_span: Range<usize>,
    pub title: String,
    pub line: usize,
}

impl TitledElement {
    /// Depth on the identifier token scale; `section` can sit at any depth.
    pub fn tag_depth(&self) -> Option<usize> {
        match self.tag.as_str() {
            "chapter" | "appendix" | "preface" => Some(1),
            tag => tag.strip_prefix("sect").and_then(|n| n.parse::<usize>().ok()),
        }
    }
}

pub struct TitledElementFinder {
    element: Regex,
    attrs: AttrScanner,
}

impl TitledElementFinder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            element: Regex::new(
                r"(?s)<(chapter|appendix|preface|section|sect[1-5])\b([^>]*)>\s*(?:<info>\s*)?<title\b[^>]*>(.*?)</title>",
            )
            .context("failed to compile titled element regex")?,
            attrs: AttrScanner::new()?,
        })
    }

    pub fn find_all(&self, text: &str) -> Vec<TitledElement> {
        let mut elements = Vec::new();
        let mut lines = LineCounter::new(text);
        for captures in self.element.captures_iter(text) {
            let (Some(tag), Some(attrs), Some(title)) =
                (captures.get(1), captures.get(2), captures.get(3))
            else {
                continue;
            };
            let Some((span, id)) = self.attrs.find(attrs.as_str(), "id") else {
                continue;
            };
            elements.push(TitledElement {
                tag: tag.as_str().to_string(),
                id: id.to_string(),
                id_span: (attrs.start() + span.start)..(attrs.start() + span.end),
                title: condense_whitespace(&strip_tags(title.as_str())),
                line: lines.line_at(tag.start()),
            });
        }
        elements
    }
}

pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

pub fn condense_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// 1-based line numbers for byte offsets, counted from the previous offset.
/// Offsets are expected in increasing order; going backwards recounts.
pub struct LineCounter<'a> {
    text: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            offset: 0,
            line: 1,
        }
    }

    pub fn line_at(&mut self, offset: usize) -> usize {
        let offset = offset.min(self.text.len());
        if offset < self.offset {
            self.offset = 0;
            self.line = 1;
        }
        self.line += self.text.as_bytes()[self.offset..offset]
            .iter()
            .filter(|byte| **byte == b'\n')
            .count();
        self.offset = offset;
        self.line
    }
}

/// Spans are byte ranges of `text`; an edit overlapping an earlier one is dropped.
pub fn apply_edits(text: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (span, replacement) in edits {
        if span.start < last {
            continue;
        }
        out.push_str(&text[last..span.start]);
        out.push_str(&replacement);
        last = span.end;
    }
    out.push_str(&text[last..]);
    out
}
