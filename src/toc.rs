use std::ops::Range;

use anyhow::{Context, Result};
use regex::Regex;

use crate::markup::{AttrScanner, LineCounter, condense_whitespace, strip_tags};

pub const DEFAULT_PLACEHOLDER_PATTERN: &str = r"(?i)^(?:|untitled|no title|\[?title\]?|chapter\s+\d+|section\s+\d+(?:\.\d+)*|part\s+\d+|\?+)$";

#[derive(Debug, Clone)]
pub struct OutlineEntry {
    pub text_span: Range<usize>,
    pub linkend: Option<String>,
    pub text: String,
    pub depth: usize,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum OutlineEvent {
    Open {
        name: String,
        span: Range<usize>,
        depth: usize,
    },
    Close {
        name: String,
        span: Range<usize>,
    },
    Entry(OutlineEntry),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericLabel {
    pub components: Vec<u32>,
    pub rest: String,
}

pub struct OutlineScanner {
    token: Regex,
    inner_link: Regex,
    label: Regex,
    placeholder: Regex,
    attrs: AttrScanner,
}

impl OutlineScanner {
    pub fn new() -> Result<Self> {
        Self::with_placeholder(DEFAULT_PLACEHOLDER_PATTERN)
    }

    pub fn with_placeholder(placeholder: &str) -> Result<Self> {
        Ok(Self {
            token: Regex::new(
                r"(?s)<(/?)(tocpart|tocchap|tocfront|tocback|toclevel[1-5]|toc)\b([^>]*)>|<tocentry\b([^>]*)>(.*?)</tocentry>",
            )
            .context("failed to compile outline token regex")?,
            inner_link: Regex::new(r"(?s)<link\b([^>]*)>(.*?)</link>")
                .context("failed to compile outline link regex")?,
            label: Regex::new(r"^(\d+(?:\.\d+)*)\.?(?:\s+(.*))?$")
                .context("failed to compile numeric label regex")?,
            placeholder: Regex::new(placeholder)
                .with_context(|| format!("failed to compile placeholder regex: {placeholder}"))?,
            attrs: AttrScanner::new()?,
        })
    }

    pub fn scan(&self, text: &str) -> Vec<OutlineEvent> {
        let mut events = Vec::new();
        let mut depth = 0_usize;
        let mut lines = LineCounter::new(text);

        for captures in self.token.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };

            if let Some(name) = captures.get(2) {
                let closing = captures
                    .get(1)
                    .map(|m| !m.as_str().is_empty())
                    .unwrap_or(false);
                let self_closing = captures
                    .get(3)
                    .map(|m| m.as_str().trim_end().ends_with('/'))
                    .unwrap_or(false);
                if closing {
                    depth = depth.saturating_sub(1);
                    events.push(OutlineEvent::Close {
                        name: name.as_str().to_string(),
                        span: whole.range(),
                    });
                } else if !self_closing {
                    depth += 1;
                    events.push(OutlineEvent::Open {
                        name: name.as_str().to_string(),
                        span: whole.range(),
                        depth,
                    });
                }
                continue;
            }

            let (Some(attrs), Some(inner)) = (captures.get(4), captures.get(5)) else {
                continue;
            };

            let mut linkend = self.attrs.get(attrs.as_str(), "linkend").map(String::from);
            let mut text_span = inner.range();
            if let Some(link) = self.inner_link.captures(inner.as_str()) {
                if let (Some(link_attrs), Some(link_text)) = (link.get(1), link.get(2)) {
                    if linkend.is_none() {
                        linkend = self
                            .attrs
                            .get(link_attrs.as_str(), "linkend")
                            .map(String::from);
                    }
                    text_span =
                        (inner.start() + link_text.start())..(inner.start() + link_text.end());
                }
            }

            events.push(OutlineEvent::Entry(OutlineEntry {
                text: condense_whitespace(&strip_tags(&text[text_span.clone()])),
                text_span,
                linkend,
                depth,
                line: lines.line_at(whole.start()),
            }));
        }

        events
    }

    pub fn entries(&self, text: &str) -> Vec<OutlineEntry> {
        self.scan(text)
            .into_iter()
            .filter_map(|event| match event {
                OutlineEvent::Entry(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }

    pub fn is_placeholder(&self, text: &str) -> bool {
        self.placeholder.is_match(text.trim())
    }

    pub fn numeric_label(&self, text: &str) -> Option<NumericLabel> {
        let captures = self.label.captures(text.trim())?;
        let components = captures
            .get(1)?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<u32>>>()?;
        Some(NumericLabel {
            components,
            rest: captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
    }

    pub fn strip_label(&self, text: &str) -> String {
        match self.numeric_label(text) {
            Some(label) if !label.rest.is_empty() => label.rest,
            _ => text.trim().to_string(),
        }
    }

    pub fn title_key(&self, text: &str) -> String {
        let stripped = self.strip_label(&condense_whitespace(&strip_tags(text)));
        let mut key = String::with_capacity(stripped.len());
        let mut chars = stripped.chars();
        while let Some(ch) = chars.next() {
            if ch == '&' {
                // character references count as a single separator
                for next in chars.by_ref() {
                    if next == ';' || next.is_whitespace() {
                        break;
                    }
                }
                key.push(' ');
            } else if ch.is_alphanumeric() {
                key.extend(ch.to_lowercase());
            } else {
                key.push(' ');
            }
        }
        condense_whitespace(&key)
    }
}

#[derive(Debug, Clone)]
pub struct TitleIndexEntry {
    pub linkend: String,
    pub text: String,
    pub key: String,
}

#[derive(Debug, Default)]
pub struct TitleIndex {
    pub entries: Vec<TitleIndexEntry>,
}

impl TitleIndex {
    pub fn build(scanner: &OutlineScanner, outline: &str) -> Self {
        let entries = scanner
            .entries(outline)
            .into_iter()
            .filter(|entry| !scanner.is_placeholder(&entry.text))
            .filter_map(|entry| {
                let linkend = entry.linkend?;
                let key = scanner.title_key(&entry.text);
                if key.is_empty() {
                    return None;
                }
                Some(TitleIndexEntry {
                    linkend,
                    text: scanner.strip_label(&entry.text),
                    key,
                })
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
