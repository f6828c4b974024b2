use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

pub const KNOWN_PREFIXES: [&str; 4] = ["ch", "ap", "pr", "pt"];
pub const MAX_SECTION_DEPTH: usize = 5;

const PAD_WIDTH: usize = 4;
const LEGACY_WIDE_WIDTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionId {
    pub prefix: String,
    pub chapter: u32,
    pub sections: Vec<u32>,
}

impl SectionId {
    /// Token count: `ch0001` is 1, `ch0001s0002s0003` is 3.
    pub fn depth(&self) -> usize {
        1 + self.sections.len()
    }

    pub fn canonical(&self) -> String {
        let mut out = format!("{}{:0width$}", self.prefix, self.chapter, width = PAD_WIDTH);
        for section in &self.sections {
            out.push_str(&format!("s{:0width$}", section, width = PAD_WIDTH));
        }
        out
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyForm {
    SixDigit,
    Separated,
    MisPadded,
}

impl LegacyForm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SixDigit => "six_digit",
            Self::Separated => "separated",
            Self::MisPadded => "mis_padded",
        }
    }
}

pub struct IdScheme {
    s_joined: Regex,
    separated: Regex,
    section_component: Regex,
}

impl IdScheme {
    pub fn new() -> Result<Self> {
        Ok(Self {
            s_joined: Regex::new(r"^([a-z]+)(\d+)((?:s\d+)*)$")
                .context("failed to compile section id regex")?,
            separated: Regex::new(r"^([a-z]+)(\d+)((?:[-_.]\d+)+)$")
                .context("failed to compile separated id regex")?,
            section_component: Regex::new(r"s(\d+)")
                .context("failed to compile section component regex")?,
        })
    }

    pub fn parse(&self, value: &str) -> Option<SectionId> {
        let captures = self.s_joined.captures(value)?;
        let prefix = captures.get(1)?.as_str();
        if !KNOWN_PREFIXES.contains(&prefix) {
            return None;
        }

        let chapter = captures.get(2)?.as_str().parse::<u32>().ok()?;
        let mut sections = Vec::new();
        for component in self.section_component.captures_iter(captures.get(3)?.as_str()) {
            sections.push(component.get(1)?.as_str().parse::<u32>().ok()?);
        }

        Some(SectionId {
            prefix: prefix.to_string(),
            chapter,
            sections,
        })
    }

    pub fn classify_legacy(&self, value: &str) -> Option<(LegacyForm, String)> {
        if let Some(id) = self.parse(value) {
            let canonical = id.canonical();
            if canonical == value {
                return None;
            }
            let form = if digit_runs(value)
                .iter()
                .all(|run| run.len() == LEGACY_WIDE_WIDTH)
            {
                LegacyForm::SixDigit
            } else {
                LegacyForm::MisPadded
            };
            return Some((form, canonical));
        }

        let captures = self.separated.captures(value)?;
        let prefix = captures.get(1)?.as_str();
        if !KNOWN_PREFIXES.contains(&prefix) {
            return None;
        }

        let chapter = captures.get(2)?.as_str().parse::<u32>().ok()?;
        let mut sections = Vec::new();
        for run in digit_runs(captures.get(3)?.as_str()) {
            sections.push(run.parse::<u32>().ok()?);
        }

        let id = SectionId {
            prefix: prefix.to_string(),
            chapter,
            sections,
        };
        Some((LegacyForm::Separated, id.canonical()))
    }
}

fn digit_runs(value: &str) -> Vec<&str> {
    value
        .split(|ch: char| !ch.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> IdScheme {
        IdScheme::new().expect("id scheme should compile")
    }

    #[test]
    fn parse_reports_depth_and_canonical_form() {
        let id = scheme().parse("ch0001s0002s0003").expect("parses");
        assert_eq!(id.chapter, 1);
        assert_eq!(id.sections, vec![2, 3]);
        assert_eq!(id.depth(), 3);
        assert_eq!(id.canonical(), "ch0001s0002s0003");
    }

    #[test]
    fn parse_rejects_unknown_prefixes_and_free_text() {
        let scheme = scheme();
        assert!(scheme.parse("figure0001").is_none());
        assert!(scheme.parse("preface").is_none());
        assert!(scheme.parse("ch0001-intro").is_none());
    }

    #[test]
    fn classify_legacy_handles_six_digit_form() {
        let (form, canonical) = scheme()
            .classify_legacy("ch000001s000002")
            .expect("legacy six-digit form");
        assert_eq!(form, LegacyForm::SixDigit);
        assert_eq!(canonical, "ch0001s0002");
    }

    #[test]
    fn classify_legacy_handles_separated_form() {
        let scheme = scheme();
        assert_eq!(
            scheme.classify_legacy("ch1-2-3"),
            Some((LegacyForm::Separated, "ch0001s0002s0003".to_string()))
        );
        assert_eq!(
            scheme.classify_legacy("ap02_01"),
            Some((LegacyForm::Separated, "ap0002s0001".to_string()))
        );
        assert_eq!(
            scheme.classify_legacy("ch3.4"),
            Some((LegacyForm::Separated, "ch0003s0004".to_string()))
        );
    }

    #[test]
    fn classify_legacy_handles_mis_padded_form() {
        assert_eq!(
            scheme().classify_legacy("ch1s02"),
            Some((LegacyForm::MisPadded, "ch0001s0002".to_string()))
        );
    }

    #[test]
    fn classify_legacy_ignores_canonical_and_unrelated_values() {
        let scheme = scheme();
        assert!(scheme.classify_legacy("ch0001s0002").is_none());
        assert!(scheme.classify_legacy("glossary").is_none());
        assert!(scheme.classify_legacy("fig1-2").is_none());
    }

    #[test]
    fn wide_numbers_keep_their_width() {
        let scheme = scheme();
        assert!(scheme.classify_legacy("ch123456").is_none());
        assert_eq!(
            scheme.classify_legacy("ch0012345s1"),
            Some((LegacyForm::MisPadded, "ch12345s0001".to_string()))
        );
    }
}
