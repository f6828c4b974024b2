use super::*;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum MatchKind {
    Exact,
    Substring,
}

impl MatchKind {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "renamed_exact",
            Self::Substring => "renamed_substring",
        }
    }
}

pub(super) struct TitleMatcher<'a> {
    pub(super) index: &'a TitleIndex,
    pub(super) ids: &'a IdScheme,
    pub(super) min_match_chars: usize,
    pub(super) check_depth: bool,
}

impl<'a> TitleMatcher<'a> {
    /// Exact key equality wins; otherwise the longest whole-word containment
    /// in either direction. Ties go to the earlier outline entry.
    pub(super) fn best_match(
        &self,
        element: &TitledElement,
        element_key: &str,
        claimed: &HashSet<String>,
    ) -> Option<(&'a TitleIndexEntry, MatchKind)> {
        let eligible = |entry: &&'a TitleIndexEntry| {
            !claimed.contains(&entry.linkend) && self.depth_compatible(element, entry)
        };

        if let Some(entry) = self
            .index
            .entries
            .iter()
            .filter(eligible)
            .find(|entry| entry.key == element_key)
        {
            return Some((entry, MatchKind::Exact));
        }

        if element_key.chars().count() < self.min_match_chars {
            return None;
        }

        let mut best: Option<(&'a TitleIndexEntry, usize)> = None;
        for entry in self.index.entries.iter().filter(eligible) {
            if entry.key.chars().count() < self.min_match_chars {
                continue;
            }
            let Some(score) = containment_score(&entry.key, element_key) else {
                continue;
            };
            if best.map(|(_, top)| score > top).unwrap_or(true) {
                best = Some((entry, score));
            }
        }

        best.map(|(entry, _)| (entry, MatchKind::Substring))
    }

    fn depth_compatible(&self, element: &TitledElement, entry: &TitleIndexEntry) -> bool {
        if !self.check_depth {
            return true;
        }
        match (element.tag_depth(), self.ids.parse(&entry.linkend)) {
            (Some(element_depth), Some(id)) => element_depth == id.depth(),
            _ => true,
        }
    }
}

pub(super) fn containment_score(left: &str, right: &str) -> Option<usize> {
    let (short, long) = if left.len() <= right.len() {
        (left, right)
    } else {
        (right, left)
    };
    if short.is_empty() {
        return None;
    }
    let padded_long = format!(" {long} ");
    let padded_short = format!(" {short} ");
    padded_long
        .contains(&padded_short)
        .then(|| short.chars().count())
}
