//! Search functionality.
//!
//! Provides text search over the fragments of a flattened page:
//! - Case-insensitive, token-start matching
//! - Clamped next/previous navigation
//! - A debounced background worker (see [`worker`])

pub mod worker;

use crate::document::{Fragment, RowId, get_plain_text};

/// One occurrence of the needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Row owning the fragment
    pub owner: RowId,
    /// Index into the fragment list
    pub fragment: usize,
    /// Char index of the occurrence in the lowercased plain text
    pub start: usize,
    /// Length of the occurrence in chars
    pub len: usize,
}

/// True if an occurrence may start right after `prev`.
///
/// Only the leading side is checked: "wor" matches "World" and "the world",
/// but "orl" does not. Symbols such as `$`, `+` or emoji do not start a token.
pub fn is_token_start(prev: Option<char>) -> bool {
    prev.is_none_or(|c| c.is_whitespace() || is_punctuation(c))
}

/// Punctuation marks, as opposed to symbols.
fn is_punctuation(c: char) -> bool {
    matches!(
        c,
        '!' | '"'
            | '#'
            | '%'
            | '&'
            | '\''
            | '('
            | ')'
            | '*'
            | ','
            | '-'
            | '.'
            | '/'
            | ':'
            | ';'
            | '?'
            | '@'
            | '['
            | '\\'
            | ']'
            | '_'
            | '{'
            | '}'
            | '\u{a1}'
            | '\u{a7}'
            | '\u{ab}'
            | '\u{b6}'
            | '\u{b7}'
            | '\u{bb}'
            | '\u{bf}'
            | '\u{2010}'..='\u{2027}'
            | '\u{2030}'..='\u{2043}'
            | '\u{2045}'..='\u{2051}'
            | '\u{2053}'..='\u{205e}'
            | '\u{3001}'..='\u{3003}'
            | '\u{3008}'..='\u{3011}'
    )
}

/// Find every occurrence of `needle` in `fragments`, in fragment order and
/// then by position. An empty or blank needle yields no matches.
pub fn find_matches(fragments: &[Fragment], needle: &str) -> Vec<SearchMatch> {
    let needle: Vec<char> = needle.to_lowercase().chars().collect();
    if needle.iter().all(|c| c.is_whitespace()) {
        return Vec::new();
    }
    let _scope = crate::perf::scope("search.find_matches");
    let mut matches = Vec::new();
    for (index, fragment) in fragments.iter().enumerate() {
        let haystack: Vec<char> = get_plain_text(&fragment.text)
            .to_lowercase()
            .chars()
            .collect();
        for start in occurrences(&haystack, &needle) {
            matches.push(SearchMatch {
                owner: fragment.owner,
                fragment: index,
                start,
                len: needle.len(),
            });
        }
    }
    matches
}

/// Non-overlapping token-start occurrences of `needle` in `haystack`.
fn occurrences(haystack: &[char], needle: &[char]) -> Vec<usize> {
    let mut found = Vec::new();
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        let prev = i.checked_sub(1).map(|p| haystack[p]);
        if haystack[i..i + needle.len()] == *needle && is_token_start(prev) {
            found.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    found
}

/// Enable/disable state of the search controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchAffordances {
    pub has_previous: bool,
    pub has_next: bool,
    /// 1-based position and total, when there are matches
    pub position: Option<(usize, usize)>,
}

/// Current query, its matches and the selected match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    query: String,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
}

impl SearchState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub const fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&SearchMatch> {
        self.current.and_then(|i| self.matches.get(i))
    }

    /// Replace the results, selecting the first match.
    pub fn set_results(&mut self, query: impl Into<String>, matches: Vec<SearchMatch>) {
        self.query = query.into();
        self.current = (!matches.is_empty()).then_some(0);
        self.matches = matches;
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.current = None;
    }

    /// Select `index`, clamped to the match list.
    pub fn select(&mut self, index: usize) -> SearchAffordances {
        if !self.matches.is_empty() {
            self.current = Some(index.min(self.matches.len() - 1));
        }
        self.affordances()
    }

    /// Move to the next match. Past the end this is a no-op.
    pub fn next(&mut self) -> SearchAffordances {
        if let Some(current) = self.current {
            self.select(current + 1)
        } else {
            self.affordances()
        }
    }

    /// Move to the previous match. Before the start this is a no-op.
    pub fn previous(&mut self) -> SearchAffordances {
        if let Some(current) = self.current {
            self.select(current.saturating_sub(1))
        } else {
            self.affordances()
        }
    }

    pub fn affordances(&self) -> SearchAffordances {
        match self.current {
            Some(current) => SearchAffordances {
                has_previous: current > 0,
                has_next: current + 1 < self.matches.len(),
                position: Some((current + 1, self.matches.len())),
            },
            None => SearchAffordances::default(),
        }
    }
}
