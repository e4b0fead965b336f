//! Full-text search over the document's page text
//!
//! Each page's text fragments are concatenated (order-preserving, no
//! separator) into one haystack per page, so flat match offsets round-trip
//! onto the fragment structure through a prefix-sum table. Matching is a
//! rolling substring scan; case-insensitive mode folds the haystack through
//! an offset map so multi-byte lowercasing cannot skew reported offsets.

use crate::engine::{DocumentHandle, TextFragment};
use crate::viewer::slot::HighlightSpan;
use crate::viewer::transform::DocRect;

/// Word-boundary classifier for whole-word matching.
///
/// The adjacent-character test is an explicit configuration point: `Simple`
/// checks ASCII alphanumerics and underscore, `Unicode` extends to all
/// alphanumeric characters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WordBoundary {
    #[default]
    Simple,
    Unicode,
}

impl WordBoundary {
    fn is_word_char(self, c: char) -> bool {
        match self {
            Self::Simple => c.is_ascii_alphanumeric() || c == '_',
            Self::Unicode => c.is_alphanumeric() || c == '_',
        }
    }
}

/// Query options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Highlight every match, not just the selected one
    pub highlight_all: bool,
    pub word_boundary: WordBoundary,
}

/// One located occurrence of the query, in both flat-offset and
/// fragment-mapped form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRecord {
    /// Page the match is on (0-indexed)
    pub page: usize,
    /// Byte offset into the page's concatenated text
    pub start: usize,
    /// Byte length in the original text
    pub len: usize,
    pub begin_fragment: usize,
    /// Byte offset within the begin fragment
    pub begin_offset: usize,
    pub end_fragment: usize,
    /// Exclusive byte offset within the end fragment
    pub end_offset: usize,
}

/// Current/total match position. `current` is 1-indexed; 0 means no match
/// is selected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchStatus {
    pub current: usize,
    pub total: usize,
    /// True when the last navigation wrapped around the document
    pub wrapped: bool,
}

/// Indexed text of one page
struct PageText {
    fragments: Vec<TextFragment>,
    joined: String,
    /// Byte offset of each fragment's start in `joined`, plus the total
    /// length as a final sentinel
    prefix: Vec<usize>,
}

impl PageText {
    fn index(fragments: Vec<TextFragment>) -> Self {
        let mut joined = String::new();
        let mut prefix = Vec::with_capacity(fragments.len() + 1);
        for fragment in &fragments {
            prefix.push(joined.len());
            joined.push_str(&fragment.text);
        }
        prefix.push(joined.len());
        Self {
            fragments,
            joined,
            prefix,
        }
    }

    /// Fragment containing the byte at `offset`, and the offset within it
    fn locate(&self, offset: usize) -> (usize, usize) {
        let fragment = self
            .prefix
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
            .min(self.fragments.len().saturating_sub(1));
        (fragment, offset - self.prefix[fragment])
    }

    fn fragment_len(&self, fragment: usize) -> usize {
        self.prefix[fragment + 1] - self.prefix[fragment]
    }
}

/// Executes queries across the whole document and owns the globally ordered
/// match list
#[derive(Default)]
pub struct SearchEngine {
    pages: Vec<PageText>,
    indexed: bool,
    in_progress: bool,
    query: String,
    options: SearchOptions,
    matches: Vec<MatchRecord>,
    current: Option<usize>,
    /// A non-empty query has been executed against the current index
    ran: bool,
}

impl SearchEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract and cache every page's text. Idempotent; the cached index is
    /// reused until [`Self::clear_index`].
    pub fn ensure_indexed(&mut self, document: &dyn DocumentHandle) {
        if self.indexed {
            return;
        }
        self.in_progress = true;
        let mut pages = Vec::with_capacity(document.page_count());
        for index in 0..document.page_count() {
            let fragments = document
                .page(index)
                .and_then(|page| page.text_fragments());
            match fragments {
                Ok(fragments) => pages.push(PageText::index(fragments)),
                Err(e) => {
                    log::warn!("page {index}: text extraction failed: {e}");
                    pages.push(PageText::index(Vec::new()));
                }
            }
        }
        self.pages = pages;
        self.indexed = true;
        self.in_progress = false;
    }

    /// Drop the cached text index (on document replacement)
    pub fn clear_index(&mut self) {
        self.pages.clear();
        self.indexed = false;
        self.clear();
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Run a query across the whole document.
    ///
    /// An empty or whitespace-only query clears any previous results and is
    /// not an error.
    pub fn search(&mut self, query: &str, options: SearchOptions) -> MatchStatus {
        if query.trim().is_empty() {
            self.clear();
            return MatchStatus::default();
        }

        self.query = query.to_string();
        self.options = options;
        self.matches.clear();
        for (page, text) in self.pages.iter().enumerate() {
            scan_page(page, text, query, options, &mut self.matches);
        }
        self.current = if self.matches.is_empty() { None } else { Some(0) };
        self.ran = true;
        self.status_with(false)
    }

    /// Select the next match, wrapping circularly. A document with no
    /// matches is a silent no-op.
    pub fn next(&mut self) -> MatchStatus {
        if self.matches.is_empty() {
            return self.status_with(false);
        }
        let (index, wrapped) = match self.current {
            Some(index) if index + 1 >= self.matches.len() => (0, true),
            Some(index) => (index + 1, false),
            None => (0, false),
        };
        self.current = Some(index);
        self.status_with(wrapped)
    }

    /// Select the previous match, wrapping circularly
    pub fn previous(&mut self) -> MatchStatus {
        if self.matches.is_empty() {
            return self.status_with(false);
        }
        let (index, wrapped) = match self.current {
            Some(0) | None => (self.matches.len() - 1, true),
            Some(index) => (index - 1, false),
        };
        self.current = Some(index);
        self.status_with(wrapped)
    }

    /// Forget the query and all matches. Counters reset to zero and
    /// [`Self::status`] reverts to "not yet run".
    pub fn clear(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.current = None;
        self.ran = false;
    }

    /// `None` until a non-empty query has been run; `Some` with zero totals
    /// for a query that found nothing
    #[must_use]
    pub fn status(&self) -> Option<MatchStatus> {
        self.ran.then(|| self.status_with(false))
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.matches.len()
    }

    #[must_use]
    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    #[must_use]
    pub fn current_match(&self) -> Option<&MatchRecord> {
        self.current.and_then(|index| self.matches.get(index))
    }

    /// Highlight spans for `page`'s fragments under the current selection.
    ///
    /// With `highlight_all` every match on the page is emitted; otherwise
    /// only the selected one. A match spanning several fragments yields one
    /// span per touched fragment.
    #[must_use]
    pub fn highlights_for_page(&self, page: usize) -> Vec<HighlightSpan> {
        let Some(text) = self.pages.get(page) else {
            return Vec::new();
        };
        let mut spans = Vec::new();
        for (index, record) in self.matches.iter().enumerate() {
            if record.page != page {
                continue;
            }
            let selected = self.current == Some(index);
            if !selected && !self.options.highlight_all {
                continue;
            }
            push_match_spans(record, selected, text, &mut spans);
        }
        spans
    }

    /// Document-space anchor of a match: its begin fragment's bounds
    #[must_use]
    pub fn match_anchor(&self, record: &MatchRecord) -> Option<DocRect> {
        self.pages
            .get(record.page)?
            .fragments
            .get(record.begin_fragment)
            .map(|fragment| fragment.bounds)
    }

    fn status_with(&self, wrapped: bool) -> MatchStatus {
        MatchStatus {
            current: self.current.map_or(0, |index| index + 1),
            total: self.matches.len(),
            wrapped,
        }
    }
}

fn scan_page(
    page: usize,
    text: &PageText,
    query: &str,
    options: SearchOptions,
    out: &mut Vec<MatchRecord>,
) {
    if text.joined.is_empty() {
        return;
    }

    let folded;
    let needle_lower;
    let (haystack, offset_map, needle): (&str, Option<&[usize]>, &str) = if options.case_sensitive
    {
        (text.joined.as_str(), None, query)
    } else {
        folded = fold_with_map(&text.joined);
        needle_lower = query.to_lowercase();
        (folded.0.as_str(), Some(folded.1.as_slice()), needle_lower.as_str())
    };
    if needle.is_empty() {
        return;
    }

    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        // non-overlapping by start position
        from = at + needle.len();

        let (start, end) = match offset_map {
            Some(map) => (map[at], map[at + needle.len()]),
            None => (at, at + needle.len()),
        };
        if end <= start {
            continue;
        }
        if options.whole_word && !is_word_bounded(&text.joined, start, end, options.word_boundary) {
            continue;
        }

        let (begin_fragment, begin_offset) = text.locate(start);
        let (end_fragment, _) = text.locate(end - 1);
        let end_offset = end - text.prefix[end_fragment];

        out.push(MatchRecord {
            page,
            start,
            len: end - start,
            begin_fragment,
            begin_offset,
            end_fragment,
            end_offset,
        });
    }
}

fn push_match_spans(
    record: &MatchRecord,
    selected: bool,
    text: &PageText,
    out: &mut Vec<HighlightSpan>,
) {
    for fragment in record.begin_fragment..=record.end_fragment {
        let start = if fragment == record.begin_fragment {
            record.begin_offset
        } else {
            0
        };
        let end = if fragment == record.end_fragment {
            record.end_offset
        } else {
            text.fragment_len(fragment)
        };
        if end > start {
            out.push(HighlightSpan {
                fragment,
                start,
                end,
                selected,
            });
        }
    }
}

fn is_word_bounded(text: &str, start: usize, end: usize, boundary: WordBoundary) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| boundary.is_word_char(c))
        && !after.is_some_and(|c| boundary.is_word_char(c))
}

/// Lowercase `s` into a folded haystack plus a map from every folded byte
/// offset (and the final length) back to an original byte offset, so matches
/// found in folded space report valid original offsets.
fn fold_with_map(s: &str) -> (String, Vec<usize>) {
    let mut folded = String::with_capacity(s.len());
    let mut map = Vec::with_capacity(s.len() + 1);
    for (original, c) in s.char_indices() {
        for lowered in c.to_lowercase() {
            let before = folded.len();
            folded.push(lowered);
            for _ in before..folded.len() {
                map.push(original);
            }
        }
    }
    map.push(s.len());
    (folded, map)
}
