//! Normalized set of known disposable domains.
//!
//! Entries are trimmed and lowercased once at ingestion, so lookups only
//! normalize the candidate and never the stored entries.

use rustc_hash::FxHashSet;

/// Longest name DNS allows; longer source lines cannot be domains.
pub const DEFAULT_MAX_LINE_LEN: usize = 253;

/// Normalizes a raw entry: surrounding whitespace trimmed, lowercased.
///
/// Returns `None` for blank input.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Counts produced by merging one batch of entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entries that were not yet in the set.
    pub added: usize,
    /// Lines skipped for exceeding the length limit.
    pub rejected: usize,
}

/// A set of lowercase domains for constant-time membership checks.
#[derive(Debug, Clone, Default)]
pub struct DomainSet {
    domains: FxHashSet<Box<str>>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a raw entry. Returns `true` if it was not present yet.
    pub fn insert(&mut self, raw: &str) -> bool {
        match normalize(raw) {
            Some(domain) => self.domains.insert(domain.into_boxed_str()),
            None => false,
        }
    }

    /// Merges a newline-delimited source body.
    ///
    /// Blank lines are ignored, lines longer than `max_line_len` bytes are
    /// counted as rejected. Everything else is inserted verbatim.
    pub fn merge_lines(&mut self, body: &str, max_line_len: usize) -> MergeOutcome {
        self.merge_entries(body.lines(), max_line_len)
    }

    /// Merges already-split entries using the same rule as [`merge_lines`](Self::merge_lines).
    pub fn merge_entries<I, S>(&mut self, entries: I, max_line_len: usize) -> MergeOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = MergeOutcome::default();

        for entry in entries {
            let line = entry.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            if line.len() > max_line_len {
                outcome.rejected += 1;
                continue;
            }
            if self.insert(line) {
                outcome.added += 1;
            }
        }

        outcome
    }

    /// Checks membership, normalizing the candidate first.
    ///
    /// Blank input is never a member.
    pub fn contains(&self, candidate: &str) -> bool {
        match normalize(candidate) {
            Some(domain) => self.domains.contains(domain.as_str()),
            None => false,
        }
    }

    /// Returns the number of domains in the set.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|d| &**d)
    }
}

impl<S: AsRef<str>> FromIterator<S> for DomainSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.merge_entries(iter, DEFAULT_MAX_LINE_LEN);
        set
    }
}
