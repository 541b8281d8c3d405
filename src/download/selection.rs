//! Choosing files from a listing
//!
//! A selection made only of 1-based indices and ranges (`"2"`, `"1 3"`,
//! `"1,3"`, `"2-4"`) picks positions in the sorted listing. Anything else is a
//! case-sensitive substring of the file name.

use crate::error::{DownloadError, Result};
use crate::types::{FileEntry, FileListing};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use tracing::warn;

/// Parsed user selection
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Every file
    All,
    /// 1-based positions and ranges, in the order given
    ///
    /// Ranges stay unexpanded until they are bounded by a listing.
    Indices(Vec<RangeInclusive<usize>>),
    /// Case-sensitive substring of the file name
    Pattern(String),
}

impl Selection {
    /// Interpret user input
    ///
    /// Blank input is a pattern that [`Selection::apply`] rejects as
    /// `NoMatch`, never a request for every file.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match parse_indices(input) {
            Some(indices) => Selection::Indices(indices),
            None => Selection::Pattern(input.to_string()),
        }
    }

    /// Entries of `listing` chosen by this selection
    ///
    /// Out-of-range indices are skipped with a warning and ranges are cut at
    /// the end of the listing. Repeated positions are chosen once.
    ///
    /// # Errors
    /// [`DownloadError::NoMatch`] if nothing is chosen.
    pub fn apply<'a>(&self, listing: &'a FileListing) -> Result<Vec<&'a FileEntry>> {
        let entries = listing.entries();

        let chosen: Vec<&FileEntry> = match self {
            Selection::All => entries.iter().collect(),
            Selection::Indices(ranges) => {
                let mut seen = HashSet::new();
                let mut chosen = Vec::new();
                for range in ranges {
                    let start = (*range.start()).max(1);
                    let end = (*range.end()).min(entries.len());
                    if *range.start() == 0 || *range.end() > entries.len() {
                        warn!(
                            start = *range.start(),
                            end = *range.end(),
                            files = entries.len(),
                            "selection index out of range"
                        );
                    }
                    for position in start..=end {
                        if seen.insert(position)
                            && let Some(entry) = entries.get(position - 1)
                        {
                            chosen.push(entry);
                        }
                    }
                }
                chosen
            }
            Selection::Pattern(pattern) if pattern.is_empty() => Vec::new(),
            Selection::Pattern(pattern) => entries
                .iter()
                .filter(|e| e.name.contains(pattern.as_str()))
                .collect(),
        };

        if chosen.is_empty() {
            return Err(DownloadError::NoMatch {
                selection: self.to_string(),
            }
            .into());
        }
        Ok(chosen)
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => write!(f, "all"),
            Selection::Indices(ranges) => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|r| {
                        if r.start() == r.end() {
                            r.start().to_string()
                        } else {
                            format!("{}-{}", r.start(), r.end())
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(","))
            }
            Selection::Pattern(pattern) => write!(f, "{}", pattern),
        }
    }
}

/// `Some` only if every token is a number or an ascending `a-b` range
fn parse_indices(input: &str) -> Option<Vec<RangeInclusive<usize>>> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let mut ranges = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_number(start)?;
                let end = parse_number(end)?;
                if start > end {
                    return None;
                }
                ranges.push(start..=end);
            }
            None => {
                let index = parse_number(token)?;
                ranges.push(index..=index);
            }
        }
    }
    Some(ranges)
}

fn parse_number(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
