//! Dictionary (C8) — a sorted set of keyword byte-strings used by
//! `CHUNK_DICT_SWAP` (S6).

use std::path::{Path, PathBuf};

use rand::Rng;

pub const MAX_ENTRY_LEN: usize = 128;
pub const MAX_ENTRIES: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("failed to read dictionary {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("dictionary {0} contains a blank line")]
    BlankLine(PathBuf),
    #[error("dictionary {0} has an entry longer than {MAX_ENTRY_LEN} bytes")]
    EntryTooLong(PathBuf),
    #[error("dictionary {0} has more than {MAX_ENTRIES} entries")]
    TooManyEntries(PathBuf),
    #[error("dictionary {0} contains a duplicate entry")]
    DuplicateEntry(PathBuf),
}

/// A loaded, sorted dictionary. Immutable after construction, shared
/// read-only across every mutator invocation once loaded.
#[derive(Debug, Clone)]
pub struct Dictionary {
    entries: Vec<Box<[u8]>>,
}

impl Dictionary {
    /// Load one entry per line, UTF-8-agnostic. No blank lines, no
    /// duplicates, at most `MAX_ENTRY_LEN` bytes per entry, at most
    /// `MAX_ENTRIES` entries.
    pub fn load(path: &Path) -> Result<Self, DictError> {
        let bytes = std::fs::read(path).map_err(|e| DictError::ReadFailed(path.to_path_buf(), e))?;

        let mut lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
        if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }

        let mut entries: Vec<Box<[u8]>> = Vec::with_capacity(lines.len());
        for raw in lines {
            let line = strip_trailing_cr(raw);
            if line.is_empty() {
                return Err(DictError::BlankLine(path.to_path_buf()));
            }
            if line.len() > MAX_ENTRY_LEN {
                return Err(DictError::EntryTooLong(path.to_path_buf()));
            }
            entries.push(line.to_vec().into_boxed_slice());
        }

        if entries.len() > MAX_ENTRIES {
            return Err(DictError::TooManyEntries(path.to_path_buf()));
        }

        entries.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        for window in entries.windows(2) {
            if window[0] == window[1] {
                return Err(DictError::DuplicateEntry(path.to_path_buf()));
            }
        }

        Ok(Self { entries })
    }

    pub fn contains(&self, word: &[u8]) -> bool {
        self.entries
            .binary_search_by(|e| e.as_ref().cmp(word))
            .is_ok()
    }

    pub fn entries(&self) -> &[Box<[u8]>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A uniformly random entry different from `word`, or `None` if every
    /// entry equals `word` (or the dictionary is empty).
    pub fn random_distinct_from(&self, word: &[u8], rng: &mut impl Rng) -> Option<&[u8]> {
        let candidates: Vec<&[u8]> = self
            .entries
            .iter()
            .map(|e| e.as_ref())
            .filter(|w| *w != word)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.gen_range(0..candidates.len())])
    }
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((&b'\r', rest)) => rest,
        _ => line,
    }
}
