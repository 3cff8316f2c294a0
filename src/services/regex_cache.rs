//! Compiled regex cache keyed by pattern id and a digest of the regex text.
//!
//! Regexes compile case-insensitively with a bounded program size. Entries
//! for a pattern are dropped whenever its text may change or before it is
//! published active.

use std::sync::Arc;

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pattern::Pattern;

/// Compile `text` the way every template is matched.
pub fn compile_regex(text: &str, size_limit: usize) -> Result<Regex, AppError> {
    RegexBuilder::new(text)
        .case_insensitive(true)
        .size_limit(size_limit)
        .build()
        .map_err(|e| AppError::InvalidPattern(e.to_string()))
}

/// SHA-256 of the regex text, hex encoded.
fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct RegexCache {
    entries: DashMap<(Uuid, String), Arc<Regex>>,
    size_limit: usize,
}

impl RegexCache {
    pub fn new(size_limit: usize) -> Self {
        Self {
            entries: DashMap::new(),
            size_limit,
        }
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// Return the cached matcher for `pattern`, compiling it on first use.
    pub fn compile(&self, pattern: &Pattern) -> Result<Arc<Regex>, AppError> {
        let key = (pattern.id, digest(&pattern.regex_pattern));
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let regex = Arc::new(compile_regex(&pattern.regex_pattern, self.size_limit)?);
        let entry = self.entries.entry(key).or_insert(regex);
        Ok(Arc::clone(entry.value()))
    }

    /// Drop every compiled entry of a pattern.
    pub fn invalidate(&self, pattern_id: Uuid) {
        self.entries.retain(|(id, _), _| *id != pattern_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
