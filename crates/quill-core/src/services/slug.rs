//! Slug generation.
//!
//! A slug is derived from a post title by lower-casing it, dropping every
//! character that is not an ASCII word character or a space, and turning
//! each run of spaces into a single hyphen. Collisions are resolved by
//! appending `-1`, `-2`, ... to the base slug.

use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_ ]+").expect("Invalid non-word regex pattern"));
static SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +").expect("Invalid space-run regex pattern"));

/// Base slug used when a title normalizes to nothing.
pub const FALLBACK_SLUG: &str = "post";

/// Normalize a title into its base slug.
pub fn normalize(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    let slug = SPACES.replace_all(&stripped, "-").into_owned();

    if slug.is_empty() || slug.chars().all(|c| c == '-') {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Infinite sequence of slug candidates: `base`, `base-1`, `base-2`, ...
#[derive(Debug, Clone)]
pub struct SlugCandidates {
    base: String,
    next_suffix: u64,
}

impl SlugCandidates {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            next_suffix: 0,
        }
    }

    pub fn for_title(title: &str) -> Self {
        Self::new(normalize(title))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Next candidate; the sequence never ends.
    pub fn next_candidate(&mut self) -> String {
        let candidate = match self.next_suffix {
            0 => self.base.clone(),
            n => format!("{}-{}", self.base, n),
        };
        self.next_suffix += 1;
        candidate
    }
}

impl Iterator for SlugCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.next_candidate())
    }
}

/// Return the first candidate for `title` that `exists` reports as unused.
///
/// The probe is unbounded; callers relying on a shared store must still
/// treat the store's uniqueness check at write time as authoritative.
pub fn generate(title: &str, mut exists: impl FnMut(&str) -> bool) -> String {
    let mut candidates = SlugCandidates::for_title(title);
    loop {
        let candidate = candidates.next_candidate();
        if !exists(&candidate) {
            return candidate;
        }
    }
}
