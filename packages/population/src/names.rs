//! Region-name normalization.
//!
//! Case feeds and census tables spell regions differently ("KERALA",
//! "Kerala", "Pondicherry" vs "Puducherry"). The same pipeline is applied to
//! both sides before matching:
//!
//! 1. Trim and collapse whitespace
//! 2. Fold diacritics (`"Pudučherry"` -> `"Puducherry"`)
//! 3. Title-case each alphabetic run (`"JAMMU AND KASHMIR"` -> `"Jammu And Kashmir"`)
//! 4. Apply the rename table

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization as _;
use unicode_normalization::char::is_combining_mark;

/// Regex to collapse runs of whitespace into a single space.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|_| unreachable!()));

/// Upper-cases the first letter of every alphabetic run and lower-cases the
/// rest. Any non-alphabetic character starts a new run, so
/// `"andaman & nicobar"` becomes `"Andaman & Nicobar"`.
#[must_use]
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_alpha = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Strips combining marks after canonical decomposition.
#[must_use]
pub fn fold_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normalizes a region name without applying any renames.
#[must_use]
pub fn canonical_name(raw: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    title_case(&fold_diacritics(&collapsed))
}

/// Region-name normalizer with a rename table.
///
/// Rename keys and targets are themselves canonicalized on construction, so
/// the table can be written in any case.
#[derive(Debug, Clone, Default)]
pub struct RegionNames {
    renames: BTreeMap<String, String>,
}

impl RegionNames {
    /// Builds a normalizer from a raw rename table.
    #[must_use]
    pub fn new(renames: &BTreeMap<String, String>) -> Self {
        Self {
            renames: renames
                .iter()
                .map(|(from, to)| (canonical_name(from), canonical_name(to)))
                .collect(),
        }
    }

    /// Returns the name used for matching `raw` against other sources.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let name = canonical_name(raw);
        match self.renames.get(&name) {
            Some(renamed) => renamed.clone(),
            None => name,
        }
    }
}
