//! Sorting repository identifiers into the ways they can be resolved.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static PAIR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w._-]+/[\w._-]*$").unwrap());
static OWNER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w._-]+$").unwrap());
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:http|https|git)://[\w/._-]+/[\w._-]*)|([\w._-]+?@[\w._-]+?:[\w./_-]+)")
        .unwrap()
});

/// An `owner/repo` pair.
///
/// The `repo` half may be empty (as in `octocat/`), which stands for every
/// repository belonging to the owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OwnerRepo {
    pub owner: String,
    pub repo: String,
}

/// The identifiers for a run, bucketed by how they get resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub pairs: BTreeSet<OwnerRepo>,
    pub owners: BTreeSet<String>,
    pub urls: BTreeSet<String>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.owners.is_empty() && self.urls.is_empty()
    }

    /// Whether anything here needs the hosted API to resolve.
    pub fn has_hosted(&self) -> bool {
        !self.pairs.is_empty() || !self.owners.is_empty()
    }
}

/// Sort repository identifiers into `owner/repo` pairs, bare owners, and
/// direct clone URLs.
///
/// Each pattern is tried against each identifier independently, so one
/// entry may land in several buckets. For URLs the matching substring is
/// kept rather than the whole identifier. Identifiers matching nothing are
/// dropped with a warning.
pub fn classify<S: AsRef<str>>(identifiers: &[S]) -> Classification {
    let mut classification = Classification::default();

    for identifier in identifiers {
        let identifier = identifier.as_ref();
        let mut matched = false;

        if PAIR_PATTERN.is_match(identifier) {
            let mut pieces = identifier.splitn(2, '/');
            let owner = pieces.next().expect("unreachable");
            let repo = pieces.next().expect("unreachable");

            classification.pairs.insert(OwnerRepo {
                owner: owner.to_string(),
                repo: repo.to_string(),
            });
            matched = true;
        }

        if OWNER_PATTERN.is_match(identifier) {
            classification.owners.insert(identifier.to_string());
            matched = true;
        }

        if let Some(found) = URL_PATTERN.find(identifier) {
            classification.urls.insert(found.as_str().to_string());
            matched = true;
        }

        if !matched {
            warn!("Ignoring unrecognised repository identifier: {:?}", identifier);
        }
    }

    classification
}
