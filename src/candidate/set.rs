use std::collections::BTreeSet;

/// The deduplicated, lexicographically sorted candidate URLs of one run.
///
/// Immutable once built; the crawler computes it once and only reads it
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    urls: Vec<String>,
}

impl CandidateSet {
    /// Merges per-URL candidate lists, dropping exact duplicates and sorting.
    pub fn from_lists<I>(lists: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let unique: BTreeSet<String> = lists.into_iter().flatten().collect();
        Self {
            urls: unique.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.urls.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.iter()
    }
}
