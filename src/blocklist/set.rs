//! Immutable blocklist with subdomain matching.
//!
//! Entries are normalized once at construction so lookups never allocate
//! beyond lowercasing the queried name.

use std::collections::HashSet;

/// A set of blocked domains.
///
/// A domain is blocked when it equals an entry or is a subdomain of one
/// (`ads.example.com` is blocked by `example.com`).
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    entries: HashSet<String>,
}

impl Blocklist {
    /// Create a blocklist from raw entries.
    ///
    /// Entries are trimmed, lowercased and stripped of a trailing dot.
    /// Empty entries are skipped.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .filter_map(|entry| normalize(entry.as_ref()))
            .collect();

        Self { entries }
    }

    /// Check if a domain is blocked, ignoring case.
    ///
    /// Probes the full name and every suffix that follows a `.`, which is
    /// the same as testing `domain == entry || domain.ends_with("." + entry)`
    /// against every entry.
    #[inline]
    pub fn is_blocked(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        let domain = domain.strip_suffix('.').unwrap_or(&domain);
        self.is_blocked_normalized(domain)
    }

    /// Same as [`is_blocked`](Self::is_blocked) for a name that is already
    /// lowercase and has no trailing dot.
    pub fn is_blocked_normalized(&self, domain: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        if self.entries.contains(domain) {
            return true;
        }
        domain
            .match_indices('.')
            .any(|(dot, _)| self.entries.contains(&domain[dot + 1..]))
    }

    /// Check whether `entry` is present as-is (after normalization).
    pub fn contains(&self, entry: &str) -> bool {
        normalize(entry).is_some_and(|entry| self.entries.contains(&entry))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for Blocklist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

fn normalize(entry: &str) -> Option<String> {
    let entry = entry.trim().to_ascii_lowercase();
    let entry = entry.strip_suffix('.').unwrap_or(&entry);
    (!entry.is_empty()).then(|| entry.to_string())
}
