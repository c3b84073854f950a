use std::collections::BTreeMap;

use crate::Version;

/// Value history keyed by the version a write became effective in.
///
/// Reading at `v` yields the latest write at a version `<= v`. Writes at the
/// same version replace each other, so repeated edits of one draft collapse
/// into a single entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    entries: BTreeMap<Version, T>,
}

impl<T> Default for Versioned<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Versioned<T> {
    pub fn new(version: Version, value: T) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(version, value);
        Self { entries }
    }

    pub fn at(&self, version: Version) -> Option<&T> {
        self.entries.range(..=version).next_back().map(|(_, v)| v)
    }

    /// Like [`Versioned::at`], falling back to the earliest entry when the
    /// read predates every write.
    pub fn at_or_first(&self, version: Version) -> Option<&T> {
        self.at(version)
            .or_else(|| self.entries.values().next())
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.values().next_back()
    }

    pub fn write(&mut self, version: Version, value: T) {
        self.entries.insert(version, value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_see_latest_write_at_or_before_version() {
        let mut v = Versioned::new(1, "a");
        v.write(3, "b");
        assert_eq!(v.at(0), None);
        assert_eq!(v.at(1), Some(&"a"));
        assert_eq!(v.at(2), Some(&"a"));
        assert_eq!(v.at(3), Some(&"b"));
        assert_eq!(v.at(9), Some(&"b"));
        assert_eq!(v.at_or_first(0), Some(&"a"));
    }

    #[test]
    fn same_version_write_replaces() {
        let mut v = Versioned::new(2, 10);
        v.write(2, 11);
        assert_eq!(v.at(2), Some(&11));
        assert_eq!(v.latest(), Some(&11));
    }
}
