//! Package manifest wire format.
//!
//! A manifest is a newline-joined list of `name==version` lines, the same
//! shape `pip list --format=freeze` emits. Lines without the `==` delimiter
//! are bare names with an unknown version; blank lines are skipped. Parsing
//! and rendering round-trip.

use serde::{Deserialize, Serialize};

const VERSION_DELIMITER: &str = "==";

/// One installed package as it appears in a manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    pub version: Option<String>,
}

impl PackageEntry {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parses a single manifest line. Returns `None` for blank lines.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match line.split_once(VERSION_DELIMITER) {
            Some((name, version)) if !name.trim().is_empty() => Some(Self::new(
                name.trim(),
                Some(version.trim().to_string()).filter(|v| !v.is_empty()),
            )),
            Some(_) => None,
            None => Some(Self::new(line, None)),
        }
    }

    pub fn render(&self) -> String {
        match &self.version {
            Some(version) => format!("{}{VERSION_DELIMITER}{version}", self.name),
            None => self.name.clone(),
        }
    }
}

/// An ordered snapshot of installed packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<PackageEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<PackageEntry>) -> Self {
        Self { entries }
    }

    /// Parses newline-joined manifest text, skipping blank and unusable lines.
    pub fn parse(text: &str) -> Self {
        Self {
            entries: text.lines().filter_map(PackageEntry::parse_line).collect(),
        }
    }

    /// Renders the newline-joined wire text stored under the account key.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(PackageEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Keeps only entries whose name appears in `names`, preserving order.
    pub fn select(&self, names: &[String]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| names.iter().any(|name| name == &entry.name))
                .cloned()
                .collect(),
        }
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a PackageEntry;
    type IntoIter = std::slice::Iter<'a, PackageEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<PackageEntry> for Manifest {
    fn from_iter<I: IntoIterator<Item = PackageEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
