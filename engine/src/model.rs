//! Core data model for backup runs.
//!
//! This module defines the structures a run is built from:
//! - BackupEntry: one declared unit of work (a remote file or directory)
//! - EntryOptions: the typed policy clauses of an entry
//! - RunOverrides: run-scoped switches that disable clauses or pick a group
//! - Clause: the names of all policy clauses

use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of a declared entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Any other declared type. Parsed successfully but never processed.
    Unknown,
}

impl EntryKind {
    /// Map the document's `type` value onto a kind.
    pub fn from_declared(value: &str) -> Self {
        match value {
            "file" => EntryKind::File,
            "dir" => EntryKind::Directory,
            _ => EntryKind::Unknown,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "File"),
            EntryKind::Directory => write!(f, "Dir"),
            EntryKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One pattern or a list of patterns, as written in the policy document.
///
/// Any other JSON value is kept as `Invalid` so that it is reported by the
/// clause that reads it, not by the document parser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Patterns {
    One(String),
    Many(Vec<String>),
    Invalid(serde_json::Value),
}

impl Patterns {
    /// The patterns when written as a non-empty list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Patterns::Many(list) if !list.is_empty() => Some(list),
            _ => None,
        }
    }
}

/// Policy clauses of a single entry. A `None` field places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntryOptions {
    pub skip: Option<bool>,
    /// An explicit `null` counts as present.
    #[serde(default, deserialize_with = "present_patterns")]
    pub exclude_folders: Option<Patterns>,
    pub group: Option<String>,
    pub recurse: Option<bool>,
    pub path_rootindex: Option<usize>,
    pub simulate: Option<bool>,
    pub overwrite_existing: Option<bool>,
    pub overwrite_newer: Option<bool>,
    pub exclude_filter: Option<String>,
    pub include_filters: Option<Patterns>,
    pub exclude_files: Option<Patterns>,
}

fn present_patterns<'de, D>(deserializer: D) -> Result<Option<Patterns>, D::Error>
where
    D: Deserializer<'de>,
{
    Patterns::deserialize(deserializer).map(Some)
}

/// Names of the policy clauses, as used in the document and in overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Skip,
    ExcludeFolders,
    Group,
    Recurse,
    PathRootIndex,
    Simulate,
    OverwriteExisting,
    OverwriteNewer,
    ExcludeFilter,
    IncludeFilters,
    ExcludeFiles,
}

impl Clause {
    pub const ALL: [Clause; 11] = [
        Clause::Skip,
        Clause::ExcludeFolders,
        Clause::Group,
        Clause::Recurse,
        Clause::PathRootIndex,
        Clause::Simulate,
        Clause::OverwriteExisting,
        Clause::OverwriteNewer,
        Clause::ExcludeFilter,
        Clause::IncludeFilters,
        Clause::ExcludeFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Clause::Skip => "skip",
            Clause::ExcludeFolders => "exclude_folders",
            Clause::Group => "group",
            Clause::Recurse => "recurse",
            Clause::PathRootIndex => "path_rootindex",
            Clause::Simulate => "simulate",
            Clause::OverwriteExisting => "overwrite_existing",
            Clause::OverwriteNewer => "overwrite_newer",
            Clause::ExcludeFilter => "exclude_filter",
            Clause::IncludeFilters => "include_filters",
            Clause::ExcludeFiles => "exclude_files",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Clause::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-scoped overrides supplied once from the command line.
///
/// Names in `ignored_options` that are not clause names are kept but match
/// nothing, so an ignored `"symlink"` has no effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub active_group: Option<String>,
    pub ignored_options: HashSet<String>,
}

impl RunOverrides {
    pub fn new<I, S>(active_group: Option<String>, ignored_options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RunOverrides {
            active_group,
            ignored_options: ignored_options
                .into_iter()
                .map(|s| {
                    let s: String = s.into();
                    s.trim().to_string()
                })
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// True unless the operator asked to ignore `clause` for this run.
    pub fn allows(&self, clause: Clause) -> bool {
        !self.ignored_options.contains(clause.as_str())
    }

    /// The group filter, if one is set and non-empty.
    pub fn group_filter(&self) -> Option<&str> {
        self.active_group.as_deref().filter(|g| !g.is_empty())
    }
}

/// One declared unit of work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub kind: EntryKind,
    pub name: String,
    pub remote_path: PathBuf,
    /// Free-text filter hint. Kept from the document, not evaluated.
    pub filter: Option<String>,
    pub options: Option<EntryOptions>,
}

impl BackupEntry {
    pub fn new(
        kind: EntryKind,
        name: impl Into<String>,
        remote_path: impl Into<PathBuf>,
        filter: Option<String>,
        options: Option<EntryOptions>,
    ) -> Self {
        BackupEntry {
            kind,
            name: name.into(),
            remote_path: remote_path.into(),
            filter,
            options,
        }
    }

    pub fn remote_path(&self) -> &Path {
        &self.remote_path
    }

    pub fn should_skip(&self, overrides: &RunOverrides) -> bool {
        overrides.allows(Clause::Skip)
            && self
                .options
                .as_ref()
                .and_then(|o| o.skip)
                .unwrap_or(false)
    }

    pub fn recurse(&self, overrides: &RunOverrides) -> bool {
        overrides.allows(Clause::Recurse)
            && self
                .options
                .as_ref()
                .and_then(|o| o.recurse)
                .unwrap_or(false)
    }

    pub fn simulate(&self, overrides: &RunOverrides) -> bool {
        overrides.allows(Clause::Simulate)
            && self
                .options
                .as_ref()
                .and_then(|o| o.simulate)
                .unwrap_or(false)
    }

    pub fn path_rootindex(&self, overrides: &RunOverrides) -> Option<usize> {
        if !overrides.allows(Clause::PathRootIndex) {
            return None;
        }
        self.options.as_ref().and_then(|o| o.path_rootindex)
    }
}
