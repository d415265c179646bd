//! Versioning policy: identifier formats and bump rules.
//!
//! These are pure functions with no repository access. The string formats
//! are a bit-exact contract — other tooling parses qualified ids and release
//! ids back out of element names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A `major.minor` capability version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn bump_minor(&mut self) {
        self.minor += 1;
    }
}

impl Default for Version {
    /// Freshly created capabilities start at 1.0.
    fn default() -> Self {
        Self { major: 1, minor: 0 }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| Error::InvalidOperation(format!("version tag {:?} is not numeric", s)))
        };
        match s.split_once('.') {
            Some((major, minor)) => Ok(Self {
                major: parse(major)?,
                minor: parse(minor)?,
            }),
            None => Ok(Self {
                major: parse(s)?,
                minor: 0,
            }),
        }
    }
}

/// Release identifier: `prefix/id.VV` with a two-digit zero-padded version.
/// Versions of 100 and above overflow to three digits naturally.
pub fn format_release_id(prefix: &str, id: &str, version: u32) -> String {
    format!("{}/{}.{:02}", prefix, id, version)
}

/// Qualified ticket identifier: `project/id`, or `project/id.VV` when a
/// version is part of the key.
pub fn format_qualified_id(project: &str, id: &str, version: Option<u32>) -> String {
    match version {
        Some(v) => format!("{}/{}.{:02}", project, id, v),
        None => format!("{}/{}", project, id),
    }
}

/// The change that is asking whether it must bump the minor version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    AddOperation,
    AssociateOperation,
    RenameOperation,
    DeleteOperation,
    Commit,
}

impl Change {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddOperation => "add_operation",
            Self::AssociateOperation => "associate_operation",
            Self::RenameOperation => "rename_operation",
            Self::DeleteOperation => "delete_operation",
            Self::Commit => "commit",
        }
    }
}

/// Whether a change forces a minor bump or leaves the decision to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpRule {
    Always,
    CallerDecides,
}

/// Bump table. New operations, new associations, and explicit commits always
/// bump; renames and deletes are batched by callers, which decide themselves.
pub fn bump_rule(change: Change) -> BumpRule {
    match change {
        Change::AddOperation | Change::AssociateOperation | Change::Commit => BumpRule::Always,
        Change::RenameOperation | Change::DeleteOperation => BumpRule::CallerDecides,
    }
}
