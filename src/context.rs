//! Explicit per-operation context.
//!
//! The engine keeps no global state: every component that needs repository
//! or configuration access receives this context by reference. The caller
//! creates one per operation or session and drops it when the operation's
//! in-memory view is no longer valid.

use crate::config::Settings;
use crate::repo::Repository;

/// Borrowed handles to the two external collaborators.
#[derive(Clone, Copy)]
pub struct ModelContext<'a> {
    pub repo: &'a dyn Repository,
    pub settings: &'a Settings,
}

impl<'a> ModelContext<'a> {
    pub fn new(repo: &'a dyn Repository, settings: &'a Settings) -> Self {
        Self { repo, settings }
    }
}
