//! Abstract boundary to the external model repository.
//!
//! The engine never owns durable storage. Everything it persists — elements,
//! tags, stereotypes, associations, locks — lives behind [`Repository`],
//! which a host model tool implements. [`MemoryRepository`] is the built-in
//! implementation used in tests and anywhere the engine runs without a host.
//!
//! All methods take `&self`; implementations are expected to use interior
//! mutability. Mutations are synchronous, and the advisory lock surface is
//! the only concurrency primitive the engine relies on.

mod lock;
mod memory;

pub use lock::LockGuard;
pub use memory::MemoryRepository;

use uuid::Uuid;

use crate::error::Result;

pub type ElementId = Uuid;
pub type PackageId = Uuid;
pub type AssociationId = Uuid;

/// Structural flavor of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// Parent owns child; recursive deletes follow these links.
    Composition,
    /// Plain navigable reference. Ticket and timeline links are references,
    /// always created in directed pairs.
    Reference,
}

/// Which end of an association a role or stereotype applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationEnd {
    Source,
    Destination,
}

/// One outgoing association as seen from its source element.
#[derive(Debug, Clone)]
pub struct AssociationView {
    pub id: AssociationId,
    pub kind: AssociationKind,
    pub destination: ElementId,
    pub destination_role: Option<String>,
    pub destination_stereotypes: Vec<String>,
}

/// Advisory lock status of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Held { holder: String },
}

/// Interface to the external model store.
pub trait Repository {
    // ============================================================
    // Packages and classes
    // ============================================================

    /// Resolve a `/`-separated package path to its handle.
    fn find_package(&self, path: &str) -> Option<PackageId>;

    /// Classes in a package, filtered by stereotype and an optional name
    /// filter. `exact` matches the whole name; otherwise the filter is a
    /// prefix match.
    fn find_classes(
        &self,
        package: PackageId,
        name_filter: Option<&str>,
        stereotype: &str,
        exact: bool,
    ) -> Vec<ElementId>;

    fn create_class(&self, package: PackageId, name: &str, stereotype: &str) -> Result<ElementId>;

    fn class_name(&self, element: ElementId) -> Result<String>;

    fn class_package(&self, element: ElementId) -> Result<PackageId>;

    fn rename_class(&self, element: ElementId, name: &str) -> Result<()>;

    /// Delete a class, its associations, and recursively every class it
    /// owns through composition links.
    fn delete_class(&self, element: ElementId) -> Result<()>;

    fn has_stereotype(&self, element: ElementId, stereotype: &str) -> bool;

    // ============================================================
    // Tags
    // ============================================================

    fn tag(&self, element: ElementId, name: &str) -> Option<String>;

    /// Set a tag value. When `create_missing` is false, setting a tag the
    /// element does not carry is an error.
    fn set_tag(&self, element: ElementId, name: &str, value: &str, create_missing: bool)
        -> Result<()>;

    // ============================================================
    // Associations
    // ============================================================

    /// Outgoing associations of an element, in creation order.
    fn associations(&self, element: ElementId) -> Vec<AssociationView>;

    fn create_association(
        &self,
        source: ElementId,
        destination: ElementId,
        kind: AssociationKind,
    ) -> Result<AssociationId>;

    fn set_role(&self, association: AssociationId, end: AssociationEnd, role: &str) -> Result<()>;

    fn add_stereotype(
        &self,
        association: AssociationId,
        end: AssociationEnd,
        stereotype: &str,
    ) -> Result<()>;

    fn remove_association(&self, association: AssociationId) -> Result<()>;

    // ============================================================
    // Advisory locks
    // ============================================================

    /// Try to take the advisory lock on an element for the repository's
    /// current user. Returns false when any holder (including the current
    /// user) already has it.
    fn lock(&self, element: ElementId) -> bool;

    /// Release the current user's lock. Locks held by other users are left
    /// alone.
    fn unlock(&self, element: ElementId);

    fn lock_state(&self, element: ElementId) -> LockState;

    // ============================================================
    // Diagram refresh (best-effort)
    // ============================================================
    //
    // Visual sync only. Callers log failures and continue.

    fn diagram_add_classes(&self, package: PackageId, elements: &[ElementId]) -> Result<()>;

    fn diagram_add_associations(
        &self,
        package: PackageId,
        associations: &[AssociationId],
    ) -> Result<()>;

    fn redraw(&self, package: PackageId) -> Result<()>;
}

/// First association from `source` to `destination`, if any.
pub fn association_between(
    repo: &dyn Repository,
    source: ElementId,
    destination: ElementId,
) -> Option<AssociationView> {
    repo.associations(source)
        .into_iter()
        .find(|a| a.destination == destination)
}
