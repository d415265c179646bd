//! In-memory [`Repository`] implementation.
//!
//! The engine's storage is normally a host model tool; this implementation
//! backs tests and standalone use with the same surface. State lives behind
//! a single mutex so all trait methods can take `&self`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::repo::{
    AssociationEnd, AssociationId, AssociationKind, AssociationView, ElementId, LockState,
    PackageId, Repository,
};

#[derive(Debug, Clone)]
struct ClassRecord {
    name: String,
    package: PackageId,
    stereotypes: Vec<String>,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct AssociationRecord {
    id: AssociationId,
    kind: AssociationKind,
    source: ElementId,
    destination: ElementId,
    source_role: Option<String>,
    destination_role: Option<String>,
    source_stereotypes: Vec<String>,
    destination_stereotypes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct DiagramRecord {
    classes: Vec<ElementId>,
    associations: Vec<AssociationId>,
    redraws: u32,
}

#[derive(Default)]
struct Store {
    packages: BTreeMap<String, PackageId>,
    classes: HashMap<ElementId, ClassRecord>,
    associations: Vec<AssociationRecord>,
    locks: HashMap<ElementId, String>,
    diagrams: HashMap<PackageId, DiagramRecord>,
}

/// In-memory model store.
pub struct MemoryRepository {
    store: Mutex<Store>,
    user: String,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::with_user("captrail")
    }

    /// A repository whose lock operations act on behalf of `user`.
    pub fn with_user(user: impl Into<String>) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            user: user.into(),
        }
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().expect("repository store poisoned")
    }

    /// Create (or return) the package at a `/`-separated path.
    pub fn add_package(&self, path: &str) -> PackageId {
        let mut store = self.store();
        if let Some(&id) = store.packages.get(path) {
            return id;
        }
        let id = Uuid::new_v4();
        store.packages.insert(path.to_string(), id);
        id
    }

    /// Take a lock on behalf of another user, for simulating external
    /// holders.
    pub fn lock_as(&self, element: ElementId, holder: &str) {
        self.store().locks.insert(element, holder.to_string());
    }

    pub fn class_count(&self) -> usize {
        self.store().classes.len()
    }

    pub fn association_count(&self) -> usize {
        self.store().associations.len()
    }

    /// Number of redraws a package's diagram has seen.
    pub fn redraw_count(&self, package: PackageId) -> u32 {
        self.store()
            .diagrams
            .get(&package)
            .map(|d| d.redraws)
            .unwrap_or(0)
    }

    fn class_record<'a>(store: &'a Store, element: ElementId) -> Result<&'a ClassRecord> {
        store
            .classes
            .get(&element)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown element {}", element)))
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MemoryRepository {
    fn find_package(&self, path: &str) -> Option<PackageId> {
        self.store().packages.get(path).copied()
    }

    fn find_classes(
        &self,
        package: PackageId,
        name_filter: Option<&str>,
        stereotype: &str,
        exact: bool,
    ) -> Vec<ElementId> {
        let store = self.store();
        let mut matches: Vec<(ElementId, String)> = store
            .classes
            .iter()
            .filter(|(_, c)| c.package == package)
            .filter(|(_, c)| c.stereotypes.iter().any(|s| s == stereotype))
            .filter(|(_, c)| match name_filter {
                Some(filter) if exact => c.name == filter,
                Some(filter) => c.name.starts_with(filter),
                None => true,
            })
            .map(|(&id, c)| (id, c.name.clone()))
            .collect();
        // HashMap iteration order is arbitrary; present a stable one.
        matches.sort_by(|a, b| a.1.cmp(&b.1));
        matches.into_iter().map(|(id, _)| id).collect()
    }

    fn create_class(&self, package: PackageId, name: &str, stereotype: &str) -> Result<ElementId> {
        let mut store = self.store();
        if !store.packages.values().any(|&p| p == package) {
            return Err(Error::InvalidArgument(format!("unknown package {}", package)));
        }
        let id = Uuid::new_v4();
        store.classes.insert(
            id,
            ClassRecord {
                name: name.to_string(),
                package,
                stereotypes: vec![stereotype.to_string()],
                tags: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn class_name(&self, element: ElementId) -> Result<String> {
        let store = self.store();
        Ok(Self::class_record(&store, element)?.name.clone())
    }

    fn class_package(&self, element: ElementId) -> Result<PackageId> {
        let store = self.store();
        Ok(Self::class_record(&store, element)?.package)
    }

    fn rename_class(&self, element: ElementId, name: &str) -> Result<()> {
        let mut store = self.store();
        let record = store
            .classes
            .get_mut(&element)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown element {}", element)))?;
        record.name = name.to_string();
        Ok(())
    }

    fn delete_class(&self, element: ElementId) -> Result<()> {
        // Collect the composition-owned subtree, then drop every class and
        // any association touching one of them.
        let mut doomed = vec![element];
        let mut index = 0;
        {
            let store = self.store();
            Self::class_record(&store, element)?;
            while index < doomed.len() {
                let current = doomed[index];
                index += 1;
                for assoc in &store.associations {
                    if assoc.kind == AssociationKind::Composition
                        && assoc.source == current
                        && !doomed.contains(&assoc.destination)
                    {
                        doomed.push(assoc.destination);
                    }
                }
            }
        }
        let mut store = self.store();
        for id in &doomed {
            store.classes.remove(id);
            store.locks.remove(id);
        }
        store
            .associations
            .retain(|a| !doomed.contains(&a.source) && !doomed.contains(&a.destination));
        Ok(())
    }

    fn has_stereotype(&self, element: ElementId, stereotype: &str) -> bool {
        self.store()
            .classes
            .get(&element)
            .map(|c| c.stereotypes.iter().any(|s| s == stereotype))
            .unwrap_or(false)
    }

    fn tag(&self, element: ElementId, name: &str) -> Option<String> {
        self.store()
            .classes
            .get(&element)
            .and_then(|c| c.tags.get(name).cloned())
    }

    fn set_tag(
        &self,
        element: ElementId,
        name: &str,
        value: &str,
        create_missing: bool,
    ) -> Result<()> {
        let mut store = self.store();
        let record = store
            .classes
            .get_mut(&element)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown element {}", element)))?;
        if !create_missing && !record.tags.contains_key(name) {
            return Err(Error::InvalidOperation(format!(
                "element {} has no tag {}",
                element, name
            )));
        }
        record.tags.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn associations(&self, element: ElementId) -> Vec<AssociationView> {
        self.store()
            .associations
            .iter()
            .filter(|a| a.source == element)
            .map(|a| AssociationView {
                id: a.id,
                kind: a.kind,
                destination: a.destination,
                destination_role: a.destination_role.clone(),
                destination_stereotypes: a.destination_stereotypes.clone(),
            })
            .collect()
    }

    fn create_association(
        &self,
        source: ElementId,
        destination: ElementId,
        kind: AssociationKind,
    ) -> Result<AssociationId> {
        let mut store = self.store();
        if !store.classes.contains_key(&source) {
            return Err(Error::InvalidArgument(format!("unknown element {}", source)));
        }
        if !store.classes.contains_key(&destination) {
            return Err(Error::InvalidArgument(format!(
                "unknown element {}",
                destination
            )));
        }
        let id = Uuid::new_v4();
        store.associations.push(AssociationRecord {
            id,
            kind,
            source,
            destination,
            source_role: None,
            destination_role: None,
            source_stereotypes: Vec::new(),
            destination_stereotypes: Vec::new(),
        });
        Ok(id)
    }

    fn set_role(&self, association: AssociationId, end: AssociationEnd, role: &str) -> Result<()> {
        let mut store = self.store();
        let record = store
            .associations
            .iter_mut()
            .find(|a| a.id == association)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("unknown association {}", association))
            })?;
        match end {
            AssociationEnd::Source => record.source_role = Some(role.to_string()),
            AssociationEnd::Destination => record.destination_role = Some(role.to_string()),
        }
        Ok(())
    }

    fn add_stereotype(
        &self,
        association: AssociationId,
        end: AssociationEnd,
        stereotype: &str,
    ) -> Result<()> {
        let mut store = self.store();
        let record = store
            .associations
            .iter_mut()
            .find(|a| a.id == association)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("unknown association {}", association))
            })?;
        let list = match end {
            AssociationEnd::Source => &mut record.source_stereotypes,
            AssociationEnd::Destination => &mut record.destination_stereotypes,
        };
        if !list.iter().any(|s| s == stereotype) {
            list.push(stereotype.to_string());
        }
        Ok(())
    }

    fn remove_association(&self, association: AssociationId) -> Result<()> {
        let mut store = self.store();
        let before = store.associations.len();
        store.associations.retain(|a| a.id != association);
        if store.associations.len() == before {
            return Err(Error::InvalidArgument(format!(
                "unknown association {}",
                association
            )));
        }
        Ok(())
    }

    fn lock(&self, element: ElementId) -> bool {
        let mut store = self.store();
        if store.locks.contains_key(&element) {
            return false;
        }
        store.locks.insert(element, self.user.clone());
        true
    }

    fn unlock(&self, element: ElementId) {
        let mut store = self.store();
        if store.locks.get(&element) == Some(&self.user) {
            store.locks.remove(&element);
        }
    }

    fn lock_state(&self, element: ElementId) -> LockState {
        match self.store().locks.get(&element) {
            Some(holder) => LockState::Held {
                holder: holder.clone(),
            },
            None => LockState::Unlocked,
        }
    }

    fn diagram_add_classes(&self, package: PackageId, elements: &[ElementId]) -> Result<()> {
        let mut store = self.store();
        if !store.packages.values().any(|&p| p == package) {
            return Err(Error::InvalidArgument(format!("unknown package {}", package)));
        }
        let diagram = store.diagrams.entry(package).or_default();
        for element in elements {
            if !diagram.classes.contains(element) {
                diagram.classes.push(*element);
            }
        }
        Ok(())
    }

    fn diagram_add_associations(
        &self,
        package: PackageId,
        associations: &[AssociationId],
    ) -> Result<()> {
        let mut store = self.store();
        if !store.packages.values().any(|&p| p == package) {
            return Err(Error::InvalidArgument(format!("unknown package {}", package)));
        }
        let diagram = store.diagrams.entry(package).or_default();
        for association in associations {
            if !diagram.associations.contains(association) {
                diagram.associations.push(*association);
            }
        }
        Ok(())
    }

    fn redraw(&self, package: PackageId) -> Result<()> {
        let mut store = self.store();
        if !store.packages.values().any(|&p| p == package) {
            return Err(Error::InvalidArgument(format!("unknown package {}", package)));
        }
        store.diagrams.entry(package).or_default().redraws += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_classes_prefix_and_exact() {
        let repo = MemoryRepository::new();
        let pkg = repo.add_package("Tickets");
        let a = repo.create_class(pkg, "release/CSTI-1.01", "ReleaseTicket").unwrap();
        let b = repo.create_class(pkg, "release/CSTI-1.02", "ReleaseTicket").unwrap();
        repo.create_class(pkg, "release/CSTI-1.01", "Other").unwrap();

        let prefix = repo.find_classes(pkg, Some("release/CSTI-1"), "ReleaseTicket", false);
        assert_eq!(prefix, vec![a, b]);

        let exact = repo.find_classes(pkg, Some("release/CSTI-1.02"), "ReleaseTicket", true);
        assert_eq!(exact, vec![b]);
    }

    #[test]
    fn test_set_tag_respects_create_missing() {
        let repo = MemoryRepository::new();
        let pkg = repo.add_package("Tickets");
        let el = repo.create_class(pkg, "x", "Thing").unwrap();

        assert!(repo.set_tag(el, "version", "1", false).is_err());
        repo.set_tag(el, "version", "1", true).unwrap();
        repo.set_tag(el, "version", "2", false).unwrap();
        assert_eq!(repo.tag(el, "version").as_deref(), Some("2"));
    }

    #[test]
    fn test_lock_is_exclusive_and_holder_scoped() {
        let repo = MemoryRepository::with_user("alice");
        let pkg = repo.add_package("Services");
        let el = repo.create_class(pkg, "svc", "Service").unwrap();

        repo.lock_as(el, "bob");
        assert!(!repo.lock(el));
        // alice never acquired it, so her unlock must not evict bob
        repo.unlock(el);
        assert_eq!(
            repo.lock_state(el),
            LockState::Held { holder: "bob".to_string() }
        );
    }

    #[test]
    fn test_delete_class_follows_composition() {
        let repo = MemoryRepository::new();
        let pkg = repo.add_package("Services");
        let parent = repo.create_class(pkg, "op", "Operation").unwrap();
        let child = repo.create_class(pkg, "msg", "Message").unwrap();
        let other = repo.create_class(pkg, "peer", "Operation").unwrap();
        repo.create_association(parent, child, AssociationKind::Composition).unwrap();
        repo.create_association(parent, other, AssociationKind::Reference).unwrap();

        repo.delete_class(parent).unwrap();

        assert!(repo.class_name(parent).is_err());
        assert!(repo.class_name(child).is_err());
        // Referenced peers survive, their links to the deleted class do not
        assert!(repo.class_name(other).is_ok());
        assert_eq!(repo.association_count(), 0);
    }
}
