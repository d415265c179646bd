//! The capability tree: arena-owned hierarchy of versioned capabilities.
//!
//! The tree is an in-memory view over a repository subtree. Nodes are held
//! by value in an arena and addressed by [`CapabilityId`]; the tree is the
//! sole owner, so no references into the middle of it outlive an operation.
//!
//! Construction follows the child-registers-with-parent contract: whether a
//! node is created fresh or loaded from the repository, inserting it into
//! its parent's child list is the last step of its own construction. Loading
//! a subtree therefore recurses child-first and never writes a parent's
//! child list from the outside.

use crate::config::keys;
use crate::context::ModelContext;
use crate::error::{Error, Result};
use crate::models::{Capability, CapabilityId, CapabilityKind};
use crate::repo::{association_between, AssociationKind, ElementId, PackageId};
use crate::versioning::Version;

/// Arena of capability nodes.
#[derive(Debug, Default)]
pub struct CapabilityTree {
    nodes: Vec<Capability>,
}

impl CapabilityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: CapabilityId) -> &Capability {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: CapabilityId) -> &mut Capability {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: CapabilityId) -> &[CapabilityId] {
        &self.node(id).children
    }

    /// Walk up the parent chain to the owning Service, if the node is part
    /// of one.
    pub fn service_of(&self, id: CapabilityId) -> Option<CapabilityId> {
        let mut current = Some(id);
        while let Some(c) = current {
            if self.node(c).kind == CapabilityKind::Service {
                return Some(c);
            }
            current = self.node(c).parent;
        }
        None
    }

    // ============================================================
    // Construction
    // ============================================================

    /// Create a fresh capability: a new repository element with the kind's
    /// stereotype and an initial version tag. The node starts unlinked; the
    /// caller attaches it explicitly.
    pub fn create(
        &mut self,
        ctx: &ModelContext<'_>,
        package: PackageId,
        kind: CapabilityKind,
        name: &str,
    ) -> Result<CapabilityId> {
        let stereotype = ctx.settings.capability_stereotype(kind)?;
        let element = ctx.repo.create_class(package, name, stereotype)?;
        let version = Version::default();
        ctx.repo.set_tag(
            element,
            ctx.settings.property(keys::VERSION_TAG)?,
            &version.to_string(),
            true,
        )?;
        Ok(self.push(Capability {
            name: name.to_string(),
            kind,
            version,
            element: Some(element),
            package: Some(package),
            parent: None,
            children: Vec::new(),
        }))
    }

    /// Link a detached node under a parent, creating the structural
    /// composition link in the repository. Registration into the parent's
    /// child list is the final step.
    pub fn attach(
        &mut self,
        ctx: &ModelContext<'_>,
        child: CapabilityId,
        parent: CapabilityId,
    ) -> Result<()> {
        if self.node(child).parent.is_some() {
            return Err(Error::InvalidOperation(format!(
                "capability {} is already attached",
                self.node(child).name
            )));
        }
        if let (Some(parent_el), Some(child_el)) =
            (self.node(parent).element, self.node(child).element)
        {
            ctx.repo
                .create_association(parent_el, child_el, AssociationKind::Composition)?;
        }
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
        Ok(())
    }

    /// Unlink a node from its parent, removing the structural link. The node
    /// and its repository element survive; resource deletion is a separate,
    /// explicit step.
    pub fn detach(&mut self, ctx: &ModelContext<'_>, child: CapabilityId) -> Result<()> {
        let parent = self.node(child).parent.ok_or_else(|| {
            Error::InvalidOperation(format!(
                "capability {} is not attached",
                self.node(child).name
            ))
        })?;
        if let (Some(parent_el), Some(child_el)) =
            (self.node(parent).element, self.node(child).element)
        {
            if let Some(link) = association_between(ctx.repo, parent_el, child_el) {
                ctx.repo.remove_association(link.id)?;
            }
        }
        self.node_mut(parent).children.retain(|&c| c != child);
        self.node_mut(child).parent = None;
        Ok(())
    }

    /// Reconstruct a tree from an existing repository subtree rooted at
    /// `element`, following composition links.
    pub fn load(ctx: &ModelContext<'_>, element: ElementId) -> Result<(Self, CapabilityId)> {
        let mut tree = Self::new();
        let root = Self::load_node(ctx, &mut tree, element, None)?;
        Ok((tree, root))
    }

    fn load_node(
        ctx: &ModelContext<'_>,
        tree: &mut Self,
        element: ElementId,
        parent: Option<CapabilityId>,
    ) -> Result<CapabilityId> {
        let name = ctx.repo.class_name(element)?;
        let kind = CapabilityKind::ALL
            .iter()
            .copied()
            .find(|&k| {
                ctx.settings
                    .capability_stereotype(k)
                    .map(|s| ctx.repo.has_stereotype(element, s))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                Error::InvalidArgument(format!("element {} is not a capability", name))
            })?;
        let version = match ctx.repo.tag(element, ctx.settings.property(keys::VERSION_TAG)?) {
            Some(tag) => tag.parse()?,
            None => Version::default(),
        };
        let package = ctx.repo.class_package(element)?;

        let id = tree.push(Capability {
            name,
            kind,
            version,
            element: Some(element),
            package: Some(package),
            parent,
            children: Vec::new(),
        });

        for link in ctx.repo.associations(element) {
            if link.kind == AssociationKind::Composition {
                Self::load_node(ctx, tree, link.destination, Some(id))?;
            }
        }

        // Children are in place; now register with the parent.
        if let Some(p) = parent {
            tree.node_mut(p).children.push(id);
        }
        Ok(id)
    }

    fn push(&mut self, node: Capability) -> CapabilityId {
        let id = CapabilityId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Rename a node in place, in both the arena and the repository.
    pub fn rename(&mut self, ctx: &ModelContext<'_>, id: CapabilityId, name: &str) -> Result<()> {
        if let Some(element) = self.node(id).element {
            ctx.repo.rename_class(element, name)?;
        }
        self.node_mut(id).name = name.to_string();
        Ok(())
    }

    // ============================================================
    // Versioning
    // ============================================================

    /// Bump a node's minor version and mirror it into the element's version
    /// tag.
    pub fn bump_minor(&mut self, ctx: &ModelContext<'_>, id: CapabilityId) -> Result<Version> {
        let tag = ctx.settings.property(keys::VERSION_TAG)?.to_string();
        let node = self.node_mut(id);
        node.version.bump_minor();
        let version = node.version;
        if let Some(element) = node.element {
            ctx.repo.set_tag(element, &tag, &version.to_string(), true)?;
        }
        Ok(version)
    }

    /// The bump an added operation triggers: the interface itself, its
    /// CommonSchema child, and every ancestor up to and including the
    /// owning Service.
    pub fn bump_for_operation_change(
        &mut self,
        ctx: &ModelContext<'_>,
        interface: CapabilityId,
    ) -> Result<()> {
        self.bump_minor(ctx, interface)?;

        let schema = self
            .children(interface)
            .iter()
            .copied()
            .find(|&c| self.node(c).kind == CapabilityKind::CommonSchema);
        if let Some(schema) = schema {
            self.bump_minor(ctx, schema)?;
        }

        let mut current = self.node(interface).parent;
        while let Some(ancestor) = current {
            self.bump_minor(ctx, ancestor)?;
            if self.node(ancestor).kind == CapabilityKind::Service {
                break;
            }
            current = self.node(ancestor).parent;
        }
        Ok(())
    }
}
