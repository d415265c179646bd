//! Interface facade with lazy implementation binding.
//!
//! [`Interface`] is the public surface of an interface capability. It holds
//! its concrete [`InterfaceImpl`] behind an option: callers construct the
//! facade first and bind the implementation once it exists, which keeps
//! partially-constructed implementation state off the public surface. Every
//! operation checks the binding and delegates, failing with
//! `MissingImplementation` when nothing is bound. A binding is fixed for the
//! facade's lifetime; rebinding is an error.

use crate::context::ModelContext;
use crate::error::{Error, Result};
use crate::models::{CapabilityId, CapabilityKind};
use crate::tree::CapabilityTree;

/// Public facade over an interface capability.
#[derive(Debug, Default)]
pub struct Interface {
    implementation: Option<InterfaceImpl>,
}

impl Interface {
    /// A facade with nothing bound. Every operation fails until
    /// [`bind`](Self::bind) is called.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// A facade bound on construction.
    pub fn bound(implementation: InterfaceImpl) -> Self {
        Self {
            implementation: Some(implementation),
        }
    }

    /// Bind the implementation, exactly once.
    pub fn bind(&mut self, implementation: InterfaceImpl) -> Result<()> {
        if self.implementation.is_some() {
            return Err(Error::InvalidOperation(
                "interface already has a bound implementation".to_string(),
            ));
        }
        self.implementation = Some(implementation);
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.implementation.is_some()
    }

    fn implementation(&self) -> Result<&InterfaceImpl> {
        self.implementation
            .as_ref()
            .ok_or(Error::MissingImplementation {
                implementation: "InterfaceImpl",
            })
    }

    /// Arena id of the interface capability behind this facade.
    pub fn node(&self) -> Result<CapabilityId> {
        Ok(self.implementation()?.node)
    }

    pub fn add_operations(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        names: &[&str],
        bump_minor: bool,
    ) -> Result<Vec<CapabilityId>> {
        self.implementation()?
            .add_operations(ctx, tree, names, bump_minor)
    }

    pub fn associate_operations(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        operations: &[CapabilityId],
        bump_minor: bool,
    ) -> Result<()> {
        self.implementation()?
            .associate_operations(ctx, tree, operations, bump_minor)
    }

    pub fn delete_operation(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        operation: CapabilityId,
        bump_minor: bool,
        delete_resources: bool,
    ) -> Result<()> {
        self.implementation()?
            .delete_operation(ctx, tree, operation, bump_minor, delete_resources)
    }

    pub fn rename_operation(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        operation: CapabilityId,
        old_name: &str,
        new_name: &str,
        bump_minor: bool,
    ) -> Result<()> {
        self.implementation()?
            .rename_operation(ctx, tree, operation, old_name, new_name, bump_minor)
    }

    pub fn operations(&self, tree: &CapabilityTree) -> Result<Vec<CapabilityId>> {
        Ok(self.implementation()?.operations(tree))
    }
}

/// Concrete implementation backing an [`Interface`] facade.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceImpl {
    node: CapabilityId,
}

impl InterfaceImpl {
    /// Wrap an already-loaded interface node.
    pub fn new(node: CapabilityId) -> Self {
        Self { node }
    }

    /// Create a fresh interface capability with its CommonSchema child,
    /// attached under `service`.
    pub fn provision(
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        service: CapabilityId,
        name: &str,
    ) -> Result<Self> {
        let package = tree.node(service).package.ok_or_else(|| {
            Error::InvalidOperation("service has no repository package".to_string())
        })?;
        let interface = tree.create(ctx, package, CapabilityKind::Interface, name)?;
        let schema = tree.create(ctx, package, CapabilityKind::CommonSchema, name)?;
        tree.attach(ctx, schema, interface)?;
        tree.attach(ctx, interface, service)?;
        Ok(Self { node: interface })
    }

    /// Append named operations. Name uniqueness inside the interface is the
    /// caller's guarantee and is not re-validated here. A minor bump, when
    /// requested, covers the interface, its schema, and the owning Service.
    pub fn add_operations(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        names: &[&str],
        bump_minor: bool,
    ) -> Result<Vec<CapabilityId>> {
        let package = tree.node(self.node).package.ok_or_else(|| {
            Error::InvalidOperation("interface has no repository package".to_string())
        })?;
        let mut created = Vec::with_capacity(names.len());
        for name in names {
            let operation = tree.create(ctx, package, CapabilityKind::Operation, name)?;
            tree.attach(ctx, operation, self.node)?;
            created.push(operation);
        }
        if bump_minor {
            tree.bump_for_operation_change(ctx, self.node)?;
        }
        Ok(created)
    }

    /// Link existing operation nodes as children, creating the structural
    /// link for each. Earlier uniqueness decisions are not re-validated.
    pub fn associate_operations(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        operations: &[CapabilityId],
        bump_minor: bool,
    ) -> Result<()> {
        for &operation in operations {
            tree.attach(ctx, operation, self.node)?;
        }
        if bump_minor {
            tree.bump_for_operation_change(ctx, self.node)?;
        }
        Ok(())
    }

    /// Detach an operation. With `delete_resources` the operation's
    /// repository element and everything it owns are removed; otherwise only
    /// the structural link goes. Service-level annotations and version are
    /// left to the caller, which may be batching several deletions into one
    /// update.
    pub fn delete_operation(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        operation: CapabilityId,
        bump_minor: bool,
        delete_resources: bool,
    ) -> Result<()> {
        self.expect_child(tree, operation)?;
        tree.detach(ctx, operation)?;
        if delete_resources {
            if let Some(element) = tree.node(operation).element {
                ctx.repo.delete_class(element)?;
            }
        }
        if bump_minor {
            tree.bump_minor(ctx, self.node)?;
        }
        Ok(())
    }

    /// Rename an operation in place. Same caller-updates-Service rule as
    /// [`delete_operation`](Self::delete_operation).
    pub fn rename_operation(
        &self,
        ctx: &ModelContext<'_>,
        tree: &mut CapabilityTree,
        operation: CapabilityId,
        old_name: &str,
        new_name: &str,
        bump_minor: bool,
    ) -> Result<()> {
        self.expect_child(tree, operation)?;
        if tree.node(operation).name != old_name {
            return Err(Error::InvalidArgument(format!(
                "operation is named {:?}, not {:?}",
                tree.node(operation).name,
                old_name
            )));
        }
        tree.rename(ctx, operation, new_name)?;
        if bump_minor {
            tree.bump_minor(ctx, self.node)?;
        }
        Ok(())
    }

    /// Current operation children, in registration order.
    pub fn operations(&self, tree: &CapabilityTree) -> Vec<CapabilityId> {
        tree.children(self.node)
            .iter()
            .copied()
            .filter(|&c| tree.node(c).kind == CapabilityKind::Operation)
            .collect()
    }

    fn expect_child(&self, tree: &CapabilityTree, operation: CapabilityId) -> Result<()> {
        if tree.node(operation).parent != Some(self.node) {
            return Err(Error::InvalidArgument(format!(
                "operation {:?} does not belong to interface {:?}",
                tree.node(operation).name,
                tree.node(self.node).name
            )));
        }
        Ok(())
    }
}
