//! Locked mutation flows.
//!
//! These are the entry points the surrounding event layer calls. Each flow
//! acquires the advisory lock on its target before any capability or ticket
//! mutation and releases it on every exit path via [`LockGuard`]. A lock
//! that cannot be acquired aborts the flow with nothing changed; a failure
//! mid-flow still releases the lock but may leave the repository partially
//! updated, which is surfaced to the caller rather than rolled back.

use crate::context::ModelContext;
use crate::error::{Error, Result};
use crate::lineage::TicketLineage;
use crate::models::{CapabilityId, ReleaseTicket, ServiceTicket, TicketKey};
use crate::registry::Interface;
use crate::repo::{ElementId, LockGuard};
use crate::tree::CapabilityTree;
use crate::versioning::{bump_rule, BumpRule, Change, Version};

/// Result of a committed service.
#[derive(Debug)]
pub struct CommitOutcome {
    pub version: Version,
    pub service_ticket: ServiceTicket,
    pub release: ReleaseTicket,
}

/// Commit a service: bump its version and record the change in the ticket
/// lineage, all under the service element's lock.
///
/// `requested_release` of 0 attaches to the current release, or opens
/// release version 1 if this is the first.
pub fn commit(
    ctx: &ModelContext<'_>,
    tree: &mut CapabilityTree,
    service: CapabilityId,
    ticket: &TicketKey,
    requested_release: u32,
) -> Result<CommitOutcome> {
    let element = service_element(tree, service)?;
    let _lock = LockGuard::acquire(ctx.repo, element)?;

    let version = if bump_rule(Change::Commit) == BumpRule::Always {
        tree.bump_minor(ctx, service)?
    } else {
        tree.node(service).version
    };

    let lineage = TicketLineage::new(*ctx);
    let service_ticket = lineage.open_service_ticket(ticket.clone(), element)?;
    let release = lineage.open_release_ticket(&ticket.id, requested_release, &service_ticket)?;

    refresh_diagram(ctx, tree, service);
    Ok(CommitOutcome {
        version,
        service_ticket,
        release,
    })
}

/// Result of adding operations through a bound interface.
#[derive(Debug)]
pub struct AddOperationsOutcome {
    pub operations: Vec<CapabilityId>,
    /// Opened when a ticket key was supplied and configuration management
    /// is on; `Disabled` otherwise.
    pub service_ticket: ServiceTicket,
}

/// Add named operations to an interface under its element's lock. The
/// release association is left to the next commit; here only the service
/// ticket is opened so the change request is on record.
pub fn add_operations(
    ctx: &ModelContext<'_>,
    tree: &mut CapabilityTree,
    interface: &Interface,
    names: &[&str],
    ticket: Option<&TicketKey>,
) -> Result<AddOperationsOutcome> {
    // Resolve the facade first: an unbound interface must fail before the
    // lock is taken or anything is written.
    let node = interface.node()?;
    let element = tree.node(node).element.ok_or_else(|| {
        Error::InvalidOperation("interface has no repository element".to_string())
    })?;
    let _lock = LockGuard::acquire(ctx.repo, element)?;

    let bump = bump_rule(Change::AddOperation) == BumpRule::Always;
    let operations = interface.add_operations(ctx, tree, names, bump)?;

    let mut service_ticket = ServiceTicket::Disabled;
    if let Some(key) = ticket {
        let service = tree
            .service_of(node)
            .and_then(|s| tree.node(s).element);
        if let Some(service) = service {
            service_ticket = TicketLineage::new(*ctx).open_service_ticket(key.clone(), service)?;
        }
    }

    refresh_diagram(ctx, tree, node);
    Ok(AddOperationsOutcome {
        operations,
        service_ticket,
    })
}

/// Rebuild the in-memory view from the repository subtree under `root`.
/// In-memory trees are views that expire at the end of a locked operation;
/// this is how a caller gets a fresh one.
pub fn synchronize(
    ctx: &ModelContext<'_>,
    root: ElementId,
) -> Result<(CapabilityTree, CapabilityId)> {
    let _lock = LockGuard::acquire(ctx.repo, root)?;
    CapabilityTree::load(ctx, root)
}

/// One service in a bulk deploy.
#[derive(Debug, Clone)]
pub struct DeployItem {
    pub service: CapabilityId,
    pub ticket: TicketKey,
}

#[derive(Debug)]
pub struct DeployFailure {
    pub service: String,
    pub error: Error,
}

/// Outcome of a bulk deploy: what committed, and what failed per item.
#[derive(Debug, Default)]
pub struct DeployReport {
    pub committed: Vec<CommitOutcome>,
    pub failures: Vec<DeployFailure>,
}

impl DeployReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deploy a batch of services, committing each against the same release.
/// Items are processed one at a time; a failing item is recorded and the
/// batch continues with the next. No per-item retry.
pub fn deploy(
    ctx: &ModelContext<'_>,
    tree: &mut CapabilityTree,
    items: &[DeployItem],
    requested_release: u32,
) -> DeployReport {
    let mut report = DeployReport::default();
    for (index, item) in items.iter().enumerate() {
        let name = tree.node(item.service).name.clone();
        tracing::info!("deploying {}/{}: {}", index + 1, items.len(), name);
        match commit(ctx, tree, item.service, &item.ticket, requested_release) {
            Ok(outcome) => report.committed.push(outcome),
            Err(error) => {
                tracing::warn!("deploy of {} failed: {}", name, error);
                report.failures.push(DeployFailure {
                    service: name,
                    error,
                });
            }
        }
    }
    report
}

fn service_element(tree: &CapabilityTree, service: CapabilityId) -> Result<ElementId> {
    tree.node(service).element.ok_or_else(|| {
        Error::InvalidOperation(format!(
            "capability {} has no repository element",
            tree.node(service).name
        ))
    })
}

/// Best-effort visual sync of the subtree under `root`. Diagram trouble
/// never fails the operation that triggered it.
fn refresh_diagram(ctx: &ModelContext<'_>, tree: &CapabilityTree, root: CapabilityId) {
    let Some(package) = tree.node(root).package else {
        return;
    };
    let mut elements = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(element) = tree.node(id).element {
            elements.push(element);
        }
        stack.extend(tree.children(id).iter().copied());
    }
    let mut links = Vec::new();
    for element in &elements {
        links.extend(ctx.repo.associations(*element).into_iter().map(|a| a.id));
    }

    let refreshed = ctx
        .repo
        .diagram_add_classes(package, &elements)
        .and_then(|_| ctx.repo.diagram_add_associations(package, &links))
        .and_then(|_| ctx.repo.redraw(package));
    if let Err(e) = refreshed {
        tracing::warn!("diagram refresh failed: {}", e);
    }
}
