//! Ticket lineage: version selection, deduplication, association pairs, and
//! timeline chaining.
//!
//! All durable ticket state lives in the repository's ticket package; the
//! ticket values handed back to callers are views over it. Opening a ticket
//! whose qualified id already names an element always loads that element —
//! the qualified id is the deduplication key, and re-running an open is a
//! no-op rather than a duplicate.
//!
//! When configuration management is disabled every open returns the inert
//! `Disabled` ticket variant and the repository is never touched.

use chrono::Utc;

use crate::config::keys;
use crate::context::ModelContext;
use crate::error::{Error, Result};
use crate::models::{
    ReleaseTicket, ServiceTicket, TicketKey, TrackedReleaseTicket, TrackedServiceTicket,
};
use crate::repo::{association_between, AssociationEnd, AssociationKind, ElementId, PackageId};
use crate::versioning;

/// One release element found during a version search.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseMatch {
    pub element: ElementId,
    pub version: u32,
}

/// Manager for service and release ticket lineage.
pub struct TicketLineage<'a> {
    ctx: ModelContext<'a>,
}

impl<'a> TicketLineage<'a> {
    pub fn new(ctx: ModelContext<'a>) -> Self {
        Self { ctx }
    }

    fn ticket_package(&self) -> Result<PackageId> {
        let path = self.ctx.settings.ticket_package()?;
        self.ctx.repo.find_package(path).ok_or_else(|| {
            Error::InvalidOperation(format!("ticket package {:?} not found", path))
        })
    }

    // ============================================================
    // Service tickets
    // ============================================================

    /// Open the service ticket for `key`, tracking `service_element`. Loads
    /// the existing element when the qualified id is already taken,
    /// otherwise creates one.
    pub fn open_service_ticket(
        &self,
        key: TicketKey,
        service_element: ElementId,
    ) -> Result<ServiceTicket> {
        if !self.ctx.settings.cm_enabled() {
            return Ok(ServiceTicket::Disabled);
        }
        let package = self.ticket_package()?;
        let stereotype = self
            .ctx
            .settings
            .property(keys::SERVICE_TICKET_STEREOTYPE)?;
        let qualified = key.qualified_id();

        let existing = self
            .ctx
            .repo
            .find_classes(package, Some(&qualified), stereotype, true);
        if let Some(&element) = existing.first() {
            return Ok(ServiceTicket::Tracked(TrackedServiceTicket {
                key,
                element,
                service_element,
                existing: true,
            }));
        }

        let element = self.ctx.repo.create_class(package, &qualified, stereotype)?;
        let now = Utc::now().to_rfc3339();
        self.set_tag(element, keys::CREATED_TAG, &now)?;
        self.set_tag(element, keys::MODIFIED_TAG, &now)?;
        self.set_tag(element, keys::TRACKED_SERVICE_TAG, &service_element.to_string())?;
        Ok(ServiceTicket::Tracked(TrackedServiceTicket {
            key,
            element,
            service_element,
            existing: false,
        }))
    }

    /// The most recently released version a service ticket has recorded;
    /// 0 when nothing was released yet or the ticket is inert.
    pub fn released_version(&self, service: &ServiceTicket) -> Result<u32> {
        let ServiceTicket::Tracked(tracked) = service else {
            return Ok(0);
        };
        let tag_name = self.ctx.settings.property(keys::RELEASED_VERSION_TAG)?;
        match self.ctx.repo.tag(tracked.element, tag_name) {
            Some(tag) => tag.parse().map_err(|_| {
                Error::InvalidOperation(format!(
                    "service ticket {} has non-numeric released version {:?}",
                    tracked.key.qualified_id(),
                    tag
                ))
            }),
            None => Ok(0),
        }
    }

    // ============================================================
    // Release tickets
    // ============================================================

    /// Open the release ticket for `id` at `requested` version on behalf of
    /// `service`.
    ///
    /// Requested version 0 means "the current maximum, or a fresh version 1
    /// if none exists". An existing element for the resolved version is
    /// attached to, never duplicated: at most a missing service association
    /// is added, and the element's modification timestamp is refreshed. A
    /// newly created element is chained to the previous highest version as
    /// its timeline parent.
    pub fn open_release_ticket(
        &self,
        id: &str,
        requested: u32,
        service: &ServiceTicket,
    ) -> Result<ReleaseTicket> {
        if !self.ctx.settings.cm_enabled() {
            return Ok(ReleaseTicket::Disabled);
        }
        let ServiceTicket::Tracked(service) = service else {
            return Ok(ReleaseTicket::Disabled);
        };

        let prefix = self.ctx.settings.release_prefix()?.to_string();
        let key = TicketKey::new(prefix, id);
        let matches = self.releases(id)?;
        let latest = matches.iter().copied().max_by_key(|m| m.version);

        let ticket = if requested == 0 {
            match latest {
                Some(m) => self.attach_release(&key, m, service)?,
                None => self.create_release(&key, 1, None, service)?,
            }
        } else if let Some(m) = matches.iter().copied().find(|m| m.version == requested) {
            self.attach_release(&key, m, service)?
        } else {
            self.create_release(&key, requested, latest, service)?
        };
        Ok(ReleaseTicket::Tracked(ticket))
    }

    /// All release elements for `id`, by scanning the ticket package for the
    /// release stereotype under the `prefix/id` name filter. Elements whose
    /// version tag does not parse are skipped with a warning; a partially
    /// tagged repository should not block the search.
    pub fn releases(&self, id: &str) -> Result<Vec<ReleaseMatch>> {
        let package = self.ticket_package()?;
        let prefix = self.ctx.settings.release_prefix()?;
        let stereotype = self.ctx.settings.property(keys::RELEASE_STEREOTYPE)?;
        let version_tag = self.ctx.settings.property(keys::RELEASE_VERSION_TAG)?;
        let filter = versioning::format_qualified_id(prefix, id, None);
        // The filter is a prefix match; require the version separator so
        // "CSTI-1" does not pick up "CSTI-10" releases.
        let boundary = format!("{}.", filter);

        let mut found = Vec::new();
        for element in self
            .ctx
            .repo
            .find_classes(package, Some(&filter), stereotype, false)
        {
            let name = self.ctx.repo.class_name(element)?;
            if !name.starts_with(&boundary) {
                continue;
            }
            match self.ctx.repo.tag(element, version_tag) {
                Some(tag) => match tag.parse::<u32>() {
                    Ok(version) => found.push(ReleaseMatch { element, version }),
                    Err(_) => {
                        tracing::warn!(
                            "release ticket {} has unparsable version tag {:?}; skipping",
                            name,
                            tag
                        );
                    }
                },
                None => {
                    tracing::warn!("release ticket {} has no version tag; skipping", name);
                }
            }
        }
        Ok(found)
    }

    /// The release element with the numerically highest version for `id`.
    pub fn latest_release(&self, id: &str) -> Result<Option<ReleaseMatch>> {
        Ok(self
            .releases(id)?
            .into_iter()
            .max_by_key(|m| m.version))
    }

    /// Reconstruct a release ticket from a bare element handle, validating
    /// its shape. The version tag is required here: an element that claims
    /// the release stereotype but cannot state its version is a malformed
    /// repository.
    pub fn load_release(&self, element: ElementId) -> Result<ReleaseTicket> {
        if !self.ctx.settings.cm_enabled() {
            return Ok(ReleaseTicket::Disabled);
        }
        let stereotype = self.ctx.settings.property(keys::RELEASE_STEREOTYPE)?;
        let name = self.ctx.repo.class_name(element)?;
        if !self.ctx.repo.has_stereotype(element, stereotype) {
            return Err(Error::InvalidArgument(format!(
                "element {} is not a release ticket",
                name
            )));
        }
        let version_tag = self.ctx.settings.property(keys::RELEASE_VERSION_TAG)?;
        let version: u32 = match self.ctx.repo.tag(element, version_tag) {
            Some(tag) => tag.parse().map_err(|_| {
                Error::InvalidOperation(format!(
                    "release ticket {} has non-numeric version tag {:?}",
                    name, tag
                ))
            })?,
            None => {
                return Err(Error::InvalidOperation(format!(
                    "release ticket {} has no version tag",
                    name
                )))
            }
        };

        let prefix = self.ctx.settings.release_prefix()?;
        let id = name
            .strip_prefix(&format!("{}/", prefix))
            .and_then(|rest| rest.rsplit_once('.'))
            .map(|(id, _)| id.to_string())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("release ticket name {:?} is malformed", name))
            })?;

        Ok(ReleaseTicket::Tracked(TrackedReleaseTicket {
            key: TicketKey::new(prefix, id),
            release_version: version,
            element,
            service_ticket: None,
            existing: true,
        }))
    }

    // ============================================================
    // Associations
    // ============================================================

    /// Whether `release` is already associated with `service`. Candidate
    /// tickets are matched by qualified id first; among same-named tickets,
    /// the one resolving to the same underlying Service element decides.
    /// Inert tickets are never associated.
    pub fn has_service_ticket(
        &self,
        release: &ReleaseTicket,
        service: &ServiceTicket,
    ) -> Result<bool> {
        let (ReleaseTicket::Tracked(release), ServiceTicket::Tracked(service)) =
            (release, service)
        else {
            return Ok(false);
        };
        self.is_linked(release.element, service)
    }

    fn is_linked(&self, release_element: ElementId, service: &TrackedServiceTicket) -> Result<bool> {
        let stereotype = self
            .ctx
            .settings
            .property(keys::SERVICE_TICKET_STEREOTYPE)?;
        let tracked_tag = self.ctx.settings.property(keys::TRACKED_SERVICE_TAG)?;
        let qualified = service.key.qualified_id();
        let service_id = service.service_element.to_string();

        for link in self.ctx.repo.associations(release_element) {
            let candidate = link.destination;
            if !self.ctx.repo.has_stereotype(candidate, stereotype) {
                continue;
            }
            if self.ctx.repo.class_name(candidate)? != qualified {
                continue;
            }
            if candidate == service.element {
                return Ok(true);
            }
            if self.ctx.repo.tag(candidate, tracked_tag).as_deref() == Some(service_id.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Timeline parent: the release with the immediately preceding version.
    pub fn predecessor(&self, release: &ReleaseTicket) -> Result<Option<ElementId>> {
        self.timeline_neighbor(release, keys::PREDECESSOR_ROLE)
    }

    /// Timeline child: the release that superseded this one, if any.
    pub fn successor(&self, release: &ReleaseTicket) -> Result<Option<ElementId>> {
        self.timeline_neighbor(release, keys::SUCCESSOR_ROLE)
    }

    fn timeline_neighbor(
        &self,
        release: &ReleaseTicket,
        role_key: &str,
    ) -> Result<Option<ElementId>> {
        let ReleaseTicket::Tracked(release) = release else {
            return Ok(None);
        };
        let role = self.ctx.settings.property(role_key)?;
        Ok(self
            .ctx
            .repo
            .associations(release.element)
            .into_iter()
            .find(|l| l.destination_role.as_deref() == Some(role))
            .map(|l| l.destination))
    }

    /// Remove the association pair between two ticket elements. Both
    /// directed links go together; removing one without the other would
    /// leave a dangling half-edge.
    pub fn unlink(&self, a: ElementId, b: ElementId) -> Result<()> {
        if let Some(forward) = association_between(self.ctx.repo, a, b) {
            self.ctx.repo.remove_association(forward.id)?;
        }
        if let Some(backward) = association_between(self.ctx.repo, b, a) {
            self.ctx.repo.remove_association(backward.id)?;
        }
        Ok(())
    }

    /// Create both directed links of an association pair, with mirrored
    /// roles and the pair's stereotype on each end.
    fn link_pair(
        &self,
        a: ElementId,
        a_role: &str,
        b: ElementId,
        b_role: &str,
        stereotype: &str,
    ) -> Result<()> {
        let forward = self
            .ctx
            .repo
            .create_association(a, b, AssociationKind::Reference)?;
        self.ctx.repo.set_role(forward, AssociationEnd::Source, a_role)?;
        self.ctx
            .repo
            .set_role(forward, AssociationEnd::Destination, b_role)?;
        self.ctx
            .repo
            .add_stereotype(forward, AssociationEnd::Destination, stereotype)?;

        let backward = self
            .ctx
            .repo
            .create_association(b, a, AssociationKind::Reference)?;
        self.ctx.repo.set_role(backward, AssociationEnd::Source, b_role)?;
        self.ctx
            .repo
            .set_role(backward, AssociationEnd::Destination, a_role)?;
        self.ctx
            .repo
            .add_stereotype(backward, AssociationEnd::Destination, stereotype)?;
        Ok(())
    }

    // ============================================================
    // Open paths
    // ============================================================

    fn attach_release(
        &self,
        key: &TicketKey,
        m: ReleaseMatch,
        service: &TrackedServiceTicket,
    ) -> Result<TrackedReleaseTicket> {
        if !self.is_linked(m.element, service)? {
            self.link_pair(
                m.element,
                self.ctx.settings.property(keys::RELEASE_ROLE)?,
                service.element,
                self.ctx.settings.property(keys::TICKET_ROLE)?,
                self.ctx.settings.property(keys::TICKET_LINK_STEREOTYPE)?,
            )?;
        }
        // Every attach refreshes the modification timestamp, association
        // added or not.
        self.touch(m.element)?;
        self.record_released_version(service, m.version)?;
        Ok(TrackedReleaseTicket {
            key: key.clone(),
            release_version: m.version,
            element: m.element,
            service_ticket: Some(service.element),
            existing: true,
        })
    }

    fn create_release(
        &self,
        key: &TicketKey,
        version: u32,
        timeline_parent: Option<ReleaseMatch>,
        service: &TrackedServiceTicket,
    ) -> Result<TrackedReleaseTicket> {
        let package = self.ticket_package()?;
        let stereotype = self.ctx.settings.property(keys::RELEASE_STEREOTYPE)?;
        let name = versioning::format_release_id(&key.project, &key.id, version);
        let element = self.ctx.repo.create_class(package, &name, stereotype)?;

        let now = Utc::now().to_rfc3339();
        self.set_tag(element, keys::RELEASE_VERSION_TAG, &version.to_string())?;
        self.set_tag(element, keys::CREATED_TAG, &now)?;
        self.set_tag(element, keys::MODIFIED_TAG, &now)?;

        if let Some(parent) = timeline_parent {
            self.link_pair(
                element,
                self.ctx.settings.property(keys::SUCCESSOR_ROLE)?,
                parent.element,
                self.ctx.settings.property(keys::PREDECESSOR_ROLE)?,
                self.ctx.settings.property(keys::TIMELINE_STEREOTYPE)?,
            )?;
        }
        self.link_pair(
            element,
            self.ctx.settings.property(keys::RELEASE_ROLE)?,
            service.element,
            self.ctx.settings.property(keys::TICKET_ROLE)?,
            self.ctx.settings.property(keys::TICKET_LINK_STEREOTYPE)?,
        )?;
        self.record_released_version(service, version)?;

        Ok(TrackedReleaseTicket {
            key: key.clone(),
            release_version: version,
            element,
            service_ticket: Some(service.element),
            existing: false,
        })
    }

    fn record_released_version(
        &self,
        service: &TrackedServiceTicket,
        version: u32,
    ) -> Result<()> {
        self.set_tag(
            service.element,
            keys::RELEASED_VERSION_TAG,
            &version.to_string(),
        )?;
        self.touch(service.element)
    }

    fn touch(&self, element: ElementId) -> Result<()> {
        self.set_tag(element, keys::MODIFIED_TAG, &Utc::now().to_rfc3339())
    }

    fn set_tag(&self, element: ElementId, key: &str, value: &str) -> Result<()> {
        let tag_name = self.ctx.settings.property(key)?;
        self.ctx.repo.set_tag(element, tag_name, value, true)
    }
}
