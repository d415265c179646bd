use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::versioning;

/// The external identity of a tracked change request: the owning project
/// plus the change-request key issued by the project tracker.
///
/// The derived qualified id (`project/id`, optionally `.VV`) is the
/// deduplication key inside the ticket package: opening a ticket whose
/// qualified id already names an element loads that element instead of
/// creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketKey {
    pub project: String,
    pub id: String,
}

impl TicketKey {
    pub fn new(project: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            id: id.into(),
        }
    }

    pub fn qualified_id(&self) -> String {
        versioning::format_qualified_id(&self.project, &self.id, None)
    }

    pub fn qualified_id_at(&self, version: u32) -> String {
        versioning::format_qualified_id(&self.project, &self.id, Some(version))
    }
}

/// Tracks one service's change lineage.
///
/// When configuration management is disabled every constructor returns the
/// `Disabled` variant: an inert ticket whose operations are all no-ops and
/// which never touches the repository. Callers can treat both variants
/// uniformly instead of branching on an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceTicket {
    Disabled,
    Tracked(TrackedServiceTicket),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedServiceTicket {
    pub key: TicketKey,
    /// Repository element backing this ticket.
    pub element: Uuid,
    /// The Service element whose lineage this ticket records.
    pub service_element: Uuid,
    /// Whether the element was loaded rather than created by this open.
    pub existing: bool,
}

impl ServiceTicket {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    pub fn element(&self) -> Option<Uuid> {
        match self {
            Self::Disabled => None,
            Self::Tracked(t) => Some(t.element),
        }
    }

    pub fn qualified_id(&self) -> Option<String> {
        match self {
            Self::Disabled => None,
            Self::Tracked(t) => Some(t.key.qualified_id()),
        }
    }
}

/// Tracks one release of a ticket id, named `prefix/id.VV`.
///
/// Several `ReleaseTicket` values may point at the same repository element:
/// one release bundles many services, and each service's commit opens the
/// release for itself. The open path detects the existing element and only
/// adds the missing service association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReleaseTicket {
    Disabled,
    Tracked(TrackedReleaseTicket),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedReleaseTicket {
    pub key: TicketKey,
    /// Release version, 1-based and monotonically increasing per key.
    pub release_version: u32,
    pub element: Uuid,
    /// Element of the service ticket this instance was opened for, when it
    /// was opened through one. Loaded timeline neighbors carry `None`.
    pub service_ticket: Option<Uuid>,
    pub existing: bool,
}

impl ReleaseTicket {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// Release version, or 0 for an inert ticket.
    pub fn release_version(&self) -> u32 {
        match self {
            Self::Disabled => 0,
            Self::Tracked(t) => t.release_version,
        }
    }

    pub fn element(&self) -> Option<Uuid> {
        match self {
            Self::Disabled => None,
            Self::Tracked(t) => Some(t.element),
        }
    }

    /// Whether the open attached to an element that already existed.
    pub fn is_existing(&self) -> bool {
        match self {
            Self::Disabled => false,
            Self::Tracked(t) => t.existing,
        }
    }

    pub fn release_id(&self) -> Option<String> {
        match self {
            Self::Disabled => None,
            Self::Tracked(t) => Some(versioning::format_release_id(
                &t.key.project,
                &t.key.id,
                t.release_version,
            )),
        }
    }
}
