use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::versioning::Version;

/// Index of a capability node inside its owning [`CapabilityTree`] arena.
///
/// Ids are only minted by the tree itself and stay valid for the lifetime of
/// the tree (nodes are detached, never removed from the arena).
///
/// [`CapabilityTree`]: crate::tree::CapabilityTree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityId(pub usize);

/// A named node in the versioned capability tree.
///
/// Capabilities form the hierarchy Service → Interface → CommonSchema /
/// Operation → Message. A node is either *fresh* (its repository element was
/// just created and the caller has not linked it to a parent yet) or
/// *loaded* (reconstructed from an existing repository subtree). In both
/// cases the node owns its version number; the repository element carries
/// the same value in a version tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub kind: CapabilityKind,
    pub version: Version,
    /// Handle of the backing repository element. `None` only for nodes that
    /// exist purely in memory.
    pub element: Option<Uuid>,
    /// Package the element lives in; new children are created alongside it.
    pub package: Option<Uuid>,
    pub parent: Option<CapabilityId>,
    /// Children in registration order.
    pub children: Vec<CapabilityId>,
}

/// The place of a capability in the hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Service,
    Interface,
    CommonSchema,
    Operation,
    Message,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 5] = [
        Self::Service,
        Self::Interface,
        Self::CommonSchema,
        Self::Operation,
        Self::Message,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Interface => "interface",
            Self::CommonSchema => "common_schema",
            Self::Operation => "operation",
            Self::Message => "message",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "service" => Some(Self::Service),
            "interface" => Some(Self::Interface),
            "common_schema" => Some(Self::CommonSchema),
            "operation" => Some(Self::Operation),
            "message" => Some(Self::Message),
            _ => None,
        }
    }
}
