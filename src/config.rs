//! Configuration surface: a flat string-keyed property lookup.
//!
//! Every tag name, stereotype name, association role, and package path the
//! engine reads or writes in the external repository is configurable here,
//! so the engine carries no hard-coded knowledge of the host model's naming
//! conventions. Defaults are shipped for all keys; deployments override the
//! ones their repository uses differently.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::CapabilityKind;

/// Well-known property keys.
pub mod keys {
    /// Master switch for configuration management. When `"false"`, all
    /// ticket constructors degrade to inert tickets instead of touching
    /// the repository.
    pub const CM_ENABLED: &str = "cm.enabled";
    /// Path of the package that stores all ticket elements.
    pub const TICKET_PACKAGE: &str = "cm.ticket_package";

    pub const RELEASE_PREFIX: &str = "release.prefix";
    pub const RELEASE_STEREOTYPE: &str = "release.stereotype";
    pub const RELEASE_ROLE: &str = "release.role";

    pub const SERVICE_TICKET_STEREOTYPE: &str = "ticket.stereotype";
    pub const TICKET_ROLE: &str = "ticket.role";
    pub const TICKET_LINK_STEREOTYPE: &str = "ticket.link_stereotype";

    pub const TIMELINE_STEREOTYPE: &str = "timeline.stereotype";
    pub const PREDECESSOR_ROLE: &str = "timeline.predecessor_role";
    pub const SUCCESSOR_ROLE: &str = "timeline.successor_role";

    pub const VERSION_TAG: &str = "tag.version";
    pub const RELEASE_VERSION_TAG: &str = "tag.release_version";
    pub const RELEASED_VERSION_TAG: &str = "tag.released_version";
    pub const CREATED_TAG: &str = "tag.created";
    pub const MODIFIED_TAG: &str = "tag.modified";
    pub const TRACKED_SERVICE_TAG: &str = "tag.tracked_service";

    pub const SERVICE_STEREOTYPE: &str = "stereotype.service";
    pub const INTERFACE_STEREOTYPE: &str = "stereotype.interface";
    pub const SCHEMA_STEREOTYPE: &str = "stereotype.schema";
    pub const OPERATION_STEREOTYPE: &str = "stereotype.operation";
    pub const MESSAGE_STEREOTYPE: &str = "stereotype.message";
}

const DEFAULTS: &[(&str, &str)] = &[
    (keys::CM_ENABLED, "true"),
    (keys::TICKET_PACKAGE, "Configuration Management/Tickets"),
    (keys::RELEASE_PREFIX, "release"),
    (keys::RELEASE_STEREOTYPE, "ReleaseTicket"),
    (keys::RELEASE_ROLE, "release"),
    (keys::SERVICE_TICKET_STEREOTYPE, "ServiceTicket"),
    (keys::TICKET_ROLE, "ticket"),
    (keys::TICKET_LINK_STEREOTYPE, "TicketLink"),
    (keys::TIMELINE_STEREOTYPE, "Timeline"),
    (keys::PREDECESSOR_ROLE, "predecessor"),
    (keys::SUCCESSOR_ROLE, "successor"),
    (keys::VERSION_TAG, "version"),
    (keys::RELEASE_VERSION_TAG, "releaseVersion"),
    (keys::RELEASED_VERSION_TAG, "releasedVersion"),
    (keys::CREATED_TAG, "created"),
    (keys::MODIFIED_TAG, "modified"),
    (keys::TRACKED_SERVICE_TAG, "trackedService"),
    (keys::SERVICE_STEREOTYPE, "Service"),
    (keys::INTERFACE_STEREOTYPE, "ServiceInterface"),
    (keys::SCHEMA_STEREOTYPE, "CommonSchema"),
    (keys::OPERATION_STEREOTYPE, "Operation"),
    (keys::MESSAGE_STEREOTYPE, "Message"),
];

/// Flat property store with shipped defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    properties: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        let properties = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { properties }
    }
}

impl Settings {
    /// Defaults overridden by a JSON object of `{"key": "value"}` pairs.
    pub fn from_json(json: &str) -> Result<Self> {
        let overrides: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("settings JSON: {}", e)))?;
        let mut settings = Self::default();
        settings.properties.extend(overrides);
        Ok(settings)
    }

    /// Look up a property. Missing keys are a configuration defect, so this
    /// fails rather than substituting a silent default.
    pub fn property(&self, key: &str) -> Result<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidOperation(format!("configuration property {} not set", key)))
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    /// Builder-style override, for test setup and call sites that tweak a
    /// single key.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Whether configuration management is active. Anything other than a
    /// literal `"true"` counts as disabled.
    pub fn cm_enabled(&self) -> bool {
        self.properties
            .get(keys::CM_ENABLED)
            .is_some_and(|v| v == "true")
    }

    pub fn ticket_package(&self) -> Result<&str> {
        self.property(keys::TICKET_PACKAGE)
    }

    pub fn release_prefix(&self) -> Result<&str> {
        self.property(keys::RELEASE_PREFIX)
    }

    /// The stereotype that classifies a capability element of the given kind.
    pub fn capability_stereotype(&self, kind: CapabilityKind) -> Result<&str> {
        let key = match kind {
            CapabilityKind::Service => keys::SERVICE_STEREOTYPE,
            CapabilityKind::Interface => keys::INTERFACE_STEREOTYPE,
            CapabilityKind::CommonSchema => keys::SCHEMA_STEREOTYPE,
            CapabilityKind::Operation => keys::OPERATION_STEREOTYPE,
            CapabilityKind::Message => keys::MESSAGE_STEREOTYPE,
        };
        self.property(key)
    }

    /// Reverse mapping from a stereotype string to the capability kind it
    /// classifies, if any.
    pub fn capability_kind(&self, stereotype: &str) -> Option<CapabilityKind> {
        CapabilityKind::ALL.iter().copied().find(|kind| {
            self.capability_stereotype(*kind)
                .map(|s| s == stereotype)
                .unwrap_or(false)
        })
    }
}
