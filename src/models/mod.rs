//! Domain models for captrail.
//!
//! # Core Concepts
//!
//! ## Capability graph
//!
//! - [`Capability`]: a named, versioned node in the hierarchy
//!   Service → Interface → CommonSchema / Operation → Message. Nodes live in
//!   an arena owned by [`CapabilityTree`] and are addressed by
//!   [`CapabilityId`].
//!
//! ## Tickets
//!
//! - [`ServiceTicket`]: tracks one service's change lineage and its most
//!   recently released version.
//! - [`ReleaseTicket`]: tracks one release of a ticket id; successive
//!   versions are chained into a timeline, and one release element may be
//!   shared by many services.
//! - [`TicketKey`]: the `project/id` identity both ticket kinds deduplicate
//!   on.
//!
//! Both ticket kinds have a `Disabled` variant returned when configuration
//! management is switched off; its operations are no-ops.
//!
//! [`CapabilityTree`]: crate::tree::CapabilityTree

mod capability;
mod ticket;

pub use capability::*;
pub use ticket::*;
