//! Capability and ticket lineage tracking over a lockable model repository.
//!
//! captrail maintains two cross-linked entity graphs inside an external
//! model store: a versioned tree of capabilities (Service → Interface →
//! CommonSchema / Operation → Message) and the change-tracking tickets that
//! record how those capabilities evolve (service tickets and release
//! tickets, chained into per-id timelines).
//!
//! The crate owns no storage. Everything durable lives behind the
//! [`repo::Repository`] trait, which a host model tool implements;
//! [`repo::MemoryRepository`] is the built-in stand-in. Mutating flows in
//! [`ops`] take the host's advisory lock before writing and release it on
//! every exit path.
//!
//! Ticket tracking degrades to inert when configuration management is
//! switched off in [`config::Settings`]: constructors return `Disabled`
//! tickets whose operations are all no-ops, and the repository is never
//! touched.

pub mod config;
pub mod context;
pub mod error;
pub mod lineage;
pub mod models;
pub mod ops;
pub mod registry;
pub mod repo;
pub mod tree;
pub mod versioning;

pub use context::ModelContext;
pub use error::{Error, Result};
