//! Nimbus Core
//!
//! Core library for a cloud control-plane provider: the resource model,
//! the `Provider` trait, the resource-ID codec and the named-lock registry.

pub mod locks;
pub mod provider;
pub mod resource;
pub mod resource_id;

pub use locks::{LockKey, LockRegistry, MultiLockGuard, NamedLockGuard};
pub use resource_id::{IdError, IdSchema, ResourceId, Segment};
