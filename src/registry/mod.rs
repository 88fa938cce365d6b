//! Lazy, race-free construction of shared instances.
//!
//! ## Contents
//! - [`InstanceRegistry`] key → instance map with single-flight construction
//! - [`RegistryBuilder`] configuration and event bus wiring
//!
//! The per-key state machine lives in `slot`:
//! ```text
//! (absent) ──claim──► Constructing ──ok──► Ready
//!                         │  │
//!                         │  └──err──► (absent) | Failed (cache_failures)
//!                         └──dropped──► (absent), waiters retry
//! ```

mod instance;
mod slot;

pub use instance::{InstanceRegistry, RegistryBuilder};
