//! Instance persistence for lantern-mc
//!
//! An instance is a self-contained installation configuration (Java, RAM,
//! window, mods) stored as its own directory with an `instance.json` record.
//! [`InstanceStore`] manages a directory tree of such records.

pub mod config;
pub mod model;
pub mod store;

pub use config::{InstanceConfig, JavaConfig, ModLoader, ModLoaderName, WindowConfig};
pub use model::{InstanceModel, ModEntry};
pub use store::{InstanceStore, InstanceStoreError};
