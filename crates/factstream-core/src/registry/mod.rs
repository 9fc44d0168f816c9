//! Managed-object registry abstraction.
//!
//! The `ObjectRegistry` trait is the seam between the sampling pipeline and
//! the monitored process: discovery, description and attribute reads all go
//! through it. `MockRegistry` scripts behaviors for tests; `ProcRegistry`
//! exposes procfs-backed objects for the daemon.

pub mod mock;
pub mod procfs;

use std::time::Duration;

use crate::filter::PatternList;
use crate::model::{AttrValue, ObjectId, ObjectInfo};

pub use mock::{Behavior, MockRegistry};
pub use procfs::ProcRegistry;

/// Error raised by registry operations.
///
/// `Connect` marks cycle-level failures (the registry itself is
/// unreachable); everything else is attribute- or object-level and stays
/// contained within the cycle.
#[derive(Debug)]
pub enum RegistryError {
    /// Registry unreachable; the whole cycle fails and is retried.
    Connect(String),
    /// Object or attribute not present.
    NotFound(String),
    /// Attribute exists but its value cannot be produced.
    Unsupported(String),
    /// Attribute read exceeded the configured budget.
    Timeout(Duration),
    /// Underlying I/O failure reading a single value.
    Io(std::io::Error),
}

impl RegistryError {
    /// True for failures that abort the whole cycle rather than one
    /// attribute.
    pub fn is_connect(&self) -> bool {
        matches!(self, RegistryError::Connect(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RegistryError::Timeout(_))
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Connect(msg) => write!(f, "registry unreachable: {}", msg),
            RegistryError::NotFound(what) => write!(f, "not found: {}", what),
            RegistryError::Unsupported(what) => write!(f, "unsupported: {}", what),
            RegistryError::Timeout(d) => write!(f, "read timed out after {:?}", d),
            RegistryError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<std::io::Error> for RegistryError {
    fn from(e: std::io::Error) -> Self {
        RegistryError::Io(e)
    }
}

/// Introspection interface of the monitored process.
///
/// Implementations are shared between the cycle thread and the timed read
/// worker, so they must be `Send + Sync`; interior mutability is the
/// implementation's concern.
pub trait ObjectRegistry: Send + Sync {
    /// Cheap connectivity check, used when scheduling is established.
    fn ping(&self) -> Result<(), RegistryError>;

    /// Lists identifiers matching any pattern of `filter`.
    fn query_names(&self, filter: &PatternList) -> Result<Vec<ObjectId>, RegistryError>;

    /// Describes one object's attributes.
    fn object_info(&self, id: &ObjectId) -> Result<ObjectInfo, RegistryError>;

    /// Reads a single attribute value. May block on process/network I/O.
    fn read_attribute(&self, id: &ObjectId, attr: &str) -> Result<AttrValue, RegistryError>;
}
