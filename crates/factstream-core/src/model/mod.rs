//! Shared data model: managed-object identifiers, attribute descriptors,
//! sampled values and per-cycle activity/snapshot containers.

mod activity;
mod object;
mod value;

pub use activity::{Activity, Property, Severity, Snapshot};
pub use object::{AttrInfo, AttrKind, NameError, ObjectId, ObjectInfo};
pub use value::AttrValue;

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_usec() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
