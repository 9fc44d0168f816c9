//! Per-cycle containers: snapshots of gathered facts and the activity that
//! bounds one sampling cycle.

use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::model::{AttrValue, now_usec};

/// Severity attached to activities and ad-hoc messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One named fact within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub key: String,
    pub value: AttrValue,
}

/// Ordered name/value facts gathered for one managed object within one
/// activity. Owned by the activity that created it.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Grouping category, normally the object's domain.
    pub category: String,
    /// Canonical object name (or a synthetic name for internal snapshots).
    pub name: String,
    props: Vec<Property>,
}

impl Snapshot {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            props: Vec::new(),
        }
    }

    /// Appends a property, keeping insertion order.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.props.push(Property {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.props.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    pub fn props(&self) -> &[Property] {
        &self.props
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

/// The bounded unit of one sampling cycle.
///
/// Opened at cycle start, populated during iteration, closed at cycle end
/// and then handed to the formatter by shared reference. A no-op activity
/// still runs for counters but is never formatted.
#[derive(Debug, Clone)]
pub struct Activity {
    name: String,
    tracking_id: String,
    source: Vec<String>,
    severity: Severity,
    start_usec: i64,
    end_usec: i64,
    user: Option<String>,
    location: Option<String>,
    snapshots: Vec<Snapshot>,
    noop: bool,
    closed: bool,
}

impl Activity {
    /// Opens a new activity. `source` is the owning hierarchy rendered
    /// root-to-leaf by the formatters.
    pub fn open(name: impl Into<String>, source: Vec<String>) -> Self {
        let name = name.into();
        let start_usec = now_usec();
        let tracking_id = format!("{:016x}", xxh3_64(format!("{}@{}", name, start_usec).as_bytes()));
        Self {
            name,
            tracking_id,
            source,
            severity: Severity::Info,
            start_usec,
            end_usec: 0,
            user: None,
            location: None,
            snapshots: Vec::new(),
            noop: false,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    pub fn source(&self) -> &[String] {
        &self.source
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = Some(location.into());
    }

    /// Recasts the activity as a no-op: the cycle still runs, the result is
    /// discarded instead of being formatted.
    pub fn set_noop(&mut self, noop: bool) {
        self.noop = noop;
    }

    pub fn is_noop(&self) -> bool {
        self.noop
    }

    pub fn add_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn start_usec(&self) -> i64 {
        self.start_usec
    }

    pub fn end_usec(&self) -> i64 {
        self.end_usec
    }

    /// Freezes the activity at cycle end.
    pub fn close(&mut self) {
        if !self.closed {
            self.end_usec = now_usec();
            self.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn elapsed_usec(&self) -> i64 {
        if self.closed {
            self.end_usec - self.start_usec
        } else {
            0
        }
    }
}
