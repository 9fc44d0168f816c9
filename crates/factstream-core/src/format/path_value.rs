//! Path/value rendering: metric keys are backslash-delimited paths derived
//! from the object identifier's properties.

use crate::format::{
    EQ, FIELD_SEP, END_SEP, FactFormatter, NameValueFormatter, PATH_DELIM, deep_str, escape_key,
    push_stream_prefix, self_snapshot, unique_key,
};
use crate::model::{Activity, ObjectId, Property, Severity, Snapshot};

/// Priority table turning identifier properties into path segments. Earlier
/// levels come first in the path; within a level every present key
/// contributes a segment, in table order.
const PATH_KEYS: &[&[&str]] = &[
    &["domain"],
    &["type"],
    &["name", "brokerName"],
    &["service", "connector", "destinationType"],
    &["instanceName", "connectorName", "destinationName"],
];

/// Renders each metric as `<path>\<attr>=<value>` where the path is built
/// from well-known identifier properties (domain, type, name, ...), with
/// leftover properties appended as `key:value` segments in written order.
///
/// Snapshots are ordered by path and properties by key, so output is stable
/// regardless of discovery order. Collection values expand in place.
#[derive(Debug, Clone, Default)]
pub struct PathValueFormatter;

impl PathValueFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Derives the path for one snapshot. Names that do not parse as object
    /// identifiers (like the bookkeeping snapshots) pass through verbatim.
    fn snap_path(&self, snap: &Snapshot) -> String {
        let Ok(id) = ObjectId::parse(&snap.name) else {
            return snap.name.clone();
        };
        let mut remaining: Vec<(String, String)> = id
            .props()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut segments: Vec<String> = Vec::new();

        for level in PATH_KEYS {
            for key in *level {
                if *key == "domain" {
                    segments.push(id.domain().to_string());
                    continue;
                }
                if let Some(pos) = remaining.iter().position(|(k, _)| k == key) {
                    let (_, value) = remaining.remove(pos);
                    if !value.is_empty() {
                        segments.push(value);
                    }
                }
            }
        }
        for (key, value) in remaining {
            segments.push(format!("{}:{}", key, value));
        }
        segments.join(PATH_DELIM)
    }

    fn push_snapshot(&self, out: &mut String, path: &str, snap: &Snapshot) {
        let mut props: Vec<Property> = snap.props().to_vec();
        props.sort_by(|a, b| a.key.cmp(&b.key));
        for i in 0..props.len() {
            let key = unique_key(&props, i);
            out.push_str(&escape_key(&format!("{}{}{}", path, PATH_DELIM, key)));
            out.push_str(EQ);
            out.push_str(&deep_str(&props[i].value));
            out.push_str(FIELD_SEP);
        }
    }
}

impl FactFormatter for PathValueFormatter {
    fn format_activity(&self, activity: &Activity) -> String {
        let mut out = String::with_capacity(1024);
        push_stream_prefix(&mut out, activity.source(), "Activities");

        let synthetic = self_snapshot(activity);
        let mut ordered: Vec<(String, &Snapshot)> = activity
            .snapshots()
            .iter()
            .chain(std::iter::once(&synthetic))
            .map(|snap| (self.snap_path(snap), snap))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, snap) in ordered {
            self.push_snapshot(&mut out, &path, snap);
        }
        out.push_str(END_SEP);
        out
    }

    fn format_snapshot(&self, snapshot: &Snapshot) -> String {
        let mut out = String::with_capacity(256);
        out.push_str("OBJ:Metrics");
        out.push_str(PATH_DELIM);
        out.push_str(&escape_key(&snapshot.category));
        out.push_str(FIELD_SEP);
        self.push_snapshot(&mut out, &self.snap_path(snapshot), snapshot);
        out.push_str(END_SEP);
        out
    }

    fn format_message(&self, severity: Severity, source: &[String], message: &str) -> String {
        NameValueFormatter::new().format_message(severity, source, message)
    }
}
