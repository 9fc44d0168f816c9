//! Fact formatters: flat, single-line renderings of closed activities.
//!
//! All variants share the same framing (`OBJ:` prefix, comma-separated
//! `key=value` fields, newline terminator) and the same escaping rules;
//! they differ in how a metric's key is derived from its object identifier.

mod name_value;
mod path_value;

#[cfg(feature = "json")]
mod json;

pub use name_value::NameValueFormatter;
pub use path_value::PathValueFormatter;

#[cfg(feature = "json")]
pub use json::JsonFormatter;

use crate::model::{Activity, AttrValue, Property, Severity, Snapshot};

pub(crate) const FIELD_SEP: &str = ",";
pub(crate) const END_SEP: &str = "\n";
pub(crate) const PATH_DELIM: &str = "\\";
pub(crate) const EQ: &str = "=";
pub(crate) const FS_REP: &str = "!";
pub(crate) const UNIQUE_SUFFIX: &str = "_";

/// Renders activities and ad-hoc messages to self-contained text blocks.
pub trait FactFormatter: Send {
    /// Renders one closed activity. The result is a complete block ending
    /// with a newline.
    fn format_activity(&self, activity: &Activity) -> String;

    /// Renders one snapshot on its own, outside any activity.
    fn format_snapshot(&self, snapshot: &Snapshot) -> String;

    /// Renders a free-standing message in the same framing as activities.
    fn format_message(&self, severity: Severity, source: &[String], message: &str) -> String;
}

/// Escapes a key fragment: spaces become underscores, double quotes become
/// single quotes.
pub(crate) fn escape_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ' ' => out.push('_'),
            '"' => out.push('\''),
            c => out.push(c),
        }
    }
    out
}

/// Escapes a value fragment so it cannot break the line framing: newlines
/// become literal escapes, field and entry separators are demoted.
pub(crate) fn escape_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ';' | ',' => out.push('|'),
            '[' => out.push_str("{("),
            ']' => out.push_str(")}"),
            '"' => out.push('\''),
            c => out.push(c),
        }
    }
    out
}

/// Scalar rendering of a value, before escaping. `None` for collections,
/// which only some formatters can represent.
pub(crate) fn scalar_str(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::Null => Some("null".to_string()),
        AttrValue::Bool(b) => Some(b.to_string()),
        AttrValue::Int(i) => Some(i.to_string()),
        AttrValue::Float(f) => Some(f.to_string()),
        AttrValue::Str(s) => Some(s.clone()),
        AttrValue::Bytes(_) | AttrValue::List(_) | AttrValue::Map(_) => None,
    }
}

/// Deep rendering of a value: collections expand element by element, each
/// element escaped individually; brackets and separators stay literal.
pub(crate) fn deep_str(value: &AttrValue) -> String {
    match value {
        AttrValue::Bytes(bytes) => {
            let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
        AttrValue::List(items) => {
            let parts: Vec<String> = items.iter().map(deep_str).collect();
            format!("[{}]", parts.join(", "))
        }
        AttrValue::Map(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}{}{}", escape_value(k), EQ, deep_str(v)))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        scalar => scalar_str(scalar).map(|s| escape_value(&s)).unwrap_or_default(),
    }
}

/// Disambiguates a property key against later siblings: when another key
/// continues past this one as a path, the shorter key gets a suffix so
/// branch and leaf never collide.
pub(crate) fn unique_key(props: &[Property], idx: usize) -> String {
    let mut key = props[idx].key.clone();
    for later in &props[idx + 1..] {
        if later.key.starts_with(&format!("{}{}", key, PATH_DELIM)) {
            key.push_str(UNIQUE_SUFFIX);
        }
    }
    key
}

/// Builds the synthetic `Self` snapshot every formatter appends: activity
/// identity and bookkeeping facts.
pub(crate) fn self_snapshot(activity: &Activity) -> Snapshot {
    let mut snap = Snapshot::new("Self", "Self");
    snap.add("corrid", AttrValue::Str(activity.tracking_id().to_string()));
    if let Some(user) = activity.user() {
        snap.add("user", AttrValue::Str(user.to_string()));
    }
    if let Some(location) = activity.location() {
        snap.add("location", AttrValue::Str(location.to_string()));
    }
    snap.add("level", AttrValue::Str(activity.severity().to_string()));
    snap.add("pid", AttrValue::Int(std::process::id() as i64));
    snap.add("snap.count", AttrValue::Int(activity.snapshot_count() as i64));
    snap.add("elapsed.usec", AttrValue::Int(activity.elapsed_usec()));
    snap
}

/// Appends the activity line prefix: `OBJ:Streams` followed by the source
/// path root-to-leaf and the given leaf segment.
pub(crate) fn push_stream_prefix(out: &mut String, source: &[String], leaf: &str) {
    out.push_str("OBJ:Streams");
    for segment in source {
        out.push_str(PATH_DELIM);
        out.push_str(&escape_key(segment));
    }
    out.push_str(PATH_DELIM);
    out.push_str(leaf);
    out.push_str(FIELD_SEP);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_value_framing_chars() {
        assert_eq!(escape_value("a,b;c"), "a|b|c");
        assert_eq!(escape_value("x[0]"), "x{(0)}");
        assert_eq!(escape_value("line1\nline2\r"), "line1\\nline2\\r");
        assert_eq!(escape_value("say \"hi\""), "say 'hi'");
    }

    #[test]
    fn test_escape_key() {
        assert_eq!(escape_key("Heap Memory Usage"), "Heap_Memory_Usage");
        assert_eq!(escape_key("a\"b"), "a'b");
    }

    #[test]
    fn test_deep_str_expands_collections() {
        assert_eq!(deep_str(&AttrValue::Bytes(vec![1, 2, 3])), "[1, 2, 3]");
        let list = AttrValue::List(vec![AttrValue::Int(1), AttrValue::Str("a,b".into())]);
        assert_eq!(deep_str(&list), "[1, a|b]");
        let map = AttrValue::Map(vec![("used".to_string(), AttrValue::Int(9))]);
        assert_eq!(deep_str(&map), "[used=9]");
    }

    #[test]
    fn test_unique_key_suffix() {
        let mut snap = Snapshot::new("x", "x");
        snap.add("Usage", 1i64);
        snap.add("Usage\\max", 2i64);
        let props = snap.props();
        assert_eq!(unique_key(props, 0), "Usage_");
        assert_eq!(unique_key(props, 1), "Usage\\max");
    }

    #[test]
    fn test_scalar_str() {
        assert_eq!(scalar_str(&AttrValue::Null), Some("null".to_string()));
        assert_eq!(scalar_str(&AttrValue::Bool(true)), Some("true".to_string()));
        assert_eq!(scalar_str(&AttrValue::Bytes(vec![1])), None);
    }
}
