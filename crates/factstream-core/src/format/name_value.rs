//! Name/value rendering: metric keys are the escaped object identifier
//! joined to the attribute name.

use crate::format::{
    EQ, FIELD_SEP, END_SEP, FS_REP, FactFormatter, PATH_DELIM, escape_key, escape_value,
    push_stream_prefix, scalar_str, self_snapshot, unique_key,
};
use crate::model::{Activity, Severity, Snapshot};

/// Renders each metric as `<object-name>\<attr>=<value>`.
///
/// The object name keeps its written shape with `=` turned into the path
/// delimiter and `,` into `!`, so the key parses unambiguously. Values that
/// are collections are skipped; this variant only carries scalars.
#[derive(Debug, Clone, Default)]
pub struct NameValueFormatter {
    quote_strings: bool,
}

impl NameValueFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps textual values in double quotes. Off by default.
    pub fn with_quoted_strings(mut self, quote: bool) -> Self {
        self.quote_strings = quote;
        self
    }

    fn snap_name(&self, snap: &Snapshot) -> String {
        snap.name.replace('=', PATH_DELIM).replace(',', FS_REP)
    }

    fn push_snapshot(&self, out: &mut String, snap: &Snapshot) {
        let name = self.snap_name(snap);
        let props = snap.props();
        for (i, prop) in props.iter().enumerate() {
            let Some(raw) = scalar_str(&prop.value) else {
                continue;
            };
            let key = unique_key(props, i);
            out.push_str(&escape_key(&format!("{}{}{}", name, PATH_DELIM, key)));
            out.push_str(EQ);
            let quoted = self.quote_strings && matches!(prop.value, crate::model::AttrValue::Str(_));
            if quoted {
                out.push('"');
            }
            out.push_str(&escape_value(&raw));
            if quoted {
                out.push('"');
            }
            out.push_str(FIELD_SEP);
        }
    }
}

impl FactFormatter for NameValueFormatter {
    fn format_activity(&self, activity: &Activity) -> String {
        let mut out = String::with_capacity(1024);
        push_stream_prefix(&mut out, activity.source(), "Activities");
        for snap in activity.snapshots() {
            self.push_snapshot(&mut out, snap);
        }
        self.push_snapshot(&mut out, &self_snapshot(activity));
        out.push_str(END_SEP);
        out
    }

    fn format_snapshot(&self, snapshot: &Snapshot) -> String {
        let mut out = String::with_capacity(256);
        out.push_str("OBJ:Metrics");
        out.push_str(PATH_DELIM);
        out.push_str(&escape_key(&snapshot.category));
        out.push_str(FIELD_SEP);
        self.push_snapshot(&mut out, snapshot);
        out.push_str(END_SEP);
        out
    }

    fn format_message(&self, severity: Severity, source: &[String], message: &str) -> String {
        let mut out = String::with_capacity(256);
        push_stream_prefix(&mut out, source, "Message");
        out.push_str("Self");
        out.push_str(PATH_DELIM);
        out.push_str("level");
        out.push_str(EQ);
        out.push_str(&severity.to_string());
        out.push_str(FIELD_SEP);
        out.push_str("Self");
        out.push_str(PATH_DELIM);
        out.push_str("msg-text");
        out.push_str(EQ);
        out.push('"');
        out.push_str(&escape_value(message));
        out.push('"');
        out.push_str(END_SEP);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttrValue;

    fn activity_with(snap: Snapshot) -> Activity {
        let mut act = Activity::open("Sample", vec!["factstream".to_string(), "host1".to_string()]);
        act.add_snapshot(snap);
        act.close();
        act
    }

    #[test]
    fn test_activity_line_shape() {
        let mut snap = Snapshot::new("app", "app:type=Cache,name=Sessions");
        snap.add("Count", 42i64);
        snap.add("Hit Ratio", 0.5f64);
        let line = NameValueFormatter::new().format_activity(&activity_with(snap));

        assert!(line.starts_with("OBJ:Streams\\factstream\\host1\\Activities,"));
        assert!(line.contains("app:type\\Cache!name\\Sessions\\Count=42,"));
        assert!(line.contains("app:type\\Cache!name\\Sessions\\Hit_Ratio=0.5,"));
        assert!(line.contains("Self\\snap.count=1,"));
        assert!(line.contains("Self\\level=INFO,"));
        assert!(line.ends_with(",\n"));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_collections_are_skipped() {
        let mut snap = Snapshot::new("app", "app:type=Cache");
        snap.add("Blob", AttrValue::Bytes(vec![1, 2]));
        snap.add("Count", 1i64);
        let line = NameValueFormatter::new().format_activity(&activity_with(snap));
        assert!(!line.contains("Blob"));
        assert!(line.contains("app:type\\Cache\\Count=1,"));
    }

    #[test]
    fn test_value_escaping_keeps_line_flat() {
        let mut snap = Snapshot::new("app", "app:type=Cache");
        snap.add("State", AttrValue::Str("a,b\nc".to_string()));
        let line = NameValueFormatter::new().format_activity(&activity_with(snap));
        assert!(line.contains("app:type\\Cache\\State=a|b\\nc,"));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_quoted_strings() {
        let mut snap = Snapshot::new("app", "app:type=Cache");
        snap.add("Name", AttrValue::Str("main".to_string()));
        snap.add("Count", 1i64);
        let line = NameValueFormatter::new()
            .with_quoted_strings(true)
            .format_activity(&activity_with(snap));
        assert!(line.contains("app:type\\Cache\\Name=\"main\","));
        assert!(line.contains("app:type\\Cache\\Count=1,"));
    }

    #[test]
    fn test_standalone_snapshot() {
        let mut snap = Snapshot::new("app", "app:type=Cache");
        snap.add("Count", 7i64);
        let line = NameValueFormatter::new().format_snapshot(&snap);
        assert_eq!(line, "OBJ:Metrics\\app,app:type\\Cache\\Count=7,\n");
    }

    #[test]
    fn test_message_shape() {
        let line = NameValueFormatter::new().format_message(
            Severity::Warning,
            &["factstream".to_string()],
            "registry unreachable, retrying",
        );
        assert_eq!(
            line,
            "OBJ:Streams\\factstream\\Message,Self\\level=WARNING,Self\\msg-text=\"registry unreachable| retrying\"\n"
        );
    }
}
