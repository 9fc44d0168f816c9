//! JSON rendering: one object per line, for downstream log pipelines.

use serde::Serialize;
use tracing::warn;

use crate::format::FactFormatter;
use crate::model::{Activity, Severity, Snapshot};

#[derive(Serialize)]
struct ActivityRecord<'a> {
    name: &'a str,
    tracking_id: &'a str,
    source: &'a [String],
    severity: Severity,
    start_usec: i64,
    end_usec: i64,
    elapsed_usec: i64,
    snapshots: &'a [Snapshot],
}

#[derive(Serialize)]
struct MessageRecord<'a> {
    severity: Severity,
    source: &'a [String],
    message: &'a str,
}

/// Renders each activity as a single JSON object terminated by a newline.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    fn to_line<T: Serialize>(record: &T) -> String {
        match serde_json::to_string(record) {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(e) => {
                warn!("json rendering failed: {}", e);
                String::new()
            }
        }
    }
}

impl FactFormatter for JsonFormatter {
    fn format_activity(&self, activity: &Activity) -> String {
        Self::to_line(&ActivityRecord {
            name: activity.name(),
            tracking_id: activity.tracking_id(),
            source: activity.source(),
            severity: activity.severity(),
            start_usec: activity.start_usec(),
            end_usec: activity.end_usec(),
            elapsed_usec: activity.elapsed_usec(),
            snapshots: activity.snapshots(),
        })
    }

    fn format_snapshot(&self, snapshot: &Snapshot) -> String {
        Self::to_line(snapshot)
    }

    fn format_message(&self, severity: Severity, source: &[String], message: &str) -> String {
        Self::to_line(&MessageRecord {
            severity,
            source,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttrValue;

    #[test]
    fn test_activity_json_line() {
        let mut act = Activity::open("Sample", vec!["factstream".to_string()]);
        let mut snap = Snapshot::new("app", "app:type=Cache");
        snap.add("Count", 42i64);
        act.add_snapshot(snap);
        act.close();

        let line = JsonFormatter::new().format_activity(&act);
        assert!(line.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["name"], "Sample");
        assert_eq!(parsed["source"][0], "factstream");
        assert_eq!(parsed["snapshots"][0]["name"], "app:type=Cache");
    }

    #[test]
    fn test_message_json_line() {
        let line = JsonFormatter::new().format_message(
            Severity::Error,
            &["factstream".to_string()],
            "registry down",
        );
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["message"], "registry down");
    }

    #[test]
    fn test_nested_values_serialize() {
        let mut act = Activity::open("Sample", vec![]);
        let mut snap = Snapshot::new("app", "app:type=Memory");
        snap.add(
            "Usage",
            AttrValue::Map(vec![("used".to_string(), AttrValue::Int(9))]),
        );
        act.add_snapshot(snap);
        act.close();
        let line = JsonFormatter::new().format_activity(&act);
        assert!(serde_json::from_str::<serde_json::Value>(&line).is_ok());
    }
}
