//! Condition/action framework: declarative reactions to sampled values,
//! evaluated by the handler without modifying it.

mod simple;

pub use simple::{CmpOp, SimpleCondition};

use crate::model::{AttrInfo, AttrValue, ObjectId, now_usec};
use crate::registry::RegistryError;
use crate::sampler::SampleContext;

/// One attribute within one sampling cycle.
///
/// Created fresh each cycle for each live, non-excluded attribute and
/// discarded after the cycle; never reused.
#[derive(Debug)]
pub struct AttributeSample {
    object: ObjectId,
    attr: AttrInfo,
    value: Option<AttrValue>,
    timestamp_usec: i64,
    error: Option<RegistryError>,
    exclude_next: bool,
}

impl AttributeSample {
    pub fn new(object: ObjectId, attr: AttrInfo) -> Self {
        Self {
            object,
            attr,
            value: None,
            timestamp_usec: 0,
            error: None,
            exclude_next: false,
        }
    }

    pub fn object(&self) -> &ObjectId {
        &self.object
    }

    pub fn attr(&self) -> &AttrInfo {
        &self.attr
    }

    pub fn value(&self) -> Option<&AttrValue> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&RegistryError> {
        self.error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Microsecond timestamp of the retrieval attempt (0 until sampled).
    pub fn timestamp_usec(&self) -> i64 {
        self.timestamp_usec
    }

    /// Records a successful retrieval.
    pub fn record(&mut self, value: AttrValue) {
        self.value = Some(value);
        self.timestamp_usec = now_usec();
    }

    /// Records a failed retrieval.
    pub fn record_error(&mut self, error: RegistryError) {
        self.error = Some(error);
        self.timestamp_usec = now_usec();
    }

    /// Whether a failure handler asked to exclude this attribute from all
    /// future cycles.
    pub fn exclude_next(&self) -> bool {
        self.exclude_next
    }

    pub fn set_exclude_next(&mut self, exclude: bool) {
        self.exclude_next = exclude;
    }

    /// Stable identity used by the exclusion set.
    pub fn attr_key(&self) -> String {
        attr_key(&self.object.canonical(), &self.attr.name)
    }
}

/// Composite string identity of one attribute of one object.
pub fn attr_key(canonical: &str, attr: &str) -> String {
    format!("{}/{}", canonical, attr)
}

/// Predicate over one attribute sample.
pub trait Condition: Send {
    fn name(&self) -> &str;
    fn evaluate(&self, sample: &AttributeSample) -> bool;
}

/// Side effect fired when a paired condition evaluates true.
pub trait Action: Send {
    fn action(&mut self, ctx: &SampleContext, cond: &dyn Condition, sample: &AttributeSample);
}

/// Default action: does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAction;

impl Action for NoopAction {
    fn action(&mut self, _ctx: &SampleContext, _cond: &dyn Condition, _sample: &AttributeSample) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttrKind;

    #[test]
    fn test_sample_lifecycle() {
        let id = ObjectId::parse("app:type=Cache").unwrap();
        let mut sample = AttributeSample::new(id, AttrInfo::new("Count", AttrKind::Int));
        assert!(sample.value().is_none());
        assert_eq!(sample.timestamp_usec(), 0);

        sample.record(AttrValue::Int(42));
        assert_eq!(sample.value(), Some(&AttrValue::Int(42)));
        assert!(sample.timestamp_usec() > 0);
        assert!(!sample.is_error());
        assert_eq!(sample.attr_key(), "app:type=Cache/Count");
    }

    #[test]
    fn test_sample_error() {
        let id = ObjectId::parse("app:type=Cache").unwrap();
        let mut sample = AttributeSample::new(id, AttrInfo::new("Bad", AttrKind::Other));
        sample.record_error(RegistryError::Unsupported("boom".to_string()));
        assert!(sample.is_error());
        assert!(!sample.exclude_next());
        sample.set_exclude_next(true);
        assert!(sample.exclude_next());
    }
}
