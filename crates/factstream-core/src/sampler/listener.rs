//! Sample listeners: callbacks around discovery, sampling and failures.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::conditions::AttributeSample;
use crate::model::{Activity, ObjectId};
use crate::registry::RegistryError;
use crate::sampler::SampleContext;

/// Callbacks invoked by the sample handler, in listener-registration order.
///
/// All hooks default to no-ops so implementations override only what they
/// need.
pub trait SampleListener: Send {
    /// A managed object newly matched the filters.
    fn register_object(&mut self, _ctx: &SampleContext, _id: &ObjectId) {}

    /// A previously known managed object disappeared.
    fn unregister_object(&mut self, _ctx: &SampleContext, _id: &ObjectId) {}

    /// Cycle start. May recast the activity as a no-op.
    fn pre(&mut self, _ctx: &SampleContext, _activity: &mut Activity) {}

    /// Called before each attribute retrieval. Returning `false` keeps the
    /// value out of the snapshot; the raw retrieval still happens so error
    /// tracking stays consistent.
    fn sample(&mut self, _ctx: &SampleContext, _sample: &mut AttributeSample) -> bool {
        true
    }

    /// An attribute retrieval failed. May set the sample's exclude-next
    /// flag to drop the attribute from all future cycles.
    fn error(&mut self, _ctx: &SampleContext, _sample: &mut AttributeSample) {}

    /// A cycle-level failure (registry unreachable). The cycle is retried
    /// on the next tick.
    fn cycle_error(&mut self, _ctx: &SampleContext, _error: &RegistryError) {}

    /// Cycle end. May recast the activity as a no-op.
    fn post(&mut self, _ctx: &SampleContext, _activity: &mut Activity) {}

    /// Contributes custom statistics to the per-activity stats snapshot.
    fn stats(&self, _ctx: &SampleContext, _out: &mut BTreeMap<String, String>) {}
}

/// What to do with an attribute whose retrieval failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExcludePolicy {
    /// Exclude on any failure (the classic behavior).
    #[default]
    Always,
    /// Never exclude; broken attributes are retried every cycle.
    Never,
    /// Exclude on any failure except timeouts, which are retried.
    SkipTimeouts,
}

impl FromStr for ExcludePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(ExcludePolicy::Always),
            "never" => Ok(ExcludePolicy::Never),
            "skip-timeouts" => Ok(ExcludePolicy::SkipTimeouts),
            other => Err(format!(
                "unknown exclude policy '{}' (expected always, never or skip-timeouts)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ExcludePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExcludePolicy::Always => write!(f, "always"),
            ExcludePolicy::Never => write!(f, "never"),
            ExcludePolicy::SkipTimeouts => write!(f, "skip-timeouts"),
        }
    }
}

/// Default failure handler: flags exclusion per policy and logs what the
/// handler is doing.
pub struct DefaultSampleListener {
    policy: ExcludePolicy,
    flagged: u64,
}

impl DefaultSampleListener {
    pub const STAT_EXCLUDE_POLICY: &'static str = "listener.exclude.policy";
    pub const STAT_FLAGGED_COUNT: &'static str = "listener.flagged.count";

    pub fn new(policy: ExcludePolicy) -> Self {
        Self { policy, flagged: 0 }
    }
}

impl Default for DefaultSampleListener {
    fn default() -> Self {
        Self::new(ExcludePolicy::default())
    }
}

impl SampleListener for DefaultSampleListener {
    fn register_object(&mut self, _ctx: &SampleContext, id: &ObjectId) {
        debug!("registered object {}", id);
    }

    fn unregister_object(&mut self, _ctx: &SampleContext, id: &ObjectId) {
        debug!("unregistered object {}", id);
    }

    fn error(&mut self, _ctx: &SampleContext, sample: &mut AttributeSample) {
        let exclude = match self.policy {
            ExcludePolicy::Always => true,
            ExcludePolicy::Never => false,
            ExcludePolicy::SkipTimeouts => {
                !sample.error().map(RegistryError::is_timeout).unwrap_or(false)
            }
        };
        if exclude {
            self.flagged += 1;
            sample.set_exclude_next(true);
        }
        warn!(
            "sampling {} failed: {} (exclude={})",
            sample.attr_key(),
            sample
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
            exclude
        );
    }

    fn cycle_error(&mut self, ctx: &SampleContext, error: &RegistryError) {
        warn!(
            "sampling cycle {} failed: {}",
            ctx.sample_count() + 1,
            error
        );
    }

    fn stats(&self, _ctx: &SampleContext, out: &mut BTreeMap<String, String>) {
        out.insert(Self::STAT_EXCLUDE_POLICY.to_string(), self.policy.to_string());
        out.insert(Self::STAT_FLAGGED_COUNT.to_string(), self.flagged.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrInfo, AttrKind};
    use std::time::Duration;

    fn failed_sample(err: RegistryError) -> AttributeSample {
        let id = ObjectId::parse("app:type=Cache").unwrap();
        let mut s = AttributeSample::new(id, AttrInfo::new("Bad", AttrKind::Other));
        s.record_error(err);
        s
    }

    #[test]
    fn test_always_policy_flags_exclusion() {
        let mut l = DefaultSampleListener::default();
        let ctx = SampleContext::default();
        let mut s = failed_sample(RegistryError::Unsupported("boom".to_string()));
        l.error(&ctx, &mut s);
        assert!(s.exclude_next());
    }

    #[test]
    fn test_never_policy_retries() {
        let mut l = DefaultSampleListener::new(ExcludePolicy::Never);
        let ctx = SampleContext::default();
        let mut s = failed_sample(RegistryError::Unsupported("boom".to_string()));
        l.error(&ctx, &mut s);
        assert!(!s.exclude_next());
    }

    #[test]
    fn test_skip_timeouts_policy() {
        let mut l = DefaultSampleListener::new(ExcludePolicy::SkipTimeouts);
        let ctx = SampleContext::default();

        let mut timeout = failed_sample(RegistryError::Timeout(Duration::from_millis(50)));
        l.error(&ctx, &mut timeout);
        assert!(!timeout.exclude_next());

        let mut broken = failed_sample(RegistryError::Unsupported("boom".to_string()));
        l.error(&ctx, &mut broken);
        assert!(broken.exclude_next());
    }

    #[test]
    fn test_stats_reported() {
        let l = DefaultSampleListener::new(ExcludePolicy::SkipTimeouts);
        let ctx = SampleContext::default();
        let mut out = BTreeMap::new();
        l.stats(&ctx, &mut out);
        assert_eq!(
            out.get(DefaultSampleListener::STAT_EXCLUDE_POLICY),
            Some(&"skip-timeouts".to_string())
        );
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("always".parse::<ExcludePolicy>().unwrap(), ExcludePolicy::Always);
        assert_eq!(
            "skip-timeouts".parse::<ExcludePolicy>().unwrap(),
            ExcludePolicy::SkipTimeouts
        );
        assert!("sometimes".parse::<ExcludePolicy>().is_err());
    }
}
