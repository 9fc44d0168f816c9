//! Sampling engine: the handler that runs cycles, the scheduler that paces
//! them, and the `Sampler` facade tying a registry, formatter and sink
//! together.

mod context;
mod handler;
mod listener;
mod scheduler;
mod worker;

pub use context::{
    SampleContext, STAT_CONDITION_COUNT, STAT_LAST_METRIC_COUNT, STAT_LISTENER_COUNT,
    STAT_NOOP_COUNT, STAT_OBJECT_COUNT, STAT_SAMPLE_COUNT, STAT_SAMPLE_TIME_USEC,
    STAT_TOTAL_ACTION_COUNT, STAT_TOTAL_ERROR_COUNT, STAT_TOTAL_EXCLUDE_COUNT,
    STAT_TOTAL_METRIC_COUNT,
};
pub use handler::{ListenerId, SampleHandler, STATS_SNAPSHOT_CATEGORY, STATS_SNAPSHOT_NAME};
pub use listener::{DefaultSampleListener, ExcludePolicy, SampleListener};
pub use scheduler::{Output, ScheduleOptions, Scheduler};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::conditions::{Action, Condition};
use crate::filter::{FilterError, PatternList};
use crate::format::FactFormatter;
use crate::registry::{ObjectRegistry, RegistryError};
use crate::sink::FactSink;

/// Errors from the sampler lifecycle.
#[derive(Debug)]
pub enum SampleError {
    /// The operation does not fit the sampler's current state.
    InvalidState(&'static str),
    /// The registry refused the initial connectivity probe.
    Connect(RegistryError),
    /// An include or exclude filter string could not be parsed.
    BadFilter(FilterError),
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::InvalidState(what) => write!(f, "invalid state: {}", what),
            SampleError::Connect(e) => write!(f, "registry probe failed: {}", e),
            SampleError::BadFilter(e) => write!(f, "bad filter: {}", e),
        }
    }
}

impl std::error::Error for SampleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SampleError::Connect(e) => Some(e),
            SampleError::BadFilter(e) => Some(e),
            SampleError::InvalidState(_) => None,
        }
    }
}

impl From<FilterError> for SampleError {
    fn from(e: FilterError) -> Self {
        SampleError::BadFilter(e)
    }
}

/// Everything a sampler needs before it can open.
pub struct SamplerConfig {
    /// Activity name, also used to name the sampling thread.
    pub name: String,
    pub registry: Arc<dyn ObjectRegistry>,
    pub formatter: Box<dyn FactFormatter>,
    pub sink: Box<dyn FactSink>,
    /// Failure policy installed into the default listener.
    pub exclude_policy: ExcludePolicy,
    /// Per-attribute read budget; `None` reads inline without a watchdog.
    pub attr_timeout: Option<Duration>,
    /// Source hierarchy, root to leaf, rendered by the formatters.
    pub source: Vec<String>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One sampling pipeline: registry in, formatted facts out.
///
/// A sampler opens once. Opening parses the filters, probes the registry
/// and starts the schedule; everything else delegates to the running
/// handler. Closing stops the thread for good.
pub struct Sampler {
    config: Option<SamplerConfig>,
    scheduler: Option<Scheduler>,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config: Some(config),
            scheduler: None,
        }
    }

    /// Opens the sampler: validates filters, probes the registry, starts
    /// the sampling thread. An empty include filter means match-all; an
    /// empty exclude filter excludes nothing.
    pub fn open(
        &mut self,
        include: &str,
        exclude: &str,
        options: ScheduleOptions,
    ) -> Result<(), SampleError> {
        if self.scheduler.is_some() {
            return Err(SampleError::InvalidState("sampler is already open"));
        }

        let include = if include.trim().is_empty() {
            PatternList::match_all()
        } else {
            PatternList::parse(include)?
        };
        let exclude = PatternList::parse(exclude)?;

        // Probe before consuming the config, so a failed open can be retried.
        self.config
            .as_ref()
            .ok_or(SampleError::InvalidState("sampler was closed"))?
            .registry
            .ping()
            .map_err(SampleError::Connect)?;
        let config = self
            .config
            .take()
            .ok_or(SampleError::InvalidState("sampler was closed"))?;

        let mut handler = SampleHandler::new(
            config.name.clone(),
            Arc::clone(&config.registry),
            include,
            exclude,
            config.source,
            config.attr_timeout,
        );
        handler.add_listener(Box::new(DefaultSampleListener::new(config.exclude_policy)));

        let mut scheduler =
            Scheduler::new(config.name, handler, config.formatter, config.sink);
        scheduler.start(options)?;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.scheduler.is_some()
    }

    fn scheduler(&self) -> Result<&Scheduler, SampleError> {
        self.scheduler
            .as_ref()
            .ok_or(SampleError::InvalidState("sampler is not open"))
    }

    /// Snapshot of the counters. Requires an open sampler.
    pub fn context(&self) -> Result<SampleContext, SampleError> {
        Ok(lock(self.scheduler()?.handler()).context().clone())
    }

    /// Period of the running schedule.
    pub fn period(&self) -> Result<Duration, SampleError> {
        self.scheduler()?
            .options()
            .map(|o| o.period)
            .ok_or(SampleError::InvalidState("sampler is not open"))
    }

    /// The include filter in effect.
    pub fn include_filter(&self) -> Result<String, SampleError> {
        Ok(lock(self.scheduler()?.handler()).include().to_string())
    }

    /// The exclude filter in effect.
    pub fn exclude_filter(&self) -> Result<String, SampleError> {
        Ok(lock(self.scheduler()?.handler()).exclude().to_string())
    }

    /// Clears counters and the exclusion set.
    pub fn reset(&self) -> Result<(), SampleError> {
        lock(self.scheduler()?.handler()).reset();
        Ok(())
    }

    /// Adds a listener to the running handler; it sees the next cycle.
    pub fn add_listener(
        &self,
        listener: Box<dyn SampleListener>,
    ) -> Result<ListenerId, SampleError> {
        Ok(lock(self.scheduler()?.handler()).add_listener(listener))
    }

    /// Removes a previously added listener. Returns false for an unknown
    /// handle.
    pub fn remove_listener(&self, id: ListenerId) -> Result<bool, SampleError> {
        Ok(lock(self.scheduler()?.handler()).remove_listener(id))
    }

    /// Pairs a condition with an action on the running handler.
    pub fn add_condition(
        &self,
        condition: Box<dyn Condition>,
        action: Box<dyn Action>,
    ) -> Result<(), SampleError> {
        lock(self.scheduler()?.handler()).add_condition(condition, action);
        Ok(())
    }

    /// Registers a condition with the default do-nothing action.
    pub fn add_condition_only(&self, condition: Box<dyn Condition>) -> Result<(), SampleError> {
        lock(self.scheduler()?.handler()).add_condition_only(condition);
        Ok(())
    }

    /// Runs one cycle immediately, outside the schedule.
    pub fn run_once(&self) -> Result<(), SampleError> {
        self.scheduler()?.run_once();
        Ok(())
    }

    /// Stops the sampling thread. The sampler cannot be reopened.
    pub fn close(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{CmpOp, NoopAction, SimpleCondition};
    use crate::format::NameValueFormatter;
    use crate::model::{AttrValue, ObjectId};
    use crate::registry::MockRegistry;
    use crate::sink::MemorySink;

    fn config(registry: Arc<MockRegistry>, sink: MemorySink) -> SamplerConfig {
        SamplerConfig {
            name: "Sample".to_string(),
            registry,
            formatter: Box::new(NameValueFormatter::new()),
            sink: Box::new(sink),
            exclude_policy: ExcludePolicy::Always,
            attr_timeout: None,
            source: vec!["factstream".to_string()],
        }
    }

    fn mock_with_counter() -> (Arc<MockRegistry>, ObjectId) {
        let reg = Arc::new(MockRegistry::new());
        let id = ObjectId::parse("app:type=Cache").unwrap();
        reg.add_object(id.clone());
        reg.add_value(&id, "Count", AttrValue::Int(42));
        (reg, id)
    }

    fn long_schedule() -> ScheduleOptions {
        // Initial delay far in the future so tests drive cycles manually.
        ScheduleOptions {
            period: Duration::from_secs(3600),
            initial_delay: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_accessors_require_open() {
        let (reg, _) = mock_with_counter();
        let sampler = Sampler::new(config(reg, MemorySink::new()));
        assert!(matches!(sampler.context(), Err(SampleError::InvalidState(_))));
        assert!(matches!(sampler.reset(), Err(SampleError::InvalidState(_))));
        assert!(matches!(sampler.run_once(), Err(SampleError::InvalidState(_))));
        assert!(matches!(sampler.period(), Err(SampleError::InvalidState(_))));
        assert!(matches!(sampler.include_filter(), Err(SampleError::InvalidState(_))));
    }

    #[test]
    fn test_schedule_and_filters_visible_after_open() {
        let (reg, _) = mock_with_counter();
        let mut sampler = Sampler::new(config(reg, MemorySink::new()));
        let options = long_schedule();
        sampler.open("app:*;db:*", "internal:*", options).unwrap();
        assert_eq!(sampler.period().unwrap(), options.period);
        assert_eq!(sampler.include_filter().unwrap(), "app:*;db:*");
        assert_eq!(sampler.exclude_filter().unwrap(), "internal:*");
    }

    #[test]
    fn test_open_run_close() {
        let (reg, _) = mock_with_counter();
        let sink = MemorySink::new();
        let mut sampler = Sampler::new(config(reg, sink.clone()));
        sampler.open("", "", long_schedule()).unwrap();
        assert!(sampler.is_open());

        sampler.run_once().unwrap();
        sampler.run_once().unwrap();
        assert_eq!(sampler.context().unwrap().sample_count(), 2);
        assert_eq!(sink.len(), 2);

        sampler.close();
        assert!(!sampler.is_open());
    }

    #[test]
    fn test_reopen_rejected() {
        let (reg, _) = mock_with_counter();
        let mut sampler = Sampler::new(config(reg, MemorySink::new()));
        sampler.open("", "", long_schedule()).unwrap();
        assert!(matches!(
            sampler.open("", "", long_schedule()),
            Err(SampleError::InvalidState(_))
        ));
        sampler.close();
        assert!(matches!(
            sampler.open("", "", long_schedule()),
            Err(SampleError::InvalidState(_))
        ));
    }

    #[test]
    fn test_bad_filter_rejected() {
        let (reg, _) = mock_with_counter();
        let mut sampler = Sampler::new(config(reg, MemorySink::new()));
        assert!(matches!(
            sampler.open("app:*;;db:*", "", long_schedule()),
            Err(SampleError::BadFilter(_))
        ));
        // A failed open leaves the sampler usable.
        sampler.open("", "", long_schedule()).unwrap();
        assert!(sampler.is_open());
    }

    #[test]
    fn test_offline_registry_rejected_at_open() {
        let (reg, _) = mock_with_counter();
        reg.set_online(false);
        let mut sampler = Sampler::new(config(reg, MemorySink::new()));
        assert!(matches!(
            sampler.open("", "", long_schedule()),
            Err(SampleError::Connect(_))
        ));
    }

    #[test]
    fn test_condition_added_mid_run() {
        let (reg, _) = mock_with_counter();
        let mut sampler = Sampler::new(config(reg, MemorySink::new()));
        sampler.open("", "", long_schedule()).unwrap();

        sampler.run_once().unwrap();
        sampler
            .add_condition(
                Box::new(SimpleCondition::new("app:type=Cache", "Count", 10.0, CmpOp::Gt)),
                Box::new(NoopAction),
            )
            .unwrap();
        sampler.run_once().unwrap();
        assert_eq!(sampler.context().unwrap().total_action_count(), 1);
    }

    #[test]
    fn test_listener_added_and_removed_through_facade() {
        use std::sync::atomic::{AtomicU64, Ordering};

        use crate::model::Activity;

        struct PreCounter(Arc<AtomicU64>);
        impl SampleListener for PreCounter {
            fn pre(&mut self, _ctx: &SampleContext, _activity: &mut Activity) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (reg, _) = mock_with_counter();
        let mut sampler = Sampler::new(config(reg, MemorySink::new()));
        sampler.open("", "", long_schedule()).unwrap();

        let hits = Arc::new(AtomicU64::new(0));
        let handle = sampler
            .add_listener(Box::new(PreCounter(Arc::clone(&hits))))
            .unwrap();
        sampler.run_once().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(sampler.remove_listener(handle).unwrap());
        sampler.run_once().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_clears_counters() {
        let (reg, _) = mock_with_counter();
        let mut sampler = Sampler::new(config(reg, MemorySink::new()));
        sampler.open("", "", long_schedule()).unwrap();
        sampler.run_once().unwrap();
        assert_eq!(sampler.context().unwrap().sample_count(), 1);
        sampler.reset().unwrap();
        assert_eq!(sampler.context().unwrap().sample_count(), 0);
    }
}
