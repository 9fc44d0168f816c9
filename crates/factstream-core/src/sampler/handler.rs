//! The sampling cycle: discovery, attribute retrieval, failure tracking and
//! condition evaluation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::conditions::{Action, AttributeSample, Condition, NoopAction, attr_key};
use crate::filter::PatternList;
use crate::model::{Activity, AttrValue, ObjectId, ObjectInfo, Snapshot};
use crate::registry::{ObjectRegistry, RegistryError};
use crate::sampler::context::{
    STAT_CONDITION_COUNT, STAT_LAST_METRIC_COUNT, STAT_LISTENER_COUNT, STAT_NOOP_COUNT,
    STAT_OBJECT_COUNT, STAT_SAMPLE_COUNT, STAT_SAMPLE_TIME_USEC, STAT_TOTAL_ACTION_COUNT,
    STAT_TOTAL_ERROR_COUNT, STAT_TOTAL_EXCLUDE_COUNT, STAT_TOTAL_METRIC_COUNT,
};
use crate::sampler::worker::ReadWorker;
use crate::sampler::{SampleContext, SampleListener};

/// Category and name of the statistics snapshot appended to every activity.
pub const STATS_SNAPSHOT_CATEGORY: &str = "Self";
pub const STATS_SNAPSHOT_NAME: &str = "SampleContext";

/// Opaque handle for a registered listener, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

enum AttributeReader {
    Direct(Arc<dyn ObjectRegistry>),
    Timed(ReadWorker),
}

impl AttributeReader {
    fn read(&mut self, id: &ObjectId, attr: &str) -> Result<AttrValue, RegistryError> {
        match self {
            AttributeReader::Direct(registry) => registry.read_attribute(id, attr),
            AttributeReader::Timed(worker) => worker.read(id, attr),
        }
    }
}

/// Runs sampling cycles against one registry.
///
/// Keyed state (known objects, the exclusion set) uses canonical object
/// names so property order never splits an identity. The handler itself is
/// single-threaded; the scheduler serializes access through a mutex.
pub struct SampleHandler {
    name: String,
    registry: Arc<dyn ObjectRegistry>,
    reader: AttributeReader,
    include: PatternList,
    exclude: PatternList,
    source: Vec<String>,
    known: BTreeMap<String, ObjectInfo>,
    excluded: BTreeSet<String>,
    listeners: Vec<(ListenerId, Box<dyn SampleListener>)>,
    next_listener: u64,
    conditions: Vec<(Box<dyn Condition>, Box<dyn Action>)>,
    context: SampleContext,
}

impl SampleHandler {
    pub fn new(
        name: impl Into<String>,
        registry: Arc<dyn ObjectRegistry>,
        include: PatternList,
        exclude: PatternList,
        source: Vec<String>,
        attr_timeout: Option<Duration>,
    ) -> Self {
        let reader = match attr_timeout {
            Some(timeout) => AttributeReader::Timed(ReadWorker::new(Arc::clone(&registry), timeout)),
            None => AttributeReader::Direct(Arc::clone(&registry)),
        };
        Self {
            name: name.into(),
            registry,
            reader,
            include,
            exclude,
            source,
            known: BTreeMap::new(),
            excluded: BTreeSet::new(),
            listeners: Vec::new(),
            next_listener: 0,
            conditions: Vec::new(),
            context: SampleContext::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &SampleContext {
        &self.context
    }

    pub fn include(&self) -> &PatternList {
        &self.include
    }

    pub fn exclude(&self) -> &PatternList {
        &self.exclude
    }

    /// Listeners run in registration order on every hook. The returned
    /// handle removes the listener again.
    pub fn add_listener(&mut self, listener: Box<dyn SampleListener>) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, listener));
        id
    }

    /// Drops a listener; it sees no further hooks. Returns false when the
    /// handle is unknown (already removed).
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Conditions are evaluated in registration order against every
    /// successfully sampled attribute; the paired action fires on match.
    pub fn add_condition(&mut self, condition: Box<dyn Condition>, action: Box<dyn Action>) {
        self.conditions.push((condition, action));
    }

    /// Registers a condition with the default do-nothing action.
    pub fn add_condition_only(&mut self, condition: Box<dyn Condition>) {
        self.conditions.push((condition, Box::new(NoopAction)));
    }

    /// Attribute keys currently dropped from sampling.
    pub fn excluded_attrs(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// Clears all counters and the exclusion set, giving previously broken
    /// attributes another chance.
    pub fn reset(&mut self) {
        self.context.reset();
        self.excluded.clear();
        debug!("sampler '{}' reset", self.name);
    }

    /// Runs one full cycle. Returns the closed activity, or `None` when the
    /// cycle failed at discovery or ended as a no-op.
    pub fn sample_cycle(&mut self) -> Option<Activity> {
        let started = Instant::now();

        let current = match self.discover() {
            Ok(current) => current,
            Err(e) => {
                self.context.total_error_count += 1;
                self.context.last_error = Some(e.to_string());
                for (_, l) in &mut self.listeners {
                    l.cycle_error(&self.context, &e);
                }
                return None;
            }
        };
        self.sync_known(current);
        self.context.last_error = None;

        let mut activity = Activity::open(self.name.clone(), self.source.clone());
        for (_, l) in &mut self.listeners {
            l.pre(&self.context, &mut activity);
        }
        self.context.sample_count += 1;

        let cycle_metrics = self.sample_objects(&mut activity);

        self.context.last_metric_count = cycle_metrics;
        self.context.total_metric_count += cycle_metrics;
        self.context.object_count = self.known.len() as u64;
        self.context.excluded_attr_count = self.excluded.len() as u64;
        self.context.last_sample_usec = started.elapsed().as_micros() as i64;

        for (_, l) in &mut self.listeners {
            l.post(&self.context, &mut activity);
        }

        activity.add_snapshot(self.stats_snapshot());
        activity.close();

        if activity.is_noop() {
            self.context.total_noop_count += 1;
            debug!("sampler '{}' cycle {} was a no-op", self.name, self.context.sample_count);
            return None;
        }
        Some(activity)
    }

    /// Queries the registry and applies both filters. Objects matching the
    /// exclude filter are dropped before identity tracking sees them.
    fn discover(&self) -> Result<BTreeMap<String, ObjectId>, RegistryError> {
        let names = self.registry.query_names(&self.include)?;
        Ok(names
            .into_iter()
            .filter(|id| !self.exclude.matches(id))
            .map(|id| (id.canonical(), id))
            .collect())
    }

    /// Diffs the discovered set against known objects, firing register and
    /// unregister hooks. Metadata for a new object that cannot be described
    /// yet is retried on the next cycle.
    fn sync_known(&mut self, current: BTreeMap<String, ObjectId>) {
        let gone: Vec<String> = self
            .known
            .keys()
            .filter(|canon| !current.contains_key(*canon))
            .cloned()
            .collect();
        for canon in gone {
            if let Some(info) = self.known.remove(&canon) {
                for (_, l) in &mut self.listeners {
                    l.unregister_object(&self.context, &info.id);
                }
            }
        }

        for (canon, id) in current {
            if self.known.contains_key(&canon) {
                continue;
            }
            match self.registry.object_info(&id) {
                Ok(info) => {
                    for (_, l) in &mut self.listeners {
                        l.register_object(&self.context, &id);
                    }
                    self.known.insert(canon, info);
                }
                Err(e) => {
                    self.context.total_error_count += 1;
                    self.context.last_error = Some(e.to_string());
                    warn!("describing {} failed: {}", id, e);
                }
            }
        }
    }

    /// Walks every readable, non-excluded attribute of every known object.
    /// Returns the number of metrics merged into snapshots this cycle.
    fn sample_objects(&mut self, activity: &mut Activity) -> u64 {
        let Self {
            known,
            excluded,
            listeners,
            conditions,
            context,
            reader,
            ..
        } = self;

        let mut cycle_metrics = 0u64;
        for info in known.values() {
            let canon = info.id.canonical();
            let mut snapshot = Snapshot::new(info.id.domain(), info.id.to_string());

            for attr in &info.attrs {
                if !attr.readable || excluded.contains(&attr_key(&canon, &attr.name)) {
                    continue;
                }
                let mut sample = AttributeSample::new(info.id.clone(), attr.clone());

                // A veto keeps the value out of the snapshot; the retrieval
                // itself still happens so failures are tracked uniformly.
                let mut vetoed = false;
                for (_, l) in listeners.iter_mut() {
                    if !l.sample(context, &mut sample) {
                        vetoed = true;
                        break;
                    }
                }

                match reader.read(&info.id, &attr.name) {
                    Ok(value) => {
                        sample.record(value.clone());
                        if vetoed {
                            context.total_noop_count += 1;
                        } else {
                            snapshot.add(attr.name.clone(), value);
                            cycle_metrics += 1;
                        }
                        for (cond, act) in conditions.iter_mut() {
                            if cond.evaluate(&sample) {
                                act.action(context, cond.as_ref(), &sample);
                                context.total_action_count += 1;
                            }
                        }
                    }
                    Err(e) => {
                        context.total_error_count += 1;
                        context.last_error = Some(e.to_string());
                        sample.record_error(e);
                        for (_, l) in listeners.iter_mut() {
                            l.error(context, &mut sample);
                        }
                        if sample.exclude_next() {
                            excluded.insert(sample.attr_key());
                        }
                        context.total_noop_count += 1;
                    }
                }
            }

            if !snapshot.is_empty() {
                activity.add_snapshot(snapshot);
            }
        }
        cycle_metrics
    }

    /// Builds the per-activity statistics snapshot: core counters plus
    /// whatever the listeners contribute.
    fn stats_snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new(STATS_SNAPSHOT_CATEGORY, STATS_SNAPSHOT_NAME);
        let ctx = &self.context;
        snap.add(STAT_SAMPLE_COUNT, ctx.sample_count as i64);
        snap.add(STAT_OBJECT_COUNT, ctx.object_count as i64);
        snap.add(STAT_TOTAL_EXCLUDE_COUNT, ctx.excluded_attr_count as i64);
        snap.add(STAT_TOTAL_METRIC_COUNT, ctx.total_metric_count as i64);
        snap.add(STAT_LAST_METRIC_COUNT, ctx.last_metric_count as i64);
        snap.add(STAT_NOOP_COUNT, ctx.total_noop_count as i64);
        snap.add(STAT_TOTAL_ERROR_COUNT, ctx.total_error_count as i64);
        snap.add(STAT_TOTAL_ACTION_COUNT, ctx.total_action_count as i64);
        snap.add(STAT_CONDITION_COUNT, self.conditions.len() as i64);
        snap.add(STAT_LISTENER_COUNT, self.listeners.len() as i64);
        snap.add(STAT_SAMPLE_TIME_USEC, ctx.last_sample_usec);

        let mut extra = BTreeMap::new();
        for (_, l) in &self.listeners {
            l.stats(&self.context, &mut extra);
        }
        for (key, value) in extra {
            snap.add(key, AttrValue::Str(value));
        }
        snap
    }
}
