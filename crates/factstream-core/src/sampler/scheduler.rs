//! Fixed-period driver: runs cycles on a background thread and pushes
//! formatted activities into the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::format::FactFormatter;
use crate::sampler::handler::SampleHandler;
use crate::sampler::SampleError;
use crate::sink::FactSink;

/// How the scheduler paces cycles: a fixed delay between cycle starts,
/// after an optional initial delay.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleOptions {
    pub period: Duration,
    pub initial_delay: Duration,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            initial_delay: Duration::ZERO,
        }
    }
}

/// Formatter and sink, swapped and written as a unit.
pub struct Output {
    pub formatter: Box<dyn FactFormatter>,
    pub sink: Box<dyn FactSink>,
}

/// Owns the sampling thread for one handler.
///
/// The handler sits behind a mutex so listeners and conditions can be added
/// while the thread runs; additions take effect on the next cycle.
pub struct Scheduler {
    name: String,
    handler: Arc<Mutex<SampleHandler>>,
    output: Arc<Mutex<Output>>,
    options: Option<ScheduleOptions>,
    stop: Option<Arc<AtomicBool>>,
    thread: Option<JoinHandle<()>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sleeps in short slices so a stop request is honored promptly. Returns
/// false when stopped mid-sleep.
fn sleep_interruptible(total: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(Duration::from_millis(25)));
    }
}

fn run_cycle(handler: &Mutex<SampleHandler>, output: &Mutex<Output>) {
    let activity = lock(handler).sample_cycle();
    if let Some(activity) = activity {
        let mut out = lock(output);
        let block = out.formatter.format_activity(&activity);
        if let Err(e) = out
            .sink
            .write_block(&block)
            .and_then(|()| out.sink.flush())
        {
            warn!("writing sampled facts failed: {}", e);
        }
    }
}

impl Scheduler {
    pub fn new(
        name: impl Into<String>,
        handler: SampleHandler,
        formatter: Box<dyn FactFormatter>,
        sink: Box<dyn FactSink>,
    ) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(Mutex::new(handler)),
            output: Arc::new(Mutex::new(Output { formatter, sink })),
            options: None,
            stop: None,
            thread: None,
        }
    }

    /// Shared handle to the handler, for counters, listeners and conditions.
    pub fn handler(&self) -> &Arc<Mutex<SampleHandler>> {
        &self.handler
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// The schedule in effect, set when the thread starts.
    pub fn options(&self) -> Option<ScheduleOptions> {
        self.options
    }

    /// Runs one cycle on the calling thread, independent of the schedule.
    pub fn run_once(&self) {
        run_cycle(&self.handler, &self.output);
    }

    /// Spawns the sampling thread.
    pub fn start(&mut self, options: ScheduleOptions) -> Result<(), SampleError> {
        if self.thread.is_some() {
            return Err(SampleError::InvalidState("scheduler already running"));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handler = Arc::clone(&self.handler);
        let output = Arc::clone(&self.output);
        let name = self.name.clone();

        let thread = thread::Builder::new()
            .name(format!("factstream-{}", name))
            .spawn(move || {
                debug!(
                    "scheduler '{}' started, period {:?}, initial delay {:?}",
                    name, options.period, options.initial_delay
                );
                if !sleep_interruptible(options.initial_delay, &flag) {
                    return;
                }
                loop {
                    run_cycle(&handler, &output);
                    if !sleep_interruptible(options.period, &flag) {
                        debug!("scheduler '{}' stopped", name);
                        return;
                    }
                }
            })
            .map_err(|e| {
                warn!("failed to spawn scheduler thread: {}", e);
                SampleError::InvalidState("could not spawn scheduler thread")
            })?;

        self.options = Some(options);
        self.stop = Some(stop);
        self.thread = Some(thread);
        Ok(())
    }

    /// Signals the thread and waits for it to finish the current cycle.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("scheduler '{}' thread panicked", self.name);
            } else {
                info!("scheduler '{}' stopped", self.name);
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PatternList;
    use crate::format::NameValueFormatter;
    use crate::model::{AttrValue, ObjectId};
    use crate::registry::MockRegistry;
    use crate::sampler::DefaultSampleListener;
    use crate::sink::MemorySink;

    fn scheduler_with_mock() -> (Scheduler, MemorySink) {
        let reg = Arc::new(MockRegistry::new());
        let id = ObjectId::parse("app:type=Cache").unwrap();
        reg.add_object(id.clone());
        reg.add_value(&id, "Count", AttrValue::Int(42));

        let mut handler = SampleHandler::new(
            "Sample",
            reg,
            PatternList::match_all(),
            PatternList::default(),
            vec!["factstream".to_string()],
            None,
        );
        handler.add_listener(Box::new(DefaultSampleListener::default()));

        let sink = MemorySink::new();
        let scheduler = Scheduler::new(
            "test",
            handler,
            Box::new(NameValueFormatter::new()),
            Box::new(sink.clone()),
        );
        (scheduler, sink)
    }

    #[test]
    fn test_periodic_cycles_reach_sink() {
        let (mut scheduler, sink) = scheduler_with_mock();
        scheduler
            .start(ScheduleOptions {
                period: Duration::from_millis(10),
                initial_delay: Duration::ZERO,
            })
            .unwrap();
        thread::sleep(Duration::from_millis(120));
        scheduler.stop();

        let blocks = sink.blocks();
        assert!(blocks.len() >= 2, "expected at least 2 blocks, got {}", blocks.len());
        assert!(blocks[0].starts_with("OBJ:Streams\\factstream\\Activities,"));
        assert!(blocks[0].contains("app:type\\Cache\\Count=42,"));
        assert!(blocks[0].ends_with('\n'));

        // No more blocks arrive after stop.
        let frozen = sink.len();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sink.len(), frozen);
    }

    #[test]
    fn test_double_start_rejected() {
        let (mut scheduler, _sink) = scheduler_with_mock();
        scheduler.start(ScheduleOptions::default()).unwrap();
        assert!(matches!(
            scheduler.start(ScheduleOptions::default()),
            Err(SampleError::InvalidState(_))
        ));
        scheduler.stop();
    }

    #[test]
    fn test_run_once_without_schedule() {
        let (scheduler, sink) = scheduler_with_mock();
        scheduler.run_once();
        scheduler.run_once();
        assert_eq!(sink.len(), 2);
        assert_eq!(lock(scheduler.handler()).context().sample_count(), 2);
    }

    #[test]
    fn test_initial_delay_defers_first_cycle() {
        let (mut scheduler, sink) = scheduler_with_mock();
        scheduler
            .start(ScheduleOptions {
                period: Duration::from_millis(10),
                initial_delay: Duration::from_millis(200),
            })
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(sink.is_empty());
        scheduler.stop();
    }
}
