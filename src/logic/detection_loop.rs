//! Detection Loop Controller
//!
//! Owns at most one background detection run. `start` and `stop` are
//! idempotent and serialized by a single lock, so racing start requests
//! spawn one loop. The run threads never take that lock; `stop` can join
//! while holding it.
//!
//! A run is two threads:
//! - loop: packet -> transform -> ensemble -> enqueue -> wait
//! - dispatcher: bounded queue -> `ResultEmitter::publish`
//!
//! The loop only ever `try_send`s into the queue, so a slow or stuck sink
//! costs dropped events, never loop cadence.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc as queue;

use crate::constants::{DEFAULT_EMITTER_CAPACITY, DISPATCH_GRACE_MS};
use crate::logic::artifacts::ArtifactStore;
use crate::logic::error::{panic_message, LoopFatalError};
use crate::logic::events::{ResultEmitter, StreamEvent};
use crate::logic::features::{PacketSource, SyntheticSource};

// ============================================================================
// STATE
// ============================================================================

enum LoopState {
    Stopped,
    Running(RunHandle),
}

/// Handle to the live run
struct RunHandle {
    /// Dropping the sender is the stop signal
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    dispatch: DispatchHandle,
}

impl RunHandle {
    fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Signal and wait for the loop to exit, then close the dispatcher
    fn shutdown(self) {
        drop(self.stop_tx);
        if self.thread.join().is_err() {
            log::error!("Detection loop thread panicked");
        }
        self.dispatch.close();
    }
}

/// Handle to the dispatcher thread of one run
struct DispatchHandle {
    /// While true, queued events may still be delivered
    open: Arc<Mutex<bool>>,
    /// Disconnects when the dispatcher exits
    done_rx: mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

impl DispatchHandle {
    /// No delivery starts after this returns. A sink call already in flight
    /// gets a short grace period, after which the thread is detached.
    fn close(self) {
        *self.open.lock() = false;

        match self.done_rx.recv_timeout(Duration::from_millis(DISPATCH_GRACE_MS)) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if self.thread.join().is_err() {
                    log::error!("Event dispatcher thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Result sink still busy after {}ms, detaching dispatcher", DISPATCH_GRACE_MS);
            }
        }
    }
}

/// Counters updated by the run threads
#[derive(Debug, Default)]
struct LoopStats {
    runs_started: AtomicU64,
    iterations: AtomicU64,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Engine status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    pub runs_started: u64,
    pub iterations: u64,
    /// Events handed to the sink
    pub events_published: u64,
    /// Events lost to a full dispatch queue or a panicking sink
    pub events_dropped: u64,
    pub interval_ms: u64,
    pub models: Vec<String>,
    pub last_error: Option<String>,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct DetectionController {
    store: Arc<ArtifactStore>,
    source: Arc<Mutex<Box<dyn PacketSource>>>,
    emitter: Arc<dyn ResultEmitter>,
    interval: Duration,
    dispatch_capacity: usize,
    state: Mutex<LoopState>,
    stats: Arc<LoopStats>,
}

impl DetectionController {
    /// Controller that synthesizes its own packets
    pub fn new(store: Arc<ArtifactStore>, emitter: Arc<dyn ResultEmitter>, interval: Duration) -> Self {
        let source = SyntheticSource::new(&store);
        Self::with_source(store, Box::new(source), emitter, interval)
    }

    /// Controller reading packets from an explicit source
    pub fn with_source(
        store: Arc<ArtifactStore>,
        source: Box<dyn PacketSource>,
        emitter: Arc<dyn ResultEmitter>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            source: Arc::new(Mutex::new(source)),
            emitter,
            interval,
            dispatch_capacity: DEFAULT_EMITTER_CAPACITY,
            state: Mutex::new(LoopState::Stopped),
            stats: Arc::new(LoopStats::default()),
        }
    }

    /// Events buffered between the loop and the sink
    pub fn with_dispatch_capacity(mut self, capacity: usize) -> Self {
        self.dispatch_capacity = capacity.max(1);
        self
    }

    /// Stopped -> Running. No-op while a loop is alive.
    pub fn start(&self) {
        let mut state = self.state.lock();

        if let LoopState::Running(run) = &*state {
            if run.is_alive() {
                log::debug!("Detection loop already running");
                return;
            }
        }

        // Reap a run that ended on a fatal error
        if let LoopState::Running(run) = std::mem::replace(&mut *state, LoopState::Stopped) {
            run.shutdown();
        }

        let (event_tx, event_rx) = queue::channel(self.dispatch_capacity);
        let dispatch = match self.spawn_dispatcher(event_rx) {
            Ok(dispatch) => dispatch,
            Err(e) => {
                log::error!("Failed to spawn event dispatcher: {}", e);
                *self.stats.last_error.lock() = Some(e.to_string());
                return;
            }
        };

        let (stop_tx, stop_rx) = mpsc::channel();
        let worker = LoopWorker {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            events: event_tx,
            interval: self.interval,
            stats: Arc::clone(&self.stats),
            stop_rx,
        };

        match thread::Builder::new()
            .name("detection-loop".to_string())
            .spawn(move || worker.run())
        {
            Ok(thread) => {
                self.stats.runs_started.fetch_add(1, Ordering::SeqCst);
                *self.stats.last_error.lock() = None;
                *state = LoopState::Running(RunHandle { stop_tx, thread, dispatch });
            }
            Err(e) => {
                log::error!("Failed to spawn detection loop: {}", e);
                *self.stats.last_error.lock() = Some(e.to_string());
                // The worker, and with it the queue sender, is gone
                dispatch.close();
            }
        }
    }

    fn spawn_dispatcher(&self, events: queue::Receiver<StreamEvent>) -> std::io::Result<DispatchHandle> {
        let open = Arc::new(Mutex::new(true));
        let (done_tx, done_rx) = mpsc::channel();
        let dispatcher = Dispatcher {
            events,
            emitter: Arc::clone(&self.emitter),
            open: Arc::clone(&open),
            stats: Arc::clone(&self.stats),
            _done: done_tx,
        };

        let thread = thread::Builder::new()
            .name("event-dispatch".to_string())
            .spawn(move || dispatcher.run())?;

        Ok(DispatchHandle { open, done_rx, thread })
    }

    /// Running -> Stopped. Returns once the loop thread has exited.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let LoopState::Running(run) = std::mem::replace(&mut *state, LoopState::Stopped) {
            run.shutdown();
            log::info!("Detection loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.state.lock(), LoopState::Running(run) if run.is_alive())
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.is_running(),
            runs_started: self.stats.runs_started.load(Ordering::SeqCst),
            iterations: self.stats.iterations.load(Ordering::SeqCst),
            events_published: self.stats.events_published.load(Ordering::SeqCst),
            events_dropped: self.stats.events_dropped.load(Ordering::SeqCst),
            interval_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            models: self.store.model_names().iter().map(|s| s.to_string()).collect(),
            last_error: self.stats.last_error.lock().clone(),
        }
    }
}

impl Drop for DetectionController {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// LOOP
// ============================================================================

struct LoopWorker {
    store: Arc<ArtifactStore>,
    source: Arc<Mutex<Box<dyn PacketSource>>>,
    events: queue::Sender<StreamEvent>,
    interval: Duration,
    stats: Arc<LoopStats>,
    stop_rx: mpsc::Receiver<()>,
}

impl LoopWorker {
    fn run(self) {
        log::info!(
            "Detection loop started (interval: {}ms, models: {})",
            self.interval.as_millis(),
            self.store.models().len()
        );

        loop {
            if self.stop_requested() {
                break;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.iterate()))
                .unwrap_or_else(|payload| Err(LoopFatalError::Panicked(panic_message(&*payload))));

            if let Err(e) = outcome {
                log::error!("Detection loop aborted: {}", e);
                *self.stats.last_error.lock() = Some(e.to_string());
                return;
            }

            match self.stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }

        log::debug!("Detection loop exiting on stop request");
    }

    fn stop_requested(&self) -> bool {
        !matches!(self.stop_rx.try_recv(), Err(TryRecvError::Empty))
    }

    fn iterate(&self) -> Result<(), LoopFatalError> {
        self.stats.iterations.fetch_add(1, Ordering::SeqCst);

        let Some(packet) = self.source.lock().next_packet()? else {
            return Ok(());
        };

        let results = crate::logic::process_packet(&packet, &self.store)?;
        if let Err(e) = self.events.try_send(StreamEvent::now(results)) {
            self.stats.events_dropped.fetch_add(1, Ordering::SeqCst);
            match e {
                queue::error::TrySendError::Full(_) => log::warn!("Result sink behind, dropping event"),
                queue::error::TrySendError::Closed(_) => log::debug!("Dispatcher gone, dropping event"),
            }
        }

        Ok(())
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

struct Dispatcher {
    events: queue::Receiver<StreamEvent>,
    emitter: Arc<dyn ResultEmitter>,
    open: Arc<Mutex<bool>>,
    stats: Arc<LoopStats>,
    /// Dropped on exit, which tells `DispatchHandle::close` we are done
    _done: mpsc::Sender<()>,
}

impl Dispatcher {
    fn run(mut self) {
        // Ends when the loop drops its sender and the queue is drained
        while let Some(event) = self.events.blocking_recv() {
            if !*self.open.lock() {
                break;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| self.emitter.publish(event))) {
                Ok(()) => {
                    self.stats.events_published.fetch_add(1, Ordering::SeqCst);
                }
                Err(payload) => {
                    self.stats.events_dropped.fetch_add(1, Ordering::SeqCst);
                    log::error!("Result sink panicked: {}", panic_message(&*payload));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::time::Instant;
    use crate::logic::artifacts::{FittedNormalizer, WeightTable};
    use crate::logic::events::ChannelEmitter;
    use crate::logic::features::{ChannelSource, FeatureVector};
    use crate::logic::model::RegisteredModel;
    use crate::logic::testing::{self, CountingModel, PanickingModel, StubModel};

    const FAST: Duration = Duration::from_millis(10);

    /// Sink that takes `delay` per event
    struct SlowSink {
        delay: Duration,
        calls: AtomicU64,
    }

    impl ResultEmitter for SlowSink {
        fn publish(&self, _event: StreamEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
        }
    }

    struct PanickingSink;

    impl ResultEmitter for PanickingSink {
        fn publish(&self, _event: StreamEvent) {
            panic!("sink exploded")
        }
    }

    struct PanickingSource;

    impl PacketSource for PanickingSource {
        fn next_packet(&mut self) -> Result<Option<FeatureVector>, LoopFatalError> {
            panic!("capture buffer corrupted")
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let (emitter, _rx) = ChannelEmitter::bounded(8);
        let controller = DetectionController::new(testing::stub_store(&[0.2]), Arc::new(emitter), FAST);

        controller.stop();
        controller.stop();
        assert!(!controller.is_running());
        assert_eq!(controller.status().runs_started, 0);
    }

    #[test]
    fn test_start_emits_events() {
        let (emitter, mut rx) = ChannelEmitter::bounded(64);
        let controller = DetectionController::new(
            testing::stub_store(&[0.2, 0.5, 0.51, 0.99]),
            Arc::new(emitter),
            FAST,
        );

        controller.start();
        assert!(controller.is_running());
        assert!(wait_until(|| controller.status().events_published >= 3));
        controller.stop();

        let event = rx.try_recv().unwrap();
        let names: Vec<_> = event.results.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(names, vec!["Model 1", "Model 2", "Model 3", "Model 4"]);
        assert_eq!(event.malicious_count(), 2);
    }

    #[test]
    fn test_concurrent_start_spawns_one_loop() {
        let (emitter, _rx) = ChannelEmitter::bounded(256);
        let controller = Arc::new(DetectionController::new(
            testing::stub_store(&[0.7]),
            Arc::new(emitter),
            FAST,
        ));

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = Arc::clone(&controller);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    controller.start();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(controller.is_running());
        assert_eq!(controller.status().runs_started, 1);
        controller.stop();
        assert!(!controller.is_running());
    }

    #[test]
    fn test_no_events_after_stop_returns() {
        let calls = CountingModel::default();
        let store = Arc::new(testing::store_with(vec![RegisteredModel::new("Model 1", calls.clone())]));
        let (emitter, mut rx) = ChannelEmitter::bounded(1024);
        let controller = DetectionController::new(store, Arc::new(emitter), Duration::from_millis(1));

        controller.start();
        assert!(wait_until(|| calls.0.load(Ordering::SeqCst) >= 5));
        controller.stop();

        let published = controller.status().events_published;
        let predictions = calls.0.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));

        assert_eq!(controller.status().events_published, published);
        assert_eq!(calls.0.load(Ordering::SeqCst), predictions);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received as u64, published);
    }

    #[test]
    fn test_restart_after_stop() {
        let (emitter, _rx) = ChannelEmitter::bounded(256);
        let controller = DetectionController::new(testing::stub_store(&[0.4]), Arc::new(emitter), FAST);

        controller.start();
        controller.stop();
        controller.start();
        assert!(controller.is_running());
        assert_eq!(controller.status().runs_started, 2);
    }

    #[test]
    fn test_transform_error_stops_loop() {
        let store = Arc::new(
            ArtifactStore::from_parts(
                WeightTable::new(vec![("Flow Bytes/s".to_string(), 1e308)]).unwrap(),
                FittedNormalizer::Identity { dimension: 1 },
                vec!["Flow Bytes/s".to_string()],
                vec![RegisteredModel::new("Model 1", StubModel(0.9))],
            )
            .unwrap(),
        );
        let (feed, source) = ChannelSource::bounded(4);
        let (emitter, _rx) = ChannelEmitter::bounded(8);
        let controller = DetectionController::with_source(store, Box::new(source), Arc::new(emitter), FAST);

        controller.start();
        let overflow: FeatureVector = [("Flow Bytes/s", 1e308)].into_iter().collect();
        assert!(feed.submit(overflow));

        assert!(wait_until(|| !controller.is_running()));
        let status = controller.status();
        assert_eq!(status.events_published, 0);
        assert!(status.last_error.unwrap().contains("not finite"));

        // A fresh start is required and allowed
        controller.start();
        assert!(controller.is_running());
        assert_eq!(controller.status().runs_started, 2);
    }

    #[test]
    fn test_closed_feed_stops_loop() {
        let (feed, source) = ChannelSource::bounded(1);
        let (emitter, _rx) = ChannelEmitter::bounded(8);
        let controller = DetectionController::with_source(
            testing::stub_store(&[0.1]),
            Box::new(source),
            Arc::new(emitter),
            FAST,
        );

        drop(feed);
        controller.start();
        assert!(wait_until(|| !controller.is_running()));
        assert_eq!(controller.status().last_error.as_deref(), Some("packet source closed"));
    }

    #[test]
    fn test_panicking_model_keeps_loop_alive() {
        let store = Arc::new(testing::store_with(vec![
            RegisteredModel::new("Model 1", StubModel(0.9)),
            RegisteredModel::new("Model 2", PanickingModel),
        ]));
        let (emitter, mut rx) = ChannelEmitter::bounded(64);
        let controller = DetectionController::new(store, Arc::new(emitter), FAST);

        controller.start();
        assert!(wait_until(|| controller.status().events_published >= 2));
        assert!(controller.is_running());
        controller.stop();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.results.len(), 2);
        assert!(event.results[0].verdict.is_malicious());
        assert!(event.results[1].is_failed());
        assert_eq!(controller.status().last_error, None);
    }

    #[test]
    fn test_panicking_source_is_reported() {
        let (emitter, _rx) = ChannelEmitter::bounded(8);
        let controller = DetectionController::with_source(
            testing::stub_store(&[0.3]),
            Box::new(PanickingSource),
            Arc::new(emitter),
            FAST,
        );

        controller.start();
        assert!(wait_until(|| !controller.is_running()));

        let last_error = controller.status().last_error.unwrap();
        assert!(last_error.contains("panicked"));
        assert!(last_error.contains("capture buffer corrupted"));
    }

    #[test]
    fn test_panicking_sink_does_not_stop_loop() {
        let controller = DetectionController::new(testing::stub_store(&[0.3]), Arc::new(PanickingSink), FAST);

        controller.start();
        assert!(wait_until(|| controller.status().events_dropped >= 3));
        assert!(controller.is_running());
        controller.stop();

        let status = controller.status();
        assert_eq!(status.events_published, 0);
        assert_eq!(status.last_error, None);
    }

    #[test]
    fn test_slow_sink_does_not_block_loop_or_stop() {
        let sink = Arc::new(SlowSink { delay: Duration::from_secs(2), calls: AtomicU64::new(0) });
        let controller = DetectionController::new(testing::stub_store(&[0.6]), sink.clone(), Duration::from_millis(5))
            .with_dispatch_capacity(2);

        controller.start();
        // The sink is still inside its first call while the loop keeps its cadence
        assert!(wait_until(|| controller.status().iterations >= 10));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

        let begin = Instant::now();
        controller.stop();
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert!(!controller.is_running());
        assert!(controller.status().events_dropped > 0);

        // Queued events are discarded, not delivered later
        thread::sleep(Duration::from_millis(2_500));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let (emitter, _rx) = ChannelEmitter::bounded(8);
        let controller = DetectionController::new(
            testing::stub_store(&[0.2]),
            Arc::new(emitter),
            Duration::from_secs(60),
        );

        controller.start();
        assert!(wait_until(|| controller.status().events_published >= 1));

        let begin = Instant::now();
        controller.stop();
        assert!(begin.elapsed() < Duration::from_millis(500));
        assert_eq!(controller.status().iterations, 1);
    }

    #[test]
    fn test_status_interval_saturates() {
        let (emitter, _rx) = ChannelEmitter::bounded(1);
        let controller = DetectionController::new(testing::stub_store(&[0.2]), Arc::new(emitter), Duration::MAX);
        assert_eq!(controller.status().interval_ms, u64::MAX);
    }
}
