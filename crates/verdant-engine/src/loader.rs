//! Stage loading phase.
//!
//! Stage geometry is produced by an external loader, normalized, and handed
//! to the bloom effect before its first tick. Loading runs on a worker thread
//! and reports back over a channel; the frame loop never waits on I/O.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, error, info, warn};
use verdant_common::LoadError;
use verdant_kernel::{GeometryNormalizer, RawGeometry, Stage, StageSet};

use crate::lifecycle::LifecycleListener;

/// Events in flight between the worker and the host.
const EVENT_CAPACITY: usize = 64;

/// Produces raw stage geometry.
pub trait StageSource: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Number of stages this source provides.
    fn stage_count(&self) -> usize;

    /// Loads one stage.
    fn load_stage(&mut self, index: usize) -> Result<RawGeometry, LoadError>;
}

/// Worker to host messages.
#[derive(Debug)]
pub enum LoadEvent {
    /// Overall progress in percent
    Progress {
        /// Stages attempted so far, as a percentage
        percent: f32,
    },
    /// A stage was loaded and normalized
    StageLoaded {
        /// Stage index
        index: usize,
        /// Normalized geometry
        stage: Stage,
    },
    /// A stage could not be loaded
    StageFailed {
        /// Stage index
        index: usize,
        /// Failure reason
        error: LoadError,
    },
    /// No further events follow
    Finished,
}

/// Result of a completed loading phase.
#[derive(Debug)]
pub struct LoadOutcome {
    /// Loaded stages; failed slots stay empty
    pub stages: StageSet,
    /// Stages that failed, with reasons
    pub failures: Vec<(usize, LoadError)>,
}

impl LoadOutcome {
    /// Whether every stage loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.stages.loaded_count() == self.stages.len()
    }
}

/// Handle to a loading phase running on a worker thread.
pub struct StageLoader {
    name: String,
    receiver: Receiver<LoadEvent>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    stages: StageSet,
    failures: Vec<(usize, LoadError)>,
    finished: bool,
}

impl StageLoader {
    /// Starts loading every stage of `source` in the background.
    pub fn spawn(source: Box<dyn StageSource>, normalizer: GeometryNormalizer) -> io::Result<Self> {
        let name = source.name().to_string();
        let count = source.stage_count();
        let (sender, receiver) = bounded(EVENT_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("stage-loader-{name}"))
            .spawn(move || {
                let mut source = source;
                run_worker(source.as_mut(), normalizer, &sender, &flag);
            })?;

        info!("Loading {} stages from {}", count, name);

        Ok(Self {
            name,
            receiver,
            cancel,
            handle: Some(handle),
            stages: StageSet::with_slots(count),
            failures: Vec::new(),
            finished: false,
        })
    }

    /// Source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker has reported completion.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Asks the worker to stop after the stage in progress.
    pub fn cancel(&self) {
        debug!("Cancelling stage loading for {}", self.name);
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Handles every event already delivered, without blocking.
    ///
    /// Returns true once loading has finished.
    pub fn poll(&mut self, listener: &dyn LifecycleListener) -> bool {
        while !self.finished {
            match self.receiver.try_recv() {
                Ok(event) => self.handle_event(event, listener),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.worker_lost(listener),
            }
        }
        self.finished
    }

    /// Blocks until loading finishes.
    pub fn wait(mut self, listener: &dyn LifecycleListener) -> LoadOutcome {
        while !self.finished {
            match self.receiver.recv() {
                Ok(event) => self.handle_event(event, listener),
                Err(_) => self.worker_lost(listener),
            }
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Stage loader thread for {} panicked", self.name);
            }
        }

        info!(
            "Loaded {}/{} stages from {}",
            self.stages.loaded_count(),
            self.stages.len(),
            self.name
        );

        LoadOutcome {
            stages: std::mem::take(&mut self.stages),
            failures: std::mem::take(&mut self.failures),
        }
    }

    fn handle_event(&mut self, event: LoadEvent, listener: &dyn LifecycleListener) {
        match event {
            LoadEvent::Progress { percent } => listener.on_progress(percent),
            LoadEvent::StageLoaded { index, stage } => self.stages.insert(index, stage),
            LoadEvent::StageFailed { index, error } => {
                warn!("Stage {} of {} failed to load: {}", index, self.name, error);
                listener.on_error(&format!("{}: stage {index}: {error}", self.name));
                self.failures.push((index, error));
            },
            LoadEvent::Finished => self.finished = true,
        }
    }

    fn worker_lost(&mut self, listener: &dyn LifecycleListener) {
        error!("Stage loader for {} stopped without finishing", self.name);
        listener.on_error(&format!("{}: loader stopped unexpectedly", self.name));
        self.finished = true;
    }
}

impl Drop for StageLoader {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.store(true, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for StageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageLoader")
            .field("name", &self.name)
            .field("loaded", &self.stages.loaded_count())
            .field("failures", &self.failures.len())
            .field("finished", &self.finished)
            .finish()
    }
}

fn run_worker(
    source: &mut dyn StageSource,
    normalizer: GeometryNormalizer,
    sender: &Sender<LoadEvent>,
    cancel: &AtomicBool,
) {
    let count = source.stage_count();
    for index in 0..count {
        if cancel.load(Ordering::Relaxed) {
            let _ = sender.send(LoadEvent::StageFailed {
                index,
                error: LoadError::Cancelled,
            });
            break;
        }

        let event = match source
            .load_stage(index)
            .and_then(|raw| normalizer.normalize(index, raw))
        {
            Ok(stage) => LoadEvent::StageLoaded { index, stage },
            Err(error) => LoadEvent::StageFailed { index, error },
        };
        // Host gone: nothing left to report to
        if sender.send(event).is_err() {
            return;
        }

        let percent = (index + 1) as f32 / count as f32 * 100.0;
        if sender.send(LoadEvent::Progress { percent }).is_err() {
            return;
        }
    }
    let _ = sender.send(LoadEvent::Finished);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LoadStatus, StatusListener};
    use crossbeam_channel::unbounded;
    use glam::Vec3;

    struct FixtureSource {
        count: usize,
        missing: Vec<usize>,
        gate: Option<Receiver<()>>,
    }

    impl StageSource for FixtureSource {
        fn name(&self) -> &str {
            "fixture"
        }

        fn stage_count(&self) -> usize {
            self.count
        }

        fn load_stage(&mut self, index: usize) -> Result<RawGeometry, LoadError> {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            if self.missing.contains(&index) {
                return Err(LoadError::SourceMissing(format!("stage-{index}.ply")));
            }
            let scale = (index + 1) as f32 * 10.0;
            Ok(RawGeometry::from_positions(vec![
                Vec3::ZERO,
                Vec3::new(scale, scale * 2.0, 0.0),
                Vec3::new(0.0, scale, scale),
            ]))
        }
    }

    fn fixture(count: usize, missing: Vec<usize>) -> Box<dyn StageSource> {
        Box::new(FixtureSource {
            count,
            missing,
            gate: None,
        })
    }

    #[test]
    fn test_all_stages_load_and_normalize() {
        let listener = StatusListener::new();
        let loader = StageLoader::spawn(fixture(4, Vec::new()), GeometryNormalizer::new(10.0))
            .expect("spawn loader");
        let outcome = loader.wait(&listener);

        assert!(outcome.is_complete());
        assert_eq!(outcome.stages.loaded_count(), 4);
        for index in 0..4 {
            let stage = outcome.stages.get(index).expect("stage loaded");
            let height = stage.positions().iter().map(|p| p.y).fold(f32::MIN, f32::max)
                - stage.positions().iter().map(|p| p.y).fold(f32::MAX, f32::min);
            assert!((height - 10.0).abs() < 1e-3);
        }
        let status = listener.snapshot();
        assert!((status.percent - 100.0).abs() < f32::EPSILON);
        assert_eq!(status.status, LoadStatus::Loading);
        assert!(status.errors.is_empty());
    }

    #[test]
    fn test_failed_stage_stays_absent() {
        let listener = StatusListener::new();
        let loader = StageLoader::spawn(fixture(4, vec![2]), GeometryNormalizer::default())
            .expect("spawn loader");
        let outcome = loader.wait(&listener);

        assert!(!outcome.is_complete());
        assert_eq!(outcome.stages.loaded_count(), 3);
        assert!(outcome.stages.get(2).is_none());
        assert_eq!(
            outcome.failures,
            vec![(2, LoadError::SourceMissing("stage-2.ply".to_string()))]
        );
        assert_eq!(listener.snapshot().errors.len(), 1);
    }

    #[test]
    fn test_poll_until_finished() {
        let listener = StatusListener::new();
        let mut loader = StageLoader::spawn(fixture(3, Vec::new()), GeometryNormalizer::default())
            .expect("spawn loader");

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while !loader.poll(&listener) {
            assert!(std::time::Instant::now() < deadline, "loader never finished");
            std::thread::yield_now();
        }
        assert!(loader.is_finished());
        assert_eq!(loader.wait(&listener).stages.loaded_count(), 3);
    }

    #[test]
    fn test_cancel_stops_after_current_stage() {
        let (release, gate) = unbounded();
        let source = Box::new(FixtureSource {
            count: 4,
            missing: Vec::new(),
            gate: Some(gate),
        });
        let listener = StatusListener::new();
        let loader = StageLoader::spawn(source, GeometryNormalizer::default()).expect("spawn loader");

        loader.cancel();
        for _ in 0..4 {
            let _ = release.send(());
        }
        let outcome = loader.wait(&listener);

        assert!(outcome.stages.loaded_count() <= 1);
        assert!(outcome
            .failures
            .iter()
            .any(|(_, error)| *error == LoadError::Cancelled));
    }

    #[test]
    fn test_empty_source_finishes() {
        let listener = StatusListener::new();
        let loader = StageLoader::spawn(fixture(0, Vec::new()), GeometryNormalizer::default())
            .expect("spawn loader");
        let outcome = loader.wait(&listener);
        assert!(outcome.stages.is_empty());
        assert!(outcome.is_complete());
    }
}
