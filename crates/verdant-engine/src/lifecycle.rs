//! Experience lifecycle notifications.
//!
//! Loading reports progress and per-stage failures; the experience reports
//! ready once its render buffer exists and the first frame is safe to draw.
//! Simulation itself never reports errors.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};

/// Receives lifecycle callbacks for one experience.
pub trait LifecycleListener: Send + Sync {
    /// Loading progress in percent, `0..=100`.
    fn on_progress(&self, percent: f32);
    /// Buffers are built and the first frame is safe to render.
    fn on_ready(&self);
    /// An unrecoverable load failure. The affected layer stays absent.
    fn on_error(&self, message: &str);
}

/// Load status of an experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    /// Not yet started
    #[default]
    NotLoaded,
    /// Currently loading
    Loading,
    /// Ready to render
    Ready,
    /// Nothing could be loaded
    Failed,
}

/// Snapshot of what a [`StatusListener`] has seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceStatus {
    /// Current status
    pub status: LoadStatus,
    /// Last reported progress
    pub percent: f32,
    /// Error messages in arrival order
    pub errors: Vec<String>,
}

/// Logs every callback through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    name: String,
}

impl LoggingListener {
    /// Creates a listener that tags messages with `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LifecycleListener for LoggingListener {
    fn on_progress(&self, percent: f32) {
        info!("[{}] loading {:.0}%", self.name, percent);
    }

    fn on_ready(&self) {
        info!("[{}] ready", self.name);
    }

    fn on_error(&self, message: &str) {
        error!("[{}] load failed: {}", self.name, message);
    }
}

/// Records callbacks into shared state that other systems can read.
#[derive(Debug, Clone, Default)]
pub struct StatusListener {
    state: Arc<RwLock<ExperienceStatus>>,
}

impl StatusListener {
    /// Creates a listener with an empty status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> ExperienceStatus {
        self.state.read().clone()
    }

    /// Marks the end of a load in which nothing usable arrived.
    pub fn mark_failed(&self) {
        self.state.write().status = LoadStatus::Failed;
    }
}

impl LifecycleListener for StatusListener {
    fn on_progress(&self, percent: f32) {
        let mut state = self.state.write();
        state.status = LoadStatus::Loading;
        state.percent = percent.clamp(0.0, 100.0);
    }

    fn on_ready(&self) {
        let mut state = self.state.write();
        state.status = LoadStatus::Ready;
        state.percent = 100.0;
    }

    fn on_error(&self, message: &str) {
        self.state.write().errors.push(message.to_string());
    }
}

/// Forwards every callback to several listeners.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl ListenerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    #[must_use]
    pub fn with(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether the set has no listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl LifecycleListener for ListenerSet {
    fn on_progress(&self, percent: f32) {
        for listener in &self.listeners {
            listener.on_progress(percent);
        }
    }

    fn on_ready(&self) {
        for listener in &self.listeners {
            listener.on_ready();
        }
    }

    fn on_error(&self, message: &str) {
        for listener in &self.listeners {
            listener.on_error(message);
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
