//! Anchored experiences.
//!
//! An experience is one effect placed in the world. Building one is a two
//! step affair: [`PendingExperience::begin`] starts any stage loading in the
//! background, and [`PendingExperience::finish`] waits for it, builds the
//! effect engine and reports ready.

use std::sync::Arc;

use tracing::{debug, info, warn};
use verdant_common::{ExperienceId, VerdantError, VerdantResult};
use verdant_kernel::{EffectConfig, EffectEngine, EffectFamily, EngineStats, FrameTick, OverrideAccessor, StageSet};

use crate::config::ExperienceConfig;
use crate::lifecycle::{ExperienceStatus, LifecycleListener, ListenerSet, LoggingListener, StatusListener};
use crate::loader::StageLoader;
use crate::procedural::ProceduralSource;

/// An experience whose stages may still be loading.
#[derive(Debug)]
pub struct PendingExperience {
    id: ExperienceId,
    config: ExperienceConfig,
    status: StatusListener,
    listeners: ListenerSet,
    loader: Option<StageLoader>,
}

impl PendingExperience {
    /// Validates the effect and starts loading its stages, if it has any.
    pub fn begin(config: &ExperienceConfig) -> VerdantResult<Self> {
        config.effect.validate()?;

        let status = StatusListener::new();
        let listeners = ListenerSet::new()
            .with(Arc::new(status.clone()))
            .with(Arc::new(LoggingListener::new(config.name.clone())));

        let loader = match &config.effect {
            EffectConfig::Bloom(bloom) => {
                let source = ProceduralSource::new(
                    config.name.clone(),
                    bloom.stage_count,
                    config.stage_points,
                    config.stage_seed,
                )
                .with_missing(config.missing_stages.clone());
                Some(StageLoader::spawn(Box::new(source), bloom.normalizer)?)
            },
            EffectConfig::Emissive(_) | EffectConfig::Fluid(_) => None,
        };

        let id = ExperienceId::new();
        debug!("Experience {} ({}) begun", config.name, id);

        Ok(Self {
            id,
            config: config.clone(),
            status,
            listeners,
            loader,
        })
    }

    /// Adds a listener that also receives this experience's callbacks.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners = self.listeners.with(listener);
        self
    }

    /// Experience ID.
    #[must_use]
    pub const fn id(&self) -> ExperienceId {
        self.id
    }

    /// Drains loader events without blocking. Returns true once loading is done.
    pub fn poll(&mut self) -> bool {
        match self.loader.as_mut() {
            Some(loader) => loader.poll(&self.listeners),
            None => true,
        }
    }

    /// Waits for loading, builds the engine and reports ready.
    ///
    /// A bloom whose stages all failed stays without an engine and reports
    /// failure instead; it still ticks, as a no-op.
    pub fn finish(self, overrides: Option<OverrideAccessor>) -> Experience {
        let Self {
            id,
            config,
            status,
            listeners,
            loader,
        } = self;

        let stages = loader.map_or_else(StageSet::default, |loader| loader.wait(&listeners).stages);

        let engine = if config.effect.family() == EffectFamily::Bloom && stages.loaded_count() == 0 {
            listeners.on_error(&format!("{}: no stages could be loaded", config.name));
            status.mark_failed();
            None
        } else {
            match build_engine(&config, stages, overrides) {
                Ok(engine) => {
                    listeners.on_ready();
                    Some(engine)
                },
                Err(e) => {
                    listeners.on_error(&format!("{}: {e}", config.name));
                    status.mark_failed();
                    None
                },
            }
        };

        Experience {
            id,
            config,
            status,
            engine,
            uploads: 0,
        }
    }
}

fn build_engine(
    config: &ExperienceConfig,
    stages: StageSet,
    overrides: Option<OverrideAccessor>,
) -> Result<EffectEngine, VerdantError> {
    let engine = EffectEngine::from_config(&config.effect, stages)?.with_placement(config.placement);
    Ok(match overrides {
        Some(accessor) => engine.with_overrides(accessor),
        None => engine,
    })
}

/// A built experience, ticked once per frame.
#[derive(Debug)]
pub struct Experience {
    id: ExperienceId,
    config: ExperienceConfig,
    status: StatusListener,
    engine: Option<EffectEngine>,
    uploads: u64,
}

impl Experience {
    /// Experience ID.
    #[must_use]
    pub const fn id(&self) -> ExperienceId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Effect family.
    #[must_use]
    pub const fn family(&self) -> EffectFamily {
        self.config.effect.family()
    }

    /// Whether the effect was built.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// The effect engine, if built.
    #[must_use]
    pub const fn engine(&self) -> Option<&EffectEngine> {
        self.engine.as_ref()
    }

    /// Advances one frame. Returns true if the buffer needs re-uploading.
    pub fn tick(&mut self, frame: FrameTick) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        engine.tick(frame);
        if engine.take_changed() {
            self.uploads += 1;
            true
        } else {
            false
        }
    }

    /// Buffer uploads requested so far.
    #[must_use]
    pub const fn uploads(&self) -> u64 {
        self.uploads
    }

    /// Engine statistics, if built.
    #[must_use]
    pub fn stats(&self) -> Option<EngineStats> {
        self.engine.as_ref().map(EffectEngine::stats)
    }

    /// Lifecycle status as reported so far.
    #[must_use]
    pub fn status(&self) -> ExperienceStatus {
        self.status.snapshot()
    }

    /// Logs a one-line summary.
    pub fn log_stats(&self) {
        match self.stats() {
            Some(stats) => info!("[{}] {} uploads={}", self.config.name, stats, self.uploads),
            None => warn!("[{}] not running", self.config.name),
        }
    }
}
