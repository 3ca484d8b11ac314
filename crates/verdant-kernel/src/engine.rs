//! The parameterized effect engine.
//!
//! One engine instance owns one effect, its clock and its render buffer.
//! The host calls [`EffectEngine::tick`] once per rendered frame; the call
//! is not reentrant and never fails. The renderer reads the buffer after a
//! tick and re-uploads when [`EffectEngine::take_changed`] says so.

use tracing::{debug, info, warn};
use verdant_common::{ConfigError, WorldPlacement};

use crate::buffer::RenderBuffer;
use crate::clock::{FrameTick, SimClock};
use crate::effects::{
    BloomConfig, BloomEffect, EffectConfig, EffectFamily, EffectState, EmissiveConfig, EmissiveEffect,
    FluidConfig, FluidEffect, TickContext,
};
use crate::emission::EmissionStats;
use crate::settings::{DebugOverrides, OverrideAccessor};
use crate::stage::StageSet;

/// Diagnostic snapshot of an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStats {
    /// Effect family.
    pub family: EffectFamily,
    /// Simulation time.
    pub now: f32,
    /// Ticks processed while running.
    pub ticks: u64,
    /// Active particles, or driven vertices for a morph.
    pub active: usize,
    /// Render buffer length.
    pub capacity: usize,
    /// Emission counters (zero for non-emissive effects).
    pub emission: EmissionStats,
    /// Particles expired since creation (zero for non-emissive effects).
    pub expired: u64,
    /// Render buffer revision.
    pub revision: u64,
}

impl EngineStats {
    /// Fraction of the buffer in use.
    #[must_use]
    pub fn occupancy(&self) -> f32 {
        if self.capacity == 0 {
            0.0
        } else {
            self.active as f32 / self.capacity as f32
        }
    }
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} t={:.2}s active={}/{} emitted={} dropped={} expired={}",
            self.family,
            self.now,
            self.active,
            self.capacity,
            self.emission.emitted,
            self.emission.dropped,
            self.expired
        )
    }
}

/// Drives one effect frame by frame.
pub struct EffectEngine {
    state: EffectState,
    clock: SimClock,
    buffer: RenderBuffer,
    overrides: Option<OverrideAccessor>,
    last_elapsed: Option<f64>,
    ticks: u64,
}

impl EffectEngine {
    /// Wraps a built effect.
    #[must_use]
    pub fn new(state: EffectState) -> Self {
        let buffer = RenderBuffer::new(state.vertex_count());
        info!(
            "Effect engine ready: {} with {} vertices",
            state.family(),
            buffer.len()
        );
        Self {
            state,
            clock: SimClock::new(),
            buffer,
            overrides: None,
            last_elapsed: None,
            ticks: 0,
        }
    }

    /// Builds a smoke or fire plume.
    pub fn emissive(config: &EmissiveConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(EffectState::Emissive(EmissiveEffect::new(config)?)))
    }

    /// Builds a body of rising water.
    pub fn fluid(config: &FluidConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(EffectState::Fluid(FluidEffect::new(config)?)))
    }

    /// Builds a stage morph over already loaded stages.
    pub fn bloom(config: &BloomConfig, stages: StageSet) -> Result<Self, ConfigError> {
        Ok(Self::new(EffectState::Bloom(BloomEffect::new(config, stages)?)))
    }

    /// Builds any family. `stages` is only used by bloom effects.
    pub fn from_config(config: &EffectConfig, stages: StageSet) -> Result<Self, ConfigError> {
        match config {
            EffectConfig::Emissive(config) => Self::emissive(config),
            EffectConfig::Fluid(config) => Self::fluid(config),
            EffectConfig::Bloom(config) => Self::bloom(config, stages),
        }
    }

    /// Installs an override accessor, polled once per tick.
    #[must_use]
    pub fn with_overrides(mut self, accessor: OverrideAccessor) -> Self {
        self.overrides = Some(accessor);
        self
    }

    /// Sets the initial placement.
    #[must_use]
    pub fn with_placement(mut self, placement: WorldPlacement) -> Self {
        self.buffer.set_placement(placement);
        self
    }

    /// Sets the largest step the clock accepts per tick.
    #[must_use]
    pub fn with_max_dt(mut self, max_dt: f32) -> Self {
        self.clock = self.clock.with_max_dt(max_dt);
        self
    }

    /// Applies a placement supplied by the host.
    pub fn set_placement(&mut self, placement: WorldPlacement) {
        self.buffer.set_placement(placement);
    }

    /// The live effect.
    #[must_use]
    pub const fn state(&self) -> &EffectState {
        &self.state
    }

    /// Effect family.
    #[must_use]
    pub const fn family(&self) -> EffectFamily {
        self.state.family()
    }

    /// Simulation time.
    #[must_use]
    pub fn now(&self) -> f32 {
        self.clock.now()
    }

    /// Whether ticks advance the simulation.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Resumes from the frozen time.
    pub fn start(&mut self) {
        if !self.clock.is_running() {
            debug!("Resuming {} effect at t={:.3}", self.family(), self.clock.now());
            self.clock.start();
        }
    }

    /// Freezes the effect. Particle state is kept.
    pub fn stop(&mut self) {
        if self.clock.is_running() {
            debug!("Stopping {} effect at t={:.3}", self.family(), self.clock.now());
            self.clock.stop();
        }
    }

    /// Render buffer, read-only.
    #[must_use]
    pub const fn buffer(&self) -> &RenderBuffer {
        &self.buffer
    }

    /// Returns true once after each buffer change.
    pub fn take_changed(&mut self) -> bool {
        self.buffer.take_changed()
    }

    /// Advances one frame.
    ///
    /// Ticks with a decreasing host time and ticks while stopped are ignored.
    /// Returns true if the render buffer was rewritten.
    pub fn tick(&mut self, frame: FrameTick) -> bool {
        if let Some(last) = self.last_elapsed {
            if frame.elapsed < last {
                warn!(
                    "Ignoring non-monotonic frame time {:.4} (last {:.4})",
                    frame.elapsed, last
                );
                return false;
            }
        }
        self.last_elapsed = Some(frame.elapsed);

        if !self.clock.is_running() {
            return false;
        }

        let dt = self.clock.advance(frame.dt);
        let overrides = self
            .overrides
            .as_ref()
            .map_or_else(DebugOverrides::default, |accessor| accessor());
        let ctx = TickContext {
            now: self.clock.now(),
            dt,
            overrides,
        };

        let wrote = self.state.tick(&ctx, self.buffer.vertices_mut());
        if wrote {
            self.buffer.mark_changed();
        }
        self.ticks += 1;
        wrote
    }

    /// Diagnostic snapshot.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let (emission, expired) = match &self.state {
            EffectState::Emissive(effect) => (effect.emission_stats(), effect.sweeper().expired_total()),
            EffectState::Fluid(_) | EffectState::Bloom(_) => (EmissionStats::default(), 0),
        };
        EngineStats {
            family: self.family(),
            now: self.clock.now(),
            ticks: self.ticks,
            active: self.state.active_count(),
            capacity: self.buffer.len(),
            emission,
            expired,
            revision: self.buffer.revision(),
        }
    }
}

impl std::fmt::Debug for EffectEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectEngine")
            .field("state", &self.state)
            .field("clock", &self.clock)
            .field("buffer_len", &self.buffer.len())
            .field("has_overrides", &self.overrides.is_some())
            .field("ticks", &self.ticks)
            .finish()
    }
}
