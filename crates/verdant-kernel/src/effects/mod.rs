//! Effect families.
//!
//! One engine type drives every effect; the differences between smoke, fire,
//! rising water and stage morphing live in a small configuration struct per
//! family and in the per-family update below.
//!
//! - [`emissive`] - particle plumes (smoke, fire)
//! - [`fluid`] - boundary-gated rising water
//! - [`bloom`] - cyclic stage morphing

pub mod bloom;
pub mod emissive;
pub mod fluid;

use serde::{Deserialize, Serialize};
use verdant_common::ConfigError;

use crate::buffer::RenderVertex;
use crate::settings::DebugOverrides;

pub use bloom::{BloomConfig, BloomEffect, BloomTuning};
pub use emissive::{EmissiveConfig, EmissiveEffect, EmissiveTuning};
pub use fluid::{FluidConfig, FluidEffect, FluidTuning};

/// Which family an effect belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectFamily {
    /// Particle plume.
    Emissive,
    /// Rising water.
    Fluid,
    /// Stage morph.
    Bloom,
}

impl std::fmt::Display for EffectFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Emissive => "emissive",
            Self::Fluid => "fluid",
            Self::Bloom => "bloom",
        };
        f.write_str(name)
    }
}

/// Serializable configuration for any effect family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum EffectConfig {
    /// Particle plume.
    Emissive(EmissiveConfig),
    /// Rising water.
    Fluid(FluidConfig),
    /// Stage morph.
    Bloom(BloomConfig),
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self::Emissive(EmissiveConfig::smoke())
    }
}

impl EffectConfig {
    /// Family of this configuration.
    #[must_use]
    pub const fn family(&self) -> EffectFamily {
        match self {
            Self::Emissive(_) => EffectFamily::Emissive,
            Self::Fluid(_) => EffectFamily::Fluid,
            Self::Bloom(_) => EffectFamily::Bloom,
        }
    }

    /// Rejects degenerate configuration before any effect is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Emissive(config) => config.validate(),
            Self::Fluid(config) => config.validate(),
            Self::Bloom(config) => config.validate(),
        }
    }
}

/// Inputs shared by every family for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickContext {
    /// Simulation time after this tick's clock advance.
    pub now: f32,
    /// Step taken this tick.
    pub dt: f32,
    /// Overrides polled for this tick.
    pub overrides: DebugOverrides,
}

/// The live effect inside an engine.
#[derive(Debug)]
pub enum EffectState {
    /// Particle plume.
    Emissive(EmissiveEffect),
    /// Rising water.
    Fluid(FluidEffect),
    /// Stage morph.
    Bloom(BloomEffect),
}

impl EffectState {
    /// Family of the live effect.
    #[must_use]
    pub const fn family(&self) -> EffectFamily {
        match self {
            Self::Emissive(_) => EffectFamily::Emissive,
            Self::Fluid(_) => EffectFamily::Fluid,
            Self::Bloom(_) => EffectFamily::Bloom,
        }
    }

    /// Render buffer length this effect needs.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Emissive(effect) => effect.vertex_count(),
            Self::Fluid(effect) => effect.vertex_count(),
            Self::Bloom(effect) => effect.vertex_count(),
        }
    }

    /// Particles or vertices currently drawn.
    #[must_use]
    pub fn active_count(&self) -> usize {
        match self {
            Self::Emissive(effect) => effect.pool().active_count(),
            Self::Fluid(effect) => effect.pool().active_count(),
            Self::Bloom(effect) => effect.driven_count(),
        }
    }

    /// Runs one tick and writes into `out`. Returns true if `out` changed.
    pub fn tick(&mut self, ctx: &TickContext, out: &mut [RenderVertex]) -> bool {
        match self {
            Self::Emissive(effect) => effect.tick(ctx, out),
            Self::Fluid(effect) => effect.tick(ctx, out),
            Self::Bloom(effect) => effect.tick(ctx, out),
        }
    }
}
