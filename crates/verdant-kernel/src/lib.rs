//! # Verdant Kernel
//!
//! Procedural particle and geometry-morph simulation for anchored AR effects.
//!
//! This crate provides the per-frame simulation core:
//! - Fixed-capacity particle pool with stable slot indices
//! - Rate-driven emission into free slots and lifetime sweeping
//! - Cubic-Bezier stage morphing with a height-driven per-vertex wave
//! - Polygon boundary containment at a runtime expansion factor
//! - One-time stage normalization to a common scale
//! - Render buffers with a narrow "changed, re-upload" signal
//! - Observable runtime settings and injected debug overrides
//!
//! ## Architecture
//!
//! One [`EffectEngine`] owns one effect (emissive, fluid or bloom), its
//! freezable clock and its render buffer. The host calls `tick` once per
//! frame; within a tick the order is always sweep, emit, advance, write.
//! Nothing in the tick path allocates or returns an error: degenerate
//! configuration is rejected when the engine is built.
//!
//! ## Tuning
//!
//! Structural settings (capacity, emitter box, boundary, grid, stage count)
//! are fixed at construction. Tuning settings live in a [`SharedSettings`]
//! handle and are copied once at the start of every tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod boundary;
pub mod buffer;
pub mod clock;
pub mod effects;
pub mod emission;
pub mod engine;
pub mod morph;
pub mod normalize;
pub mod pool;
pub mod settings;
pub mod stage;
pub mod sweep;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::boundary::*;
    pub use crate::buffer::*;
    pub use crate::clock::*;
    pub use crate::effects::*;
    pub use crate::emission::*;
    pub use crate::engine::*;
    pub use crate::morph::*;
    pub use crate::normalize::*;
    pub use crate::pool::*;
    pub use crate::settings::*;
    pub use crate::stage::*;
    pub use crate::sweep::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_vertex_layout() {
        // Ensure vertex fits in expected GPU buffer alignment
        assert_eq!(std::mem::size_of::<RenderVertex>(), 32);
        assert_eq!(std::mem::align_of::<RenderVertex>(), 4);
    }

    #[test]
    fn test_engine_end_to_end() {
        let mut engine = EffectEngine::fluid(&FluidConfig::default().with_resolution(16)).expect("valid config");
        for frame in 1..=30 {
            engine.tick(FrameTick::new(f64::from(frame) / 30.0, 1.0 / 30.0));
        }
        assert!(engine.take_changed());
        assert_eq!(engine.buffer().len(), 256);
        assert!(engine.buffer().visible_count() > 0);
    }
}
