//! Error types for Project Verdant.
//!
//! Only configuration and loading can fail. The per-frame simulation has no
//! error path: missing geometry, saturated pools and similar conditions
//! degrade to no-ops instead.

use thiserror::Error;

/// Top-level error type for Verdant operations.
#[derive(Debug, Error)]
pub enum VerdantError {
    /// Configuration rejected during validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stage geometry failed to load
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Degenerate configuration, rejected before any simulation runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A particle pool was configured with zero slots
    #[error("Particle capacity must be greater than zero")]
    ZeroCapacity,

    /// A morph or rise cycle of zero (or negative) length
    #[error("Cycle duration must be greater than zero")]
    ZeroCycleDuration,

    /// Lifetime distribution that can produce a non-positive lifetime
    #[error("Invalid lifetime: base {base}, extra {extra} (base must be > 0, extra >= 0)")]
    InvalidLifetime {
        /// Base lifetime in seconds
        base: f32,
        /// Random extra lifetime in seconds
        extra: f32,
    },

    /// A min/max pair where min exceeds max
    #[error("Invalid range for {field}: min {min} > max {max}")]
    InvalidRange {
        /// Name of the offending field
        field: &'static str,
        /// Configured minimum
        min: f32,
        /// Configured maximum
        max: f32,
    },

    /// A single value outside its allowed bounds
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field
        field: &'static str,
        /// Configured value
        value: f32,
        /// Lowest allowed value
        min: f32,
        /// Highest allowed value
        max: f32,
    },

    /// A value that must be finite was NaN or infinite
    #[error("Value for {field} must be finite")]
    NonFinite {
        /// Name of the offending field
        field: &'static str,
    },

    /// Boundary polygon cannot enclose a region
    #[error("Degenerate boundary polygon: {0}")]
    DegenerateBoundary(String),

    /// Not enough stages for a morph cycle
    #[error("Too few stages: need at least {required}, got {actual}")]
    TooFewStages {
        /// Minimum number of stages
        required: usize,
        /// Number of stages configured
        actual: usize,
    },

    /// Fluid grid resolution out of range
    #[error("Invalid grid resolution {resolution}")]
    InvalidGrid {
        /// Configured resolution
        resolution: u32,
    },
}

/// Stage geometry loading errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The geometry source does not exist
    #[error("Geometry source missing: {0}")]
    SourceMissing(String),

    /// The geometry source exists but could not be decoded
    #[error("Stage {stage} is corrupt: {reason}")]
    Corrupt {
        /// Stage index
        stage: usize,
        /// Reason reported by the loader
        reason: String,
    },

    /// The stage decoded to zero vertices
    #[error("Stage {0} contains no vertices")]
    EmptyStage(usize),

    /// Loading was abandoned before completion
    #[error("Loading was cancelled")]
    Cancelled,
}

/// Result type alias for Verdant operations.
pub type VerdantResult<T> = Result<T, VerdantError>;
