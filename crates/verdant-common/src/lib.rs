//! # Verdant Common
//!
//! Common types, utilities, and shared abstractions for Project Verdant.
//!
//! This crate provides foundational types used across all Verdant subsystems:
//! - ID types (ExperienceId, SubscriptionId)
//! - World placement transform for an effect's output group
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod placement;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::placement::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experience_id_generation() {
        let id1 = ExperienceId::new();
        let id2 = ExperienceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_config_error_converts_to_top_level() {
        let err: VerdantError = ConfigError::ZeroCapacity.into();
        assert!(matches!(err, VerdantError::Config(ConfigError::ZeroCapacity)));
        assert!(err.to_string().contains("capacity"));
    }
}
