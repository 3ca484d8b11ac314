//! Verdant Engine - headless host for anchored AR effects.
//!
//! This crate provides everything around the simulation kernel:
//! configuration, stage loading, lifecycle reporting and the frame loop.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod app;
pub mod config;
pub mod experience;
pub mod lifecycle;
pub mod loader;
pub mod procedural;
pub mod timing;
