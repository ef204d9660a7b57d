//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-playback`, `core-catalog`). Host
//! applications can depend on `player-workspace` and enable the documented
//! features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(any(feature = "playback-only", feature = "diagnostics"))]
pub use core_playback as playback;

#[cfg(feature = "catalog-only")]
pub use core_catalog as catalog;
