//! TOURPLAY - interactive product-tour engine
//!
//! Re-exports all modules for use by the binary target.

// Core engine (preload, progress, gate, player)
pub mod core;

// App modules
pub mod catalog;
pub mod cli;
pub mod paths;
pub mod progress;
pub mod server;
pub mod settings;

// Re-export commonly used types
pub use catalog::{AssetId, Catalog, Direction, UnknownAssetError};
pub use core::player::{MediaCommand, PlaybackState, Session, TourEvent};
pub use core::tour::{Tour, TourOptions, TourPhase};
