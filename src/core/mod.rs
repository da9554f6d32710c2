//! Core engine modules - preloading, synthetic progress, gate, playback
//!
//! These modules form the tour engine, independent of any presentation layer.

pub mod gate;
pub mod media;
pub mod player;
pub mod preloader;
pub mod progress_driver;
pub mod tour;
pub mod workers;

// Re-exports for convenience
pub use gate::{GateState, ReadinessGate};
pub use media::{HttpMediaSource, MediaElement, MediaSource};
pub use player::{MediaCommand, PlaybackState, Session, TourEvent, TourPlayer};
pub use preloader::{LoadOutcome, LoadRecord, PreloadCoordinator, PreloadOptions};
pub use progress_driver::{ProgressDriver, ProgressSnapshot};
pub use tour::{Tour, TourOptions, TourPhase};
pub use workers::Workers;
