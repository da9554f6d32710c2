//! Tour engine - one loading phase followed by interactive playback.
//!
//! Owns the preloader, the synthetic progress driver, the readiness gate and
//! (once the gate opens) the player. The host calls [`Tour::update`] on a
//! fixed short interval; user input and playback signals go through
//! [`Tour::handle`].
//!
//! ```text
//!   begin() ──▶ Loading ──(timer done AND preload settled)──▶ Ready
//!                  │
//!                  └──(max wait exceeded)──▶ Failed ──retry()──▶ Loading
//! ```

use crate::catalog::Catalog;
use crate::core::gate::{GateState, ReadinessGate};
use crate::core::media::MediaSource;
use crate::core::player::{MediaCommand, Session, TourEvent, TourPlayer};
use crate::core::preloader::{LoadRecord, PreloadCoordinator, PreloadHandle, PreloadOptions};
use crate::core::progress_driver::{ProgressDriver, ProgressSnapshot};
use crate::core::workers::Workers;
use log::{info, trace};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shown when the gate times out
pub const LOAD_FAILED_MESSAGE: &str = "Content failed to load, please retry.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TourPhase {
    /// `begin()` not called yet
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Engine configuration
#[derive(Debug, Clone, Copy)]
pub struct TourOptions {
    /// Synthetic duration range
    pub progress_min: Duration,
    pub progress_max: Duration,
    /// Overrides the random duration
    pub progress_fixed: Option<Duration>,
    /// Hard cap on the loading phase
    pub max_wait: Option<Duration>,
    pub preload: PreloadOptions,
}

impl Default for TourOptions {
    fn default() -> Self {
        Self {
            progress_min: Duration::from_secs(3),
            progress_max: Duration::from_secs(5),
            progress_fixed: None,
            max_wait: Some(Duration::from_secs(60)),
            preload: PreloadOptions::default(),
        }
    }
}

pub struct Tour {
    catalog: Arc<Catalog>,
    preloader: PreloadCoordinator,
    preload: Option<PreloadHandle>,
    progress: ProgressDriver,
    gate: ReadinessGate,
    player: Option<TourPlayer>,
}

impl Tour {
    pub fn new(
        catalog: Arc<Catalog>,
        source: Arc<dyn MediaSource>,
        workers: Arc<Workers>,
        options: TourOptions,
    ) -> Self {
        let progress = match options.progress_fixed {
            Some(total) => ProgressDriver::with_duration(total),
            None => ProgressDriver::new(options.progress_min, options.progress_max),
        };
        Self {
            preloader: PreloadCoordinator::new(Arc::clone(&catalog), source, workers, options.preload),
            catalog,
            preload: None,
            progress,
            gate: ReadinessGate::new(options.max_wait),
            player: None,
        }
    }

    /// Start the loading phase: preload fan-out, timer and gate together.
    pub fn begin(&mut self, now: Instant) {
        if self.phase() == TourPhase::Ready {
            trace!("Tour already ready, ignoring begin()");
            return;
        }
        self.preload = Some(self.preloader.start_all());
        let total = self.progress.begin(now);
        self.gate.arm(now);
        info!(
            "Loading phase started: {} assets, synthetic duration {} ms",
            self.preloader.total(),
            total.as_millis()
        );
    }

    /// Restart loading after a timeout. No-op in any other phase.
    pub fn retry(&mut self, now: Instant) -> bool {
        if self.phase() != TourPhase::Failed {
            return false;
        }
        info!("Retrying loading phase");
        self.begin(now);
        true
    }

    /// Host tick: sample progress, then evaluate the gate.
    pub fn update(&mut self, now: Instant) -> TourPhase {
        if self.gate.state() == GateState::Waiting {
            self.progress.sample(now);
            if let Some(handle) = self.preload.as_mut() {
                handle.poll();
            }
            let opened = self
                .gate
                .evaluate(now, self.progress.is_complete(), self.preloader.all_loaded());
            if opened && self.player.is_none() {
                // Session is created once and kept for the life of the page
                self.player = Some(TourPlayer::new(Arc::clone(&self.catalog)));
                let degraded = self.preloader.degraded();
                info!(
                    "Tour ready ({} of {} assets buffered)",
                    self.preloader.total() - degraded,
                    self.preloader.total()
                );
            }
        }
        self.phase()
    }

    pub fn phase(&self) -> TourPhase {
        match self.gate.state() {
            GateState::Idle => TourPhase::Idle,
            GateState::Waiting => TourPhase::Loading,
            GateState::Open => TourPhase::Ready,
            GateState::TimedOut => TourPhase::Failed,
        }
    }

    /// Route an event to the player. Ignored until the tour is ready.
    pub fn handle(&mut self, event: TourEvent) -> Vec<MediaCommand> {
        match self.player.as_mut() {
            Some(player) if self.gate.is_open() => player.handle(event),
            _ => {
                trace!("Tour not ready, ignoring {:?}", event);
                Vec::new()
            }
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.player.as_ref().map(|p| p.session())
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// User-facing failure text while in `Failed`
    pub fn failure_message(&self) -> Option<&'static str> {
        (self.phase() == TourPhase::Failed).then_some(LOAD_FAILED_MESSAGE)
    }

    pub fn preload_records(&self) -> Vec<LoadRecord> {
        self.preloader.records()
    }

    /// Preload attempts queued or running on the worker pool
    pub fn preload_in_flight(&self) -> usize {
        self.preloader.in_flight()
    }

    pub fn preload_settled(&self) -> (usize, usize) {
        (self.preloader.settled(), self.preloader.total())
    }

    /// Block until the current preload cycle settled or `timeout` passed.
    pub fn wait_preload(&mut self, timeout: Duration) -> bool {
        match self.preload.as_mut() {
            Some(handle) => handle.wait_timeout(timeout),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::catalog_with;
    use crate::catalog::{AssetId, Direction};
    use crate::core::media::fakes::{Buffering, HeldSource, ScriptedSource};
    use crate::core::player::PlaybackState;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn tour(source: Arc<dyn MediaSource>, duration_ms: u64, max_wait: Option<Duration>) -> Tour {
        let catalog = Arc::new(catalog_with(3));
        let workers = Arc::new(Workers::new(catalog.pair_count()));
        let options = TourOptions {
            progress_fixed: Some(ms(duration_ms)),
            max_wait,
            preload: PreloadOptions {
                probe_bytes: 256,
                asset_timeout: ms(2000),
            },
            ..TourOptions::default()
        };
        Tour::new(catalog, source, workers, options)
    }

    fn wait_pending(source: &HeldSource, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while source.pending() < count && Instant::now() < deadline {
            std::thread::sleep(ms(2));
        }
        assert_eq!(source.pending(), count);
    }

    #[test]
    fn test_ready_not_before_timer() {
        // All eight pairs succeed quickly; 3000 ms synthetic duration
        let mut t = tour(Arc::new(ScriptedSource::new()), 3000, None);
        let t0 = Instant::now();
        t.begin(t0);
        assert!(t.wait_preload(Duration::from_secs(5)));
        assert_eq!(t.preload_settled(), (8, 8));

        for tick in (0..3000).step_by(30) {
            assert_eq!(t.update(t0 + ms(tick)), TourPhase::Loading, "tick {}", tick);
        }
        assert_eq!(t.update(t0 + ms(3000)), TourPhase::Ready);
        assert!(t.session().is_some());
    }

    #[test]
    fn test_ready_waits_for_preload() {
        let source = Arc::new(HeldSource::default());
        let mut t = tour(source.clone(), 3000, None);
        let t0 = Instant::now();
        t.begin(t0);
        wait_pending(&source, 8);

        // Timer long done, preload still pending
        assert_eq!(t.update(t0 + ms(3000)), TourPhase::Loading);
        assert_eq!(t.update(t0 + ms(10_000)), TourPhase::Loading);
        assert!(t.session().is_none());

        source.release_all();
        assert!(t.wait_preload(Duration::from_secs(5)));
        assert_eq!(t.update(t0 + ms(10_030)), TourPhase::Ready);
    }

    #[test]
    fn test_failed_asset_does_not_block() {
        let url = "mem://poi-2/forward";
        let source = ScriptedSource::new()
            .fail_probe(url)
            .buffering(url, Buffering::Fail);
        let mut t = tour(Arc::new(source), 100, None);
        let t0 = Instant::now();
        t.begin(t0);
        assert!(t.wait_preload(Duration::from_secs(5)));
        assert_eq!(t.update(t0 + ms(100)), TourPhase::Ready);

        let record = t
            .preload_records()
            .into_iter()
            .find(|r| r.id == AssetId::Poi(2) && r.direction == Direction::Forward)
            .unwrap();
        assert!(record.loaded);
    }

    #[test]
    fn test_events_ignored_while_loading() {
        let source = Arc::new(HeldSource::default());
        let mut t = tour(source.clone(), 0, None);
        t.begin(Instant::now());
        assert!(t.handle(TourEvent::SelectPoi(1)).is_empty());
        assert!(t.session().is_none());
        wait_pending(&source, 8);
        source.release_all();
    }

    #[test]
    fn test_playback_after_ready() {
        let mut t = tour(Arc::new(ScriptedSource::new()), 0, None);
        let t0 = Instant::now();
        t.begin(t0);
        assert!(t.wait_preload(Duration::from_secs(5)));
        assert_eq!(t.update(t0), TourPhase::Ready);

        t.handle(TourEvent::SelectPoi(1));
        assert_eq!(t.session().map(|s| s.state), Some(PlaybackState::TransitionIn(1)));
        t.handle(TourEvent::PlaybackFinished);
        assert_eq!(t.session().map(|s| s.state), Some(PlaybackState::AtRest(1)));
        assert_eq!(
            t.session().and_then(|s| s.url.clone()).as_deref(),
            Some("mem://poi-1/forward")
        );

        // Further ticks leave the gate and session alone
        assert_eq!(t.update(t0 + ms(500)), TourPhase::Ready);
        assert_eq!(t.session().map(|s| s.state), Some(PlaybackState::AtRest(1)));
    }

    #[test]
    fn test_timeout_and_retry() {
        let source = Arc::new(HeldSource::default());
        let mut t = tour(source.clone(), 100, Some(ms(1000)));
        let t0 = Instant::now();
        t.begin(t0);
        wait_pending(&source, 8);

        assert_eq!(t.update(t0 + ms(999)), TourPhase::Loading);
        assert_eq!(t.update(t0 + ms(1000)), TourPhase::Failed);
        assert_eq!(t.failure_message(), Some(LOAD_FAILED_MESSAGE));

        // Completion after the timeout doesn't open the gate
        source.release_all();
        assert!(t.wait_preload(Duration::from_secs(5)));
        assert_eq!(t.update(t0 + ms(1100)), TourPhase::Failed);

        // Retry runs a fresh cycle
        let t1 = t0 + ms(1200);
        assert!(t.retry(t1));
        assert_eq!(t.phase(), TourPhase::Loading);
        wait_pending(&source, 8);
        source.release_all();
        assert!(t.wait_preload(Duration::from_secs(5)));
        assert_eq!(t.update(t1 + ms(100)), TourPhase::Ready);
        assert!(!t.retry(t1 + ms(200)));
    }
}
