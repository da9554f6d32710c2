//! Preload coordinator - warms every catalog asset before the tour opens.
//!
//! **Attempt** per (identity, direction) pair, all pairs in parallel:
//! 1. Ranged probe of the first bytes (cheap reachability check)
//! 2. Regardless of the probe result, open a media element and buffer
//! 3. Settle when the element reports buffered OR failed, or when the
//!    per-asset timeout expires
//!
//! Every settled attempt counts as *attempted*: the record flips to loaded
//! whatever the outcome, so one unreachable asset cannot hold the tour in the
//! loading phase. The outcome is kept on the record for diagnostics only.
//!
//! # Cycles
//!
//! `start_all()` begins a new cycle with fresh records. Attempts of an older
//! cycle that have not started yet are skipped (outcome `Superseded`) and
//! write only into their own cycle's records.

use crate::catalog::{AssetId, Catalog, Direction};
use crate::core::media::{BufferSignal, MediaSource};
use crate::core::workers::Workers;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How an attempt settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    Buffered,
    BufferFailed,
    TimedOut,
    /// A newer cycle started before this attempt ran
    Superseded,
}

/// Per-pair preload state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRecord {
    pub id: AssetId,
    pub direction: Direction,
    pub url: String,
    /// Attempted (settled either way). Never reverts.
    pub loaded: bool,
    /// Diagnostics; `None` until settled
    pub outcome: Option<LoadOutcome>,
    pub probe_ok: Option<bool>,
}

/// Attempt tuning
#[derive(Debug, Clone, Copy)]
pub struct PreloadOptions {
    /// Bytes requested by the existence probe
    pub probe_bytes: u64,
    /// Upper bound on buffering per asset
    pub asset_timeout: Duration,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            probe_bytes: 1024,
            asset_timeout: Duration::from_secs(15),
        }
    }
}

/// State of one loading cycle, shared with its attempts
struct CycleState {
    records: Mutex<Vec<LoadRecord>>,
    settled: AtomicUsize,
}

impl CycleState {
    /// Flip record `index` to loaded. Returns false if it already was.
    fn mark(&self, index: usize, outcome: LoadOutcome, probe_ok: Option<bool>) -> bool {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = records.get_mut(index) else {
            return false;
        };
        if record.loaded {
            return false;
        }
        record.loaded = true;
        record.outcome = Some(outcome);
        record.probe_ok = probe_ok;
        self.settled.fetch_add(1, Ordering::AcqRel);
        true
    }
}

/// Fans preload attempts out to the worker pool.
pub struct PreloadCoordinator {
    catalog: Arc<Catalog>,
    source: Arc<dyn MediaSource>,
    workers: Arc<Workers>,
    options: PreloadOptions,
    cycle: Arc<AtomicU64>,
    current: Arc<CycleState>,
}

impl PreloadCoordinator {
    pub fn new(
        catalog: Arc<Catalog>,
        source: Arc<dyn MediaSource>,
        workers: Arc<Workers>,
        options: PreloadOptions,
    ) -> Self {
        let current = Arc::new(Self::fresh_cycle(&catalog));
        Self {
            catalog,
            source,
            workers,
            options,
            cycle: Arc::new(AtomicU64::new(0)),
            current,
        }
    }

    fn fresh_cycle(catalog: &Catalog) -> CycleState {
        let records = catalog
            .pairs()
            .into_iter()
            .filter_map(|(id, direction)| {
                // pairs() only yields catalog identities
                let url = catalog.resolve(id, direction).ok()?.to_string();
                Some(LoadRecord {
                    id,
                    direction,
                    url,
                    loaded: false,
                    outcome: None,
                    probe_ok: None,
                })
            })
            .collect();
        CycleState {
            records: Mutex::new(records),
            settled: AtomicUsize::new(0),
        }
    }

    /// Start a loading cycle: one attempt per pair, all queued at once.
    ///
    /// The handle settles after every attempt of this cycle settled.
    pub fn start_all(&mut self) -> PreloadHandle {
        let cycle_id = self.cycle.fetch_add(1, Ordering::AcqRel) + 1;
        let state = Arc::new(Self::fresh_cycle(&self.catalog));
        self.current = Arc::clone(&state);

        let targets: Vec<(usize, String)> = state
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .enumerate()
            .map(|(index, r)| (index, r.url.clone()))
            .collect();
        let total = targets.len();
        info!("Preload cycle {}: {} assets", cycle_id, total);

        let (done_tx, done_rx) = unbounded();
        for (index, url) in targets {
            let state = Arc::clone(&state);
            let source = Arc::clone(&self.source);
            let cycle = Arc::clone(&self.cycle);
            let done_tx: Sender<()> = done_tx.clone();
            let options = self.options;

            self.workers.execute(move || {
                let (outcome, probe_ok) = if cycle.load(Ordering::Acquire) != cycle_id {
                    (LoadOutcome::Superseded, None)
                } else {
                    attempt(source.as_ref(), &url, options)
                };
                state.mark(index, outcome, probe_ok);
                let _ = done_tx.send(());
            });
        }

        PreloadHandle {
            done: done_rx,
            total,
            received: 0,
        }
    }

    /// Every record attempted. Recomputed from the records on each call.
    pub fn all_loaded(&self) -> bool {
        self.current
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .all(|r| r.loaded)
    }

    /// Attempts settled in the current cycle
    pub fn settled(&self) -> usize {
        self.current.settled.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.catalog.pair_count()
    }

    /// Attempts queued or running, stale cycles included
    pub fn in_flight(&self) -> usize {
        self.workers.in_flight()
    }

    /// Snapshot of the current cycle's records
    pub fn records(&self) -> Vec<LoadRecord> {
        self.current
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Attempts that settled without buffering (failed or timed out)
    pub fn degraded(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| matches!(r.outcome, Some(LoadOutcome::BufferFailed | LoadOutcome::TimedOut)))
            .count()
    }
}

/// Run one attempt. Never fails: problems are logged and folded into the outcome.
///
/// Probe and buffering share one `asset_timeout` budget.
fn attempt(source: &dyn MediaSource, url: &str, options: PreloadOptions) -> (LoadOutcome, Option<bool>) {
    let started = Instant::now();
    let deadline = started + options.asset_timeout;

    let probe_ok = match source.probe(url, options.probe_bytes) {
        Ok(()) => true,
        Err(e) => {
            warn!("{}; buffering anyway", e);
            false
        }
    };

    // Element lives only for this attempt; dropping it releases the download
    let element = source.open(url);
    let remaining = deadline.saturating_duration_since(Instant::now());
    let outcome = match element.wait(remaining) {
        Some(BufferSignal::Buffered { bytes }) => {
            debug!(
                "Buffered {} ({} bytes, {} ms)",
                url,
                bytes,
                started.elapsed().as_millis()
            );
            LoadOutcome::Buffered
        }
        Some(BufferSignal::Failed(e)) => {
            warn!("{}", e);
            LoadOutcome::BufferFailed
        }
        None => {
            warn!(
                "Buffering {} timed out after {} ms, continuing",
                url,
                options.asset_timeout.as_millis()
            );
            LoadOutcome::TimedOut
        }
    };
    (outcome, Some(probe_ok))
}

/// Join handle for one preload cycle.
pub struct PreloadHandle {
    done: Receiver<()>,
    total: usize,
    received: usize,
}

impl PreloadHandle {
    /// Attempts in this cycle
    pub fn total(&self) -> usize {
        self.total
    }

    /// Drain completions without blocking; true once every attempt settled.
    pub fn poll(&mut self) -> bool {
        while self.received < self.total && self.done.try_recv().is_ok() {
            self.received += 1;
        }
        self.is_settled()
    }

    pub fn is_settled(&self) -> bool {
        self.received >= self.total
    }

    /// Block until every attempt settled.
    pub fn wait(&mut self) {
        while self.received < self.total {
            if self.done.recv().is_err() {
                // All senders gone: no further completions can arrive
                break;
            }
            self.received += 1;
        }
    }

    /// Block up to `timeout`; true if every attempt settled.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.received < self.total {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done.recv_timeout(remaining) {
                Ok(()) => self.received += 1,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.is_settled()
    }
}
