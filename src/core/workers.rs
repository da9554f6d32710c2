//! Background thread pool for preload attempts.
//!
//! Every attempt blocks on network I/O and on a buffering signal, so the pool
//! is sized to the number of asset pairs rather than CPU cores: all pairs are
//! in flight at once. Jobs are pulled from a shared injector queue.

use crossbeam::deque::Injector;
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(8);
/// workers.execute(move || {
///     let outcome = attempt(&source, &url, &options);
///     records.mark(index, outcome);
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    /// Jobs queued or running
    in_flight: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` workers (at least one). No upper bound: attempts
    /// block on I/O, so a smaller pool would serialize them.
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handles = (0..num_threads)
            .filter_map(|worker_id| {
                let injector = Arc::clone(&injector);
                let in_flight = Arc::clone(&in_flight);
                let shutdown = Arc::clone(&shutdown);

                let spawned = thread::Builder::new()
                    .name(format!("tourplay-preload-{}", worker_id))
                    .spawn(move || {
                        trace!("Worker {} started", worker_id);
                        loop {
                            if let Some(job) = injector.steal().success() {
                                job();
                                in_flight.fetch_sub(1, Ordering::AcqRel);
                                continue;
                            }
                            if shutdown.load(Ordering::Relaxed) {
                                break;
                            }
                            // Idle: short sleep instead of spinning
                            thread::sleep(Duration::from_millis(1));
                        }
                        trace!("Worker {} stopped", worker_id);
                    });

                match spawned {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::error!("Failed to spawn worker {}: {}", worker_id, e);
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        trace!("Workers initialized: {} threads", handles.len());

        Self {
            injector,
            handles,
            in_flight,
            shutdown,
        }
    }

    /// Queue a job. Runs asynchronously, no return value; report results
    /// through shared state or a channel.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.injector.push(Box::new(f));
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Jobs queued or still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        // Attempts are bounded by the asset timeout, but don't hold up exit on them
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, leaving remaining workers detached");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_runs_all_jobs() {
        let workers = Workers::new(4);
        let (tx, rx) = unbounded();
        for i in 0..20 {
            let tx = tx.clone();
            workers.execute(move || {
                let _ = tx.send(i);
            });
        }
        let mut got: Vec<i32> = (0..20)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort();
        assert_eq!(got, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_jobs_run_concurrently() {
        // Four blocking jobs on four threads must all be running at once
        let workers = Workers::new(4);
        let barrier = Arc::new(std::sync::Barrier::new(4));
        let (tx, rx) = unbounded();
        for _ in 0..4 {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            workers.execute(move || {
                barrier.wait();
                let _ = tx.send(());
            });
        }
        for _ in 0..4 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
    }

    #[test]
    fn test_thread_count_not_capped() {
        assert_eq!(Workers::new(0).num_threads(), 1);
        // 20 POIs: 42 asset pairs, one thread each
        assert_eq!(Workers::new(42).num_threads(), 42);
    }

    #[test]
    fn test_in_flight_counts_queued_and_running() {
        let workers = Workers::new(1);
        let (release_tx, release_rx) = unbounded::<()>();
        let (done_tx, done_rx) = unbounded();
        for _ in 0..3 {
            let release_rx = release_rx.clone();
            let done_tx = done_tx.clone();
            workers.execute(move || {
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
                let _ = done_tx.send(());
            });
        }
        assert_eq!(workers.in_flight(), 3);

        for _ in 0..3 {
            release_tx.send(()).unwrap();
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while workers.in_flight() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(workers.in_flight(), 0);
    }
}
