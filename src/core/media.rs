//! Media source abstraction: existence probes and buffering elements.
//!
//! The preloader needs two things from the platform: a cheap ranged GET to
//! confirm an asset is reachable, and a "media element" that buffers the full
//! asset and reports completion or failure as a discrete signal.
//!
//! A [`MediaElement`] is scoped to a single preload attempt. The source keeps
//! the [`ElementFeed`] half to deliver the signal; dropping the element marks
//! the feed released so the source can stop downloading.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, trace};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Existence probe failed (unreachable, HTTP error, bad range response)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub url: String,
    pub reason: String,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Probe failed for {}: {}", self.url, self.reason)
    }
}

impl std::error::Error for ProbeFailure {}

/// Media element could not buffer the asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFailure {
    pub url: String,
    pub reason: String,
}

impl fmt::Display for BufferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffering failed for {}: {}", self.url, self.reason)
    }
}

impl std::error::Error for BufferFailure {}

/// Terminal signal of a buffering element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferSignal {
    /// Enough data buffered to play
    Buffered { bytes: u64 },
    Failed(BufferFailure),
}

/// Platform media primitive used by the preloader.
pub trait MediaSource: Send + Sync {
    /// Request only the first `bytes` of `url` to confirm reachability.
    fn probe(&self, url: &str, bytes: u64) -> Result<(), ProbeFailure>;

    /// Create an element and start buffering `url`.
    fn open(&self, url: &str) -> MediaElement;
}

/// Consumer half: one preload attempt's view of a buffering element.
#[derive(Debug)]
pub struct MediaElement {
    url: String,
    signals: Receiver<BufferSignal>,
    released: Arc<AtomicBool>,
}

/// Producer half, held by the media source implementation.
#[derive(Debug, Clone)]
pub struct ElementFeed {
    url: String,
    signals: Sender<BufferSignal>,
    released: Arc<AtomicBool>,
}

impl MediaElement {
    /// New dormant element plus the feed used to signal it.
    pub fn pair(url: &str) -> (MediaElement, ElementFeed) {
        // One terminal signal per element
        let (tx, rx) = bounded(1);
        let released = Arc::new(AtomicBool::new(false));
        (
            MediaElement {
                url: url.to_string(),
                signals: rx,
                released: Arc::clone(&released),
            },
            ElementFeed {
                url: url.to_string(),
                signals: tx,
                released,
            },
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the terminal signal. `None` means the timeout expired first.
    ///
    /// A feed dropped without signalling counts as a buffer failure.
    pub fn wait(&self, timeout: Duration) -> Option<BufferSignal> {
        match self.signals.recv_timeout(timeout) {
            Ok(signal) => Some(signal),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(BufferSignal::Failed(BufferFailure {
                url: self.url.clone(),
                reason: "element closed without a signal".into(),
            })),
        }
    }
}

impl Drop for MediaElement {
    fn drop(&mut self) {
        self.released.store(true, Ordering::Release);
        trace!("Media element released: {}", self.url);
    }
}

impl ElementFeed {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver the terminal signal. Later signals are dropped.
    pub fn signal(&self, signal: BufferSignal) {
        let _ = self.signals.try_send(signal);
    }

    /// Attempt finished with the element (completed or gave up)
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// Chunk size for body reads; release is checked between chunks
const READ_CHUNK: usize = 64 * 1024;

/// HTTP-backed media source (blocking `ureq`).
///
/// `open` spawns a download thread per element that reads the full body,
/// counting bytes, and stops early once the element is released. The body is
/// discarded: the point is to warm the CDN and any intermediate caches.
///
/// Every socket read and write is bounded by `io_timeout`, and a probe as a
/// whole must finish within it, so a server that accepts and then goes silent
/// cannot pin a preload worker or a download thread.
pub struct HttpMediaSource {
    agent: ureq::Agent,
    io_timeout: Duration,
}

impl HttpMediaSource {
    pub fn new(connect_timeout: Duration, io_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(io_timeout)
            .timeout_write(io_timeout)
            .user_agent(concat!("tourplay/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, io_timeout }
    }

    fn download(agent: ureq::Agent, feed: ElementFeed) {
        let url = feed.url().to_string();
        let fail = |reason: String| {
            BufferSignal::Failed(BufferFailure {
                url: url.clone(),
                reason,
            })
        };

        let resp = match agent.get(&url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, _)) => {
                feed.signal(fail(format!("HTTP {}", code)));
                return;
            }
            Err(e) => {
                feed.signal(fail(e.to_string()));
                return;
            }
        };

        let mut reader = resp.into_reader();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut total: u64 = 0;
        loop {
            if feed.is_released() {
                debug!("Download of {} abandoned after {} bytes", url, total);
                return;
            }
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => total += n as u64,
                Err(e) => {
                    feed.signal(fail(format!("read body: {}", e)));
                    return;
                }
            }
        }
        feed.signal(BufferSignal::Buffered { bytes: total });
    }
}

impl MediaSource for HttpMediaSource {
    fn probe(&self, url: &str, bytes: u64) -> Result<(), ProbeFailure> {
        let fail = |reason: String| ProbeFailure {
            url: url.to_string(),
            reason,
        };
        let range = format!("bytes=0-{}", bytes.saturating_sub(1));
        let request = self
            .agent
            .get(url)
            .timeout(self.io_timeout)
            .set("Range", &range);
        match request.call() {
            // 206 for range-aware servers, 200 for servers that ignore Range
            Ok(resp) if resp.status() == 206 || resp.status() == 200 => Ok(()),
            Ok(resp) => Err(fail(format!("unexpected HTTP {}", resp.status()))),
            Err(ureq::Error::Status(code, _)) => Err(fail(format!("HTTP {}", code))),
            Err(e) => Err(fail(e.to_string())),
        }
    }

    fn open(&self, url: &str) -> MediaElement {
        let (element, feed) = MediaElement::pair(url);
        let agent = self.agent.clone();
        let fallback = feed.clone();
        let spawned = thread::Builder::new()
            .name("tourplay-buffer".into())
            .spawn(move || Self::download(agent, feed));
        if let Err(e) = spawned {
            fallback.signal(BufferSignal::Failed(BufferFailure {
                url: url.to_string(),
                reason: format!("spawn download thread: {}", e),
            }));
        }
        element
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_returns_signal() {
        let (element, feed) = MediaElement::pair("mem://a");
        feed.signal(BufferSignal::Buffered { bytes: 7 });
        assert_eq!(
            element.wait(Duration::from_millis(100)),
            Some(BufferSignal::Buffered { bytes: 7 })
        );
    }

    #[test]
    fn test_only_first_signal_delivered() {
        let (element, feed) = MediaElement::pair("mem://a");
        feed.signal(BufferSignal::Buffered { bytes: 1 });
        feed.signal(BufferSignal::Buffered { bytes: 2 });
        assert_eq!(
            element.wait(Duration::from_millis(100)),
            Some(BufferSignal::Buffered { bytes: 1 })
        );
        assert_eq!(element.wait(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_wait_times_out() {
        let (element, _feed) = MediaElement::pair("mem://slow");
        assert_eq!(element.wait(Duration::from_millis(20)), None);
    }

    #[test]
    fn test_dropped_feed_is_failure() {
        let (element, feed) = MediaElement::pair("mem://gone");
        drop(feed);
        assert!(matches!(
            element.wait(Duration::from_millis(100)),
            Some(BufferSignal::Failed(_))
        ));
    }

    #[test]
    fn test_drop_releases_feed() {
        let (element, feed) = MediaElement::pair("mem://a");
        assert!(!feed.is_released());
        drop(element);
        assert!(feed.is_released());
    }

    #[test]
    fn test_http_probe_and_buffer() {
        let server = rouille::Server::new("127.0.0.1:0", |request| {
            if request.url() == "/clip.mp4" {
                rouille::Response::from_data("video/mp4", vec![0u8; 200_000])
            } else {
                rouille::Response::empty_404()
            }
        })
        .unwrap();
        let base = format!("http://{}", server.server_addr());
        let (handle, stop) = server.stoppable();

        let source = HttpMediaSource::new(Duration::from_secs(2), Duration::from_secs(5));
        let clip = format!("{}/clip.mp4", base);
        let missing = format!("{}/missing.mp4", base);

        assert!(source.probe(&clip, 1024).is_ok());
        assert_eq!(
            source.open(&clip).wait(Duration::from_secs(5)),
            Some(BufferSignal::Buffered { bytes: 200_000 })
        );

        assert!(source.probe(&missing, 1024).is_err());
        assert!(matches!(
            source.open(&missing).wait(Duration::from_secs(5)),
            Some(BufferSignal::Failed(_))
        ));

        let _ = stop.send(());
        let _ = handle.join();
    }

    #[test]
    fn test_http_probe_unreachable() {
        // Nothing listens on port 9 (discard) on localhost in CI containers
        let source = HttpMediaSource::new(Duration::from_millis(200), Duration::from_millis(200));
        let err = source.probe("http://127.0.0.1:9/missing.mp4", 1024).unwrap_err();
        assert_eq!(err.url, "http://127.0.0.1:9/missing.mp4");
    }

    #[test]
    fn test_http_silent_server_is_bounded() {
        // Accepts connections (kernel backlog) but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/clip.mp4", listener.local_addr().unwrap());
        let source = HttpMediaSource::new(Duration::from_millis(500), Duration::from_millis(200));

        let started = std::time::Instant::now();
        assert!(source.probe(&url, 1024).is_err());
        assert!(started.elapsed() < Duration::from_secs(3));

        let element = source.open(&url);
        assert!(matches!(
            element.wait(Duration::from_secs(5)),
            Some(BufferSignal::Failed(_))
        ));
        drop(listener);
    }
}
