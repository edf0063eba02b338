use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::entry::LogEntry;
use crate::watch::{self, FileEvents};

/// A single Arena JSON payload can exceed 1 MiB (full collection dumps get
/// close to 8 MiB), so the line ceiling is well above that.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_BUFFER_SIZE: usize = 100;
const DEFAULT_ERROR_BUFFER_SIZE: usize = 100;

#[derive(Debug, Error, Diagnostic)]
pub enum PollerError {
    #[error("channel buffer sizes must be nonzero")]
    InvalidBufferSize,

    #[error("poller for {0:?} is already running")]
    AlreadyRunning(PathBuf),

    #[error("failed to stat {path:?}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to seek in {path:?}")]
    Seek {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read error in {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("skipped a line longer than {max} bytes in {path:?}")]
    LineTooLong { path: PathBuf, max: usize },

    #[error("file events unavailable for {path:?}, falling back to timer-only polling")]
    WatchUnavailable {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub path: PathBuf,
    /// Periodic wake cadence. The timer always runs, even with file events on.
    pub interval: Duration,
    /// Entry channel capacity. Senders block when it fills; the scanner never
    /// drops data.
    pub buffer_size: usize,
    /// Error channel capacity. Errors are advisory and drop on overflow.
    pub error_buffer_size: usize,
    /// Subscribe to OS file events as a wake hint.
    pub use_file_events: bool,
    /// Scan from byte zero instead of seeking to EOF at startup. Used for
    /// historical imports.
    pub read_from_start: bool,
}

impl PollerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PollerConfig {
            path: path.into(),
            interval: DEFAULT_INTERVAL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            error_buffer_size: DEFAULT_ERROR_BUFFER_SIZE,
            use_file_events: false,
            read_from_start: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerMetrics {
    pub poll_count: u64,
    pub entries_processed: u64,
    pub error_count: u64,
    pub total_processing_time: Duration,
    pub last_poll_time: Option<DateTime<Utc>>,
}

/// Byte-position bookkeeping for one file identity. All three fields are
/// updated together under the write lock.
#[derive(Debug, Clone, Copy, Default)]
struct FilePosition {
    last_pos: u64,
    last_size: u64,
    last_mod: Option<SystemTime>,
}

/// Tails one log file: detects rotation, scans appended bytes on each wake,
/// and emits the JSON-bearing lines as [`LogEntry`] values.
pub struct Poller {
    config: PollerConfig,
    position: Arc<RwLock<FilePosition>>,
    metrics: Arc<RwLock<PollerMetrics>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    error_tx: mpsc::Sender<PollerError>,
    error_rx: Option<mpsc::Receiver<PollerError>>,
}

impl Poller {
    /// Build a poller. Unless `read_from_start` is set, the position starts
    /// at the file's current end. A missing file is not an error; the first
    /// scan after it appears picks it up from byte zero.
    pub fn new(config: PollerConfig) -> Result<Self, PollerError> {
        if config.buffer_size == 0 || config.error_buffer_size == 0 {
            return Err(PollerError::InvalidBufferSize);
        }

        let mut position = FilePosition::default();
        if !config.read_from_start {
            match std::fs::metadata(&config.path) {
                Ok(meta) => {
                    position.last_pos = meta.len();
                    position.last_size = meta.len();
                    position.last_mod = meta.modified().ok();
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(PollerError::Stat {
                        path: config.path.clone(),
                        source: err,
                    });
                }
            }
        }

        let (error_tx, error_rx) = mpsc::channel(config.error_buffer_size);
        Ok(Poller {
            config,
            position: Arc::new(RwLock::new(position)),
            metrics: Arc::new(RwLock::new(PollerMetrics::default())),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            worker: None,
            error_tx,
            error_rx: Some(error_rx),
        })
    }

    /// Spawn the worker task and hand back the entry stream. Consumers detect
    /// termination by the channel closing.
    pub fn start(&mut self) -> Result<mpsc::Receiver<LogEntry>, PollerError> {
        if self.worker.is_some() {
            return Err(PollerError::AlreadyRunning(self.config.path.clone()));
        }

        self.cancel = CancellationToken::new();
        let (entry_tx, entry_rx) = mpsc::channel(self.config.buffer_size);
        let ctx = WorkerCtx {
            config: self.config.clone(),
            position: Arc::clone(&self.position),
            metrics: Arc::clone(&self.metrics),
            running: Arc::clone(&self.running),
            cancel: self.cancel.clone(),
            error_tx: self.error_tx.clone(),
        };
        self.worker = Some(tokio::spawn(run_worker(ctx, entry_tx)));
        Ok(entry_rx)
    }

    /// Take the error stream. Errors are advisory; the poller retries on the
    /// next wake regardless.
    pub fn errors(&mut self) -> Option<mpsc::Receiver<PollerError>> {
        self.error_rx.take()
    }

    /// Cancel the worker and wait for it to exit. Idempotent; the entry
    /// channel is closed exactly once, when the worker drops its sender.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                warn!(
                    "poller worker for {} did not exit cleanly: {err}",
                    self.config.path.display()
                );
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> PollerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current byte offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_pos
    }

    pub fn path(&self) -> &std::path::Path {
        &self.config.path
    }
}

struct WorkerCtx {
    config: PollerConfig,
    position: Arc<RwLock<FilePosition>>,
    metrics: Arc<RwLock<PollerMetrics>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    error_tx: mpsc::Sender<PollerError>,
}

impl WorkerCtx {
    fn report(&self, err: PollerError) {
        warn!("{}: {err}", self.config.path.display());
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .error_count += 1;
        // Advisory channel: drop on overflow rather than stall the scan.
        let _ = self.error_tx.try_send(err);
    }
}

async fn run_worker(ctx: WorkerCtx, entry_tx: mpsc::Sender<LogEntry>) {
    ctx.running.store(true, Ordering::SeqCst);
    debug!("poller for {} started", ctx.config.path.display());

    let mut ticker = tokio::time::interval(ctx.config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately, which doubles as the startup scan
    // for read-from-start pollers.

    let mut events: Option<FileEvents> = if ctx.config.use_file_events {
        match watch::file_events(&ctx.config.path) {
            Ok(events) => Some(events),
            Err(source) => {
                ctx.report(PollerError::WatchUnavailable {
                    path: ctx.config.path.clone(),
                    source,
                });
                None
            }
        }
    } else {
        None
    };

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ticker.tick() => {}
            hint = next_hint(&mut events), if events.is_some() => {
                if hint.is_none() {
                    // Watcher died; the timer keeps us alive.
                    events = None;
                    continue;
                }
            }
        }

        let started = Instant::now();
        let outcome = scan(&ctx, &entry_tx).await;
        let elapsed = started.elapsed();

        {
            let mut metrics = ctx
                .metrics
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            metrics.poll_count += 1;
            metrics.total_processing_time += elapsed;
            metrics.last_poll_time = Some(Utc::now());
        }

        match outcome {
            Ok(ScanOutcome::Completed { emitted }) => {
                if emitted > 0 {
                    ctx.metrics
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entries_processed += emitted;
                }
            }
            Ok(ScanOutcome::Cancelled) => break,
            Err(err) => ctx.report(err),
        }
    }

    ctx.running.store(false, Ordering::SeqCst);
    debug!("poller for {} exited", ctx.config.path.display());
    // entry_tx drops here, closing the stream for consumers.
}

async fn next_hint(events: &mut Option<FileEvents>) -> Option<()> {
    match events {
        Some(events) => events.rx.recv().await,
        None => std::future::pending().await,
    }
}

enum ScanOutcome {
    Completed { emitted: u64 },
    Cancelled,
}

/// One wake's worth of work: stat, rotation check, scan to EOF, emit.
async fn scan(ctx: &WorkerCtx, entry_tx: &mpsc::Sender<LogEntry>) -> Result<ScanOutcome, PollerError> {
    let path = &ctx.config.path;

    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            // Not an error: wait for the game to (re)create the file.
            let mut pos = ctx.position.write().unwrap_or_else(PoisonError::into_inner);
            *pos = FilePosition::default();
            return Ok(ScanOutcome::Completed { emitted: 0 });
        }
        Err(source) => {
            return Err(PollerError::Stat {
                path: path.clone(),
                source,
            });
        }
    };
    let current_size = meta.len();
    let current_mod = meta.modified().ok();

    let start_pos = {
        let mut pos = ctx.position.write().unwrap_or_else(PoisonError::into_inner);
        let rotated = current_size < pos.last_pos
            || (current_size < pos.last_size && current_mod != pos.last_mod);
        if rotated {
            info!(
                "{} was rotated or truncated, rescanning from the start",
                path.display()
            );
            pos.last_pos = 0;
        }
        if current_size <= pos.last_pos {
            pos.last_size = current_size;
            pos.last_mod = current_mod;
            return Ok(ScanOutcome::Completed { emitted: 0 });
        }
        pos.last_pos
    };

    let file = File::open(path).await.map_err(|source| PollerError::Open {
        path: path.clone(),
        source,
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    reader
        .seek(SeekFrom::Start(start_pos))
        .await
        .map_err(|source| PollerError::Seek {
            path: path.clone(),
            source,
        })?;

    let mut buf: Vec<u8> = Vec::with_capacity(16 * 1024);
    // Bytes whose entries have been handed off (or that carried none).
    let mut committed: u64 = 0;
    let mut emitted: u64 = 0;

    let result = loop {
        buf.clear();
        let n = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| PollerError::Read {
                path: path.clone(),
                source,
            })?;
        if n == 0 {
            break Ok(ScanOutcome::Completed { emitted });
        }

        if buf.len() > MAX_LINE_BYTES && !buf.ends_with(b"\n") {
            // Skip to the end of the oversized line so the next wake does not
            // trip over it again, then end this scan with an advisory error.
            let skipped = discard_line_remainder(&mut reader)
                .await
                .map_err(|source| PollerError::Read {
                    path: path.clone(),
                    source,
                })?;
            committed += n as u64 + skipped;
            break Err(PollerError::LineTooLong {
                path: path.clone(),
                max: MAX_LINE_BYTES,
            });
        }

        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        let entry = LogEntry::parse(&line);
        if entry.is_json {
            tokio::select! {
                res = entry_tx.send(entry) => {
                    if res.is_err() {
                        // Receiver gone; nothing left to emit to.
                        break Ok(ScanOutcome::Cancelled);
                    }
                    emitted += 1;
                    committed += n as u64;
                }
                _ = ctx.cancel.cancelled() => break Ok(ScanOutcome::Cancelled),
            }
        } else {
            committed += n as u64;
        }
    };

    {
        let mut pos = ctx.position.write().unwrap_or_else(PoisonError::into_inner);
        pos.last_pos = start_pos + committed;
        pos.last_size = current_size.max(pos.last_pos);
        pos.last_mod = current_mod;
    }

    result
}

async fn discard_line_remainder(reader: &mut BufReader<File>) -> std::io::Result<u64> {
    const CHUNK: u64 = 1024 * 1024;
    let mut scratch: Vec<u8> = Vec::new();
    let mut skipped: u64 = 0;
    loop {
        scratch.clear();
        let n = (&mut *reader).take(CHUNK).read_until(b'\n', &mut scratch).await?;
        skipped += n as u64;
        if n == 0 || scratch.ends_with(b"\n") {
            return Ok(skipped);
        }
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }
    &buf[..end]
}
