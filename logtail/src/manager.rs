use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::entry::LogEntry;
use crate::notifier::{Notifier, NotifierConfig};
use crate::poller::{Poller, PollerConfig, PollerError};

const DEFAULT_AGGREGATE_BUFFER: usize = 1000;
const DEFAULT_ERROR_BUFFER: usize = 100;
const NOTIFIER_BUFFER: usize = 100;

#[derive(Debug, Error, Diagnostic)]
pub enum ManagerError {
    #[error("a poller with key \"{0}\" already exists")]
    DuplicateKey(String),

    #[error("no poller with key \"{0}\"")]
    UnknownKey(String),

    #[error("manager is already running")]
    AlreadyRunning,

    #[error("poller \"{key}\": {source}")]
    Poller {
        key: String,
        #[source]
        source: PollerError,
    },
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Capacity of the aggregated entry channel. Relays block when it fills,
    /// which backpressures each file scanner.
    pub entry_buffer_size: usize,
    /// Capacity of the aggregated error channel. Overflow drops.
    pub error_buffer_size: usize,
    /// When set, entries are also forwarded to a [`Notifier`] sidecar.
    pub notifier: Option<NotifierConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            entry_buffer_size: DEFAULT_AGGREGATE_BUFFER,
            error_buffer_size: DEFAULT_ERROR_BUFFER,
            notifier: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateMetrics {
    pub poll_count: u64,
    pub entries_processed: u64,
    pub error_count: u64,
    pub total_processing_time: Duration,
    pub last_poll_time: Option<DateTime<Utc>>,
    pub average_entries_per_poll: f64,
}

/// Owns a set of named [`Poller`]s and multiplexes their output onto one
/// aggregated entry stream and one annotated error stream. Entry ordering is
/// preserved per source key; interleaving across keys is arbitrary.
pub struct PollerManager {
    config: ManagerConfig,
    pollers: Mutex<HashMap<String, Poller>>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    relays: Mutex<Vec<JoinHandle<()>>>,
    agg_entry_tx: Mutex<Option<mpsc::Sender<LogEntry>>>,
    agg_error_tx: Mutex<Option<mpsc::Sender<ManagerError>>>,
    agg_error_rx: Mutex<Option<mpsc::Receiver<ManagerError>>>,
    notifier: Option<Arc<Notifier>>,
    notifier_tx: Mutex<Option<mpsc::Sender<LogEntry>>>,
}

impl PollerManager {
    pub fn new(config: ManagerConfig) -> Self {
        let notifier = config
            .notifier
            .clone()
            .map(|cfg| Arc::new(Notifier::new(cfg)));
        PollerManager {
            config,
            pollers: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            relays: Mutex::new(Vec::new()),
            agg_entry_tx: Mutex::new(None),
            agg_error_tx: Mutex::new(None),
            agg_error_rx: Mutex::new(None),
            notifier,
            notifier_tx: Mutex::new(None),
        }
    }

    /// Register a poller under a unique key. On a running manager the poller
    /// starts immediately; otherwise it starts with [`PollerManager::start`].
    pub fn add_poller(
        &self,
        key: impl Into<String>,
        config: PollerConfig,
    ) -> Result<(), ManagerError> {
        let key = key.into();
        let mut pollers = lock(&self.pollers);
        if pollers.contains_key(&key) {
            return Err(ManagerError::DuplicateKey(key));
        }

        let mut poller = Poller::new(config).map_err(|source| ManagerError::Poller {
            key: key.clone(),
            source,
        })?;

        if self.running.load(Ordering::SeqCst) {
            let entry_rx = poller.start().map_err(|source| ManagerError::Poller {
                key: key.clone(),
                source,
            })?;
            let error_rx = poller.errors();
            self.spawn_relay(key.clone(), entry_rx, error_rx);
        }

        debug!("registered poller \"{key}\"");
        pollers.insert(key, poller);
        Ok(())
    }

    /// Stop and discard the poller registered under `key`.
    pub async fn remove_poller(&self, key: &str) -> Result<(), ManagerError> {
        let poller = lock(&self.pollers).remove(key);
        match poller {
            Some(mut poller) => {
                poller.stop().await;
                debug!("removed poller \"{key}\"");
                Ok(())
            }
            None => Err(ManagerError::UnknownKey(key.to_string())),
        }
    }

    /// Start every registered poller and return the aggregated entry stream.
    pub fn start(&self) -> Result<mpsc::Receiver<LogEntry>, ManagerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ManagerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        *lock(&self.cancel) = cancel.clone();

        let (entry_tx, entry_rx) = mpsc::channel(self.config.entry_buffer_size);
        let (error_tx, error_rx) = mpsc::channel(self.config.error_buffer_size);
        *lock(&self.agg_entry_tx) = Some(entry_tx);
        *lock(&self.agg_error_tx) = Some(error_tx);
        *lock(&self.agg_error_rx) = Some(error_rx);

        if let Some(notifier) = &self.notifier {
            let (notif_tx, notif_rx) = mpsc::channel(NOTIFIER_BUFFER);
            *lock(&self.notifier_tx) = Some(notif_tx);
            let notifier = Arc::clone(notifier);
            let cancel = cancel.clone();
            lock(&self.relays).push(tokio::spawn(notifier_task(notifier, notif_rx, cancel)));
        }

        let mut startup_error = None;
        {
            let mut pollers = lock(&self.pollers);
            for (key, poller) in pollers.iter_mut() {
                match poller.start() {
                    Ok(entry_rx) => {
                        let error_rx = poller.errors();
                        self.spawn_relay(key.clone(), entry_rx, error_rx);
                    }
                    Err(source) => {
                        startup_error = Some(ManagerError::Poller {
                            key: key.clone(),
                            source,
                        });
                        break;
                    }
                }
            }
        }
        if let Some(err) = startup_error {
            // Roll back so the caller can fix the config and try again.
            self.running.store(false, Ordering::SeqCst);
            cancel.cancel();
            return Err(err);
        }

        Ok(entry_rx)
    }

    /// Take the aggregated error stream. Each error is annotated with the
    /// source poller's key.
    pub fn errors(&self) -> Option<mpsc::Receiver<ManagerError>> {
        lock(&self.agg_error_rx).take()
    }

    /// Stop all pollers, wait for the relay tasks to drain, and close the
    /// aggregated entry channel exactly once.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Children first: their entry channels close, which ends each relay.
        let drained: Vec<(String, Poller)> = lock(&self.pollers).drain().collect();
        let mut stopped = Vec::with_capacity(drained.len());
        for (key, mut poller) in drained {
            poller.stop().await;
            stopped.push((key, poller));
        }
        lock(&self.pollers).extend(stopped);

        lock(&self.cancel).cancel();

        let relays: Vec<JoinHandle<()>> = lock(&self.relays).drain(..).collect();
        for relay in relays {
            if let Err(err) = relay.await {
                warn!("relay task did not exit cleanly: {err}");
            }
        }

        // Last senders standing; dropping them closes the aggregated streams.
        lock(&self.agg_entry_tx).take();
        lock(&self.agg_error_tx).take();
        lock(&self.notifier_tx).take();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn poller_count(&self) -> usize {
        lock(&self.pollers).len()
    }

    pub fn notifier(&self) -> Option<Arc<Notifier>> {
        self.notifier.clone()
    }

    /// Sum of the per-poller metrics. `last_poll_time` is the max across
    /// children; `average_entries_per_poll` is the overall ratio.
    pub fn aggregate_metrics(&self) -> AggregateMetrics {
        let mut agg = AggregateMetrics::default();
        for poller in lock(&self.pollers).values() {
            let m = poller.metrics();
            agg.poll_count += m.poll_count;
            agg.entries_processed += m.entries_processed;
            agg.error_count += m.error_count;
            agg.total_processing_time += m.total_processing_time;
            agg.last_poll_time = agg.last_poll_time.max(m.last_poll_time);
        }
        if agg.poll_count > 0 {
            agg.average_entries_per_poll = agg.entries_processed as f64 / agg.poll_count as f64;
        }
        agg
    }

    fn spawn_relay(
        &self,
        key: String,
        entry_rx: mpsc::Receiver<LogEntry>,
        error_rx: Option<mpsc::Receiver<PollerError>>,
    ) {
        let Some(agg_tx) = lock(&self.agg_entry_tx).clone() else {
            return;
        };
        let Some(agg_error_tx) = lock(&self.agg_error_tx).clone() else {
            return;
        };
        let notif_tx = lock(&self.notifier_tx).clone();
        let cancel = lock(&self.cancel).clone();
        let handle = tokio::spawn(relay(
            key, entry_rx, error_rx, agg_tx, agg_error_tx, notif_tx, cancel,
        ));
        lock(&self.relays).push(handle);
    }
}

/// One relay per child poller: tags entries with the source key, forwards
/// them (with backpressure) onto the aggregated channel, and annotates
/// errors as it forwards them.
async fn relay(
    key: String,
    mut entries: mpsc::Receiver<LogEntry>,
    error_rx: Option<mpsc::Receiver<PollerError>>,
    agg_tx: mpsc::Sender<LogEntry>,
    agg_error_tx: mpsc::Sender<ManagerError>,
    notif_tx: Option<mpsc::Sender<LogEntry>>,
    cancel: CancellationToken,
) {
    let mut errors = error_rx;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            entry = entries.recv() => {
                let Some(mut entry) = entry else { break };
                entry.source = Some(key.clone());
                if let Some(notif_tx) = &notif_tx {
                    // The notifier is advisory; a full buffer just skips it.
                    let _ = notif_tx.try_send(entry.clone());
                }
                tokio::select! {
                    res = agg_tx.send(entry) => if res.is_err() { break },
                    _ = cancel.cancelled() => break,
                }
            }
            err = recv_error(&mut errors), if errors.is_some() => {
                match err {
                    Some(source) => {
                        let annotated = ManagerError::Poller { key: key.clone(), source };
                        let _ = agg_error_tx.try_send(annotated);
                    }
                    None => errors = None,
                }
            }
        }
    }
    debug!("relay for \"{key}\" exited");
}

async fn recv_error(errors: &mut Option<mpsc::Receiver<PollerError>>) -> Option<PollerError> {
    match errors {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn notifier_task(
    notifier: Arc<Notifier>,
    mut rx: mpsc::Receiver<LogEntry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            entry = rx.recv() => match entry {
                Some(entry) => {
                    notifier.observe(&entry);
                }
                None => break,
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
