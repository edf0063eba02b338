//! Tailing layer for MTGA log files.
//!
//! Arena appends to `Player.log` for as long as the game runs, rotates it
//! without warning, and mixes plain diagnostics with lines carrying large
//! JSON payloads. This crate turns that into an ordered, at-least-once
//! stream of [`LogEntry`] values: a [`Poller`] tracks byte position across
//! rotation and truncation for one file, and a [`PollerManager`] fans any
//! number of pollers into a single stream with per-source error annotation,
//! aggregate metrics, and an optional [`Notifier`] sidecar for user-facing
//! events.
//!
//! Only lines that decode to a `{`-rooted JSON object are published;
//! everything else is dropped at the scanner.

pub mod entry;
pub mod manager;
pub mod notifier;
pub mod poller;
pub mod watch;

pub use entry::{LogEntry, parse_log_timestamp};
pub use manager::{AggregateMetrics, ManagerConfig, ManagerError, PollerManager};
pub use notifier::{Importance, Notifier, NotifierConfig, UiEvent};
pub use poller::{MAX_LINE_BYTES, Poller, PollerConfig, PollerError, PollerMetrics};
