use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

/// File-event hints for a single log path.
///
/// Hints shorten the latency between the game writing a line and the poller
/// picking it up. They are never load-bearing: the poller's periodic timer
/// still fires regardless, and a watcher that fails to initialise only costs
/// latency. The watcher is bound to the parent directory rather than the file
/// itself because Arena replaces the file during rotation, which silently
/// kills inode-bound watches on several platforms.
pub struct FileEvents {
    pub rx: mpsc::Receiver<()>,
    _watcher: RecommendedWatcher,
}

pub fn file_events(path: &Path) -> Result<FileEvents, notify::Error> {
    let (tx, rx) = mpsc::channel(16);
    let target = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        let Ok(event) = res else { return };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        // Some backends report directory-level events with no paths attached.
        if event.paths.is_empty() || event.paths.iter().any(|p| p == &target) {
            // A full hint channel already guarantees a wake-up.
            let _ = tx.try_send(());
        }
    })?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    Ok(FileEvents {
        rx,
        _watcher: watcher,
    })
}
