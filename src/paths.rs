use std::path::{Path, PathBuf};

/// Directories where Arena is known to write its logs, most likely first.
pub fn default_log_dirs() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    let mut dirs = Vec::new();
    if cfg!(target_os = "macos") {
        dirs.push(home.join("Library/Application Support/com.wizards.mtga/Logs/Logs"));
        dirs.push(home.join("Library/Logs/Wizards of the Coast/MTGA"));
    } else if cfg!(target_os = "windows") {
        dirs.push(home.join("AppData/LocalLow/Wizards Of The Coast/MTGA"));
    } else {
        // Steam Proton keeps the Windows layout inside the compatdata prefix.
        dirs.push(home.join(
            ".steam/steam/steamapps/compatdata/2141910/pfx/drive_c/users/steamuser/AppData/LocalLow/Wizards Of The Coast/MTGA",
        ));
    }
    dirs
}

/// Find live log files to tail. An `ARENALOG_LOG_PATH` override wins;
/// otherwise every existing `Player.log` under the default directories.
pub fn discover_log_paths() -> Vec<PathBuf> {
    if let Ok(path) = std::env::var("ARENALOG_LOG_PATH") {
        return vec![PathBuf::from(path)];
    }
    default_log_dirs()
        .into_iter()
        .map(|dir| dir.join("Player.log"))
        .filter(|path| path.exists())
        .collect()
}

/// Names the historical importer cares about: the live log, its predecessor,
/// and the dated `UTC_Log*.log` archives.
pub fn is_historical_log_name(name: &str) -> bool {
    name == "Player.log"
        || name == "Player-prev.log"
        || (name.starts_with("UTC_Log") && name.ends_with(".log"))
}

/// All importable logs in a directory, newest first by modification time.
pub fn discover_historical_logs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut logs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(is_historical_log_name)
        })
        .collect();

    logs.sort_by_key(|path| {
        std::cmp::Reverse(
            path.metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        )
    });
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historical_name_matching() {
        assert!(is_historical_log_name("Player.log"));
        assert!(is_historical_log_name("Player-prev.log"));
        assert!(is_historical_log_name("UTC_Log - 11-27-2025 19.12.55.log"));
        assert!(!is_historical_log_name("Player.log.bak"));
        assert!(!is_historical_log_name("output_log.txt"));
    }

    #[test]
    fn historical_logs_sort_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["UTC_Log - old.log", "Player-prev.log", "Player.log", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
            // Distinct mtimes so the ordering is well-defined.
            std::thread::sleep(std::time::Duration::from_millis(15));
        }
        let logs = discover_historical_logs(dir.path()).unwrap();
        let names: Vec<_> = logs
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Player.log", "Player-prev.log", "UTC_Log - old.log"]);
    }
}
