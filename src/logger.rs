//! Session logger - writes all log output to a single file in the OS data directory.
//!
//! The file is **truncated at each launch**, so it only ever holds output from
//! the most recent editing session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\PhotoEdit\photoedit.log`
//!   Linux:    `~/.local/share/PhotoEdit/photoedit.log`
//!   macOS:    `~/Library/Application Support/PhotoEdit/photoedit.log`
//!
//! Anywhere in the crate use the `log_info!` / `log_warn!` / `log_err!`
//! macros.  Before `init()` runs (tests, headless batch mode) the macros are
//! silent no-ops.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Folder name used under the platform data/config directories.
pub const APP_DIR_NAME: &str = "PhotoEdit";

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Write a line to the session log.  I/O errors are swallowed.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Write a timestamped, level-tagged line to the session log.
pub fn write(level: &str, msg: &str) {
    write_line(&format_line(&timestamp(), level, msg));
}

fn format_line(ts: &str, level: &str, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level, msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Initialise the session logger.  Call once, before the window opens.
///
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that mirrors the panic message into the log.
pub fn init() {
    let path = data_dir().join(APP_DIR_NAME).join("photoedit.log");

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== PhotoEdit session started (unix {}) ===",
        unix_seconds()
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format_line(&timestamp(), "PANIC", &info.to_string()));
        prev(info);
    }));
}

/// Platform data directory (without the app sub-folder).
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    clock_string(unix_seconds())
}

fn clock_string(secs: u64) -> String {
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock_string(0), "00:00:00");
        assert_eq!(clock_string(86400 + 3661), "01:01:01");
    }

    #[test]
    fn lines_carry_level_tag() {
        assert_eq!(format_line("12:00:00", "WARN", "hi"), "[12:00:00] [WARN] hi");
    }

    #[test]
    fn writing_before_init_is_silent() {
        write("INFO", "nobody is listening");
        log_info!("still fine {}", 1);
    }
}
