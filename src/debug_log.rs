//! Opt-in file log for slow-path locking and purge activity.
//!
//! Turned on by `FLYWEIGHT_DEBUG_LOG=1` or `debug_log = true` under
//! `[logging]`. Lines go to `<temp dir>/flyweight-debug.log`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

static ENABLED: AtomicBool = AtomicBool::new(false);
static SINK: OnceLock<Sink> = OnceLock::new();

struct Sink {
    started: Instant,
    file: Mutex<File>,
}

pub const ENV_VAR: &str = "FLYWEIGHT_DEBUG_LOG";

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("flyweight-debug.log")
}

/// Open the log if `force` is set or [`ENV_VAR`] is present. Later calls are
/// no-ops once the file is open.
pub fn init(force: bool) {
    if SINK.get().is_some() || (!force && std::env::var_os(ENV_VAR).is_none()) {
        return;
    }

    let opened = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path());
    match opened {
        Ok(file) => {
            let _ = SINK.set(Sink {
                started: Instant::now(),
                file: Mutex::new(file),
            });
            ENABLED.store(true, Ordering::SeqCst);
            log("DEBUG", "init", "repository debug log opened");
        }
        Err(e) => eprintln!("Warning: Failed to open debug log file: {e}"),
    }
}

#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Append `[elapsed] [thread] [category] action - detail`.
pub fn log(category: &str, action: &str, detail: &str) {
    let Some(sink) = SINK.get().filter(|_| is_enabled()) else {
        return;
    };

    let line = format!(
        "[{:>8}ms] [{:?}] [{category}] {action} - {detail}\n",
        sink.started.elapsed().as_millis(),
        std::thread::current().id(),
    );
    let mut file = sink.file.lock();
    let _ = file.write_all(line.as_bytes());
    let _ = file.flush();
}

/// Record that `operation` is waiting for `lock`.
#[inline]
pub fn lock_acquiring(lock: &str, operation: &str) {
    log(lock, "ACQUIRING", operation);
}

#[inline]
pub fn lock_acquired(lock: &str, operation: &str) {
    log(lock, "ACQUIRED", operation);
}

/// Logs the release of `lock` when dropped.
pub struct LogOnDrop {
    lock: &'static str,
    operation: &'static str,
}

impl LogOnDrop {
    pub fn new(lock: &'static str, operation: &'static str) -> Self {
        Self { lock, operation }
    }
}

impl Drop for LogOnDrop {
    fn drop(&mut self) {
        log(self.lock, "RELEASED", self.operation);
    }
}
