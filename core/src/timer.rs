//! Background tick dispatcher (spec.md §4.3 "Background tick", §9
//! "Dynamic dispatch").
//!
//! Grounded on `iFuseLibInitTimerThread`/`_timerTick` in
//! `iFuse.Lib.cpp`: a single OS thread wakes once a second, takes a
//! read lock over a list of registered callbacks, and calls each in
//! turn. This keeps that one-second tick and the registered-callback
//! list, dropping the originals's raw function-pointer comparison for
//! `unregister` (not needed: every registration here lives for the
//! life of the mount).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

type TickHandler = Box<dyn Fn() + Send + Sync>;

pub struct TimerService {
    handlers: RwLock<Vec<TickHandler>>,
    running: Arc<AtomicBool>,
    thread: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TimerService {
    pub fn new() -> Self {
        TimerService {
            handlers: RwLock::new(Vec::new()),
            running: Arc::new(AtomicBool::new(false)),
            thread: std::sync::Mutex::new(None),
        }
    }

    /// Registers a callback to run on every tick. Must be called before
    /// `start` joins a background thread (handlers registered after
    /// `start` are picked up on the next tick regardless, since the
    /// list is read fresh each iteration).
    pub fn register(self: &Arc<Self>, handler: impl Fn() + Send + Sync + 'static) {
        self.handlers.write().unwrap().push(Box::new(handler));
    }

    /// Spawns the tick thread. No-op if already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        let handle = std::thread::spawn(move || {
            crate::log_debug!("timer thread started");
            while this.running.load(Ordering::SeqCst) {
                {
                    let handlers = this.handlers.read().unwrap();
                    for handler in handlers.iter() {
                        handler();
                    }
                }
                std::thread::sleep(TICK_INTERVAL);
            }
            crate::log_debug!("timer thread stopped");
        });
        *self.thread.lock().unwrap() = Some(handle);
    }

    /// Stops the tick thread and joins it. No-op if not running.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn handlers_run_repeatedly_until_stopped() {
        let timer = Arc::new(TimerService::new());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        timer.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.start();
        std::thread::sleep(Duration::from_millis(2200));
        timer.stop();
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn start_is_idempotent() {
        let timer = Arc::new(TimerService::new());
        timer.start();
        timer.start();
        assert!(timer.running.load(Ordering::SeqCst));
        timer.stop();
    }

    #[test]
    fn stop_without_start_is_noop() {
        let timer = TimerService::new();
        timer.stop();
    }
}
