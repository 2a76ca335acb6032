//! Background worker ticking the middleware
//!
//! Hosts never call into the plugin outside of their audio and control
//! callbacks, so preset loading and other deferred work needs its own
//! thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{PluginError, PluginResult};
use crate::synth::Middleware;

/// Pause between two ticks
pub const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Running housekeeping thread; stopped and joined on drop
pub struct Housekeeping {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Housekeeping {
    pub fn spawn<M: Middleware + ?Sized>(middleware: Arc<M>) -> PluginResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("dssi-housekeeping".into())
            .spawn(move || {
                while flag.load(Ordering::Acquire) {
                    middleware.tick();
                    std::thread::sleep(TICK_INTERVAL);
                }
            })
            .map_err(PluginError::ThreadSpawn)?;

        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop ticking and wait for the worker to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Housekeeping thread panicked");
            }
        }
    }
}

impl Drop for Housekeeping {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[derive(Default)]
    struct Ticker {
        ticks: AtomicUsize,
    }

    impl Middleware for Ticker {
        fn tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
        fn rescan_banks(&self) {}
        fn bank_count(&self) -> usize {
            0
        }
        fn load_bank(&self, _bank: usize) -> Option<Vec<String>> {
            None
        }
        fn pending_set_bank(&self, _bank: usize) {}
        fn pending_set_program(&self, _part: usize, _program: usize) {}
    }

    #[test]
    fn test_ticks_until_stopped() {
        let ticker = Arc::new(Ticker::default());
        let mut worker = Housekeeping::spawn(Arc::clone(&ticker)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while ticker.ticks.load(Ordering::SeqCst) < 3 {
            assert!(Instant::now() < deadline, "worker never ticked");
            std::thread::sleep(Duration::from_millis(1));
        }

        worker.stop();
        assert!(!worker.is_running());
        let after_stop = ticker.ticks.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(ticker.ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_drop_releases_middleware() {
        let ticker = Arc::new(Ticker::default());
        let worker = Housekeeping::spawn(Arc::clone(&ticker)).unwrap();
        drop(worker);
        assert_eq!(Arc::strong_count(&ticker), 1, "worker's handle released on join");
    }
}
