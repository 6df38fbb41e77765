//! Recurring schedule thread. One timer slot per service; each tick runs an
//! update unless one is already in flight, then re-reads the configuration
//! so interval changes and disabling take effect without a restart.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::runlog::LogLevel;
use super::UpdateService;
use crate::settings;

pub struct ScheduleHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl UpdateService {
    /// Starts the recurring schedule when enabled in the configuration and
    /// no timer is already armed.
    pub fn start_schedule(self: &Arc<Self>) {
        let config = settings::load_config(self.store.as_ref());
        if !config.schedule_enabled {
            self.log(LogLevel::Warning, "schedule is disabled in configuration");
            return;
        }

        let mut slot = self.schedule.lock().unwrap();
        if slot.is_some() {
            self.log(LogLevel::Warning, "schedule is already running");
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let service = Arc::clone(self);
        let mut interval = config.update_interval_secs;
        let thread = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(Duration::from_secs(interval)) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            if service.running.load(Ordering::SeqCst) {
                service.log(
                    LogLevel::Warning,
                    "scheduled run skipped, previous run still in progress",
                );
            } else {
                let _ = service.run_update();
            }
            let config = settings::load_config(service.store.as_ref());
            if !config.schedule_enabled {
                service.log(LogLevel::Info, "schedule disabled, timer stopping");
                break;
            }
            interval = config.update_interval_secs;
        });

        *slot = Some(ScheduleHandle { stop_tx, thread });
        self.log(
            LogLevel::Success,
            format!("schedule started, next run in {} seconds", interval),
        );
    }

    /// Signals the timer thread and waits for it to exit.
    pub fn stop_schedule(&self) {
        let handle = self.schedule.lock().unwrap().take();
        match handle {
            Some(ScheduleHandle { stop_tx, thread }) => {
                let _ = stop_tx.send(());
                if thread.join().is_err() {
                    self.log(LogLevel::Warning, "schedule thread ended abnormally");
                } else {
                    self.log(LogLevel::Success, "schedule stopped");
                }
            }
            None => self.log(LogLevel::Warning, "schedule is not running"),
        }
    }
}
