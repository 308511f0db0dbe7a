// Background position reporting for a session

use crate::handle::WeakSessionHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Periodically asks a session to report its position to observers.
///
/// Holds only a weak reference: the worker exits by itself once the session is
/// gone. Dropping the reporter stops and joins the worker.
pub struct PositionReporter {
    stop_flag: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PositionReporter {
    pub(crate) fn spawn(session: WeakSessionHandle, interval: Duration) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = stop_flag.clone();

        let worker = thread::spawn(move || {
            log::debug!("[reporter {}] started, every {:?}", session.id(), interval);

            loop {
                thread::park_timeout(interval);
                if stop.load(Ordering::SeqCst) {
                    break;
                }

                match session.upgrade() {
                    Some(handle) => handle.report_position(),
                    None => {
                        log::debug!("[reporter {}] session dropped", session.id());
                        break;
                    }
                }
            }

            log::debug!("[reporter {}] exited", session.id());
        });

        Self {
            stop_flag,
            worker: Some(worker),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }

    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stop_flag.store(true, Ordering::SeqCst);
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}

impl Drop for PositionReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
