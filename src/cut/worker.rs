//! Timed background evaluation for native targets.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::CutError;

/// Runs one job at a time on a fresh thread.
///
/// The busy flag is owned by the running job, not by the caller: when the
/// caller stops waiting on a timeout the job keeps the flag set until it
/// actually finishes, so no second cut can start on top of it.
#[derive(Debug, Default)]
pub(crate) struct CutWorker {
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the job ends, including by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Release);
    }
}

impl CutWorker {
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Acquire)
    }

    pub(crate) fn run<T, F>(&self, timeout: Duration, job: F) -> Result<T, CutError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.busy.swap(true, Acquire) {
            return Err(CutError::Busy);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("knife-cut".to_string())
            .spawn(move || {
                // Locals drop in reverse order on unwind: the flag clears
                // before the channel disconnects.
                let tx = tx;
                let guard = guard;
                let value = job();
                drop(guard);
                // The receiver is gone after a timeout.
                let _ = tx.send(value);
            });
        if let Err(err) = spawned {
            // The closure, and the guard with it, was dropped by the failed
            // spawn.
            log::warn!("cut worker: failed to spawn thread: {err}");
            return Err(CutError::WorkerUnavailable);
        }

        match rx.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("cut worker: no answer after {timeout:?}, keeping the target");
                Err(CutError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("cut worker: job ended without a result");
                Err(CutError::WorkerUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Sender;

    #[test]
    fn returns_job_result_and_clears_busy() {
        let worker = CutWorker::default();
        let value = worker.run(Duration::from_secs(5), || 21 * 2).unwrap();
        assert_eq!(value, 42);
        assert!(!worker.is_busy());
    }

    #[test]
    fn timeout_keeps_worker_busy_until_job_finishes() {
        let worker = CutWorker::default();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx): (Sender<()>, _) = mpsc::channel();

        let result = worker.run(Duration::from_millis(20), move || {
            let _ = release_rx.recv();
            let _ = done_tx.send(());
        });
        assert_eq!(result, Err(CutError::Timeout(Duration::from_millis(20))));
        assert!(worker.is_busy());
        assert_eq!(worker.run(Duration::from_millis(20), || ()), Err(CutError::Busy));

        release_tx.send(()).unwrap();
        done_rx.recv().unwrap();
        // The flag is cleared just before the job's result is sent.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while worker.is_busy() && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        assert!(!worker.is_busy());
    }

    #[test]
    fn panicking_job_reports_unavailable() {
        let worker = CutWorker::default();
        let result: Result<(), _> = worker.run(Duration::from_secs(5), || panic!("boom"));
        assert_eq!(result, Err(CutError::WorkerUnavailable));
        assert!(!worker.is_busy());
    }
}
