use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use trip_core::{Clock, PlaybackState, PlaybackTx};

use crate::PlaybackScheduler;

/// Runs a scheduler's timers on the tokio runtime.
///
/// Timer firings and manual commands both go through the same mutex, so a
/// tick never interleaves with a seek; whichever takes the lock last wins.
pub struct PlaybackDriver<C: Clock + 'static> {
    scheduler: Arc<Mutex<PlaybackScheduler<C>>>,
    wake: Arc<Notify>,
    tx: PlaybackTx,
    task: JoinHandle<()>,
}

impl<C: Clock + 'static> PlaybackDriver<C> {
    pub fn spawn(scheduler: PlaybackScheduler<C>, tx: PlaybackTx) -> Self {
        let scheduler = Arc::new(Mutex::new(scheduler));
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run(scheduler.clone(), wake.clone(), tx.clone()));
        Self { scheduler, wake, tx, task }
    }

    /// Applies a command atomically and re-arms the timer.
    pub fn with<R>(&self, f: impl FnOnce(&mut PlaybackScheduler<C>) -> R) -> R {
        let r = {
            let mut s = self.scheduler.lock();
            let r = f(&mut s);
            for ev in s.take_events() {
                if self.tx.send(ev).is_err() {
                    log::debug!("playback receiver dropped, discarding event");
                    break;
                }
            }
            r
        };
        self.wake.notify_one();
        r
    }

    pub fn play(&self) {
        self.with(|s| s.play())
    }

    pub fn pause(&self) {
        self.with(|s| s.pause())
    }

    pub fn seek(&self, percentage: f64) {
        self.with(|s| s.seek(percentage))
    }

    pub fn next(&self) {
        self.with(|s| s.next())
    }

    pub fn previous(&self) {
        self.with(|s| s.previous())
    }

    pub fn reset(&self) {
        self.with(|s| s.reset())
    }

    pub fn set_speed(&self, factor: f64) {
        self.with(|s| s.set_speed(factor))
    }

    pub fn position(&self) -> usize {
        self.scheduler.lock().position()
    }

    pub fn state(&self) -> PlaybackState {
        self.scheduler.lock().state()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run<C: Clock>(scheduler: Arc<Mutex<PlaybackScheduler<C>>>, wake: Arc<Notify>, tx: PlaybackTx) {
    loop {
        let wait = {
            let mut s = scheduler.lock();
            s.poll();
            for ev in s.take_events() {
                if tx.send(ev).is_err() {
                    log::debug!("playback receiver dropped, stopping driver");
                    return;
                }
            }
            s.next_deadline().map(|d| d.saturating_sub(s.now()))
        };
        match wait {
            Some(w) => {
                tokio::select! {
                    _ = tokio::time::sleep(w) => {}
                    _ = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
}
