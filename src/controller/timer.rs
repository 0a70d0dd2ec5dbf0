use std::future::Future;
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Restartable one-shot timer.
///
/// Every `schedule` starts a new generation. The callback receives its generation and runs on its
/// own task, so by the time its result reaches the owner the timer may have been re-armed or
/// cancelled; the owner asks [`IdleResetTimer::take_fired`] whether the firing still counts.
#[derive(Debug, Default)]
pub struct IdleResetTimer {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl IdleResetTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels a pending firing and arms a new one. Returns the generation of the new firing.
    pub fn schedule<F, Fut>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;

        self.pending = Some(spawn(async move {
            sleep(delay).await;
            on_fire(generation).await;
        }));

        generation
    }

    /// Safe to call without a pending firing.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Accepts a firing of `generation` if it is the armed one, disarming the timer.
    /// Firings that were superseded or cancelled are rejected.
    pub fn take_fired(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            return false;
        }
        self.pending = None;
        true
    }
}

impl Drop for IdleResetTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
