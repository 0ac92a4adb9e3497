//! Synthetic progress for UX feedback.
//!
//! Neither the "upload" of an admitted file nor the analysis call reports
//! real progress, so both are animated: a lazy sequence `0, 5, 10, …, 100`,
//! one value per tick, that ends at 100.
//!
//! A [`ProgressSimulator`] is just the recipe (interval + step). Each call to
//! [`ProgressSimulator::start`] spawns an independent tokio task and returns a
//! [`ProgressHandle`]; dropping the handle aborts the task, so a simulator can
//! never outlive the file or request it animates.

use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::trace;

/// A boxed stream of progress percentages.
pub type ProgressStream = Pin<Box<dyn Stream<Item = u8> + Send>>;

/// Recipe for one progress animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSimulator {
    interval: Duration,
    step: u8,
}

impl ProgressSimulator {
    pub fn new(interval: Duration, step: u8) -> Self {
        Self {
            interval,
            step: step.clamp(1, 100),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// The lazy sequence: yields 0 immediately, then one value per interval,
    /// each `step` higher than the last, ending with exactly 100.
    pub fn sequence(&self) -> ProgressStream {
        let interval = self.interval;
        let step = self.step;
        let s = stream::unfold(Some(0u8), move |state| async move {
            let value = state?;
            if value > 0 {
                tokio::time::sleep(interval).await;
            }
            let next = if value >= 100 {
                None
            } else {
                Some(value.saturating_add(step).min(100))
            };
            Some((value, next))
        });
        Box::pin(s)
    }

    /// Drive the sequence on a spawned task, calling `on_tick` with each
    /// value. Returning `false` from `on_tick` stops the animation early (the
    /// owner is gone).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&self, mut on_tick: F) -> ProgressHandle
    where
        F: FnMut(u8) -> bool + Send + 'static,
    {
        let mut seq = self.sequence();
        let task = tokio::spawn(async move {
            while let Some(value) = seq.next().await {
                if !on_tick(value) {
                    trace!("progress owner gone at {}%", value);
                    return;
                }
            }
        });
        ProgressHandle { task }
    }
}

/// Running animation. Dropping it cancels the timer.
#[derive(Debug)]
pub struct ProgressHandle {
    task: JoinHandle<()>,
}

impl ProgressHandle {
    /// Stop the animation now.
    pub fn cancel(self) {
        drop(self);
    }

    /// True once the sequence reached 100, was stopped by its callback, or
    /// was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
