//! Job Queue
//!
//! A deferring scheduler. Instead of re-running an effect the moment one of
//! its dependencies changes, the effect is queued, and the queue runs every
//! pending effect once when it is flushed.
//!
//! # Algorithm
//!
//! 1. A trigger calls the effect's scheduler, which queues the effect by id.
//!    Queuing an effect that is already pending does nothing, so any number
//!    of writes before a flush collapse into one run.
//! 2. `flush` pops jobs in the order they were first queued and runs them.
//! 3. Jobs queued while flushing (an effect writing state another pending
//!    effect reads) are picked up by the same flush.
//!
//! A job that keeps re-queuing itself is dropped after
//! [`RECURSION_LIMIT`] runs within one flush.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::runtime::{Job, Scheduler};
use super::EffectId;

/// Maximum number of times one job may run during a single flush.
pub const RECURSION_LIMIT: u32 = 100;

/// Queue of deferred effect runs.
///
/// Clones share the same queue.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ripple_core::reactive::{effect_with, EffectOptions, JobQueue, Signal};
///
/// let queue = JobQueue::new();
/// let count = Signal::new(0);
/// let runs = Rc::new(Cell::new(0));
///
/// let (count_clone, runs_clone) = (count.clone(), runs.clone());
/// effect_with(
///     move || {
///         count_clone.get();
///         runs_clone.set(runs_clone.get() + 1);
///     },
///     EffectOptions::default().scheduler(queue.scheduler()),
/// );
///
/// count.set(1);
/// count.set(2);
/// assert_eq!(queue.flush(), 1);
/// assert_eq!(runs.get(), 2);
/// ```
#[derive(Clone, Default)]
pub struct JobQueue {
    pending: Rc<RefCell<IndexMap<EffectId, Job>>>,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` under `id` unless a job for `id` is already pending.
    ///
    /// Returns `true` if the job was queued.
    pub fn queue(&self, id: EffectId, job: impl Fn() + 'static) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.contains_key(&id) {
            return false;
        }
        pending.insert(id, Rc::new(job));
        true
    }

    /// A scheduler that queues the triggered effect's own run.
    pub fn scheduler(&self) -> impl Fn(EffectId) + 'static {
        let queue = self.clone();
        move |id| {
            queue.queue(id, move || {
                id.run();
            });
        }
    }

    /// Same as [`scheduler`](Self::scheduler), already boxed.
    pub fn as_scheduler(&self) -> Scheduler {
        Rc::new(self.scheduler())
    }

    /// Run every pending job, including jobs queued while flushing.
    ///
    /// Returns the number of jobs run.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        let mut counts: HashMap<EffectId, u32> = HashMap::new();

        loop {
            // Pop before running: the job may queue more work.
            let next = self.pending.borrow_mut().shift_remove_index(0);
            let Some((id, job)) = next else {
                break;
            };

            let count = counts.entry(id).or_insert(0);
            *count += 1;
            if *count > RECURSION_LIMIT {
                tracing::warn!(
                    effect = ?id,
                    limit = RECURSION_LIMIT,
                    "maximum recursive updates exceeded, dropping job"
                );
                continue;
            }

            job();
            ran += 1;
        }
        ran
    }

    /// Number of jobs waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Drop every pending job without running it.
    pub fn clear(&self) {
        let jobs = std::mem::take(&mut *self.pending.borrow_mut());
        drop(jobs);
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.pending.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::reactive::{effect_with, EffectOptions, Signal};

    fn queued_effect(
        queue: &JobQueue,
        f: impl Fn() + 'static,
    ) -> (crate::reactive::EffectRunner<()>, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let runner = effect_with(
            move || {
                f();
                runs_clone.set(runs_clone.get() + 1);
            },
            EffectOptions::default().scheduler(queue.scheduler()),
        );
        (runner, runs)
    }

    #[test]
    fn writes_before_flush_collapse() {
        let queue = JobQueue::new();
        let (a, b) = (Signal::new(0), Signal::new(0));
        let (a_clone, b_clone) = (a.clone(), b.clone());
        let (_runner, runs) = queued_effect(&queue, move || {
            a_clone.get();
            b_clone.get();
        });

        a.set(1);
        b.set(1);
        a.set(2);
        assert_eq!(runs.get(), 1);
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.flush(), 1);
        assert_eq!(runs.get(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn jobs_queued_during_flush_run_in_same_flush() {
        let queue = JobQueue::new();
        let source = Signal::new(0);
        let mirror = Signal::new(0);

        let (source_clone, mirror_clone) = (source.clone(), mirror.clone());
        let (_writer, _) = queued_effect(&queue, move || mirror_clone.set(source_clone.get()));

        let seen = Rc::new(Cell::new(0));
        let (mirror_clone, seen_clone) = (mirror.clone(), seen.clone());
        let (_reader, _) = queued_effect(&queue, move || seen_clone.set(mirror_clone.get()));

        source.set(7);
        assert_eq!(queue.flush(), 2);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn stopped_effect_job_is_inert() {
        let queue = JobQueue::new();
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let (runner, runs) = queued_effect(&queue, move || {
            signal_clone.get();
        });

        signal.set(1);
        runner.stop();
        queue.flush();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn runaway_job_is_dropped() {
        let queue = JobQueue::new();
        let id = EffectId::new(u32::MAX, 0);
        let runs = Rc::new(Cell::new(0));

        fn requeue(queue: JobQueue, id: EffectId, runs: Rc<Cell<u32>>) {
            let (next_queue, next_runs) = (queue.clone(), runs.clone());
            queue.queue(id, move || {
                next_runs.set(next_runs.get() + 1);
                requeue(next_queue.clone(), id, next_runs.clone());
            });
        }
        requeue(queue.clone(), id, runs.clone());

        assert_eq!(queue.flush(), RECURSION_LIMIT as usize);
        assert_eq!(runs.get(), RECURSION_LIMIT);
        assert!(queue.is_empty());
    }
}
