//! Supervision of concurrently running bot tasks.
//!
//! Work is submitted through [`TaskSupervisor::schedule`] from any task and
//! spawned by the single driver loop in [`TaskSupervisor::drive`]. The first
//! task that fails aborts the drive; the remaining tasks are dropped with the
//! driver's `JoinSet`.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, warn};

use crate::error::BotError;

type Work = BoxFuture<'static, Result<(), BotError>>;

/// Tracks every scheduled unit of work for one session
#[derive(Debug, Default)]
pub struct TaskSupervisor {
    /// Submission side, present while a session is open
    submit: Mutex<Option<mpsc::UnboundedSender<Work>>>,
    /// Receiving side, taken by the driver
    queue: Mutex<Option<mpsc::UnboundedReceiver<Work>>>,
    /// Scheduled and not yet reaped
    tracked: AtomicUsize,
}

impl TaskSupervisor {
    /// Create a closed supervisor; scheduling fails until it is opened
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept work for a new session
    pub(crate) fn open(&self) {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.submit) = Some(tx);
        *lock(&self.queue) = Some(rx);
        self.tracked.store(0, Ordering::SeqCst);
    }

    /// Forget all work. Tasks not yet spawned are dropped.
    pub(crate) fn close(&self) {
        lock(&self.submit).take();
        lock(&self.queue).take();
        self.tracked.store(0, Ordering::SeqCst);
    }

    /// Whether work can currently be scheduled
    pub fn is_open(&self) -> bool {
        lock(&self.submit).is_some()
    }

    /// Number of tasks scheduled and not yet observed complete
    pub fn tracked(&self) -> usize {
        self.tracked.load(Ordering::SeqCst)
    }

    /// Register a new concurrently running unit of work. Never blocks.
    pub fn schedule<F>(&self, work: F) -> Result<(), BotError>
    where
        F: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let submit = lock(&self.submit);
        let tx = submit.as_ref().ok_or(BotError::NotConnected)?;

        self.tracked.fetch_add(1, Ordering::SeqCst);
        if tx.send(Box::pin(work)).is_err() {
            // The driver has already exited; the session is going away
            self.tracked.fetch_sub(1, Ordering::SeqCst);
            return Err(BotError::NotConnected);
        }
        Ok(())
    }

    /// Run scheduled work until no task remains or one fails.
    ///
    /// Returns the first observed error. Tasks still running at that point
    /// are abandoned and aborted when the driver's task set is dropped.
    pub async fn drive(&self) -> Result<(), BotError> {
        let mut queue = lock(&self.queue).take().ok_or(BotError::NotConnected)?;
        let mut running: JoinSet<Result<(), BotError>> = JoinSet::new();

        loop {
            if running.is_empty() {
                // Work submitted by a task always lands in the queue before
                // that task is reaped, so an empty queue here means done.
                match queue.try_recv() {
                    Ok(work) => {
                        running.spawn(work);
                        continue;
                    }
                    Err(_) => break,
                }
            }

            tokio::select! {
                biased;

                Some(work) = queue.recv() => {
                    running.spawn(work);
                }

                Some(joined) = running.join_next() => {
                    self.tracked.fetch_sub(1, Ordering::SeqCst);
                    if let Err(e) = reap(joined) {
                        if !running.is_empty() {
                            warn!("Abandoning {} in-flight tasks", running.len());
                        }
                        return Err(e);
                    }
                }

                else => break,
            }
        }

        debug!("All supervised tasks finished");
        Ok(())
    }
}

/// Inspect one finished task
fn reap(joined: Result<Result<(), BotError>, JoinError>) -> Result<(), BotError> {
    match joined {
        Ok(Ok(())) => {
            debug!("Task completed");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Task failed: {}", e);
            Err(e)
        }
        Err(e) => {
            error!("Task did not complete: {}", e);
            Err(BotError::TaskPanicked(e.to_string()))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
