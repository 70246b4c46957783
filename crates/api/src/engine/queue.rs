//! Single-slot FIFO execution queue.
//!
//! Tasks are opaque futures. A single dispatcher task drains the channel and
//! runs one task at a time, in submission order. A task that panics is
//! logged and the dispatcher moves on to the next one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A unit of work dispatched by the queue.
pub type QueueTask = BoxFuture<'static, ()>;

/// The dispatcher has stopped and no longer accepts tasks.
#[derive(Debug, thiserror::Error)]
#[error("execution queue is closed")]
pub struct QueueClosed;

/// FIFO queue admitting one in-flight task at a time.
pub struct ExecutionQueue {
    sender: Mutex<mpsc::UnboundedSender<QueueTask>>,
    /// Tasks queued or in flight.
    depth: Arc<AtomicUsize>,
}

impl ExecutionQueue {
    /// Create the queue and spawn its dispatcher.
    ///
    /// The dispatcher runs until `cancel` is triggered; a task in flight at
    /// that point is aborted.
    pub fn start(cancel: CancellationToken) -> (Arc<Self>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher {
            receiver,
            depth: Arc::clone(&depth),
        };
        let handle = tokio::spawn(dispatcher.run(cancel));

        let queue = Arc::new(Self {
            sender: Mutex::new(sender),
            depth,
        });
        (queue, handle)
    }

    /// Number of tasks queued or in flight.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Reserve the next slot.
    ///
    /// Other submissions wait until the returned [`Reservation`] is sent or
    /// dropped, so the reported position always matches dispatch order.
    pub async fn reserve(&self) -> Reservation<'_> {
        let sender = self.sender.lock().await;
        let position = self.depth.load(Ordering::SeqCst);
        Reservation {
            sender,
            depth: &self.depth,
            position,
        }
    }

    /// Append a task. Returns its position (tasks ahead of it).
    pub async fn enqueue(&self, task: QueueTask) -> Result<usize, QueueClosed> {
        let reservation = self.reserve().await;
        let position = reservation.position();
        reservation.send(task)?;
        Ok(position)
    }
}

/// Exclusive hold on the queue tail.
pub struct Reservation<'a> {
    sender: MutexGuard<'a, mpsc::UnboundedSender<QueueTask>>,
    depth: &'a AtomicUsize,
    position: usize,
}

impl Reservation<'_> {
    /// Tasks queued or in flight ahead of this slot.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Hand the task to the dispatcher and release the queue tail.
    pub fn send(self, task: QueueTask) -> Result<(), QueueClosed> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(task).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueClosed);
        }
        Ok(())
    }
}

struct Dispatcher {
    receiver: mpsc::UnboundedReceiver<QueueTask>,
    depth: Arc<AtomicUsize>,
}

impl Dispatcher {
    async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Execution queue dispatcher started");

        loop {
            let task = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(task) => task,
                    None => break,
                },
            };

            // Each task runs in its own tokio task so a panic stays contained.
            let mut handle = tokio::spawn(task);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    handle.abort();
                    self.depth.fetch_sub(1, Ordering::SeqCst);
                    tracing::warn!("Aborted in-flight task on shutdown");
                    break;
                }
                outcome = &mut handle => outcome,
            };

            self.depth.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = outcome {
                tracing::error!(error = %e, "Queued task panicked");
            }
        }

        tracing::info!("Execution queue dispatcher stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
