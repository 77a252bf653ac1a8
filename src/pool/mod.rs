//! Fixed-size worker pool for CPU-bound document compression
//!
//! # Architecture
//!
//! ```text
//!  caller ──submit──▶ ┌──────────────────────┐ ──compress──▶ unit 0 (thread + engine)
//!                     │ scheduler thread     │ ──compress──▶ unit 1
//!  TaskHandle ◀────── │ queue / slots /      │ ◀─responses── ...
//!                     │ pending-task table   │ ──compress──▶ unit N-1
//!                     └──────────────────────┘
//! ```
//!
//! - **Execution units** ([`unit`]) each own one engine and run one task at a time.
//! - **Scheduler** ([`scheduler`]) is the only owner of the queue, the slot table and
//!   the pending-task table. It reacts to submissions and unit responses arriving on
//!   a single crossbeam inbox, so none of that state is shared or locked.
//! - **Dispatch** picks the lowest-index idle slot and the oldest queued task. Payload
//!   buffers are moved into the unit's request, never copied.
//! - **Completion** handles are oneshot receivers settled exactly once.
//!
//! # Example
//!
//! ```rust,no_run
//! use presspool::pool::{GzipEngine, WorkerPool};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pool = WorkerPool::new(4, GzipEngine::factory(6))?;
//! pool.wait_ready().await?;
//!
//! let outcome = pool.submit(std::fs::read("slides.pdf")?, "slides.pdf").await?;
//! println!("{} -> {} bytes", outcome.original_size, outcome.compressed_size);
//!
//! pool.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod scheduler;
pub mod slot;
pub mod unit;

use anyhow::{Context, Result};
use crossbeam::channel::{Sender, unbounded};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::thread::{self, JoinHandle};
use tokio::sync::{oneshot, watch};

pub use engine::{CompressionEngine, EngineFactory, GzipEngine};
pub use error::PoolError;
pub use pending::{CompressOutcome, Settlement, TaskId};
pub use scheduler::{PoolSnapshot, PoolStatus};
pub use slot::SlotStatus;

use scheduler::{Event, Scheduler, Task};
use slot::WorkerSlot;

/// Handle to a running pool. Dropping it shuts the pool down.
pub struct WorkerPool {
    size: usize,
    inbox: Sender<Event>,
    status: watch::Receiver<PoolStatus>,
    scheduler: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` execution units, each with its own engine from `factory`,
    /// and send every unit its `init` request.
    pub fn new(size: usize, factory: EngineFactory) -> Result<Self> {
        if size == 0 {
            anyhow::bail!("Worker pool size must be at least 1");
        }

        let (inbox, events) = unbounded();
        let (status_tx, status) = watch::channel(PoolStatus::starting(size));

        let mut slots = Vec::with_capacity(size);
        for index in 0..size {
            let (request_tx, request_rx) = unbounded();
            let thread = unit::spawn(index, factory.clone(), request_rx, inbox.clone())?;
            slots.push(WorkerSlot::new(index, request_tx, thread));
        }

        let scheduler = Scheduler::new(slots, status_tx, events);
        let scheduler = thread::Builder::new()
            .name("presspool-scheduler".to_string())
            .spawn(move || scheduler.run())
            .context("Failed to spawn worker pool scheduler")?;

        tracing::info!("Started worker pool with {} units", size);
        Ok(Self {
            size,
            inbox,
            status,
            scheduler: Some(scheduler),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// True once every unit has initialized its engine
    pub fn is_ready(&self) -> bool {
        self.status.borrow().ready
    }

    pub fn status(&self) -> PoolStatus {
        self.status.borrow().clone()
    }

    /// Wait until every unit is initialized, or the pool fails first
    pub async fn wait_ready(&self) -> Result<(), PoolError> {
        let mut status = self.status.clone();
        let settled = status
            .wait_for(|s| s.ready || s.failure.is_some() || s.closed)
            .await
            .map(|s| (*s).clone());

        match settled {
            Ok(s) if s.ready => Ok(()),
            Ok(s) => Err(s.failure.unwrap_or(PoolError::ShutDown)),
            Err(_) => Err(PoolError::ShutDown),
        }
    }

    /// Queue `payload` for compression. Never blocks; ownership of the buffer
    /// moves to the pool.
    pub fn submit(&self, payload: Vec<u8>, filename: impl Into<String>) -> TaskHandle {
        let id = TaskId::generate();
        let filename = filename.into();
        let (completion, receiver) = oneshot::channel();

        let event = Event::Submit {
            task: Task {
                id: id.clone(),
                payload,
                filename: filename.clone(),
            },
            completion,
        };
        if let Err(rejected) = self.inbox.send(event)
            && let Event::Submit { completion, .. } = rejected.into_inner()
        {
            let _ = completion.send(Err(PoolError::ShutDown));
        }

        TaskHandle {
            id,
            filename,
            receiver,
        }
    }

    /// Ask the scheduler for a view of its slots and queue
    pub async fn snapshot(&self) -> Result<PoolSnapshot, PoolError> {
        let (reply, receiver) = oneshot::channel();
        self.inbox
            .send(Event::Snapshot(reply))
            .map_err(|_| PoolError::ShutDown)?;
        receiver.await.map_err(|_| PoolError::ShutDown)
    }

    /// Stop every unit and reject whatever is still pending
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(scheduler) = self.scheduler.take() else {
            return;
        };
        let _ = self.inbox.send(Event::Shutdown);
        if scheduler.join().is_err() {
            tracing::error!("Worker pool scheduler panicked");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Completion handle for one submitted task
///
/// Await it from async code, or call [`TaskHandle::wait_blocking`] from a plain
/// thread.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    filename: String,
    receiver: oneshot::Receiver<Settlement>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Block the current thread until the task settles. Panics inside an async runtime.
    pub fn wait_blocking(self) -> Settlement {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(PoolError::ShutDown))
    }
}

impl Future for TaskHandle {
    type Output = Settlement;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PoolError::ShutDown)))
    }
}
