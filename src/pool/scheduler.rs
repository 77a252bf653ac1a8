//! The single-owner scheduler loop
//!
//! One thread owns the task queue, the slot table and the pending-task table.
//! Everything that changes that state arrives as an [`Event`] on one inbox, so
//! the state is never shared and never locked.

use crossbeam::channel::Receiver;
use std::collections::VecDeque;
use tokio::sync::{oneshot, watch};

use super::error::PoolError;
use super::pending::{Completion, CompressOutcome, PendingTable, Settlement, TaskId};
use super::protocol::{Request, Response};
use super::slot::{SlotStatus, WorkerSlot};

/// Everything the scheduler reacts to
#[derive(Debug)]
pub(crate) enum Event {
    Submit {
        task: Task,
        completion: oneshot::Sender<Settlement>,
    },
    Unit {
        slot: usize,
        response: Response,
    },
    UnitExited {
        slot: usize,
        panicked: bool,
    },
    Snapshot(oneshot::Sender<PoolSnapshot>),
    Shutdown,
}

/// A submitted unit of work waiting for a slot
#[derive(Debug)]
pub(crate) struct Task {
    pub id: TaskId,
    pub payload: Vec<u8>,
    pub filename: String,
}

/// Pool lifecycle, broadcast to every [`WorkerPool`](super::WorkerPool) reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: usize,
    /// Distinct slots that answered `init-success`
    pub ready_count: usize,
    /// True once `ready_count == size`; never reverts
    pub ready: bool,
    /// Set when the pool can no longer run queued work
    pub failure: Option<PoolError>,
    pub closed: bool,
}

impl PoolStatus {
    pub(crate) fn starting(size: usize) -> Self {
        Self {
            size,
            ready_count: 0,
            ready: false,
            failure: None,
            closed: false,
        }
    }

    /// Error new submissions are rejected with, if any
    pub fn rejection(&self) -> Option<PoolError> {
        if self.closed {
            Some(PoolError::ShutDown)
        } else {
            self.failure
                .as_ref()
                .map(|failure| PoolError::Unavailable(failure.to_string()))
        }
    }
}

/// Point-in-time view of the scheduler's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub status: PoolStatus,
    pub slots: Vec<SlotStatus>,
    /// Tasks waiting for a slot
    pub queued: usize,
    /// Tasks submitted but not yet settled (queued + running)
    pub pending: usize,
}

impl PoolSnapshot {
    /// Slots holding a task, started or not
    pub fn busy(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_busy()).count()
    }

    /// Slots whose unit has reported `progress` for its task
    pub fn running(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_running()).count()
    }
}

pub(crate) struct Scheduler {
    slots: Vec<WorkerSlot>,
    queue: VecDeque<Task>,
    pending: PendingTable,
    status: PoolStatus,
    status_tx: watch::Sender<PoolStatus>,
    inbox: Receiver<Event>,
}

impl Scheduler {
    pub fn new(
        slots: Vec<WorkerSlot>,
        status_tx: watch::Sender<PoolStatus>,
        inbox: Receiver<Event>,
    ) -> Self {
        let status = PoolStatus::starting(slots.len());
        Self {
            slots,
            queue: VecDeque::new(),
            pending: PendingTable::new(),
            status,
            status_tx,
            inbox,
        }
    }

    /// Initialize every unit, then serve events until shutdown
    pub fn run(mut self) {
        for index in 0..self.slots.len() {
            let request = Request::Init {
                id: format!("init-{}", index),
            };
            if self.slots[index].send(request).is_err() {
                self.fault_slot(index);
            }
        }

        while let Ok(event) = self.inbox.recv() {
            match event {
                Event::Submit { task, completion } => self.submit(task, completion),
                Event::Unit { slot, response } => self.on_response(slot, response),
                Event::UnitExited { slot, panicked } => self.on_unit_exit(slot, panicked),
                Event::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                Event::Shutdown => break,
            }
        }

        self.teardown();
    }

    fn submit(&mut self, task: Task, completion: oneshot::Sender<Settlement>) {
        if let Some(rejection) = self.status.rejection() {
            tracing::debug!("Rejecting {} ({}): {}", task.id, task.filename, rejection);
            let _ = completion.send(Err(rejection));
            return;
        }

        tracing::trace!("Queued {} ({}, {} bytes)", task.id, task.filename, task.payload.len());
        self.pending
            .insert(task.id.clone(), Completion::new(task.filename.clone(), completion));
        self.queue.push_back(task);
        self.dispatch();
    }

    /// Hand queued tasks to the lowest-index idle slots, in submission order
    fn dispatch(&mut self) {
        while !self.queue.is_empty() {
            let Some(index) = self.slots.iter().position(WorkerSlot::is_idle) else {
                return;
            };
            let Some(Task {
                id,
                payload,
                filename,
            }) = self.queue.pop_front()
            else {
                return;
            };

            tracing::debug!("Dispatching {} ({}) to slot {}", id, filename, index);
            self.slots[index].assign(id.clone());
            let request = Request::Compress {
                id: id.to_string(),
                data: payload,
                filename,
            };
            if self.slots[index].send(request).is_err() {
                self.fault_slot(index);
            }
        }
    }

    fn on_response(&mut self, slot: usize, response: Response) {
        if slot >= self.slots.len() {
            tracing::warn!("Response from unknown slot {}", slot);
            return;
        }
        tracing::trace!("Slot {} -> {} ({})", slot, response.kind(), response.id());

        match response {
            Response::InitSuccess { id } => {
                if self.slots[slot].mark_initialized() {
                    self.status.ready_count += 1;
                    tracing::debug!(
                        "Slot {} initialized ({}), {}/{} ready",
                        slot,
                        id,
                        self.status.ready_count,
                        self.status.size
                    );
                    if !self.status.ready && self.status.ready_count == self.status.size {
                        self.status.ready = true;
                        tracing::info!("Worker pool ready with {} units", self.status.size);
                    }
                    self.publish();
                }
                self.dispatch();
            }
            Response::InitError { id, error } => {
                tracing::error!("Slot {} failed to initialize ({}): {}", slot, id, error);
                self.slots[slot].fault();
                self.fail(PoolError::Initialization {
                    slot,
                    message: error,
                });
            }
            Response::Progress { id } => {
                if self.slots[slot].mark_started(&id) {
                    tracing::debug!("Slot {} started {}", slot, id);
                } else {
                    tracing::trace!("Ignoring progress for {} not running on slot {}", id, slot);
                }
            }
            Response::Success {
                id,
                data,
                original_size,
                compressed_size,
            } => {
                let outcome = CompressOutcome {
                    original_size,
                    compressed_size,
                    data,
                    slot,
                };
                self.complete(slot, &id, Ok(outcome));
            }
            Response::Error { id, error } => {
                tracing::debug!("Task {} failed on slot {}: {}", id, slot, error);
                self.complete(slot, &id, Err(PoolError::Task(error)));
            }
        }
    }

    fn complete(&mut self, slot: usize, id: &str, settlement: Settlement) {
        let released = self.slots[slot].release(id);
        if !self.pending.settle(id, settlement) {
            tracing::trace!("Ignoring response for unknown task {}", id);
        }
        if released {
            self.dispatch();
        }
    }

    fn on_unit_exit(&mut self, slot: usize, panicked: bool) {
        if slot >= self.slots.len() || self.slots[slot].is_faulted() {
            return;
        }
        if panicked {
            tracing::error!("Execution unit {} panicked", slot);
        } else {
            tracing::warn!("Execution unit {} exited unexpectedly", slot);
        }
        self.fault_slot(slot);
    }

    /// Take a slot out of service, rejecting the task it was running
    fn fault_slot(&mut self, slot: usize) {
        let error = PoolError::Transport { slot };
        if let Some(id) = self.slots[slot].fault() {
            self.pending.settle(id.as_str(), Err(error.clone()));
        }

        let all_faulted = self.slots.iter().all(WorkerSlot::is_faulted);
        if !self.status.ready || all_faulted {
            self.fail(error);
        }
    }

    /// Enter the failed state; queued work is rejected, running work finishes
    fn fail(&mut self, error: PoolError) {
        if self.status.failure.is_none() {
            tracing::error!("Worker pool failed: {}", error);
            self.status.failure = Some(error);
            self.publish();
        }

        if let Some(rejection) = self.status.rejection() {
            for task in self.queue.drain(..) {
                self.pending.settle(task.id.as_str(), Err(rejection.clone()));
            }
        }
    }

    fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            status: self.status.clone(),
            slots: self.slots.iter().map(WorkerSlot::status).collect(),
            queued: self.queue.len(),
            pending: self.pending.len(),
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
    }

    fn teardown(&mut self) {
        tracing::debug!(
            "Shutting down worker pool ({} queued, {} pending)",
            self.queue.len(),
            self.pending.len()
        );
        self.queue.clear();
        self.pending.reject_all(&PoolError::ShutDown);
        for slot in &mut self.slots {
            slot.terminate();
        }
        self.status.closed = true;
        self.publish();
        tracing::info!("Worker pool shut down");
    }
}
