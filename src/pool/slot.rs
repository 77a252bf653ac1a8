//! Scheduler-side handle to one execution unit

use crossbeam::channel::Sender;
use std::thread::JoinHandle;

use super::pending::TaskId;
use super::protocol::Request;

/// Lifecycle of a slot as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// `init` sent, no `init-success` yet
    Starting,
    Idle,
    /// Running exactly one task. The id lives here, so busy <=> current task set.
    /// `started` flips when the unit reports `progress` for it.
    Busy { task: TaskId, started: bool },
    /// The unit failed to initialize or its thread died
    Faulted,
}

/// Public view of a slot, returned by pool snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    Starting,
    Idle,
    /// Dispatched, the unit has not reported progress yet
    Busy(String),
    /// The unit is running the engine
    Running(String),
    Faulted,
}

impl SlotStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, SlotStatus::Busy(_) | SlotStatus::Running(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SlotStatus::Running(_))
    }

    pub fn task(&self) -> Option<&str> {
        match self {
            SlotStatus::Busy(id) | SlotStatus::Running(id) => Some(id),
            _ => None,
        }
    }
}

pub struct WorkerSlot {
    index: usize,
    channel: Option<Sender<Request>>,
    thread: Option<JoinHandle<()>>,
    state: SlotState,
    /// Counted toward pool readiness
    initialized: bool,
}

impl WorkerSlot {
    pub fn new(index: usize, channel: Sender<Request>, thread: JoinHandle<()>) -> Self {
        Self {
            index,
            channel: Some(channel),
            thread: Some(thread),
            state: SlotState::Starting,
            initialized: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == SlotState::Idle
    }

    pub fn is_faulted(&self) -> bool {
        self.state == SlotState::Faulted
    }

    pub fn current_task(&self) -> Option<&TaskId> {
        match &self.state {
            SlotState::Busy { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Record an `init-success`. Returns true the first time only.
    pub fn mark_initialized(&mut self) -> bool {
        if self.state == SlotState::Starting {
            self.state = SlotState::Idle;
        }
        !std::mem::replace(&mut self.initialized, true)
    }

    pub fn assign(&mut self, id: TaskId) {
        debug_assert!(self.is_idle(), "assigning to slot {} in state {:?}", self.index, self.state);
        self.state = SlotState::Busy {
            task: id,
            started: false,
        };
    }

    /// Note that the unit began running `id`. Returns false if the slot is not running it.
    pub fn mark_started(&mut self, id: &str) -> bool {
        match &mut self.state {
            SlotState::Busy { task, started } if task.as_str() == id => {
                *started = true;
                true
            }
            _ => false,
        }
    }

    /// Return the slot to idle if it is running `id`
    pub fn release(&mut self, id: &str) -> bool {
        if self.current_task().is_some_and(|current| current.as_str() == id) {
            self.state = SlotState::Idle;
            true
        } else {
            false
        }
    }

    /// Mark the slot unusable, handing back the task it was running
    pub fn fault(&mut self) -> Option<TaskId> {
        match std::mem::replace(&mut self.state, SlotState::Faulted) {
            SlotState::Busy { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Send a request to the unit; hands the request back if the unit is gone
    pub fn send(&self, request: Request) -> Result<(), Request> {
        match &self.channel {
            Some(channel) => channel.send(request).map_err(|e| e.into_inner()),
            None => Err(request),
        }
    }

    pub fn status(&self) -> SlotStatus {
        match &self.state {
            SlotState::Starting => SlotStatus::Starting,
            SlotState::Idle => SlotStatus::Idle,
            SlotState::Busy {
                task,
                started: false,
            } => SlotStatus::Busy(task.to_string()),
            SlotState::Busy {
                task,
                started: true,
            } => SlotStatus::Running(task.to_string()),
            SlotState::Faulted => SlotStatus::Faulted,
        }
    }

    /// Close the request channel and wait for the unit thread to finish
    pub fn terminate(&mut self) {
        self.channel.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("Execution unit {} panicked before shutdown", self.index);
        }
    }
}
