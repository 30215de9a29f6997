use anyhow::{Result, anyhow};
use std::{
    sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError, sync_channel},
    time::Duration,
};
use thiserror::Error;
use trafficsim_core::{
    ComponentId, ComponentTable, Connection, EngineError, FailureReport, LoadProfile,
    SimulationMetrics,
};

/// Pending commands the worker accepts before senders see `Full`.
const COMMAND_BUFFER: usize = 1_024;

/// Events kept for the consumer before the worker starts dropping ticks.
const EVENT_BUFFER: usize = 4_096;

/// Instructions sent to the worker thread.
#[derive(Debug)]
pub enum Command {
    /// reset the simulation and start ticking under the given profile
    Start(LoadProfile),
    /// discard everything in flight and stop ticking
    Stop,
    /// stop ticking, keeping everything in flight
    Pause,
    /// tick again after a [`Command::Pause`]
    Resume,
    UpdateProfile(LoadProfile),
    InjectFailure(ComponentId),
    /// replace the engine with one built from a new topology
    Reconfigure {
        components: ComponentTable,
        connections: Vec<Connection>,
    },
}

/// What the worker thread reports back.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// an engine was built (on spawn and after every reconfigure), it
    /// waits for a [`Command::Start`]
    Ready {
        components: usize,
        entries: Vec<ComponentId>,
    },
    Tick(Box<SimulationMetrics>),
    FailureReport(FailureReport),
    Error(WorkerError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Cannot resume a simulation that was never started")]
    NeverStarted,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub(crate) struct CommandSender(SyncSender<Command>);

pub(crate) struct CommandReceiver(Receiver<Command>);

pub(crate) struct EventSender(SyncSender<Event>);

/// The consumer side of the worker's events, see
/// [`SimWorker::events`](crate::SimWorker::events).
pub struct EventReceiver(Receiver<Event>);

pub(crate) fn command_channel() -> (CommandSender, CommandReceiver) {
    let (sender, receiver) = sync_channel(COMMAND_BUFFER);

    (CommandSender(sender), CommandReceiver(receiver))
}

pub(crate) fn event_channel() -> (EventSender, EventReceiver) {
    let (sender, receiver) = sync_channel(EVENT_BUFFER);

    (EventSender(sender), EventReceiver(receiver))
}

impl CommandSender {
    pub(crate) fn send(&self, command: Command) -> Result<()> {
        self.0.try_send(command).map_err(|error| match error {
            TrySendError::Full(command) => {
                anyhow!("Worker is lagging behind, cannot queue {command:?}")
            }
            TrySendError::Disconnected(command) => {
                anyhow!("Worker is not running anymore, cannot send {command:?}")
            }
        })
    }
}

impl Clone for CommandSender {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl CommandReceiver {
    pub(crate) fn try_recv(&self) -> Result<Command, TryRecvError> {
        self.0.try_recv()
    }
}

impl EventSender {
    pub(crate) fn send(&self, event: Event) -> Result<(), TrySendError<Event>> {
        self.0.try_send(event)
    }
}

impl EventReceiver {
    /// Block until the next event. `None` once the worker is gone and
    /// every event was received.
    pub fn recv(&self) -> Option<Event> {
        self.0.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.0.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.0.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Events already queued, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = Event> + '_ {
        self.0.try_iter()
    }
}
