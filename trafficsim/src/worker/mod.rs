pub(crate) mod command;
mod stop;

use self::{
    command::{
        Command, CommandReceiver, CommandSender, Event, EventReceiver, EventSender, WorkerError,
        command_channel, event_channel,
    },
    stop::Stop,
};
use anyhow::{Context as _, Result, bail};
use std::{
    sync::{
        Arc,
        mpsc::{TryRecvError, TrySendError},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};
use trafficsim_core::{
    ComponentId, ComponentTable, Connection, Engine, EngineBuilder, EngineError, LoadProfile,
    defaults::TICK_DURATION,
};

/// Handle on a simulation running in a background thread.
///
/// The thread owns the [`Engine`] and ticks it on a wall-clock cadence
/// (one tick every [`TICK_DURATION`] by default) while it is started.
/// It is driven with [`Command`]s and reports through the [`Event`]s of
/// [`SimWorker::events`]. Nothing is shared with the thread besides the
/// two channels and the stop flag.
///
/// Call [`SimWorker::shutdown`] for a clean exit of the thread. Dropping
/// the handle also ends the thread on its next iteration.
pub struct SimWorker {
    commands: CommandSender,

    events: EventReceiver,

    stop: Arc<Stop>,

    thread: JoinHandle<Result<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// engine just built, never started
    Ready,
    Running,
    Paused,
    Stopped,
}

struct Worker {
    engine: Engine,
    /// kept to rebuild the engine on [`Command::Reconfigure`]
    builder: EngineBuilder,
    state: State,
    cadence: Duration,

    commands: CommandReceiver,
    events: EventSender,

    stop: Arc<Stop>,
}

impl SimWorker {
    /// Spawn a worker ticking every [`TICK_DURATION`], matching the
    /// simulated duration of a tick.
    pub fn spawn(components: ComponentTable, connections: Vec<Connection>) -> Result<Self> {
        Self::with_cadence(components, connections, TICK_DURATION)
    }

    /// Spawn a worker ticking every `cadence` of wall-clock time. The
    /// simulated duration of a tick is unchanged: a shorter cadence runs
    /// the simulation faster than real time.
    pub fn with_cadence(
        components: ComponentTable,
        connections: Vec<Connection>,
        cadence: Duration,
    ) -> Result<Self> {
        Self::with_engine(Engine::builder(), components, connections, cadence)
    }

    /// Same as [`SimWorker::with_cadence`] with an explicitly configured
    /// engine (seed, tick duration...). The configuration is reused on
    /// every reconfigure.
    pub fn with_engine(
        builder: EngineBuilder,
        components: ComponentTable,
        connections: Vec<Connection>,
        cadence: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(Stop::new());
        let (commands, command_receiver) = command_channel();
        let (event_sender, events) = event_channel();

        let worker = Worker {
            engine: builder.clone().build(components, connections),
            builder,
            state: State::Ready,
            cadence,
            commands: command_receiver,
            events: event_sender,
            stop: Arc::clone(&stop),
        };

        let thread = thread::Builder::new()
            .name("trafficsim-worker".to_owned())
            .spawn(|| worker_run(worker))
            .context("Failed to spawn the simulation worker thread")?;

        Ok(Self {
            commands,
            events,
            stop,
            thread,
        })
    }

    /// Events reported by the worker, starting with [`Event::Ready`].
    pub fn events(&self) -> &EventReceiver {
        &self.events
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command)
    }

    pub fn start(&self, profile: LoadProfile) -> Result<()> {
        self.send(Command::Start(profile))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    pub fn update_profile(&self, profile: LoadProfile) -> Result<()> {
        self.send(Command::UpdateProfile(profile))
    }

    pub fn inject_failure(&self, id: impl Into<ComponentId>) -> Result<()> {
        self.send(Command::InjectFailure(id.into()))
    }

    /// Replace the simulation with one built from a new topology. The
    /// current run is discarded and a new [`SimWorker::start`] is needed.
    pub fn reconfigure(
        &self,
        components: ComponentTable,
        connections: Vec<Connection>,
    ) -> Result<()> {
        self.send(Command::Reconfigure {
            components,
            connections,
        })
    }

    pub fn shutdown(self) -> Result<()> {
        self.stop.raise();

        match self.thread.join() {
            Err(join_error) => {
                bail!("Simulation worker failed to clean shutdown: {join_error:?}")
            }
            Ok(Err(error)) => Err(error).context("Simulation worker failed with error"),
            Ok(Ok(())) => Ok(()),
        }
    }
}

impl Worker {
    fn stopped(&self) -> bool {
        self.stop.get()
    }

    fn emit(&self, event: Event) {
        match self.events.send(event) {
            Ok(()) => (),
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event queue is full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                // nobody is listening anymore
                self.stop.raise();
            }
        }
    }

    fn ready(&self) {
        let event = Event::Ready {
            components: self.engine.components().len(),
            entries: self.engine.topology().entries().to_vec(),
        };
        self.emit(event);
    }

    fn error(&self, error: impl Into<WorkerError>) {
        let error = error.into();
        debug!(%error, "command rejected");
        self.emit(Event::Error(error));
    }

    fn inbound(&mut self, command: Command) {
        match command {
            Command::Start(profile) => {
                self.engine.start(profile);
                self.state = State::Running;
            }
            Command::Stop => {
                self.engine.stop();
                self.state = State::Stopped;
            }
            Command::Pause => {
                if self.state == State::Running {
                    info!(tick = self.engine.tick_count(), "simulation paused");
                    self.state = State::Paused;
                }
            }
            Command::Resume => match self.state {
                State::Running => (),
                State::Paused => {
                    info!(tick = self.engine.tick_count(), "simulation resumed");
                    self.state = State::Running;
                }
                State::Ready => self.error(WorkerError::NeverStarted),
                State::Stopped => self.error(EngineError::NotRunning),
            },
            Command::UpdateProfile(profile) => {
                if let Err(error) = self.engine.update_profile(profile) {
                    self.error(error);
                }
            }
            Command::InjectFailure(id) => match self.engine.inject_failure(id.as_str()) {
                Ok(report) => self.emit(Event::FailureReport(report)),
                Err(error) => self.error(error),
            },
            Command::Reconfigure {
                components,
                connections,
            } => {
                self.engine = self.builder.clone().build(components, connections);
                self.state = State::Ready;
                info!(
                    components = self.engine.components().len(),
                    connections = self.engine.topology().connections().len(),
                    "simulation reconfigured"
                );
                self.ready();
            }
        }
    }

    fn inbounds(&mut self) {
        loop {
            match self.commands.try_recv() {
                Err(TryRecvError::Disconnected) => {
                    // the handle is gone, no new command will ever come
                    self.stop.raise();

                    break;
                }
                Err(TryRecvError::Empty) => break,
                Ok(command) => self.inbound(command),
            }
        }
    }

    fn step(&mut self) {
        self.inbounds();

        if self.state != State::Running {
            return;
        }

        let instant = Instant::now();
        let mut metrics = self.engine.tick();
        metrics.engine_stats.tick_duration = instant.elapsed();

        self.emit(Event::Tick(Box::new(metrics)));
    }
}

fn worker_run(mut worker: Worker) -> Result<()> {
    worker.ready();

    let mut instant = Instant::now();

    // time overspent in the previous rounds, taken off the next sleep so
    // the ticks keep their cadence on average. Capped to one cadence so
    // a long stall does not turn into a burst of ticks.
    let mut lag = Duration::ZERO;

    while !worker.stopped() {
        worker.step();

        let elapsed = instant.elapsed() + lag;

        let sleep_duration = worker.cadence.saturating_sub(elapsed);
        lag = elapsed.saturating_sub(worker.cadence).min(worker.cadence);

        thread::sleep(sleep_duration);

        instant = Instant::now();
    }

    info!(tick = worker.engine.tick_count(), "simulation worker exiting");

    Ok(())
}
