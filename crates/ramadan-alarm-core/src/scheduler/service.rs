//! Async front of the scheduler.
//!
//! One tokio task owns the [`Scheduler`] and serves requests from a
//! [`SchedulerHandle`] one at a time. Timers are tokio tasks that sleep and
//! then post `(alarm_id, token)` back to the same task, so timer callbacks and
//! mutations never interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::Clock;
use super::driver::{ArmToken, TimerDriver};
use super::engine::{Scheduler, SchedulerPolicy, SlotState};
use crate::alarm::{Alarm, AlarmId};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::notify::NotificationSink;
use crate::prayer::{Coordinates, EventTimeProvider};
use crate::storage::AlarmStore;

const REQUEST_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

type Fire = (AlarmId, ArmToken);

/// One sleeping tokio task per armed alarm.
pub struct TokioTimers {
    tasks: HashMap<AlarmId, JoinHandle<()>>,
    fire_tx: mpsc::UnboundedSender<Fire>,
}

impl TokioTimers {
    fn new(fire_tx: mpsc::UnboundedSender<Fire>) -> Self {
        Self {
            tasks: HashMap::new(),
            fire_tx,
        }
    }
}

impl TimerDriver for TokioTimers {
    fn arm(&mut self, id: &AlarmId, token: ArmToken, delay: Duration) {
        let tx = self.fire_tx.clone();
        let fire_id = id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((fire_id, token));
        });
        if let Some(previous) = self.tasks.insert(id.clone(), task) {
            previous.abort();
        }
    }

    fn disarm(&mut self, id: &AlarmId) {
        if let Some(task) = self.tasks.remove(id) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

enum Request {
    Upsert {
        alarm: Alarm,
        reply: oneshot::Sender<Result<SlotState>>,
    },
    Remove {
        id: AlarmId,
        reply: oneshot::Sender<Result<()>>,
    },
    SetActive {
        id: AlarmId,
        active: bool,
        reply: oneshot::Sender<Result<SlotState>>,
    },
    SetCoordinates {
        coordinates: Coordinates,
        reply: oneshot::Sender<()>,
    },
    Resume {
        reply: oneshot::Sender<()>,
    },
    Sync {
        reply: oneshot::Sender<()>,
    },
    Alarms {
        reply: oneshot::Sender<Vec<Alarm>>,
    },
    Slots {
        reply: oneshot::Sender<Vec<(AlarmId, SlotState)>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Everything the service needs to build its scheduler.
pub struct SchedulerService {
    pub store: AlarmStore,
    pub provider: Box<dyn EventTimeProvider>,
    pub sink: Box<dyn NotificationSink>,
    pub coordinates: Coordinates,
    pub policy: SchedulerPolicy,
    pub clock: Arc<dyn Clock>,
}

impl SchedulerService {
    /// Start the scheduler task, arming every stored alarm.
    ///
    /// Must be called from within a tokio runtime. The task stops when every
    /// handle is dropped or on [`SchedulerHandle::shutdown`], aborting all
    /// timers.
    pub fn spawn(self) -> SchedulerHandle {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::channel(REQUEST_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let scheduler = Scheduler::new(
            self.store,
            self.provider,
            self.sink,
            Box::new(TokioTimers::new(fire_tx)),
            self.coordinates,
            self.policy,
        );

        tokio::spawn(run(
            scheduler,
            request_rx,
            fire_rx,
            self.clock,
            events.clone(),
        ));

        SchedulerHandle {
            requests: request_tx,
            events,
        }
    }
}

async fn run(
    mut scheduler: Scheduler,
    mut requests: mpsc::Receiver<Request>,
    mut fires: mpsc::UnboundedReceiver<Fire>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Event>,
) {
    scheduler.rebuild(clock.now());
    publish(&mut scheduler, &events);
    info!(alarms = scheduler.alarms().len(), "scheduler started");

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(request) = request else { break };
                if !handle(&mut scheduler, request, clock.as_ref()) {
                    break;
                }
            }
            Some((id, token)) = fires.recv() => {
                debug!(alarm_id = %id, %token, "timer fired");
                scheduler.fire(&id, token, clock.now());
            }
        }
        publish(&mut scheduler, &events);
    }

    scheduler.shutdown();
    info!("scheduler stopped");
}

/// Apply one request. Returns false on shutdown.
fn handle(scheduler: &mut Scheduler, request: Request, clock: &dyn Clock) -> bool {
    match request {
        Request::Upsert { alarm, reply } => {
            let _ = reply.send(scheduler.upsert_alarm(alarm, clock.now()));
        }
        Request::Remove { id, reply } => {
            let _ = reply.send(scheduler.remove_alarm(&id, clock.now()));
        }
        Request::SetActive { id, active, reply } => {
            let _ = reply.send(scheduler.set_active(&id, active, clock.now()));
        }
        Request::SetCoordinates { coordinates, reply } => {
            scheduler.on_coordinates_changed(coordinates, clock.now());
            let _ = reply.send(());
        }
        Request::Resume { reply } => {
            scheduler.on_clock_or_visibility_resume(clock.now());
            let _ = reply.send(());
        }
        Request::Sync { reply } => {
            scheduler.sync_with_store(clock.now());
            let _ = reply.send(());
        }
        Request::Alarms { reply } => {
            let _ = reply.send(scheduler.alarms().to_vec());
        }
        Request::Slots { reply } => {
            let _ = reply.send(scheduler.slots());
        }
        Request::Shutdown { reply } => {
            scheduler.shutdown();
            let _ = reply.send(());
            return false;
        }
    }
    true
}

fn publish(scheduler: &mut Scheduler, events: &broadcast::Sender<Event>) {
    for event in scheduler.drain_events() {
        // No subscribers is fine.
        let _ = events.send(event);
    }
}

/// Cloneable entry point to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<Event>,
}

impl SchedulerHandle {
    /// Events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Whether the scheduler task has stopped.
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| CoreError::ServiceStopped)?;
        rx.await.map_err(|_| CoreError::ServiceStopped)
    }

    pub async fn upsert_alarm(&self, alarm: Alarm) -> Result<SlotState> {
        self.call(|reply| Request::Upsert { alarm, reply }).await?
    }

    pub async fn remove_alarm(&self, id: AlarmId) -> Result<()> {
        self.call(|reply| Request::Remove { id, reply }).await?
    }

    pub async fn set_active(&self, id: AlarmId, active: bool) -> Result<SlotState> {
        self.call(|reply| Request::SetActive { id, active, reply })
            .await?
    }

    pub async fn set_coordinates(&self, coordinates: Coordinates) -> Result<()> {
        self.call(|reply| Request::SetCoordinates { coordinates, reply })
            .await
    }

    pub async fn resume(&self) -> Result<()> {
        self.call(|reply| Request::Resume { reply }).await
    }

    /// Pick up alarms written to the store by another process.
    pub async fn sync(&self) -> Result<()> {
        self.call(|reply| Request::Sync { reply }).await
    }

    pub async fn alarms(&self) -> Result<Vec<Alarm>> {
        self.call(|reply| Request::Alarms { reply }).await
    }

    pub async fn slots(&self) -> Result<Vec<(AlarmId, SlotState)>> {
        self.call(|reply| Request::Slots { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.call(|reply| Request::Shutdown { reply }).await
    }
}
