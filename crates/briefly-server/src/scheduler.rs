use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use briefly_core::{CycleRequest, ScheduleEvent};
use briefly_db::DbError;
use briefly_runner::{CycleOutcome, Pipeline};

/// Cycles currently running, keyed by user id. The generation number lets a
/// finished task remove its own entry without clobbering a replacement.
#[derive(Default)]
struct InFlight {
    tasks: Mutex<HashMap<String, (u64, JoinHandle<()>)>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, (u64, JoinHandle<()>)>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_running(&self, user_id: &str) -> bool {
        self.lock()
            .get(user_id)
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    fn abort(&self, user_id: &str) -> bool {
        match self.lock().remove(user_id) {
            Some((_, handle)) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }
}

/// Sender side of the scheduler, shared with route handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<ScheduleEvent>,
}

impl SchedulerHandle {
    /// A handle whose events go to the returned receiver instead of a
    /// running scheduler.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<ScheduleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: ScheduleEvent) {
        if self.tx.send(event).is_err() {
            warn!("scheduler: event dropped, scheduler is not running");
        }
    }
}

/// Runs send cycles: due records found by polling `next_run_at`, plus
/// cycles requested through [`ScheduleEvent`]s.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    in_flight: Arc<InFlight>,
    generation: AtomicU64,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            in_flight: Arc::new(InFlight::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Spawn the event/poll loop.
    pub fn start(self, poll_interval: Duration) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SchedulerHandle { tx };
        let task = tokio::spawn(self.run(rx, poll_interval));
        (handle, task)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<ScheduleEvent>, poll_interval: Duration) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_due(Utc::now()).await {
                        error!("scheduler: poll failed: {e}");
                    }
                }
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("scheduler: event channel closed, stopping");
                        break;
                    }
                },
            }
        }
    }

    /// `Start` aborts whatever cycle the user has running and launches a
    /// fresh one with the submitted preferences. If the aborted cycle had
    /// already handed its email to the mailer but not yet written its next
    /// slot, the user receives two emails; the newest preferences win.
    pub fn handle_event(&self, event: ScheduleEvent) {
        match event {
            ScheduleEvent::Start(req) => {
                if self.in_flight.abort(&req.user_id) {
                    info!("scheduler[{}]: restarting in-flight cycle", req.user_id);
                }
                self.launch(req);
            }
            ScheduleEvent::Deleted { user_id } => {
                if self.in_flight.abort(&user_id) {
                    info!("scheduler[{user_id}]: cancelled in-flight cycle");
                }
            }
        }
    }

    /// Launch a cycle for every active record due at `now` that has none
    /// running. Returns how many were launched.
    pub async fn poll_due(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        let due = self.pipeline.db().list_due_preferences(now).await?;
        let mut launched = 0;
        for prefs in &due {
            if self.in_flight.is_running(&prefs.user_id) {
                debug!("scheduler[{}]: due but already running", prefs.user_id);
                continue;
            }
            self.launch(CycleRequest::from(prefs));
            launched += 1;
        }
        if launched > 0 {
            info!("scheduler: launched {launched} due cycle(s)");
        }
        Ok(launched)
    }

    pub fn is_running(&self, user_id: &str) -> bool {
        self.in_flight.is_running(user_id)
    }

    fn launch(&self, req: CycleRequest) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let user_id = req.user_id.clone();
        let pipeline = self.pipeline.clone();
        let in_flight = self.in_flight.clone();

        // Hold the map while spawning so the task's cleanup cannot run first.
        let mut tasks = self.in_flight.lock();
        let handle = tokio::spawn(async move {
            match pipeline.run_cycle(&req).await {
                Ok(CycleOutcome::Sent { next_run_at, .. }) => {
                    debug!("scheduler[{}]: next run {next_run_at}", req.user_id);
                }
                Ok(CycleOutcome::Skipped { reason }) => {
                    debug!("scheduler[{}]: skipped ({reason})", req.user_id);
                }
                Ok(CycleOutcome::Failed { .. }) => {}
                Err(e) => error!("scheduler[{}]: {e:#}", req.user_id),
            }
            let mut tasks = in_flight.lock();
            if tasks.get(&req.user_id).is_some_and(|(g, _)| *g == generation) {
                tasks.remove(&req.user_id);
            }
        });
        tasks.insert(user_id, (generation, handle));
    }
}
