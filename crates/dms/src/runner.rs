//! Background tasks driving a session
//!
//! Two repeating tasks: the frame tick (~30 ms) and the break reminder poll
//! (10 s). Their `JoinHandle`s are the cancel handles; stopping the runner
//! aborts both. Each tick's blocking work runs on the blocking pool.
//! Emergency sends run detached and may outlive the session.

use alerting::{DispatchReport, EmergencyDispatcher, EmergencyGate};
use camera_capture::FrameSource;
use chrono::Local;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use storage::EventLog;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::analysis::{Directive, SoundCue, TickOutcome};
use crate::break_timer::{BreakAction, BreakStatus, BreakTimer, BREAK_POLL_INTERVAL};
use crate::session::{DetectionSession, SessionSummary};
use crate::DmsError;

/// Session shared between the tick task and the control surface
pub type SharedSession = Arc<Mutex<DetectionSession>>;

/// Snooze length offered by the break dialog (minutes)
pub const BREAK_SNOOZE_MIN: u64 = 15;

/// Plays alert sounds. Failures never reach the tick loop.
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: SoundCue, looped: bool) -> Result<(), DmsError>;
    fn stop(&self, cue: SoundCue) -> Result<(), DmsError>;
}

/// Audio sink for headless runs
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&self, cue: SoundCue, looped: bool) -> Result<(), DmsError> {
        debug!("(silent) play {:?} looped={}", cue, looped);
        Ok(())
    }

    fn stop(&self, cue: SoundCue) -> Result<(), DmsError> {
        debug!("(silent) stop {:?}", cue);
        Ok(())
    }
}

/// Clock used by the tasks; follows tokio's paused clock in tests
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn play_directives(audio: &dyn AudioSink, directives: &[Directive], events: &broadcast::Sender<Directive>) {
    for directive in directives {
        let result = match directive {
            Directive::PlaySound { cue, looped } => audio.play(*cue, *looped),
            Directive::StopSound { cue } => audio.stop(*cue),
            Directive::ShowWarning { title, message, .. } => {
                warn!("{}: {}", title, message);
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Audio unavailable, skipping cue: {}", e);
        }
        // No subscribers is fine
        let _ = events.send(directive.clone());
    }
}

type TickStep = (TickOutcome, Arc<EmergencyGate>, Option<EventLog>);

/// One tick on a blocking thread. The session lock is held only to read the
/// detector settings and to apply the result, never during inference.
fn run_tick(
    source: &StdMutex<Box<dyn FrameSource>>,
    session: &Mutex<DetectionSession>,
    at: Instant,
) -> Option<TickStep> {
    let frame = {
        let mut source = match source.lock() {
            Ok(source) => source,
            Err(e) => {
                warn!("Frame source unavailable: {}", e);
                return None;
            }
        };
        match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                warn!("Frame read failed: {}", e);
                return None;
            }
        }
    };

    let (classifier, confidence) = {
        let session = session.blocking_lock();
        if !session.is_active() {
            return None;
        }
        (session.classifier(), session.confidence())
    };
    let classification = classifier.classify(&frame, confidence);

    let mut session = session.blocking_lock();
    let outcome = session.apply(classification, at);
    if outcome.skipped {
        return None;
    }
    Some((outcome, Arc::clone(session.gate()), session.log().cloned()))
}

pub struct SessionRunner {
    session: SharedSession,
    gate: Arc<EmergencyGate>,
    dispatcher: EmergencyDispatcher,
    audio: Arc<dyn AudioSink>,
    break_timer: Arc<StdMutex<BreakTimer>>,
    break_status: watch::Receiver<Option<BreakStatus>>,
    events: broadcast::Sender<Directive>,
    tick_task: JoinHandle<()>,
    break_task: JoinHandle<()>,
}

impl SessionRunner {
    /// Start both tasks for `session`. Must be called inside a tokio runtime.
    pub fn spawn(
        session: DetectionSession,
        source: Box<dyn FrameSource>,
        tick: Duration,
        audio: Arc<dyn AudioSink>,
        dispatcher: EmergencyDispatcher,
    ) -> Self {
        let gate = Arc::clone(session.gate());
        let session = Arc::new(Mutex::new(session));
        let (events, _) = broadcast::channel(64);
        let (status_tx, break_status) = watch::channel(None);
        let break_timer = Arc::new(StdMutex::new(BreakTimer::new(now())));

        let tick_task = {
            let session = Arc::clone(&session);
            let audio = Arc::clone(&audio);
            let dispatcher = dispatcher.clone();
            let events = events.clone();
            let source = Arc::new(StdMutex::new(source));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;

                    // Decode, inference and CSV appends block; keep them off the workers
                    let at = now();
                    let step = {
                        let session = Arc::clone(&session);
                        let source = Arc::clone(&source);
                        tokio::task::spawn_blocking(move || run_tick(&source, &session, at))
                    };
                    let (outcome, gate, log) = match step.await {
                        Ok(Some(step)) => step,
                        Ok(None) => continue,
                        Err(e) => {
                            warn!("Tick failed: {}", e);
                            continue;
                        }
                    };

                    play_directives(audio.as_ref(), &outcome.directives, &events);

                    if let Some(request) = outcome.emergency {
                        info!("Dispatching automated emergency message");
                        // Detached: the send may finish after the session stops
                        drop(dispatcher.dispatch(request, gate, log));
                    }
                }
            })
        };

        let break_task = {
            let timer = Arc::clone(&break_timer);
            tokio::spawn(async move {
                let start = tokio::time::Instant::now() + BREAK_POLL_INTERVAL;
                let mut interval = tokio::time::interval_at(start, BREAK_POLL_INTERVAL);
                loop {
                    interval.tick().await;
                    let status = match timer.lock() {
                        Ok(timer) => timer.check(now(), Local::now().time()),
                        Err(e) => {
                            warn!("Break timer unavailable: {}", e);
                            continue;
                        }
                    };
                    if let Some(status) = status {
                        if let Some(prompt) = status.prompt {
                            info!("Break reminder: {}", prompt.message());
                        }
                        let _ = status_tx.send(Some(status));
                    }
                }
            })
        };

        info!("Session runner started (tick {:?})", tick);
        Self {
            session,
            gate,
            dispatcher,
            audio,
            break_timer,
            break_status,
            events,
            tick_task,
            break_task,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn gate(&self) -> &Arc<EmergencyGate> {
        &self.gate
    }

    /// Directives produced by the tick task
    pub fn subscribe(&self) -> broadcast::Receiver<Directive> {
        self.events.subscribe()
    }

    /// Latest break reminder status, `None` before the first poll
    pub fn break_status(&self) -> Option<BreakStatus> {
        self.break_status.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.tick_task.is_finished()
    }

    /// Manual emergency button: approve through the gate and wait for the attempt
    pub async fn send_manual_emergency(&self) -> Result<DispatchReport, DmsError> {
        let (request, log) = {
            let session = self.session.lock().await;
            (session.manual_emergency(now()), session.log().cloned())
        };
        self.dispatcher
            .dispatch(request, Arc::clone(&self.gate), log)
            .await
            .map_err(|e| DmsError::Task(e.to_string()))
    }

    /// Apply the driver's answer to a break reminder.
    /// Returns the session summary when the driver chose to stop.
    pub async fn handle_break(&self, action: BreakAction) -> Result<Option<SessionSummary>, DmsError> {
        match action {
            BreakAction::TakeBreak => return self.stop().await.map(Some),
            BreakAction::Snooze => {
                let mut timer = self
                    .break_timer
                    .lock()
                    .map_err(|e| DmsError::Task(format!("Lock error: {}", e)))?;
                timer.snooze(BREAK_SNOOZE_MIN, now());
            }
            BreakAction::Dismiss => {
                self.session.lock().await.record_break_dismissed();
                let mut timer = self
                    .break_timer
                    .lock()
                    .map_err(|e| DmsError::Task(format!("Lock error: {}", e)))?;
                timer.acknowledge(now());
            }
        }
        Ok(None)
    }

    /// Cancel both tasks and stop the session
    pub async fn stop(&self) -> Result<SessionSummary, DmsError> {
        self.tick_task.abort();
        self.break_task.abort();
        if let Err(e) = self.audio.stop(SoundCue::DrowsyAlarm) {
            warn!("Audio unavailable, skipping cue: {}", e);
        }
        let summary = self.session.lock().await.stop(now())?;
        info!("Session runner stopped");
        Ok(summary)
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.tick_task.abort();
        self.break_task.abort();
    }
}
