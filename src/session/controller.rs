use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::LiveSessionConfig;
use super::scheduler::PlaybackScheduler;
use super::state::{SessionReport, SessionState, SessionStatus};
use super::transcript::{Role, TranscriptAssembler, Turn};
use crate::audio::{pcm, AudioBackend, AudioDevices, AudioFrame, ChunkId, OutputDevice};
use crate::error::{ErrorClassifier, ErrorPhase, LiveError, LiveResult};
use crate::gateway::{
    ClientEvent, GatewayConnection, LiveGateway, OpenRequest, RealtimeAudio, ServerEvent,
};

/// State visible outside the session task
#[derive(Default)]
struct Shared {
    session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    error: Option<String>,
    transcript: Vec<Turn>,
    task: Option<JoinHandle<()>>,
    report: Option<SessionReport>,
}

/// Stop signal for the current attempt
///
/// Kept outside `Shared` so it can be fired from `Drop` without awaiting.
type CancelSlot = Arc<StdMutex<Option<oneshot::Sender<()>>>>;

fn take_cancel(slot: &StdMutex<Option<oneshot::Sender<()>>>) -> Option<oneshot::Sender<()>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Owns the lifecycle of one live interview session at a time
///
/// `start` acquires the microphone, the output device and the gateway
/// stream, then hands everything to a session task that is the only place
/// session state is mutated. `stop` signals that task (or the in-flight
/// `start`) and waits until the controller is idle again.
pub struct LiveSessionController {
    gateway: Arc<dyn LiveGateway>,
    devices: Arc<dyn AudioDevices>,
    config: LiveSessionConfig,
    shared: Arc<Mutex<Shared>>,
    cancel: CancelSlot,
    state_tx: Arc<watch::Sender<SessionState>>,
}

impl LiveSessionController {
    pub fn new(
        gateway: Arc<dyn LiveGateway>,
        devices: Arc<dyn AudioDevices>,
        config: LiveSessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            gateway,
            devices,
            config,
            shared: Arc::new(Mutex::new(Shared::default())),
            cancel: Arc::new(StdMutex::new(None)),
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Start a session with the given interviewer system prompt
    ///
    /// Returns the session id once the stream is open (or once a concurrent
    /// `stop` cancelled the attempt). Rejects with `AlreadyActive` unless
    /// the controller is idle.
    pub async fn start(&self, system_prompt: String) -> LiveResult<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        {
            let mut shared = self.shared.lock().await;
            if !self.state().is_idle() {
                warn!("Live session already running ({:?})", self.state());
                return Err(LiveError::AlreadyActive);
            }

            shared.session_id = Some(session_id.clone());
            shared.started_at = Some(started_at);
            shared.error = None;
            shared.transcript.clear();
            shared.report = None;
            *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel_tx);
            self.state_tx.send_replace(SessionState::Connecting);
        }

        info!("Starting live session {} via {}", session_id, self.gateway.name());

        let request = OpenRequest {
            session_id: session_id.clone(),
            model: self.config.model.clone(),
            voice: self.config.voice.clone(),
            system_prompt,
            input_sample_rate: self.config.input_sample_rate,
            output_sample_rate: self.config.output_sample_rate,
            input_transcription: true,
            output_transcription: true,
        };

        let mut resources = SessionResources::default();
        let outcome = tokio::select! {
            res = self.connect(&mut resources, request) => Some(res),
            _ = &mut cancel_rx => None,
        };

        match outcome {
            None => {
                info!("Live session {} cancelled while connecting", session_id);
                resources.teardown().await;
                finish(&self.shared, &self.cancel, &self.state_tx, None, None).await;
                Ok(session_id)
            }
            Some(Err(err)) => {
                error!("Failed to start live session: {}", err);
                resources.teardown().await;
                let message = err.user_message(ErrorPhase::Starting);
                finish(&self.shared, &self.cancel, &self.state_tx, Some(message), None).await;
                Err(err)
            }
            Some(Ok((events, finished))) => {
                let session = LiveSession {
                    id: session_id.clone(),
                    started_at,
                    resources,
                    events,
                    finished,
                    transcript: TranscriptAssembler::new(),
                    scheduler: PlaybackScheduler::new(),
                    classifier: self.config.classifier.clone(),
                    input_sample_rate: self.config.input_sample_rate,
                    shared: Arc::clone(&self.shared),
                    cancel: Arc::clone(&self.cancel),
                    state_tx: Arc::clone(&self.state_tx),
                    frames_sent: 0,
                    frames_dropped: 0,
                };

                let task = tokio::spawn(supervise(
                    tokio::spawn(session.run(cancel_rx)),
                    Arc::clone(&self.shared),
                    Arc::clone(&self.cancel),
                    Arc::clone(&self.state_tx),
                ));

                self.shared.lock().await.task = Some(task);

                Ok(session_id)
            }
        }
    }

    async fn connect(
        &self,
        resources: &mut SessionResources,
        request: OpenRequest,
    ) -> LiveResult<(mpsc::Receiver<ServerEvent>, mpsc::UnboundedReceiver<ChunkId>)> {
        let microphone = self.devices.open_microphone().await?;
        resources.microphone = Some(microphone);

        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let output = self.devices.open_output(finished_tx)?;
        info!("Output device ready: {}", output.name());
        resources.output = Some(output);

        let session = self
            .gateway
            .open(request)
            .await
            .map_err(|e| self.config.classifier.classify(e))?;
        resources.connection = Some(session.connection);

        Ok((session.events, finished_rx))
    }

    /// Stop the current session, if any, and wait until idle
    ///
    /// Safe from any state. Returns the report of the session that ended,
    /// handed out only once.
    pub async fn stop(&self) -> Option<SessionReport> {
        if let Some(cancel) = take_cancel(&self.cancel) {
            info!("Stopping live session");
            let _ = cancel.send(());
        }

        self.wait_idle().await;

        let mut shared = self.shared.lock().await;
        if let Some(task) = shared.task.take() {
            drop(shared);
            if let Err(e) = task.await {
                error!("Live session task panicked: {}", e);
            }
            shared = self.shared.lock().await;
        }
        shared.report.take()
    }

    /// Wait until the controller is idle (session ended by any cause)
    pub async fn wait_idle(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|state| state.is_idle()).await;
    }

    /// Take the report of the last finished session, if not yet taken
    pub async fn take_report(&self) -> Option<SessionReport> {
        let mut shared = self.shared.lock().await;
        if self.state().is_idle() {
            shared.report.take()
        } else {
            None
        }
    }

    pub async fn transcript(&self) -> Vec<Turn> {
        self.shared.lock().await.transcript.clone()
    }

    pub async fn error_message(&self) -> Option<String> {
        self.shared.lock().await.error.clone()
    }

    pub async fn clear_error(&self) {
        self.shared.lock().await.error = None;
    }

    pub async fn status(&self) -> SessionStatus {
        let shared = self.shared.lock().await;

        SessionStatus {
            state: self.state(),
            session_id: shared.session_id.clone(),
            error: shared.error.clone(),
            started_at: shared.started_at,
            turn_count: shared.transcript.len(),
        }
    }
}

impl Drop for LiveSessionController {
    fn drop(&mut self) {
        // The session task tears itself down once signalled
        if let Some(cancel) = take_cancel(&self.cancel) {
            let _ = cancel.send(());
        }
    }
}

/// Record the end of an attempt and return to idle
async fn finish(
    shared: &Mutex<Shared>,
    cancel: &StdMutex<Option<oneshot::Sender<()>>>,
    state_tx: &watch::Sender<SessionState>,
    error: Option<String>,
    report: Option<SessionReport>,
) {
    let mut shared = shared.lock().await;
    if let Some(message) = error {
        shared.error = Some(message);
    }
    if let Some(report) = report {
        shared.transcript = report.turns.clone();
        shared.report = Some(report);
    }
    take_cancel(cancel);
    state_tx.send_replace(SessionState::Idle);
}

/// Await the session task; if it died mid-session, return to idle with
/// whatever transcript was already published
async fn supervise(
    task: JoinHandle<()>,
    shared: Arc<Mutex<Shared>>,
    cancel: CancelSlot,
    state_tx: Arc<watch::Sender<SessionState>>,
) {
    let Err(e) = task.await else {
        return;
    };

    error!("Live session task failed: {}", e);
    let message = LiveError::TaskFailed(e.to_string()).user_message(ErrorPhase::Active);

    let report = {
        let shared = shared.lock().await;
        match (&shared.session_id, shared.started_at) {
            (Some(session_id), Some(started_at)) => Some(SessionReport {
                session_id: session_id.clone(),
                started_at,
                ended_at: Utc::now(),
                turns: shared.transcript.clone(),
                error: Some(message.clone()),
                frames_sent: 0,
                frames_dropped: 0,
            }),
            _ => None,
        }
    };

    finish(&shared, &cancel, &state_tx, Some(message), report).await;
}

/// Resources a session may hold; any subset may be present
#[derive(Default)]
struct SessionResources {
    capture: Option<mpsc::Receiver<AudioFrame>>,
    microphone: Option<Box<dyn AudioBackend>>,
    connection: Option<Box<dyn GatewayConnection>>,
    output: Option<Box<dyn OutputDevice>>,
}

impl SessionResources {
    /// Release everything held, in order; never fails and is idempotent
    async fn teardown(&mut self) {
        if self.capture.take().is_some() {
            debug!("Capture pipeline released");
        }

        if let Some(mut microphone) = self.microphone.take() {
            if let Err(e) = microphone.stop().await {
                warn!("Failed to stop {}: {}", microphone.name(), e);
            }
        }

        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close live stream: {}", e);
            }
        }

        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.close() {
                warn!("Failed to close {}: {}", output.name(), e);
            }
        }
    }
}

enum Exit {
    Stopped,
    Closed(Option<String>),
    Failed(LiveError, ErrorPhase),
}

/// The running session; lives inside its own task
struct LiveSession {
    id: String,
    started_at: DateTime<Utc>,
    resources: SessionResources,
    events: mpsc::Receiver<ServerEvent>,
    finished: mpsc::UnboundedReceiver<ChunkId>,
    transcript: TranscriptAssembler,
    scheduler: PlaybackScheduler,
    classifier: ErrorClassifier,
    input_sample_rate: u32,
    shared: Arc<Mutex<Shared>>,
    cancel: CancelSlot,
    state_tx: Arc<watch::Sender<SessionState>>,
    frames_sent: u64,
    frames_dropped: u64,
}

impl LiveSession {
    async fn run(mut self, mut cancel_rx: oneshot::Receiver<()>) {
        info!("Live session {} waiting for gateway", self.id);

        let exit = loop {
            tokio::select! {
                _ = &mut cancel_rx => break Exit::Stopped,
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Some(exit) = self.handle_event(event).await {
                            break exit;
                        }
                    }
                    None => break Exit::Closed(Some("event stream ended".to_string())),
                },
                frame = next_frame(&mut self.resources.capture) => match frame {
                    Some(frame) => self.send_frame(frame),
                    None => {
                        debug!("Capture stream ended");
                        self.resources.capture = None;
                    }
                },
                Some(id) = self.finished.recv() => {
                    self.scheduler.finished(id);
                }
            }
        };

        self.state_tx.send_replace(SessionState::Closing);

        let error = match &exit {
            Exit::Stopped => {
                info!("Live session {} stopped", self.id);
                None
            }
            Exit::Closed(reason) => {
                info!("Live session {} closed by gateway ({:?})", self.id, reason);
                None
            }
            Exit::Failed(err, phase) => {
                error!("Live session {} failed: {}", self.id, err);
                Some(err.user_message(*phase))
            }
        };

        self.resources.teardown().await;
        let stopped = self.scheduler.interrupt();
        debug!("Flushed {} scheduled chunks", stopped.len());

        info!(
            "Live session {} ended: {} turns, {} frames sent, {} dropped",
            self.id,
            self.transcript.turns().len(),
            self.frames_sent,
            self.frames_dropped
        );

        let report = SessionReport {
            session_id: self.id.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            turns: self.transcript.into_turns(),
            error: error.clone(),
            frames_sent: self.frames_sent,
            frames_dropped: self.frames_dropped,
        };

        finish(&self.shared, &self.cancel, &self.state_tx, error, Some(report)).await;
    }

    fn phase(&self) -> ErrorPhase {
        if *self.state_tx.borrow() == SessionState::Active {
            ErrorPhase::Active
        } else {
            ErrorPhase::Starting
        }
    }

    async fn handle_event(&mut self, event: ServerEvent) -> Option<Exit> {
        let accepting = *self.state_tx.borrow() == SessionState::Active;

        match event {
            ServerEvent::Opened => {
                if accepting {
                    return None;
                }
                if let Some(microphone) = self.resources.microphone.as_mut() {
                    match microphone.start().await {
                        Ok(rx) => self.resources.capture = Some(rx),
                        Err(e) => return Some(Exit::Failed(e, ErrorPhase::Starting)),
                    }
                }
                self.state_tx.send_replace(SessionState::Active);
                info!("Live session {} active", self.id);
            }
            ServerEvent::Error(e) => {
                return Some(Exit::Failed(self.classifier.classify(e), self.phase()));
            }
            ServerEvent::Closed { reason } => return Some(Exit::Closed(reason)),
            _ if !accepting => {
                debug!("Ignoring event before open: {:?}", event);
            }
            ServerEvent::OutputTranscript { text } => {
                self.transcript.push_fragment(Role::Interviewer, &text);
                self.publish_transcript().await;
            }
            ServerEvent::InputTranscript { text } => {
                self.transcript.push_fragment(Role::Candidate, &text);
                self.publish_transcript().await;
            }
            ServerEvent::TurnComplete => {
                self.transcript.turn_complete();
            }
            ServerEvent::Audio { data, sample_rate } => {
                self.play(&data, sample_rate);
            }
            ServerEvent::Interrupted => {
                let stopped = self.scheduler.interrupt();
                if let Some(output) = self.resources.output.as_mut() {
                    for id in &stopped {
                        output.stop_chunk(*id);
                    }
                }
                debug!("Interrupted: stopped {} chunks", stopped.len());
            }
        }

        None
    }

    fn play(&mut self, data: &str, sample_rate: u32) {
        let samples = match pcm::decode_frame(data) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Skipping undecodable audio chunk: {}", e);
                return;
            }
        };

        if sample_rate == 0 || samples.is_empty() {
            warn!("Skipping audio chunk with {} samples at {}Hz", samples.len(), sample_rate);
            return;
        }

        let Some(output) = self.resources.output.as_mut() else {
            return;
        };

        let duration = pcm::duration_secs(samples.len(), sample_rate);
        let chunk = self.scheduler.schedule(duration, output.current_time());

        if let Err(e) = output.schedule(chunk.id, samples, sample_rate, chunk.start_at) {
            warn!("Failed to schedule chunk {}: {}", chunk.id, e);
            self.scheduler.finished(chunk.id);
        }
    }

    fn send_frame(&mut self, frame: AudioFrame) {
        let Some(connection) = self.resources.connection.as_ref() else {
            return;
        };

        let audio = RealtimeAudio::from_samples(&frame.samples, self.input_sample_rate);
        match connection.send(ClientEvent::RealtimeAudio(audio)) {
            Ok(()) => self.frames_sent += 1,
            Err(e) => {
                self.frames_dropped += 1;
                debug!("{}", LiveError::FrameDrop(e.to_string()));
            }
        }
    }

    async fn publish_transcript(&self) {
        let turns = self.transcript.turns();
        let mut shared = self.shared.lock().await;

        let known = shared.transcript.len().min(turns.len());
        if known > 0 {
            shared.transcript[known - 1] = turns[known - 1].clone();
        }
        shared.transcript.extend_from_slice(&turns[known..]);
    }
}

/// Next captured frame, or pending forever when capture is not running
async fn next_frame(capture: &mut Option<mpsc::Receiver<AudioFrame>>) -> Option<AudioFrame> {
    match capture {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
