//! Scriptable audio output shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    AudioOutput, AudioOutputFactory, MediaError, OutputEvent, OutputEventStream, ReadyState,
    StreamLocator,
};
use core_catalog::Track;
use core_playback::{PlaybackConfig, PlaybackController};
use futures::channel::mpsc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Calls the engine made on a [`FakeOutput`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(String),
    Unload,
    Play,
    Pause,
    SetPosition(f64),
}

/// How `play()` settles.
#[derive(Debug, Clone)]
pub enum PlayMode {
    Resolve,
    Reject(MediaError),
    /// Held until the test calls [`FakeOutput::settle_play`].
    Manual,
}

struct FakeState {
    locator: Option<StreamLocator>,
    position: f64,
    duration: Option<f64>,
    ready_state: ReadyState,
    play_mode: PlayMode,
    /// Emit metadata and readiness as soon as a locator is loaded.
    auto_ready: bool,
    calls: Vec<Call>,
    held_plays: VecDeque<oneshot::Sender<Result<(), MediaError>>>,
}

pub struct FakeOutput {
    state: Mutex<FakeState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<OutputEvent>>>,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                locator: None,
                position: 0.0,
                duration: None,
                ready_state: ReadyState::HaveNothing,
                play_mode: PlayMode::Resolve,
                auto_ready: false,
                calls: Vec::new(),
                held_plays: VecDeque::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// An output that reports readiness right after `load`.
    pub fn auto_ready() -> Arc<Self> {
        let output = Self::new();
        output.state.lock().auto_ready = true;
        output
    }

    pub fn emit(&self, event: OutputEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }

    pub fn set_play_mode(&self, mode: PlayMode) {
        self.state.lock().play_mode = mode;
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.state.lock().ready_state = ready_state;
    }

    /// Settle the oldest held `play()`. `false` if none is held.
    pub fn settle_play(&self, result: Result<(), MediaError>) -> bool {
        let held = self.state.lock().held_plays.pop_front();
        match held {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn play_count(&self) -> usize {
        self.count(&Call::Play)
    }

    pub fn pause_count(&self) -> usize {
        self.count(&Call::Pause)
    }

    pub fn load_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Load(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().locator.is_some()
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    fn load(&self, locator: &StreamLocator) {
        let auto_ready = {
            let mut state = self.state.lock();
            state.calls.push(Call::Load(locator.as_str().to_string()));
            state.locator = Some(locator.clone());
            state.position = 0.0;
            if state.auto_ready {
                state.duration = Some(180.0);
                state.ready_state = ReadyState::HaveEnoughData;
            } else {
                state.duration = None;
                state.ready_state = ReadyState::HaveNothing;
            }
            state.auto_ready
        };

        if auto_ready {
            self.emit(OutputEvent::LoadedMetadata {
                duration_seconds: 180.0,
            });
            self.emit(OutputEvent::CanPlay);
            self.emit(OutputEvent::CanPlayThrough);
        }
    }

    fn unload(&self) {
        let mut state = self.state.lock();
        state.calls.push(Call::Unload);
        state.locator = None;
        state.duration = None;
        state.ready_state = ReadyState::HaveNothing;
    }

    fn locator(&self) -> Option<StreamLocator> {
        self.state.lock().locator.clone()
    }

    async fn play(&self) -> Result<(), MediaError> {
        let held = {
            let mut state = self.state.lock();
            state.calls.push(Call::Play);
            match state.play_mode.clone() {
                PlayMode::Resolve => return Ok(()),
                PlayMode::Reject(err) => return Err(err),
                PlayMode::Manual => {
                    let (tx, rx) = oneshot::channel();
                    state.held_plays.push_back(tx);
                    rx
                }
            }
        };
        held.await
            .unwrap_or_else(|_| Err(MediaError::aborted("play dropped")))
    }

    fn pause(&self) {
        self.state.lock().calls.push(Call::Pause);
    }

    fn set_position(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.calls.push(Call::SetPosition(seconds));
        state.position = seconds;
    }

    fn position(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn events(&self) -> OutputEventStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().push(tx);
        Box::pin(rx)
    }
}

/// Hands out [`FakeOutput`]s and keeps them for inspection.
pub struct FakeFactory {
    auto_ready: bool,
    created: Mutex<Vec<Arc<FakeOutput>>>,
}

impl FakeFactory {
    /// Outputs that become ready as soon as they load.
    pub fn ready() -> Arc<Self> {
        Arc::new(Self {
            auto_ready: true,
            created: Mutex::new(Vec::new()),
        })
    }

    /// Outputs that only report what the test emits.
    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            auto_ready: false,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> Vec<Arc<FakeOutput>> {
        self.created.lock().clone()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl AudioOutputFactory for FakeFactory {
    fn create_output(&self) -> Arc<dyn AudioOutput> {
        let output = if self.auto_ready {
            FakeOutput::auto_ready()
        } else {
            FakeOutput::new()
        };
        self.created.lock().push(output.clone());
        output
    }
}

pub fn track(id: &str) -> Track {
    Track::new(
        id,
        format!("Track {}", id),
        "Chill Channel",
        format!("https://img.example.com/{}.jpg", id),
        format!("https://cdn.example.com/{}.webm", id),
    )
}

/// Engine under test with its live output and preload factory.
pub struct Harness {
    pub controller: PlaybackController,
    pub output: Arc<FakeOutput>,
    pub factory: Arc<FakeFactory>,
}

pub fn harness() -> Harness {
    harness_with(PlaybackConfig::default(), FakeFactory::ready())
}

pub fn harness_with(config: PlaybackConfig, factory: Arc<FakeFactory>) -> Harness {
    let output = FakeOutput::new();
    let controller = PlaybackController::builder(output.clone(), factory.clone())
        .config(config)
        .spawn()
        .expect("valid config");
    Harness {
        controller,
        output,
        factory,
    }
}

/// Let spawned tasks drain their queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advance paused time by `duration`, then drain.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}
