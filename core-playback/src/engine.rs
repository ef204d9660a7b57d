//! # Playback Engine
//!
//! The engine is a single task that owns the live output handle and the
//! [`PlaybackSession`]. Commands from the [`PlaybackController`], hardware
//! feedback, play outcomes and timer expiries all arrive as [`EngineMsg`]s on
//! one mailbox and are applied in order, so no two of them ever interleave.
//!
//! ## Stale feedback
//!
//! Every binding of the live handle gets a fresh [`OperationToken`]. The
//! task forwarding the handle's events, and every timer, tag their messages
//! with the token they were started under; the engine drops anything whose
//! token is no longer active. Play requests carry their own id for the same
//! reason.
//!
//! ## Play/pause serialization
//!
//! At most one hardware `play()` is in flight. A pause issued while it is
//! pending is recorded and applied once the play settles; another play
//! request cancels that deferred pause instead of starting a second play.
//!
//! [`PlaybackController`]: crate::PlaybackController

use bridge_traits::{AudioOutput, MediaError, MediaErrorKind, OutputEvent, ReadyState};
use core_catalog::Track;
use core_runtime::events::{CoreEvent, EventBus, NavigationEvent, PlaybackEvent};
use futures::StreamExt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::navigation::NavigationTracker;
#[cfg(any(debug_assertions, feature = "diagnostics"))]
use crate::navigation::NavigationState;
use crate::preload::PreloadCache;
use crate::publisher::StatePublisher;
use crate::session::{
    advance_progress, OperationToken, PlaybackSession, PlaybackStatus, SessionError,
};

/// What the user last asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayIntent {
    Play,
    #[default]
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    StuckProgress,
    LoadCeiling,
    PlaybackGrace,
}

impl TimerKind {
    const ALL: [TimerKind; 3] = [
        TimerKind::StuckProgress,
        TimerKind::LoadCeiling,
        TimerKind::PlaybackGrace,
    ];

    fn index(self) -> usize {
        match self {
            TimerKind::StuckProgress => 0,
            TimerKind::LoadCeiling => 1,
            TimerKind::PlaybackGrace => 2,
        }
    }
}

/// Armed state and generation of each engine timer. Re-arming or disarming
/// bumps the generation so an expiry already in the mailbox is ignored.
#[derive(Debug, Default)]
struct Timers {
    generation: [u64; 3],
    armed: [bool; 3],
}

impl Timers {
    fn arm(&mut self, kind: TimerKind) -> u64 {
        let i = kind.index();
        self.generation[i] += 1;
        self.armed[i] = true;
        self.generation[i]
    }

    fn disarm(&mut self, kind: TimerKind) {
        let i = kind.index();
        if self.armed[i] {
            self.generation[i] += 1;
            self.armed[i] = false;
        }
    }

    fn disarm_all(&mut self) {
        for kind in TimerKind::ALL {
            self.disarm(kind);
        }
    }

    fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed[kind.index()]
    }

    /// Consume an expiry. `false` if it was superseded.
    fn fire(&mut self, kind: TimerKind, generation: u64) -> bool {
        let i = kind.index();
        if self.armed[i] && self.generation[i] == generation {
            self.armed[i] = false;
            true
        } else {
            false
        }
    }
}

struct PendingPlay {
    play_id: u64,
    /// A pause arrived while the play was in flight.
    deferred_pause: bool,
    /// Issued by a track switch; the switch stays in flight until it settles.
    from_switch: bool,
    /// Notified when the play settles. Dropped if it is cancelled.
    waiters: Vec<oneshot::Sender<()>>,
}

pub(crate) enum EngineMsg {
    LoadTrack {
        track: Track,
        autoplay: bool,
    },
    TogglePlayPause,
    Seek(f64),
    SeekPercent(f64),
    SetUpNext(Option<Track>),
    BeginSwitch {
        track: Track,
        reply: oneshot::Sender<OperationToken>,
    },
    CompleteSwitch {
        track: Track,
        ticket: OperationToken,
        done: oneshot::Sender<()>,
    },
    RouteChangeStarted(String),
    RouteChangeSettled,
    NavigationTimer {
        epoch: u64,
    },
    Output {
        token: OperationToken,
        event: OutputEvent,
    },
    PlaySettled {
        play_id: u64,
        result: std::result::Result<(), MediaError>,
    },
    Timer {
        token: OperationToken,
        kind: TimerKind,
        generation: u64,
    },
    Snapshot(oneshot::Sender<PlaybackSession>),
    #[cfg(any(debug_assertions, feature = "diagnostics"))]
    Diagnostics(oneshot::Sender<EngineDiagnostics>),
    Shutdown(oneshot::Sender<()>),
}

/// Internal engine state, for debugging.
#[cfg(any(debug_assertions, feature = "diagnostics"))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineDiagnostics {
    pub active_operation_token: OperationToken,
    pub intent: PlayIntent,
    pub play_pending: bool,
    pub pause_deferred: bool,
    pub switch_in_flight: bool,
    /// Ready-to-play was observed for the current binding.
    pub ready: bool,
    pub navigation: NavigationState,
    /// Locator bound to the live handle, without query string.
    pub bound_locator: Option<String>,
    /// Preloaded locators, oldest first, without query strings.
    pub preloaded_locators: Vec<String>,
    pub last_action: &'static str,
}

pub(crate) struct Engine {
    config: PlaybackConfig,
    output: Arc<dyn AudioOutput>,
    cache: PreloadCache,
    publisher: StatePublisher,
    event_bus: Option<EventBus>,
    mailbox: WeakUnboundedSender<EngineMsg>,
    session: PlaybackSession,
    published: PlaybackSession,
    intent: PlayIntent,
    pending_play: Option<PendingPlay>,
    next_play_id: u64,
    forwarder: Option<JoinHandle<()>>,
    switch_in_flight: bool,
    ready: bool,
    navigation: NavigationTracker,
    timers: Timers,
    #[cfg_attr(not(any(debug_assertions, feature = "diagnostics")), allow(dead_code))]
    last_action: &'static str,
}

impl Engine {
    pub(crate) fn new(
        config: PlaybackConfig,
        output: Arc<dyn AudioOutput>,
        cache: PreloadCache,
        publisher: StatePublisher,
        event_bus: Option<EventBus>,
        mailbox: WeakUnboundedSender<EngineMsg>,
    ) -> Self {
        let session = publisher.current();
        let navigation = NavigationTracker::new(config.navigation_route_prefixes.clone());
        Self {
            config,
            output,
            cache,
            publisher,
            event_bus,
            mailbox,
            published: session.clone(),
            session,
            intent: PlayIntent::Pause,
            pending_play: None,
            next_play_id: 0,
            forwarder: None,
            switch_in_flight: false,
            ready: false,
            navigation,
            timers: Timers::default(),
            last_action: "idle",
        }
    }

    pub(crate) async fn run(mut self, mut inbox: UnboundedReceiver<EngineMsg>) {
        debug!("Playback engine started");

        let shutdown_reply = loop {
            let Some(msg) = inbox.recv().await else {
                break None;
            };
            if let ControlFlow::Break(reply) = self.handle(msg) {
                break Some(reply);
            }
            self.publish_if_changed();
        };

        self.teardown();
        self.publish_if_changed();
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
        info!("Playback engine stopped");
    }

    fn handle(&mut self, msg: EngineMsg) -> ControlFlow<oneshot::Sender<()>> {
        match msg {
            EngineMsg::LoadTrack { track, autoplay } => self.load_track(track, autoplay),
            EngineMsg::TogglePlayPause => self.toggle_play_pause(),
            EngineMsg::Seek(seconds) => self.seek(seconds),
            EngineMsg::SeekPercent(percent) => self.seek_by_percentage(percent),
            EngineMsg::SetUpNext(track) => self.set_up_next(track),
            EngineMsg::BeginSwitch { track, reply } => {
                let ticket = self.begin_switch(track);
                let _ = reply.send(ticket);
            }
            EngineMsg::CompleteSwitch {
                track,
                ticket,
                done,
            } => self.complete_switch(track, ticket, done),
            EngineMsg::RouteChangeStarted(path) => self.route_change_started(path),
            EngineMsg::RouteChangeSettled => {
                if self.navigation.settle() {
                    self.on_navigation_settled();
                }
            }
            EngineMsg::NavigationTimer { epoch } => {
                if self.navigation.settle_epoch(epoch) {
                    debug!(epoch, "Navigation settle delay elapsed");
                    self.on_navigation_settled();
                }
            }
            EngineMsg::Output { token, event } => {
                if token == self.session.active_operation_token {
                    self.on_output_event(event);
                } else {
                    trace!(%token, ?event, "Dropping event from a previous binding");
                }
            }
            EngineMsg::PlaySettled { play_id, result } => self.on_play_settled(play_id, result),
            EngineMsg::Timer {
                token,
                kind,
                generation,
            } => {
                if token == self.session.active_operation_token
                    && self.timers.fire(kind, generation)
                {
                    self.on_timer(kind);
                }
            }
            EngineMsg::Snapshot(reply) => {
                let _ = reply.send(self.session.clone());
            }
            #[cfg(any(debug_assertions, feature = "diagnostics"))]
            EngineMsg::Diagnostics(reply) => {
                let _ = reply.send(self.diagnostics());
            }
            EngineMsg::Shutdown(reply) => return ControlFlow::Break(reply),
        }
        ControlFlow::Continue(())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn load_track(&mut self, track: Track, autoplay: bool) {
        self.last_action = if autoplay { "load_and_play" } else { "load_track" };

        if self.is_current_binding(&track) {
            debug!(track_id = %track.id, "Track already loaded, keeping the live handle");
            self.session.current_track = Some(track);
            self.preload_next_hint();
            if autoplay {
                self.resume();
            }
            return;
        }

        let adopted_ready = self.bind_track(track);
        if autoplay {
            self.intent = PlayIntent::Play;
            self.session.is_user_initiated_pause = false;
            self.request_play(None, false);
        }
        if adopted_ready {
            self.on_ready();
        }
    }

    fn toggle_play_pause(&mut self) {
        self.last_action = "toggle_play_pause";
        if self.session.current_track.is_none() {
            debug!("Toggle ignored, nothing loaded");
            return;
        }

        match self.intent {
            PlayIntent::Play => {
                self.intent = PlayIntent::Pause;
                self.session.is_user_initiated_pause = true;
                match self.pending_play.as_mut() {
                    Some(pending) => {
                        debug!(play_id = pending.play_id, "Deferring pause until play settles");
                        pending.deferred_pause = true;
                    }
                    None => {
                        self.output.pause();
                        self.set_status(PlaybackStatus::Paused);
                    }
                }
            }
            PlayIntent::Pause => self.resume(),
        }
    }

    fn seek(&mut self, seconds: f64) {
        self.last_action = "seek";
        if self.navigation.is_transitioning() {
            debug!(seconds, "Ignoring seek during navigation");
            return;
        }
        if self.session.current_track.is_none() || !seconds.is_finite() {
            return;
        }

        let mut target = seconds.max(0.0);
        let duration = self.known_duration();
        if duration > 0.0 {
            target = target.min(duration);
        }

        self.output.set_position(target);
        self.session.position_seconds = target;
    }

    fn seek_by_percentage(&mut self, percent: f64) {
        let duration = self.known_duration();
        if duration <= 0.0 || !percent.is_finite() {
            debug!(percent, "Ignoring percentage seek without a known duration");
            return;
        }
        self.seek(percent.clamp(0.0, 100.0) / 100.0 * duration);
    }

    fn set_up_next(&mut self, track: Option<Track>) {
        if let Some(next) = &track {
            debug!(track_id = %next.id, "Up next updated");
            let _ = self.cache.preload(&next.stream_uri);
        }
        self.session.up_next = track;
    }

    fn begin_switch(&mut self, track: Track) -> OperationToken {
        self.last_action = "switch_track";
        if let Some(current) = &self.session.current_track {
            self.cache.release(&current.stream_uri);
        }

        self.release_live();
        let ticket = self.advance_token();
        info!(track_id = %track.id, %ticket, "Switching track");

        self.session.current_track = Some(track);
        self.session.status = PlaybackStatus::Loading;
        self.session.position_seconds = 0.0;
        self.session.duration_seconds = 0.0;
        self.session.buffer_progress_percent = 0.0;
        self.session.last_error = None;
        self.session.is_user_initiated_pause = false;
        self.intent = PlayIntent::Play;
        self.switch_in_flight = true;
        ticket
    }

    fn complete_switch(&mut self, track: Track, ticket: OperationToken, done: oneshot::Sender<()>) {
        if ticket != self.session.active_operation_token {
            debug!(%ticket, active = %self.session.active_operation_token, "Switch superseded");
            return;
        }

        let adopted_ready = self.bind_track(track);
        self.switch_in_flight = true;
        self.intent = PlayIntent::Play;
        self.session.is_user_initiated_pause = false;
        self.request_play(Some(done), true);
        if adopted_ready {
            self.on_ready();
        }
    }

    fn route_change_started(&mut self, path: String) {
        match self.navigation.begin(&path) {
            Some(epoch) => {
                debug!(%path, epoch, "Navigation started");
                self.session.navigation_in_flight = true;
                self.spawn_navigation_timer(epoch);
                self.emit(CoreEvent::Navigation(NavigationEvent::TransitionStarted {
                    path,
                    epoch,
                }));
            }
            None => trace!(%path, "Navigation to untracked route"),
        }
    }

    fn on_navigation_settled(&mut self) {
        self.session.navigation_in_flight = false;
        self.emit(CoreEvent::Navigation(NavigationEvent::TransitionSettled {
            epoch: self.navigation.epoch(),
        }));

        if self.ready && self.intent == PlayIntent::Play && !self.session.status.is_terminal() {
            self.resume_if_allowed();
        }
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Same track, still bound and healthy. During navigation the id alone
    /// is enough, since the page is only re-announcing what is playing.
    fn is_current_binding(&self, track: &Track) -> bool {
        let Some(current) = &self.session.current_track else {
            return false;
        };
        if current.id != track.id {
            return false;
        }
        if self.navigation.is_transitioning() {
            return true;
        }
        self.session.status != PlaybackStatus::Errored
            && self.output.locator().as_ref() == Some(&track.stream_uri)
    }

    /// Bind `track` to the live handle, adopting a preloaded handle when one
    /// exists. Returns `true` if the adopted handle can already play.
    fn bind_track(&mut self, track: Track) -> bool {
        self.release_live();
        let token = self.advance_token();

        let adopted = self.cache.take_preloaded(&track.stream_uri);
        let preloaded = adopted.is_some();
        if let Some(handle) = adopted {
            self.output = handle;
        }

        self.spawn_forwarder(token);
        if !preloaded {
            self.output.load(&track.stream_uri);
        }

        let duration = if preloaded {
            self.output
                .duration()
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(0.0)
        } else {
            0.0
        };

        info!(
            track_id = %track.id,
            locator = %track.stream_uri.redacted(),
            preloaded,
            %token,
            "Loading track"
        );
        self.emit(CoreEvent::Playback(PlaybackEvent::TrackLoaded {
            track_id: track.id.clone(),
            title: track.title.clone(),
            preloaded,
        }));

        self.session.current_track = Some(track);
        self.session.status = PlaybackStatus::Loading;
        self.session.position_seconds = 0.0;
        self.session.duration_seconds = duration;
        self.session.buffer_progress_percent = if preloaded {
            self.config.preloaded_start_progress
        } else {
            self.config.fresh_start_progress
        };
        self.session.last_error = None;
        self.arm_timer(TimerKind::LoadCeiling);
        self.preload_next_hint();

        preloaded && self.output.ready_state() >= ReadyState::HaveFutureData
    }

    /// Detach the live handle from whatever it was doing.
    fn release_live(&mut self) {
        if let Some(pending) = self.pending_play.take() {
            debug!(play_id = pending.play_id, "Cancelling pending play");
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.output.unload();
        self.timers.disarm_all();
        self.switch_in_flight = false;
        self.ready = false;
    }

    fn advance_token(&mut self) -> OperationToken {
        let token = self.session.active_operation_token.next();
        self.session.active_operation_token = token;
        token
    }

    fn spawn_forwarder(&mut self, token: OperationToken) {
        let mut events = self.output.events();
        let mailbox = self.mailbox.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(tx) = mailbox.upgrade() else {
                    break;
                };
                if tx.send(EngineMsg::Output { token, event }).is_err() {
                    break;
                }
            }
        }));
    }

    fn preload_next_hint(&self) {
        let Some(track) = &self.session.current_track else {
            return;
        };
        if let Some(next) = &track.next_stream_uri {
            if *next != track.stream_uri {
                let _ = self.cache.preload(next);
            }
        }
    }

    // ========================================================================
    // Play requests
    // ========================================================================

    /// Explicit play: clears a user pause and starts playback unless it is
    /// already running.
    fn resume(&mut self) {
        self.intent = PlayIntent::Play;
        self.session.is_user_initiated_pause = false;
        if self.session.status == PlaybackStatus::Playing && self.pending_play.is_none() {
            return;
        }
        self.set_status(PlaybackStatus::Loading);
        self.request_play(None, false);
    }

    /// Auto-resume after readiness or navigation, honoring a user pause.
    fn resume_if_allowed(&mut self) {
        if self.pending_play.is_some()
            || self.session.status == PlaybackStatus::Playing
            || self.session.is_user_initiated_pause
        {
            return;
        }
        if self.navigation.is_transitioning() {
            debug!("Deferring auto-resume until navigation settles");
            return;
        }
        self.request_play(None, false);
    }

    fn request_play(&mut self, waiter: Option<oneshot::Sender<()>>, from_switch: bool) {
        if let Some(pending) = self.pending_play.as_mut() {
            trace!(play_id = pending.play_id, "Play already in flight");
            pending.deferred_pause = false;
            pending.from_switch |= from_switch;
            pending.waiters.extend(waiter);
            return;
        }

        self.next_play_id += 1;
        let play_id = self.next_play_id;
        let output = self.output.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = output.play().await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(EngineMsg::PlaySettled { play_id, result });
            }
        });

        self.pending_play = Some(PendingPlay {
            play_id,
            deferred_pause: false,
            from_switch,
            waiters: waiter.into_iter().collect(),
        });
    }

    fn on_play_settled(&mut self, play_id: u64, result: std::result::Result<(), MediaError>) {
        let pending = match self.pending_play.take() {
            Some(pending) if pending.play_id == play_id => pending,
            other => {
                self.pending_play = other;
                trace!(play_id, "Ignoring outcome of a cancelled play");
                return;
            }
        };

        let during_switch = pending.from_switch || self.switch_in_flight;
        if pending.from_switch {
            self.switch_in_flight = false;
        }

        match result {
            Ok(()) if pending.deferred_pause => {
                debug!(play_id, "Applying deferred pause");
                self.output.pause();
                self.set_status(PlaybackStatus::Paused);
            }
            Ok(()) => {
                self.set_status(PlaybackStatus::Playing);
                self.arm_timer(TimerKind::PlaybackGrace);
            }
            Err(err) if err.is_cancellation() => {
                debug!(play_id, error = %err, "Play request superseded");
                if self.intent == PlayIntent::Pause {
                    self.set_status(PlaybackStatus::Paused);
                }
            }
            Err(err) if err.is_permission_denied() => {
                info!(error = %err, "Playback blocked until the user interacts");
                self.intent = PlayIntent::Pause;
                self.set_status(PlaybackStatus::Paused);
            }
            Err(err) if during_switch || self.navigation.is_transitioning() => {
                debug!(error = %err, "Suppressing play rejection during a transition");
                self.intent = PlayIntent::Pause;
                self.set_status(PlaybackStatus::Paused);
            }
            Err(err) => self.fail(err),
        }

        for waiter in pending.waiters {
            let _ = waiter.send(());
        }
    }

    // ========================================================================
    // Hardware feedback
    // ========================================================================

    fn on_output_event(&mut self, event: OutputEvent) {
        if let Some(percent) = event.buffered_percent() {
            self.update_progress(percent);
            return;
        }

        match event {
            OutputEvent::Waiting => {
                if !self.session.status.is_terminal() {
                    self.set_status(PlaybackStatus::Loading);
                }
            }
            OutputEvent::LoadedMetadata { duration_seconds } => {
                if duration_seconds.is_finite() && duration_seconds > 0.0 {
                    self.session.duration_seconds = duration_seconds;
                }
            }
            OutputEvent::CanPlay | OutputEvent::CanPlayThrough => self.on_ready(),
            OutputEvent::Playing => {
                if self.intent == PlayIntent::Pause {
                    if self.pending_play.is_none() {
                        debug!("Output started playing against a pause; pausing");
                        self.output.pause();
                        self.set_status(PlaybackStatus::Paused);
                    }
                } else {
                    self.set_status(PlaybackStatus::Playing);
                }
            }
            OutputEvent::TimeUpdate { position_seconds } => {
                if self.session.status != PlaybackStatus::Ended && position_seconds.is_finite() {
                    self.session.position_seconds = position_seconds.max(0.0);
                }
            }
            OutputEvent::Ended => self.on_ended(),
            OutputEvent::Error(err) => self.on_media_error(err),
            OutputEvent::Progress { .. } => {}
        }
    }

    fn on_ready(&mut self) {
        self.ready = true;
        self.timers.disarm(TimerKind::LoadCeiling);
        self.timers.disarm(TimerKind::StuckProgress);
        self.session.buffer_progress_percent = 100.0;

        if self.session.status.is_terminal() {
            return;
        }
        match self.intent {
            PlayIntent::Play => self.resume_if_allowed(),
            PlayIntent::Pause => {
                if self.pending_play.is_none() {
                    self.set_status(PlaybackStatus::Paused);
                }
            }
        }
    }

    fn on_ended(&mut self) {
        self.timers.disarm_all();
        self.intent = PlayIntent::Pause;
        self.output.set_position(0.0);
        self.session.position_seconds = 0.0;
        self.set_status(PlaybackStatus::Ended);

        let Some(next) = self.session.up_next.take() else {
            return;
        };
        let from_track_id = self.session.current_track_id().unwrap_or_default().to_string();
        info!(from = %from_track_id, to = %next.id, "Advancing to up next");
        self.emit(CoreEvent::Playback(PlaybackEvent::AutoAdvanced {
            from_track_id,
            to_track_id: next.id.clone(),
        }));

        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };
        let cache = self.cache.clone();
        tokio::spawn(async move {
            if let Err(err) = run_switch(&mailbox, &cache, next).await {
                warn!(error = %err, "Auto-advance failed");
            }
        });
    }

    fn on_media_error(&mut self, err: MediaError) {
        if err.is_cancellation() {
            debug!(error = %err, "Ignoring aborted media operation");
            return;
        }
        if self.switch_in_flight || self.navigation.is_transitioning() {
            debug!(error = %err, "Suppressing media error during a transition");
            return;
        }
        self.fail(err);
    }

    fn fail(&mut self, err: MediaError) {
        warn!(
            track_id = self.session.current_track_id().unwrap_or_default(),
            error = %err,
            "Playback failed"
        );
        self.timers.disarm_all();
        self.intent = PlayIntent::Pause;
        self.session.buffer_progress_percent = 0.0;
        self.session.last_error = Some(SessionError::from(&err));
        self.set_status(PlaybackStatus::Errored);
        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            track_id: self.session.current_track_id().map(str::to_string),
            message: err.to_string(),
            recoverable: err.kind == MediaErrorKind::Network,
        }));
    }

    fn update_progress(&mut self, reported: f64) {
        let progress = advance_progress(
            self.session.buffer_progress_percent,
            reported,
            self.config.completion_threshold,
        );
        self.session.buffer_progress_percent = progress;

        if progress >= 100.0 {
            self.timers.disarm(TimerKind::StuckProgress);
        } else if progress >= self.config.stuck_progress_threshold
            && !self.timers.is_armed(TimerKind::StuckProgress)
        {
            self.arm_timer(TimerKind::StuckProgress);
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    fn arm_timer(&mut self, kind: TimerKind) {
        let generation = self.timers.arm(kind);
        let delay = match kind {
            TimerKind::StuckProgress => self.config.stuck_progress_timeout,
            TimerKind::LoadCeiling => self.config.load_ceiling,
            TimerKind::PlaybackGrace => self.config.playback_grace,
        };
        let token = self.session.active_operation_token;
        self.spawn_delayed(
            delay,
            EngineMsg::Timer {
                token,
                kind,
                generation,
            },
        );
    }

    fn spawn_navigation_timer(&self, epoch: u64) {
        self.spawn_delayed(
            self.config.navigation_settle_delay,
            EngineMsg::NavigationTimer { epoch },
        );
    }

    fn spawn_delayed(&self, delay: Duration, msg: EngineMsg) {
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(msg);
            }
        });
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::StuckProgress => {
                let progress = self.session.buffer_progress_percent;
                if progress >= self.config.stuck_progress_threshold && progress < 100.0 {
                    debug!(progress, "Buffering progress stalled near the end");
                    self.session.buffer_progress_percent = 100.0;
                }
            }
            TimerKind::LoadCeiling => {
                if self.session.status == PlaybackStatus::Loading {
                    warn!(
                        ceiling = ?self.config.load_ceiling,
                        "Load exceeded its ceiling; resolving from the output state"
                    );
                    self.session.buffer_progress_percent = 100.0;
                    if self.pending_play.is_none() {
                        self.on_ready();
                    }
                }
            }
            TimerKind::PlaybackGrace => {
                self.session.buffer_progress_percent = 100.0;
            }
        }
    }

    // ========================================================================
    // Publication
    // ========================================================================

    fn set_status(&mut self, status: PlaybackStatus) {
        let previous = self.session.status;
        if previous == status {
            return;
        }
        self.session.status = status;
        debug!(from = %previous, to = %status, "Playback status changed");

        let Some(track_id) = self.session.current_track_id().map(str::to_string) else {
            return;
        };
        let event = match status {
            PlaybackStatus::Playing => PlaybackEvent::Started { track_id },
            PlaybackStatus::Paused => PlaybackEvent::Paused {
                track_id,
                position_ms: (self.session.position_seconds * 1000.0) as u64,
                user_initiated: self.session.is_user_initiated_pause,
            },
            PlaybackStatus::Ended => PlaybackEvent::Ended { track_id },
            _ => return,
        };
        self.emit(CoreEvent::Playback(event));
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(event);
        }
    }

    fn publish_if_changed(&mut self) {
        if self.session != self.published {
            self.published = self.session.clone();
            self.publisher.publish(&self.session);
        }
    }

    fn known_duration(&self) -> f64 {
        if self.session.duration_seconds > 0.0 {
            return self.session.duration_seconds;
        }
        self.output
            .duration()
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0)
    }

    fn teardown(&mut self) {
        self.release_live();
        self.cache.clear();
        self.intent = PlayIntent::Pause;
        let token = self.advance_token();
        self.session = PlaybackSession {
            active_operation_token: token,
            ..PlaybackSession::default()
        };
    }

    #[cfg(any(debug_assertions, feature = "diagnostics"))]
    fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            active_operation_token: self.session.active_operation_token,
            intent: self.intent,
            play_pending: self.pending_play.is_some(),
            pause_deferred: self
                .pending_play
                .as_ref()
                .is_some_and(|pending| pending.deferred_pause),
            switch_in_flight: self.switch_in_flight,
            ready: self.ready,
            navigation: self.navigation.state(),
            bound_locator: self
                .output
                .locator()
                .map(|locator| locator.redacted().to_string()),
            preloaded_locators: self
                .cache
                .preloaded_locators()
                .iter()
                .map(|locator| locator.redacted().to_string())
                .collect(),
            last_action: self.last_action,
        }
    }
}

/// Switch to `track`: release the current binding, wait for a preloaded
/// handle, then bind it and play.
///
/// A failed preload falls back to a fresh load. Resolves once the play
/// settles, or immediately if a newer load superseded this switch.
pub(crate) async fn run_switch(
    mailbox: &UnboundedSender<EngineMsg>,
    cache: &PreloadCache,
    track: Track,
) -> Result<()> {
    let (reply, ticket) = oneshot::channel();
    mailbox
        .send(EngineMsg::BeginSwitch {
            track: track.clone(),
            reply,
        })
        .map_err(|_| PlaybackError::EngineStopped)?;
    let ticket = ticket.await.map_err(|_| PlaybackError::EngineStopped)?;

    if let Err(err) = cache.preload(&track.stream_uri).await {
        warn!(
            track_id = %track.id,
            error = %err,
            "Preload for switch failed, loading directly"
        );
        cache.release(&track.stream_uri);
    }

    let (done, settled) = oneshot::channel();
    mailbox
        .send(EngineMsg::CompleteSwitch {
            track,
            ticket,
            done,
        })
        .map_err(|_| PlaybackError::EngineStopped)?;

    if settled.await.is_err() && mailbox.is_closed() {
        return Err(PlaybackError::EngineStopped);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_generations_supersede() {
        let mut timers = Timers::default();
        let first = timers.arm(TimerKind::LoadCeiling);
        let second = timers.arm(TimerKind::LoadCeiling);

        assert!(!timers.fire(TimerKind::LoadCeiling, first));
        assert!(timers.fire(TimerKind::LoadCeiling, second));
        assert!(!timers.fire(TimerKind::LoadCeiling, second));
    }

    #[test]
    fn test_disarm_invalidates_pending_expiry() {
        let mut timers = Timers::default();
        let generation = timers.arm(TimerKind::StuckProgress);
        timers.disarm_all();

        assert!(!timers.is_armed(TimerKind::StuckProgress));
        assert!(!timers.fire(TimerKind::StuckProgress, generation));
    }

    #[test]
    fn test_timer_kinds_are_independent() {
        let mut timers = Timers::default();
        let grace = timers.arm(TimerKind::PlaybackGrace);
        timers.arm(TimerKind::StuckProgress);
        timers.disarm(TimerKind::StuckProgress);

        assert!(timers.fire(TimerKind::PlaybackGrace, grace));
    }
}
