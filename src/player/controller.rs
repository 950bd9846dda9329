// =============================================================================
// PLAYBACK POSITION CONTROLLER
// =============================================================================
//
// Reconciles three inputs on the control thread:
// - transport commands from the buttons
// - the fixed-interval poll timer
// - asynchronous notifications the engine posts onto the bus
//
// Transport state is only ever taken from the engine's state-changed
// messages. The slider is kept in sync with the engine position without the
// programmatic writes being mistaken for user seeks.
//
// =============================================================================

use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use crate::core::{ClockTime, SeekFlags, StateChangeReturn, StreamKind, TransportState};
use crate::engine::{EngineError, PlaybackEngine};
use crate::player::bus::{Bus, BusMessage, SourceId};
use crate::player::timer::PollTimer;

/// The slider half of the UI surface.
pub trait SliderSurface {
    fn set_range(&mut self, min: f64, max: f64);

    /// Moves the slider programmatically. Returns the value-changed
    /// notification the widget emitted while doing so, if the toolkit emits one.
    fn set_value(&mut self, value: f64) -> Option<f64>;
}

/// What became of a seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDecision {
    /// Sent to the engine.
    Issued,
    /// Came from our own slider write, not from the user.
    Suppressed,
    /// Nothing to seek in: not prerolled, or the stream has ended.
    Rejected,
    /// The engine refused it.
    Failed,
}

pub struct PositionController<E, S> {
    engine: E,
    slider: S,
    state: TransportState,
    duration: Option<ClockTime>,
    position: Option<ClockTime>,
    suppress_seek: bool,
    end_of_stream: bool,
    /// Set by a successful play request, cleared by stop, shutdown and end of stream.
    play_requested: bool,
    timer: PollTimer,
    last_error: Option<String>,
    streams_changed: bool,
}

impl<E: PlaybackEngine, S: SliderSurface> PositionController<E, S> {
    pub fn new(engine: E, slider: S, poll_interval: Duration) -> Self {
        Self {
            engine,
            slider,
            state: TransportState::Null,
            duration: None,
            position: None,
            suppress_seek: false,
            end_of_stream: false,
            play_requested: false,
            timer: PollTimer::new(poll_interval),
            last_error: None,
            streams_changed: false,
        }
    }

    // =========================================================================
    // TRANSPORT COMMANDS
    // =========================================================================

    pub fn on_play_command(&mut self, now: Instant) -> Result<StateChangeReturn, EngineError> {
        self.end_of_stream = false;
        let result = self.request_state(TransportState::Playing);
        if result.is_ok() {
            self.play_requested = true;
            self.start_polling(now);
        }
        result
    }

    pub fn on_pause_command(&mut self) -> Result<StateChangeReturn, EngineError> {
        self.request_state(TransportState::Paused)
    }

    /// Polling stops once the engine confirms it has dropped to Ready.
    pub fn on_stop_command(&mut self) -> Result<StateChangeReturn, EngineError> {
        self.play_requested = false;
        self.request_state(TransportState::Ready)
    }

    /// Releases the pipeline entirely, used when the window closes.
    pub fn shutdown(&mut self) {
        self.play_requested = false;
        if let Err(e) = self.engine.set_state(TransportState::Null) {
            log::warn!("Failed to release pipeline: {}", e);
        }
        self.timer.cancel();
    }

    fn request_state(&mut self, target: TransportState) -> Result<StateChangeReturn, EngineError> {
        match self.engine.set_state(target) {
            Ok(ret) => {
                log::debug!("Requested {} ({:?})", target, ret);
                Ok(ret)
            }
            Err(e) => {
                log::error!("ERROR: Unable to set the pipeline to the {} state: {}", target, e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn start_polling(&mut self, now: Instant) {
        if !self.timer.is_active() {
            log::debug!("Starting position polling every {:?}", self.timer.interval());
        }
        self.timer.start(now);
    }

    // =========================================================================
    // SLIDER
    // =========================================================================

    pub fn on_seek_requested(&mut self, target_seconds: f64) -> SeekDecision {
        if self.suppress_seek {
            log::trace!("Ignoring slider change to {:.2}s caused by position refresh", target_seconds);
            return SeekDecision::Suppressed;
        }
        if !self.state.can_seek() || self.end_of_stream {
            log::debug!("Rejecting seek to {:.2}s in state {}", target_seconds, self.state);
            return SeekDecision::Rejected;
        }

        let target = ClockTime::from_seconds_f64(target_seconds);
        match self.engine.seek(SeekFlags::FLUSH | SeekFlags::KEY_UNIT, target) {
            Ok(()) => {
                log::debug!("Seeking to {}", target);
                SeekDecision::Issued
            }
            Err(e) => {
                log::warn!("Seek to {} failed: {}", target, e);
                SeekDecision::Failed
            }
        }
    }

    /// One refresh of duration and position. Always continues; polling ends
    /// only through timer cancellation.
    pub fn on_poll_tick(&mut self) -> ControlFlow<()> {
        if self.state < TransportState::Paused {
            return ControlFlow::Continue(());
        }

        if self.duration.is_none() {
            match self.engine.query_duration() {
                Ok(duration) => {
                    log::info!("Duration is {}", duration);
                    self.duration = Some(duration);
                    self.slider.set_range(0.0, duration.seconds_f64());
                }
                Err(e) => {
                    log::warn!("ERROR: Could not query current duration ({})", e);
                }
            }
        }

        match self.engine.query_position() {
            Ok(position) => {
                self.position = Some(position);
                self.write_slider_position(position.seconds_f64());
            }
            Err(e) => {
                log::warn!("Couldn't fetch current position to update slider: {}", e);
            }
        }

        ControlFlow::Continue(())
    }

    fn write_slider_position(&mut self, seconds: f64) {
        self.suppress_seek = true;
        if let Some(echo) = self.slider.set_value(seconds) {
            let decision = self.on_seek_requested(echo);
            log::trace!("Slider echo {:.2}s -> {:?}", echo, decision);
        }
        self.suppress_seek = false;
    }

    // =========================================================================
    // ENGINE NOTIFICATIONS
    // =========================================================================

    /// `pending` is where the engine is still heading, if it hasn't arrived.
    pub fn on_engine_state_changed(
        &mut self,
        source: &SourceId,
        old: TransportState,
        new: TransportState,
        pending: Option<TransportState>,
    ) {
        if source != self.engine.source() {
            return;
        }

        self.state = new;
        log::info!("State changed from {} to {}", old, new);

        // A play issued after the stop is already queued behind this message.
        let settling_idle = new <= TransportState::Ready
            && new < old
            && pending.map_or(true, |target| target <= TransportState::Ready)
            && !self.play_requested;
        if settling_idle && self.timer.is_active() {
            log::debug!("Pipeline is idle, cancelling position polling");
            self.timer.cancel();
        }

        if old == TransportState::Ready && new == TransportState::Paused {
            let _ = self.on_poll_tick();
        }
    }

    pub fn on_end_of_stream(&mut self) {
        log::info!("End-Of-Stream reached");
        self.end_of_stream = true;
        self.play_requested = false;
        if let Err(e) = self.engine.set_state(TransportState::Ready) {
            log::error!("Failed to reset pipeline after End-Of-Stream: {}", e);
            self.last_error = Some(e.to_string());
        }
    }

    pub fn on_error(&mut self, source: &SourceId, message: &str, debug: Option<&str>) {
        log::error!("ERROR: {} : {}", source, message);
        if let Some(debug) = debug {
            log::debug!("Debug info: {}", debug);
        }
        self.last_error = Some(format!("{}: {}", source, message));
    }

    pub fn on_tags_changed(&mut self, kind: StreamKind, index: usize) {
        log::debug!("Tags changed on {:?} stream {}", kind, index);
        self.streams_changed = true;
    }

    pub fn dispatch(&mut self, message: BusMessage) {
        match message {
            BusMessage::StateChanged { source, old, new, pending } => {
                self.on_engine_state_changed(&source, old, new, pending)
            }
            BusMessage::Error { source, message, debug } => {
                self.on_error(&source, &message, debug.as_deref())
            }
            BusMessage::EndOfStream => self.on_end_of_stream(),
            BusMessage::TagsChanged { kind, index } => self.on_tags_changed(kind, index),
        }
    }

    /// Handles everything queued on the bus, in arrival order.
    pub fn process_bus(&mut self, bus: &Bus) -> usize {
        let messages = bus.drain();
        let count = messages.len();
        for message in messages {
            self.dispatch(message);
        }
        count
    }

    /// Runs a poll tick if the timer is due.
    pub fn drive_timer(&mut self, now: Instant) -> bool {
        if self.timer.poll(now) {
            let _ = self.on_poll_tick();
            true
        } else {
            false
        }
    }

    /// One control-thread iteration: notifications first, then the timer.
    pub fn iterate(&mut self, now: Instant, bus: &Bus) {
        self.process_bus(bus);
        self.drive_timer(now);
    }

    // =========================================================================
    // STATE QUERIES
    // =========================================================================

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn duration(&self) -> Option<ClockTime> {
        self.duration
    }

    pub fn position(&self) -> Option<ClockTime> {
        self.position
    }

    pub fn is_seek_suppressed(&self) -> bool {
        self.suppress_seek
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_active()
    }

    pub fn at_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn next_tick_in(&self, now: Instant) -> Option<Duration> {
        self.timer.remaining(now)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// True once after any tags-changed notification.
    pub fn take_streams_changed(&mut self) -> bool {
        std::mem::take(&mut self.streams_changed)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn slider(&self) -> &S {
        &self.slider
    }

    pub fn slider_mut(&mut self) -> &mut S {
        &mut self.slider
    }
}
