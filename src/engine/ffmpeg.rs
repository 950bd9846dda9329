// =============================================================================
// FFMPEG PLAYBACK ENGINE
// =============================================================================
//
// A playbin-like pipeline built from external processes:
// - ffprobe prerolls the media (duration, streams, tags)
// - one ffmpeg process per decoded stream writes raw samples/frames to stdout
// - reader threads move audio into a ring buffer feeding a rodio sink and
//   queue video frames for release at their presentation time
//
// All transport work happens on a single pipeline thread. Callers only send
// commands and read a snapshot of shared state, so nothing they call blocks.
// Progress is reported as bus messages, one per state step.
//
// =============================================================================

use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use rodio::Sink;
use crate::core::{ClockTime, MediaUri, PlayerConfig, SeekFlags, StateChangeReturn, StreamKind, TransportState};
use crate::engine::audio_output::{AudioOutput, AudioRingBuffer, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::engine::probe::{keyframe_before, MediaInfo};
use crate::engine::{EngineError, PlaybackEngine, QueryKind};
use crate::player::{BusMessage, BusSender, SourceId};

const MAX_QUEUED_FRAMES: usize = 120;
const MAX_FRAME_RATE: f64 = 60.0;
const DEFAULT_FRAME_RATE: f64 = 30.0;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_source(name: &str) -> SourceId {
    SourceId::new(NEXT_SOURCE_ID.fetch_add(1, Ordering::SeqCst), name)
}

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// RGBA frame ready for upload as a texture.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: ClockTime,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub audio_device: Option<String>,
    /// Output frame size; `None` disables video decoding.
    pub video_size: Option<(u32, u32)>,
}

impl EngineSettings {
    pub fn audio_only(config: &PlayerConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_binary(),
            ffprobe: config.ffprobe_binary(),
            audio_device: config.audio_device.clone(),
            video_size: None,
        }
    }

    pub fn with_video(config: &PlayerConfig) -> Self {
        Self {
            video_size: Some((config.video_width, config.video_height)),
            ..Self::audio_only(config)
        }
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

#[derive(Debug)]
enum PipelineCommand {
    SetState(TransportState),
    Seek { position: ClockTime, key_unit: bool },
    Shutdown,
}

/// Media clock. Advances with wall time while running, never past `limit`.
#[derive(Debug, Clone, Copy)]
struct PlaybackClock {
    base: ClockTime,
    started: Option<Instant>,
    limit: Option<ClockTime>,
}

impl PlaybackClock {
    fn new(limit: Option<ClockTime>) -> Self {
        Self {
            base: ClockTime::ZERO,
            started: None,
            limit,
        }
    }

    fn position(&self, now: Instant) -> ClockTime {
        let position = match self.started {
            Some(started) => self.base.saturating_add(now.saturating_duration_since(started)),
            None => self.base,
        };
        match self.limit {
            Some(limit) => position.min(limit),
            None => position,
        }
    }

    fn run(&mut self, now: Instant) {
        if self.started.is_none() {
            self.started = Some(now);
        }
    }

    fn freeze(&mut self, now: Instant) {
        self.base = self.position(now);
        self.started = None;
    }

    fn reset_to(&mut self, position: ClockTime, now: Instant) {
        self.base = match self.limit {
            Some(limit) => position.min(limit),
            None => position,
        };
        if self.started.is_some() {
            self.started = Some(now);
        }
    }
}

#[derive(Debug)]
struct SharedState {
    current: TransportState,
    duration: Option<ClockTime>,
    clock: PlaybackClock,
    media: Option<MediaInfo>,
}

fn lock_shared(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// ENGINE HANDLE
// =============================================================================

pub struct FfmpegEngine {
    source: SourceId,
    commands: mpsc::Sender<PipelineCommand>,
    shared: Arc<Mutex<SharedState>>,
    latest_frame: Arc<Mutex<Option<VideoFrame>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl FfmpegEngine {
    /// Fails with [`EngineError::Unavailable`] when ffmpeg or ffprobe can't be run.
    pub fn new(settings: EngineSettings, uri: MediaUri, bus: BusSender) -> Result<Self, EngineError> {
        check_binary(&settings.ffmpeg)?;
        check_binary(&settings.ffprobe)?;

        let source = next_source("playbin");
        let shared = Arc::new(Mutex::new(SharedState {
            current: TransportState::Null,
            duration: None,
            clock: PlaybackClock::new(None),
            media: None,
        }));
        let latest_frame = Arc::new(Mutex::new(None));
        let (cmd_tx, cmd_rx) = mpsc::channel();

        log::info!("Creating pipeline {} for {}", source, uri);

        let pipeline_source = source.clone();
        let pipeline_shared = shared.clone();
        let pipeline_frame = latest_frame.clone();

        // The audio output stream is not Send, so the pipeline is built on its own thread.
        let thread_handle = thread::Builder::new()
            .name("ion-pipeline".to_string())
            .spawn(move || {
                let pipeline = Pipeline {
                    settings,
                    uri,
                    source: pipeline_source,
                    audio_sink_source: next_source("audio-sink"),
                    decoder_source: next_source("decoder"),
                    bus,
                    shared: pipeline_shared,
                    latest_frame: pipeline_frame,
                    audio: None,
                    session: None,
                    eos_posted: false,
                };
                pipeline.run(cmd_rx)
            })?;

        Ok(Self {
            source,
            commands: cmd_tx,
            shared,
            latest_frame,
            thread_handle: Some(thread_handle),
        })
    }

    /// Most recent frame due for display, if a new one arrived since the last call.
    pub fn take_video_frame(&self) -> Option<VideoFrame> {
        self.latest_frame.lock().ok().and_then(|mut frame| frame.take())
    }

    /// Streams found by the last preroll.
    pub fn media_info(&self) -> Option<MediaInfo> {
        lock_shared(&self.shared).media.clone()
    }
}

impl PlaybackEngine for FfmpegEngine {
    fn source(&self) -> &SourceId {
        &self.source
    }

    fn set_state(&mut self, target: TransportState) -> Result<StateChangeReturn, EngineError> {
        let current = lock_shared(&self.shared).current;
        self.commands
            .send(PipelineCommand::SetState(target))
            .map_err(|_| EngineError::StateChange {
                target,
                reason: "pipeline thread has stopped".to_string(),
            })?;

        Ok(if current == target {
            StateChangeReturn::Success
        } else {
            StateChangeReturn::Async
        })
    }

    fn seek(&mut self, flags: SeekFlags, position: ClockTime) -> Result<(), EngineError> {
        let target = {
            let mut shared = lock_shared(&self.shared);
            if shared.current < TransportState::Paused {
                return Err(EngineError::Seek(format!("pipeline is in {}", shared.current)));
            }
            let target = match shared.duration {
                Some(duration) => position.min(duration),
                None => position,
            };
            // Position queries report the target right away, like a flushing seek.
            shared.clock.reset_to(target, Instant::now());
            target
        };

        if !flags.flush {
            log::debug!("Non-flushing seek requested; decoders are always restarted");
        }

        self.commands
            .send(PipelineCommand::Seek { position: target, key_unit: flags.key_unit })
            .map_err(|_| EngineError::Seek("pipeline thread has stopped".to_string()))
    }

    fn query_duration(&self) -> Result<ClockTime, EngineError> {
        let shared = lock_shared(&self.shared);
        if shared.current < TransportState::Paused {
            return Err(EngineError::Query(QueryKind::Duration));
        }
        shared.duration.ok_or(EngineError::Query(QueryKind::Duration))
    }

    fn query_position(&self) -> Result<ClockTime, EngineError> {
        let shared = lock_shared(&self.shared);
        if shared.current < TransportState::Paused {
            return Err(EngineError::Query(QueryKind::Position));
        }
        Ok(shared.clock.position(Instant::now()))
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        log::debug!("Pipeline {} dropping", self.source);
        let _ = self.commands.send(PipelineCommand::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            for _ in 0..10 {
                if handle.is_finished() {
                    let _ = handle.join();
                    return;
                }
                thread::sleep(Duration::from_millis(100));
            }
            log::warn!("Pipeline thread did not shut down cleanly");
        }
    }
}

fn check_binary(path: &Path) -> Result<(), EngineError> {
    let status = Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(EngineError::Unavailable(format!("{} -version exited with {}", path.display(), status))),
        Err(e) => Err(EngineError::Unavailable(format!("cannot run {}: {}", path.display(), e))),
    }
}

// =============================================================================
// DECODING
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum DecoderOutput {
    Audio,
    Video { width: u32, height: u32, frame_rate: f64 },
}

fn decoder_command(
    ffmpeg: &Path,
    uri: &MediaUri,
    position: ClockTime,
    output: DecoderOutput,
) -> Command {
    let mut cmd = Command::new(ffmpeg);
    cmd.arg("-nostdin").arg("-loglevel").arg("error");

    // Input seeking; output starts exactly at `position`.
    cmd.arg("-ss").arg(format!("{:.3}", position.seconds_f64()));
    cmd.arg("-i").arg(uri.input_arg());

    match output {
        DecoderOutput::Audio => {
            cmd.arg("-map").arg("0:a:0").arg("-vn");
            cmd.arg("-f").arg("f32le");
            cmd.arg("-ac").arg(OUTPUT_CHANNELS.to_string());
            cmd.arg("-ar").arg(OUTPUT_SAMPLE_RATE.to_string());
        }
        DecoderOutput::Video { width, height, frame_rate } => {
            cmd.arg("-map").arg("0:v:0").arg("-an");
            cmd.arg("-f").arg("rawvideo");
            cmd.arg("-pix_fmt").arg("rgb24");
            cmd.arg("-s").arg(format!("{}x{}", width, height));
            cmd.arg("-r").arg(format!("{:.3}", frame_rate));
        }
    }

    cmd.arg("pipe:1");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::null());
    cmd
}

pub(crate) fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for chunk in rgb.chunks_exact(3) {
        rgba.extend_from_slice(chunk);
        rgba.push(255);
    }
    rgba
}

/// Decoder processes and reader threads for one continuous run from one position.
/// Dropping it tears everything down.
struct DecodeSession {
    children: Vec<Child>,
    readers: Vec<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    active_readers: Arc<AtomicUsize>,
    ring: Arc<Mutex<AudioRingBuffer>>,
    frames: Arc<Mutex<VecDeque<VideoFrame>>>,
    sink: Option<Sink>,
    failure_reported: bool,
}

impl DecodeSession {
    fn new() -> Self {
        Self {
            children: Vec::new(),
            readers: Vec::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            active_readers: Arc::new(AtomicUsize::new(0)),
            ring: Arc::new(Mutex::new(AudioRingBuffer::with_default_capacity())),
            frames: Arc::new(Mutex::new(VecDeque::new())),
            sink: None,
            failure_reported: false,
        }
    }

    fn spawn_reader<F>(&mut self, name: &str, body: F) -> Result<(), EngineError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.active_readers.fetch_add(1, Ordering::SeqCst);
        let active = self.active_readers.clone();
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            body();
            active.fetch_sub(1, Ordering::SeqCst);
        });

        match spawned {
            Ok(handle) => {
                self.readers.push(handle);
                Ok(())
            }
            Err(e) => {
                self.active_readers.fetch_sub(1, Ordering::SeqCst);
                Err(EngineError::Process(e))
            }
        }
    }

    /// Every reader hit end of input and everything it produced has been consumed.
    fn drained(&self) -> bool {
        if self.active_readers.load(Ordering::SeqCst) > 0 {
            return false;
        }
        let audio_left = self.ring.lock().map(|ring| ring.available()).unwrap_or(0);
        let frames_left = self.frames.lock().map(|frames| frames.len()).unwrap_or(0);
        audio_left == 0 && frames_left == 0
    }

    /// First decoder that exited unsuccessfully, reported once per session.
    fn failed_decoder(&mut self) -> Option<String> {
        if self.failure_reported {
            return None;
        }
        for child in &mut self.children {
            if let Ok(Some(status)) = child.try_wait() {
                if !status.success() {
                    self.failure_reported = true;
                    return Some(format!("decoder exited with {}", status));
                }
            }
        }
        None
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        for child in &mut self.children {
            log::debug!("Killing decoder process {}", child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
        for handle in self.readers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn push_samples(ring: &Mutex<AudioRingBuffer>, samples: &[f32], stop_flag: &AtomicBool) {
    let mut offset = 0;
    while offset < samples.len() && !stop_flag.load(Ordering::Relaxed) {
        let written = match ring.lock() {
            Ok(mut ring) => ring.write(&samples[offset..]),
            Err(_) => return,
        };
        offset += written;
        if offset < samples.len() {
            thread::sleep(Duration::from_millis(5));
        }
    }
}

fn audio_reader(mut stdout: ChildStdout, ring: Arc<Mutex<AudioRingBuffer>>, stop_flag: Arc<AtomicBool>) {
    let mut bytes = vec![0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();
    let mut total_samples = 0u64;

    log::debug!("Audio reader started");

    while !stop_flag.load(Ordering::Relaxed) {
        match stdout.read(&mut bytes) {
            Ok(0) => break,
            Ok(read) => {
                // Reads don't respect sample boundaries.
                pending.extend_from_slice(&bytes[..read]);
                let whole = pending.len() / 4 * 4;
                let samples: Vec<f32> = pending[..whole]
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                pending.drain(..whole);

                push_samples(&ring, &samples, &stop_flag);
                total_samples += samples.len() as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Audio reader error: {}", e);
                break;
            }
        }
    }

    log::debug!("Audio reader stopped (read {} samples)", total_samples);
}

fn video_reader(
    mut stdout: ChildStdout,
    frames: Arc<Mutex<VecDeque<VideoFrame>>>,
    stop_flag: Arc<AtomicBool>,
    (width, height): (u32, u32),
    frame_rate: f64,
    start_position: ClockTime,
) {
    let frame_size = width as usize * height as usize * 3;
    let frame_duration = 1.0 / frame_rate;
    let mut frame_index = 0u64;
    let mut buffer = vec![0u8; frame_size];

    log::debug!("Video reader started ({}x{} @ {:.2} fps)", width, height, frame_rate);

    while !stop_flag.load(Ordering::Relaxed) {
        if let Err(e) = stdout.read_exact(&mut buffer) {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                log::debug!("Video reader error: {}", e);
            }
            break;
        }

        let offset = Duration::from_secs_f64(frame_index as f64 * frame_duration);
        let frame = VideoFrame {
            image_data: rgb_to_rgba(&buffer),
            width,
            height,
            timestamp: start_position.saturating_add(offset),
        };

        while !stop_flag.load(Ordering::Relaxed)
            && frames.lock().map(|f| f.len() >= MAX_QUEUED_FRAMES).unwrap_or(false)
        {
            thread::sleep(Duration::from_millis(5));
        }
        if let Ok(mut frames) = frames.lock() {
            frames.push_back(frame);
        }
        frame_index += 1;
    }

    log::debug!("Video reader stopped (read {} frames)", frame_index);
}

// =============================================================================
// PIPELINE THREAD
// =============================================================================

struct Pipeline {
    settings: EngineSettings,
    uri: MediaUri,
    source: SourceId,
    audio_sink_source: SourceId,
    decoder_source: SourceId,
    bus: BusSender,
    shared: Arc<Mutex<SharedState>>,
    latest_frame: Arc<Mutex<Option<VideoFrame>>>,
    audio: Option<AudioOutput>,
    session: Option<DecodeSession>,
    eos_posted: bool,
}

impl Pipeline {
    fn run(mut self, commands: mpsc::Receiver<PipelineCommand>) {
        loop {
            let timeout = if self.session.is_some() {
                Duration::from_millis(8)
            } else {
                Duration::from_millis(50)
            };

            match commands.recv_timeout(timeout) {
                Ok(PipelineCommand::SetState(target)) => self.change_state(target),
                Ok(PipelineCommand::Seek { position, key_unit }) => self.flush_seek(position, key_unit),
                Ok(PipelineCommand::Shutdown) => {
                    log::info!("Pipeline thread shutting down");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => self.on_idle(Instant::now()),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    log::info!("Command channel disconnected, shutting down");
                    break;
                }
            }
        }

        self.session = None;
        self.audio = None;
        log::info!("Pipeline thread exited");
    }

    /// Walks towards `target` one state at a time, announcing each step.
    fn change_state(&mut self, target: TransportState) {
        loop {
            let current = lock_shared(&self.shared).current;
            let Some(next) = current.step_towards(target) else {
                break;
            };

            if let Err(e) = self.transition(current, next) {
                log::error!("Pipeline {} failed to go from {} to {}: {}", self.source, current, next, e);
                self.bus.post(BusMessage::Error {
                    source: self.source.clone(),
                    message: e.to_string(),
                    debug: Some(format!("{} -> {} while playing {}", current, next, self.uri)),
                });
                break;
            }

            lock_shared(&self.shared).current = next;
            self.bus.post(BusMessage::StateChanged {
                source: self.source.clone(),
                old: current,
                new: next,
                pending: (next != target).then_some(target),
            });
        }
    }

    fn transition(&mut self, from: TransportState, to: TransportState) -> Result<(), EngineError> {
        use TransportState::*;
        let now = Instant::now();

        match (from, to) {
            (Null, Ready) => {
                self.open_audio();
                Ok(())
            }
            (Ready, Paused) => self.preroll(),
            (Paused, Playing) => {
                let position = lock_shared(&self.shared).clock.position(now);
                self.start_session(position)?;
                lock_shared(&self.shared).clock.run(now);
                self.post_sink_state(Paused, Playing);
                Ok(())
            }
            (Playing, Paused) => {
                lock_shared(&self.shared).clock.freeze(now);
                self.session = None;
                self.post_sink_state(Playing, Paused);
                Ok(())
            }
            (Paused, Ready) => {
                self.session = None;
                self.eos_posted = false;
                {
                    let mut shared = lock_shared(&self.shared);
                    shared.duration = None;
                    shared.media = None;
                    shared.clock = PlaybackClock::new(None);
                }
                if let Ok(mut frame) = self.latest_frame.lock() {
                    *frame = None;
                }
                Ok(())
            }
            (Ready, Null) => {
                if self.audio.take().is_some() {
                    self.post_sink_state(Ready, Null);
                }
                Ok(())
            }
            (from, to) => Err(EngineError::StateChange {
                target: to,
                reason: format!("no transition from {}", from),
            }),
        }
    }

    fn open_audio(&mut self) {
        match AudioOutput::open(self.settings.audio_device.as_deref()) {
            Ok(output) => {
                self.audio = Some(output);
                self.post_sink_state(TransportState::Null, TransportState::Ready);
            }
            Err(e) => {
                log::warn!("{}. Media will play without audio.", e);
            }
        }
    }

    fn post_sink_state(&self, old: TransportState, new: TransportState) {
        if self.audio.is_none() {
            return;
        }
        self.bus.post(BusMessage::StateChanged {
            source: self.audio_sink_source.clone(),
            old,
            new,
            pending: None,
        });
    }

    fn preroll(&mut self) -> Result<(), EngineError> {
        let info = MediaInfo::probe(&self.settings.ffprobe, &self.uri)?;
        log::info!(
            "Prerolled {} ({} video, {} audio, {} text streams, duration {})",
            self.uri,
            info.count(StreamKind::Video),
            info.count(StreamKind::Audio),
            info.count(StreamKind::Text),
            info.duration.map(|d| d.to_string()).unwrap_or_else(|| "unknown".to_string()),
        );

        let first_frame = match self.settings.video_size {
            Some(size) if info.has(StreamKind::Video) => match self.extract_frame(size, ClockTime::ZERO) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::warn!("Could not extract first frame: {}", e);
                    None
                }
            },
            _ => None,
        };

        {
            let mut shared = lock_shared(&self.shared);
            shared.duration = info.duration;
            shared.clock = PlaybackClock::new(info.duration);
            shared.media = Some(info.clone());
        }
        if let Some(frame) = first_frame {
            self.show_frame(frame);
        }

        for stream in &info.streams {
            self.bus.post(BusMessage::TagsChanged {
                kind: stream.kind,
                index: stream.index,
            });
        }

        self.eos_posted = false;
        Ok(())
    }

    fn start_session(&mut self, position: ClockTime) -> Result<(), EngineError> {
        let media = lock_shared(&self.shared).media.clone().unwrap_or_default();
        let mut session = DecodeSession::new();

        if let (Some(audio), true) = (&self.audio, media.has(StreamKind::Audio)) {
            let mut child = decoder_command(&self.settings.ffmpeg, &self.uri, position, DecoderOutput::Audio)
                .spawn()?;
            let stdout = child.stdout.take();
            session.children.push(child);

            if let Some(stdout) = stdout {
                let ring = session.ring.clone();
                let stop_flag = session.stop_flag.clone();
                session.spawn_reader("ion-audio-reader", move || audio_reader(stdout, ring, stop_flag))?;
                session.sink = Some(audio.play(session.ring.clone(), session.stop_flag.clone())?);
            }
        }

        if let (Some(size), true) = (self.settings.video_size, media.has(StreamKind::Video)) {
            let frame_rate = media.frame_rate.unwrap_or(DEFAULT_FRAME_RATE).min(MAX_FRAME_RATE);
            let output = DecoderOutput::Video {
                width: size.0,
                height: size.1,
                frame_rate,
            };
            let mut child = decoder_command(&self.settings.ffmpeg, &self.uri, position, output).spawn()?;
            let stdout = child.stdout.take();
            session.children.push(child);

            if let Some(stdout) = stdout {
                let frames = session.frames.clone();
                let stop_flag = session.stop_flag.clone();
                session.spawn_reader("ion-video-reader", move || {
                    video_reader(stdout, frames, stop_flag, size, frame_rate, position)
                })?;
            }
        }

        if session.children.is_empty() {
            return Err(EngineError::AudioOutput(
                "nothing to play: no usable audio output and no video stream".to_string(),
            ));
        }

        log::info!("Decoding {} from {}", self.uri, position);
        self.session = Some(session);
        Ok(())
    }

    fn flush_seek(&mut self, target: ClockTime, key_unit: bool) {
        let current = lock_shared(&self.shared).current;
        self.session = None;
        self.eos_posted = false;

        let position = if key_unit { self.snap_to_keyframe(target) } else { target };
        let now = Instant::now();
        lock_shared(&self.shared).clock.reset_to(position, now);
        log::info!("Seeking to {} (requested {}, key unit: {})", position, target, key_unit);

        match current {
            TransportState::Playing => match self.start_session(position) {
                Ok(()) => lock_shared(&self.shared).clock.run(now),
                Err(e) => {
                    log::error!("Failed to restart decoding after seek: {}", e);
                    self.bus.post(BusMessage::Error {
                        source: self.decoder_source.clone(),
                        message: e.to_string(),
                        debug: Some(format!("seek to {} in {}", position, self.uri)),
                    });
                }
            },
            TransportState::Paused => {
                if let Some(size) = self.settings.video_size {
                    match self.extract_frame(size, position) {
                        Ok(frame) => self.show_frame(frame),
                        Err(e) => log::debug!("No preview frame at {}: {}", position, e),
                    }
                }
            }
            _ => {}
        }
    }

    /// Where a key-unit seek to `target` resumes. Audio-only media and failed
    /// lookups seek exactly.
    fn snap_to_keyframe(&self, target: ClockTime) -> ClockTime {
        let has_video = lock_shared(&self.shared)
            .media
            .as_ref()
            .map_or(false, |media| media.has(StreamKind::Video));
        if !has_video {
            return target;
        }

        match keyframe_before(&self.settings.ffprobe, &self.uri, target) {
            Ok(Some(keyframe)) => keyframe,
            Ok(None) => target,
            Err(e) => {
                log::debug!("Keyframe lookup failed, seeking exactly: {}", e);
                target
            }
        }
    }

    fn on_idle(&mut self, now: Instant) {
        let (position, duration) = {
            let shared = lock_shared(&self.shared);
            (shared.clock.position(now), shared.duration)
        };

        let Some(session) = self.session.as_mut() else {
            return;
        };

        // Release the newest frame that is due, dropping the ones we fell behind on.
        let due = match session.frames.lock() {
            Ok(mut frames) => {
                let mut due = None;
                while frames.front().map_or(false, |f| f.timestamp <= position) {
                    due = frames.pop_front();
                }
                due
            }
            Err(_) => None,
        };
        let failure = session.failed_decoder();
        let drained = session.drained();

        if let Some(frame) = due {
            self.show_frame(frame);
        }

        if let Some(message) = failure {
            log::error!("{} for {}", message, self.uri);
            self.bus.post(BusMessage::Error {
                source: self.decoder_source.clone(),
                message,
                debug: Some(self.uri.to_string()),
            });
        }

        if self.eos_posted {
            return;
        }
        let past_end = duration.map_or(false, |d| position >= d);
        if drained || past_end {
            log::info!("Reached end of {} at {}", self.uri, position);
            lock_shared(&self.shared).clock.freeze(now);
            self.session = None;
            self.eos_posted = true;
            self.bus.post(BusMessage::EndOfStream);
        }
    }

    fn show_frame(&self, frame: VideoFrame) {
        if let Ok(mut latest) = self.latest_frame.lock() {
            *latest = Some(frame);
        }
    }

    fn extract_frame(&self, (width, height): (u32, u32), position: ClockTime) -> Result<VideoFrame, EngineError> {
        let output = Command::new(&self.settings.ffmpeg)
            .arg("-nostdin")
            .arg("-ss").arg(format!("{:.3}", position.seconds_f64()))
            .arg("-i").arg(self.uri.input_arg())
            .arg("-frames:v").arg("1")
            .arg("-f").arg("rawvideo")
            .arg("-pix_fmt").arg("rgb24")
            .arg("-s").arg(format!("{}x{}", width, height))
            .arg("-loglevel").arg("quiet")
            .arg("-")
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(EngineError::Probe("ffmpeg failed to extract frame".to_string()));
        }

        let expected_size = width as usize * height as usize * 3;
        if output.stdout.len() != expected_size {
            return Err(EngineError::Probe(format!(
                "unexpected frame size: {} (expected {})",
                output.stdout.len(),
                expected_size
            )));
        }

        Ok(VideoFrame {
            image_data: rgb_to_rgba(&output.stdout),
            width,
            height,
            timestamp: position,
        })
    }
}
