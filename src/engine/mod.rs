pub mod audio_output;
pub mod ffmpeg;
pub mod probe;

pub use ffmpeg::{EngineSettings, FfmpegEngine, VideoFrame};
pub use probe::{MediaInfo, StreamInfo};

use thiserror::Error;
use crate::core::{ClockTime, SeekFlags, StateChangeReturn, TransportState};
use crate::player::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Duration,
    Position,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("playback engine unavailable: {0}")]
    Unavailable(String),
    #[error("failed to change state to {target}: {reason}")]
    StateChange { target: TransportState, reason: String },
    #[error("seek rejected: {0}")]
    Seek(String),
    #[error("failed to query current {0:?}")]
    Query(QueryKind),
    #[error("failed to probe media: {0}")]
    Probe(String),
    #[error("{0}")]
    Process(#[from] std::io::Error),
    #[error("audio output: {0}")]
    AudioOutput(String),
}

/// Transport control surface of a playback pipeline.
///
/// Every call returns promptly. State changes complete on the engine's own
/// threads and are reported through the bus, never through the return value
/// of [`PlaybackEngine::set_state`] alone.
pub trait PlaybackEngine {
    /// Identity used on the bus for messages about the pipeline itself.
    fn source(&self) -> &SourceId;

    fn set_state(&mut self, target: TransportState) -> Result<StateChangeReturn, EngineError>;

    fn seek(&mut self, flags: SeekFlags, position: ClockTime) -> Result<(), EngineError>;

    fn query_duration(&self) -> Result<ClockTime, EngineError>;

    fn query_position(&self) -> Result<ClockTime, EngineError>;
}
