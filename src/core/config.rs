use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_AUDIO_FILE: &str = "Queen.webm";
pub const DEFAULT_VIDEO_URI: &str = "http://video.webmfiles.org/big-buck-bunny_trailer.webm";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Cadence of the position/duration refresh while media is prerolled.
    pub poll_interval_ms: u64,
    /// Local file played by the audio player, relative to the working directory.
    pub audio_file: PathBuf,
    /// Remote URI played by the video player.
    pub video_uri: String,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Output device name as reported by the audio host; default device when unset.
    pub audio_device: Option<String>,
    pub video_width: u32,
    pub video_height: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            audio_file: PathBuf::from(DEFAULT_AUDIO_FILE),
            video_uri: DEFAULT_VIDEO_URI.to_string(),
            ffmpeg_path: None,
            ffprobe_path: None,
            audio_device: None,
            video_width: 854,
            video_height: 480,
        }
    }
}

impl PlayerConfig {
    /// Reads the config file if there is one. Missing or broken files fall back
    /// to defaults; nothing is ever written back.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            log::info!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {}: {}", config_path.display(), e))?;

        match serde_json::from_str::<Self>(&content) {
            Ok(config) => {
                log::info!("Loaded config from {}", config_path.display());
                Ok(config.sanitized())
            }
            Err(e) => {
                log::warn!("Config file {} has issues ({}), using defaults", config_path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ion-player")
            .join("config.json")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ffmpeg_binary(&self) -> PathBuf {
        self.ffmpeg_path.clone().unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn ffprobe_binary(&self) -> PathBuf {
        self.ffprobe_path.clone().unwrap_or_else(|| PathBuf::from("ffprobe"))
    }

    /// A zero interval would spin the timer and zero-sized frames can't be decoded.
    fn sanitized(mut self) -> Self {
        if self.poll_interval_ms == 0 {
            log::warn!("poll_interval_ms must be positive, falling back to 1000");
            self.poll_interval_ms = 1000;
        }
        if self.video_width == 0 || self.video_height == 0 {
            log::warn!("Invalid video size {}x{}, falling back to 854x480", self.video_width, self.video_height);
            self.video_width = 854;
            self.video_height = 480;
        }
        self
    }
}
