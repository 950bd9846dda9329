#[cfg(test)]
mod tests {

    use std::path::PathBuf;
    use std::time::Duration;
    use crate::core::{PlayerConfig, DEFAULT_VIDEO_URI};

    fn temp_config_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ion-player-test-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
        dir.join("config.json")
    }

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.audio_file, PathBuf::from("Queen.webm"));
        assert_eq!(config.video_uri, DEFAULT_VIDEO_URI);
        assert!(config.audio_device.is_none());
        assert_eq!(config.ffmpeg_binary(), PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_binary(), PathBuf::from("ffprobe"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "poll_interval_ms": 250, "audio_device": "USB DAC" }"#;
        let config: PlayerConfig = serde_json::from_str(json).expect("Failed to parse partial config");

        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.audio_device.as_deref(), Some("USB DAC"));
        assert_eq!(config.video_width, 854);
        assert_eq!(config.video_uri, DEFAULT_VIDEO_URI);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = temp_config_path("missing").with_file_name("does-not-exist.json");
        let config = PlayerConfig::load_from(&path).expect("Missing config should not fail");
        assert_eq!(config, PlayerConfig::default());
        assert!(!path.exists(), "Loading must not write a config file");
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let path = temp_config_path("malformed");
        std::fs::write(&path, "{ not json").expect("Failed to write config");

        let config = PlayerConfig::load_from(&path).expect("Malformed config should not fail");
        assert_eq!(config, PlayerConfig::default());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let path = temp_config_path("zero-interval");
        std::fs::write(&path, r#"{ "poll_interval_ms": 0, "video_width": 0 }"#).expect("Failed to write config");

        let config = PlayerConfig::load_from(&path).expect("Config should load");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!((config.video_width, config.video_height), (854, 480));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_custom_binaries() {
        let mut config = PlayerConfig::default();
        config.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.ffmpeg_binary(), PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.ffprobe_binary(), PathBuf::from("ffprobe"));
    }
}
