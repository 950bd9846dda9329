use std::path::Path;
use std::process::{Command, Stdio};
use crate::core::{ClockTime, MediaUri, StreamKind, StreamTags};
use crate::engine::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub kind: StreamKind,
    /// Position among streams of the same kind.
    pub index: usize,
    pub tags: StreamTags,
}

/// What a preroll learns about the media.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    /// `None` for live or unseekable sources.
    pub duration: Option<ClockTime>,
    pub frame_rate: Option<f64>,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn probe(ffprobe: &Path, uri: &MediaUri) -> Result<Self, EngineError> {
        log::debug!("Probing {}", uri);
        let output = Command::new(ffprobe)
            .arg("-v").arg("error")
            .arg("-print_format").arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(uri.input_arg())
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Probe(format!("ffprobe failed on {}: {}", uri, error.trim())));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        Self::from_ffprobe_json(&json_str)
    }

    pub fn from_ffprobe_json(json_str: &str) -> Result<Self, EngineError> {
        let info: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| EngineError::Probe(format!("unreadable ffprobe output: {}", e)))?;

        let duration = info["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(ClockTime::from_seconds_f64);

        let empty_vec = vec![];
        let raw_streams = info["streams"].as_array().unwrap_or(&empty_vec);

        let mut streams: Vec<StreamInfo> = Vec::new();
        let mut frame_rate = None;

        for stream in raw_streams {
            let Some(kind) = stream["codec_type"].as_str().and_then(StreamKind::from_codec_type) else {
                continue;
            };
            let index = streams.iter().filter(|s| s.kind == kind).count();

            if kind == StreamKind::Video && frame_rate.is_none() {
                frame_rate = stream["avg_frame_rate"]
                    .as_str()
                    .and_then(parse_frame_rate)
                    .or_else(|| stream["r_frame_rate"].as_str().and_then(parse_frame_rate));
            }

            let codec = stream["codec_long_name"]
                .as_str()
                .or_else(|| stream["codec_name"].as_str())
                .map(str::to_string);

            // Matroska/WebM spell tag keys in upper case.
            let tag = |key: &str| {
                stream["tags"][key]
                    .as_str()
                    .or_else(|| stream["tags"][key.to_uppercase()].as_str())
                    .map(str::to_string)
            };

            let bitrate = stream["bit_rate"]
                .as_str()
                .map(str::to_string)
                .or_else(|| tag("BPS"))
                .and_then(|s| s.parse::<u32>().ok());

            streams.push(StreamInfo {
                kind,
                index,
                tags: StreamTags {
                    codec,
                    language: tag("language"),
                    bitrate,
                },
            });
        }

        Ok(MediaInfo {
            duration,
            frame_rate,
            streams,
        })
    }

    pub fn count(&self, kind: StreamKind) -> usize {
        self.streams.iter().filter(|s| s.kind == kind).count()
    }

    pub fn has(&self, kind: StreamKind) -> bool {
        self.count(kind) > 0
    }

    pub fn tags(&self, kind: StreamKind, index: usize) -> Option<&StreamTags> {
        self.streams
            .iter()
            .find(|s| s.kind == kind && s.index == index)
            .map(|s| &s.tags)
    }
}

/// How far back from a seek target to look for the keyframe it snaps to.
const KEYFRAME_SEARCH_WINDOW_SECS: f64 = 10.0;

/// Position of the last video keyframe at or before `target`, where a
/// key-unit seek actually resumes. `None` when the window holds no keyframe.
pub fn keyframe_before(ffprobe: &Path, uri: &MediaUri, target: ClockTime) -> Result<Option<ClockTime>, EngineError> {
    let from = (target.seconds_f64() - KEYFRAME_SEARCH_WINDOW_SECS).max(0.0);
    let to = target.seconds_f64() + 0.001;

    let output = Command::new(ffprobe)
        .arg("-v").arg("error")
        .arg("-select_streams").arg("v:0")
        .arg("-read_intervals").arg(format!("{:.3}%{:.3}", from, to))
        .arg("-show_entries").arg("packet=pts_time,flags")
        .arg("-print_format").arg("json")
        .arg(uri.input_arg())
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Probe(format!("keyframe lookup failed on {}: {}", uri, error.trim())));
    }

    keyframe_from_packets(&String::from_utf8_lossy(&output.stdout), target)
}

fn keyframe_from_packets(json_str: &str, target: ClockTime) -> Result<Option<ClockTime>, EngineError> {
    let info: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| EngineError::Probe(format!("unreadable ffprobe output: {}", e)))?;

    let empty_vec = vec![];
    let packets = info["packets"].as_array().unwrap_or(&empty_vec);

    let keyframe = packets
        .iter()
        .filter(|p| p["flags"].as_str().map_or(false, |flags| flags.starts_with('K')))
        .filter_map(|p| p["pts_time"].as_str().and_then(|t| t.parse::<f64>().ok()))
        .map(ClockTime::from_seconds_f64)
        .filter(|pts| *pts <= target)
        .max();

    Ok(keyframe)
}

/// ffprobe reports rates as `num/den`; `0/0` means unknown.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then(|| fps.clamp(1.0, 1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBM_PROBE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "vp8",
                "codec_long_name": "On2 VP8",
                "codec_type": "video",
                "r_frame_rate": "25/1",
                "avg_frame_rate": "25/1",
                "tags": { "language": "eng" }
            },
            {
                "index": 1,
                "codec_name": "vorbis",
                "codec_long_name": "Vorbis",
                "codec_type": "audio",
                "tags": { "LANGUAGE": "eng", "BPS": "128000" }
            },
            {
                "index": 2,
                "codec_name": "webvtt",
                "codec_type": "subtitle",
                "tags": { "language": "fre" }
            },
            {
                "index": 3,
                "codec_type": "attachment"
            }
        ],
        "format": { "duration": "32.480000" }
    }"#;

    #[test]
    fn test_parse_webm_probe() {
        let info = MediaInfo::from_ffprobe_json(WEBM_PROBE).expect("probe should parse");

        assert_eq!(info.duration, Some(ClockTime::from_nseconds(32_480_000_000)));
        assert_eq!(info.frame_rate, Some(25.0));
        assert_eq!(info.count(StreamKind::Video), 1);
        assert_eq!(info.count(StreamKind::Audio), 1);
        assert_eq!(info.count(StreamKind::Text), 1);
        assert_eq!(info.streams.len(), 3);

        let audio = info.tags(StreamKind::Audio, 0).expect("audio tags");
        assert_eq!(audio.codec.as_deref(), Some("Vorbis"));
        assert_eq!(audio.language.as_deref(), Some("eng"));
        assert_eq!(audio.bitrate, Some(128_000));

        let text = info.tags(StreamKind::Text, 0).expect("text tags");
        assert_eq!(text.codec.as_deref(), Some("webvtt"));
        assert_eq!(text.language.as_deref(), Some("fre"));
    }

    #[test]
    fn test_live_source_has_no_duration() {
        let json = r#"{ "streams": [ { "codec_type": "audio", "codec_name": "mp3", "bit_rate": "192000" } ], "format": {} }"#;
        let info = MediaInfo::from_ffprobe_json(json).unwrap();

        assert_eq!(info.duration, None);
        assert_eq!(info.frame_rate, None);
        assert_eq!(info.tags(StreamKind::Audio, 0).and_then(|t| t.bitrate), Some(192_000));
        assert!(!info.has(StreamKind::Video));
    }

    #[test]
    fn test_per_kind_indices() {
        let json = r#"{ "streams": [
            { "codec_type": "audio", "codec_name": "opus" },
            { "codec_type": "video", "codec_name": "vp9" },
            { "codec_type": "audio", "codec_name": "aac" }
        ], "format": { "duration": "1.0" } }"#;
        let info = MediaInfo::from_ffprobe_json(json).unwrap();

        assert_eq!(info.tags(StreamKind::Audio, 1).and_then(|t| t.codec.as_deref()), Some("aac"));
        assert_eq!(info.tags(StreamKind::Video, 0).and_then(|t| t.codec.as_deref()), Some("vp9"));
        assert!(info.tags(StreamKind::Audio, 2).is_none());
    }

    #[test]
    fn test_garbage_is_a_probe_error() {
        assert!(matches!(MediaInfo::from_ffprobe_json("not json"), Err(EngineError::Probe(_))));
    }

    #[test]
    fn test_keyframe_before_target() {
        let json = r#"{ "packets": [
            { "pts_time": "36.000000", "flags": "K__" },
            { "pts_time": "36.040000", "flags": "___" },
            { "pts_time": "42.000000", "flags": "K__" },
            { "pts_time": "44.960000", "flags": "___" },
            { "pts_time": "45.000000", "flags": "___" }
        ] }"#;
        let keyframe = keyframe_from_packets(json, ClockTime::from_seconds_f64(45.0)).unwrap();
        assert_eq!(keyframe, Some(ClockTime::from_seconds_f64(42.0)));
    }

    #[test]
    fn test_keyframe_on_target_and_after_it() {
        let json = r#"{ "packets": [
            { "pts_time": "40.000000", "flags": "K_" },
            { "pts_time": "45.000000", "flags": "K_" },
            { "pts_time": "45.001000", "flags": "K_" }
        ] }"#;
        let keyframe = keyframe_from_packets(json, ClockTime::from_seconds_f64(45.0)).unwrap();
        assert_eq!(keyframe, Some(ClockTime::from_seconds_f64(45.0)));
    }

    #[test]
    fn test_no_keyframe_in_window() {
        let json = r#"{ "packets": [ { "pts_time": "44.5", "flags": "___" } ] }"#;
        assert_eq!(keyframe_from_packets(json, ClockTime::from_seconds_f64(45.0)).unwrap(), None);
        assert_eq!(keyframe_from_packets("{}", ClockTime::from_seconds_f64(45.0)).unwrap(), None);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30000/1001").map(|f| (f * 100.0).round()), Some(2997.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("abc"), None);
    }
}
