use std::fmt::Write;
use crate::core::StreamKind;
use crate::engine::MediaInfo;

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or("unknown")
}

/// Text for the stream info panel: one block per stream, grouped by kind.
pub fn describe_streams(info: &MediaInfo) -> String {
    let mut text = String::new();

    for stream in info.streams.iter().filter(|s| s.kind == StreamKind::Video) {
        let _ = writeln!(text, "video stream {}", stream.index);
        let _ = writeln!(text, "  codec: {}", or_unknown(stream.tags.codec.as_deref()));
    }

    for stream in info.streams.iter().filter(|s| s.kind == StreamKind::Audio) {
        let bitrate = stream.tags.bitrate.map(|b| b.to_string());
        let _ = writeln!(text, "\naudio stream {}", stream.index);
        let _ = writeln!(text, "  codec: {}", or_unknown(stream.tags.codec.as_deref()));
        let _ = writeln!(text, "  language: {}", or_unknown(stream.tags.language.as_deref()));
        let _ = writeln!(text, "  bitrate: {}", or_unknown(bitrate.as_deref()));
    }

    for stream in info.streams.iter().filter(|s| s.kind == StreamKind::Text) {
        let _ = writeln!(text, "\nsubtitle stream {}", stream.index);
        let _ = writeln!(text, "  language: {}", or_unknown(stream.tags.language.as_deref()));
    }

    text
}
