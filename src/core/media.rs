use std::fmt;
use std::path::Path;

/// Location of the media a pipeline plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUri(String);

impl MediaUri {
    pub fn new(uri: impl Into<String>) -> Self {
        MediaUri(uri.into())
    }

    /// `file://` URI for a local path, made absolute against the working directory.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| anyhow::anyhow!("Failed to resolve working directory: {}", e))?
                .join(path)
        };
        Ok(MediaUri(format!("file://{}", absolute.display())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// What to hand to ffmpeg/ffprobe as `-i`: a plain path for local files,
    /// the URI itself for network protocols ffmpeg understands.
    pub fn input_arg(&self) -> &str {
        self.0.strip_prefix("file://").unwrap_or(&self.0)
    }
}

impl fmt::Display for MediaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    Text,
}

impl StreamKind {
    /// Maps ffprobe's `codec_type`.
    pub fn from_codec_type(codec_type: &str) -> Option<Self> {
        match codec_type {
            "video" => Some(StreamKind::Video),
            "audio" => Some(StreamKind::Audio),
            "subtitle" => Some(StreamKind::Text),
            _ => None,
        }
    }
}

/// Tags known for one elementary stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamTags {
    pub codec: Option<String>,
    pub language: Option<String>,
    pub bitrate: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_local_uri_input_arg() {
        let uri = MediaUri::from_path(&PathBuf::from("/music/Queen.webm")).unwrap();
        assert_eq!(uri.as_str(), "file:///music/Queen.webm");
        assert_eq!(uri.input_arg(), "/music/Queen.webm");
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let uri = MediaUri::from_path(&PathBuf::from("Queen.webm")).unwrap();
        let path = PathBuf::from(uri.input_arg());
        assert!(path.is_absolute());
        assert!(path.ends_with("Queen.webm"));
    }

    #[test]
    fn test_remote_uri_passes_through() {
        let uri = MediaUri::new("http://video.webmfiles.org/big-buck-bunny_trailer.webm");
        assert_eq!(uri.input_arg(), uri.as_str());
    }

    #[test]
    fn test_stream_kind_from_codec_type() {
        assert_eq!(StreamKind::from_codec_type("video"), Some(StreamKind::Video));
        assert_eq!(StreamKind::from_codec_type("subtitle"), Some(StreamKind::Text));
        assert_eq!(StreamKind::from_codec_type("data"), None);
    }
}
