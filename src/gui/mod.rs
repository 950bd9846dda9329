pub mod audio_app;
pub mod controls;
pub mod streams;
pub mod video_app;

pub use audio_app::AudioPlayerApp;
pub use controls::SeekSlider;
pub use video_app::VideoPlayerApp;
