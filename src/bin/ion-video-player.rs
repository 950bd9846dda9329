use std::time::Instant;
use eframe::egui;
use ion_player::core::{MediaUri, PlayerConfig};
use ion_player::engine::{EngineSettings, FfmpegEngine};
use ion_player::gui::{video_app, SeekSlider, VideoPlayerApp};
use ion_player::player::{Bus, PositionController};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = PlayerConfig::load()?;
    let uri = MediaUri::new(config.video_uri.clone());
    let (bus_sender, bus) = Bus::new();

    let engine = match FfmpegEngine::new(EngineSettings::with_video(&config), uri, bus_sender) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to create playback engine: {}", e);
            std::process::exit(1);
        }
    };
    let mut controller = PositionController::new(engine, SeekSlider::new(), config.poll_interval());

    // Polling is armed before the first play request so the first refresh
    // lands as soon as the pipeline prerolls.
    controller.start_polling(Instant::now());
    if controller.on_play_command(Instant::now()).is_err() {
        eprintln!("ERROR: Unable to set the pipeline to the playing state");
        std::process::exit(1);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(video_app::WINDOW_SIZE)
            .with_title(video_app::WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        video_app::WINDOW_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(VideoPlayerApp::new(controller, bus)))),
    ).map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
