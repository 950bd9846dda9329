use eframe::egui;
use ion_player::core::{MediaUri, PlayerConfig};
use ion_player::engine::{EngineSettings, FfmpegEngine};
use ion_player::gui::{audio_app, AudioPlayerApp, SeekSlider};
use ion_player::player::{Bus, PositionController};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = PlayerConfig::load()?;
    let uri = MediaUri::from_path(&config.audio_file)?;
    let (bus_sender, bus) = Bus::new();

    let engine = match FfmpegEngine::new(EngineSettings::audio_only(&config), uri, bus_sender) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to create playback engine: {}", e);
            std::process::exit(1);
        }
    };
    let controller = PositionController::new(engine, SeekSlider::new(), config.poll_interval());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(audio_app::WINDOW_SIZE)
            .with_title(audio_app::WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        audio_app::WINDOW_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(AudioPlayerApp::new(controller, bus)))),
    ).map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
