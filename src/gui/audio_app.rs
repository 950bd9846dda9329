use std::time::{Duration, Instant};
use eframe::egui;
use crate::engine::FfmpegEngine;
use crate::gui::controls::{next_repaint, status_line, transport_bar, SeekSlider};
use crate::player::{Bus, PositionController};

pub const WINDOW_TITLE: &str = "Ion audio player";
pub const WINDOW_SIZE: [f32; 2] = [600.0, 250.0];

pub struct AudioPlayerApp {
    controller: PositionController<FfmpegEngine, SeekSlider>,
    bus: Bus,
}

impl AudioPlayerApp {
    pub fn new(controller: PositionController<FfmpegEngine, SeekSlider>, bus: Bus) -> Self {
        Self { controller, bus }
    }
}

impl eframe::App for AudioPlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.controller.iterate(now, &self.bus);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            status_line(ui, &mut self.controller);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(ui.available_height() / 2.0 - 12.0);
            transport_bar(ui, &mut self.controller, false);
        });

        ctx.request_repaint_after(next_repaint(&self.controller, now, Duration::from_millis(50)));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("Window closed, releasing pipeline");
        self.controller.shutdown();
    }
}
