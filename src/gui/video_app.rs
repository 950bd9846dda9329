use std::time::{Duration, Instant};
use eframe::egui;
use egui::{Color32, ColorImage, TextureHandle};
use crate::engine::{FfmpegEngine, VideoFrame};
use crate::gui::controls::{next_repaint, shows_picture, status_line, transport_bar, SeekSlider};
use crate::gui::streams::describe_streams;
use crate::core::TransportState;
use crate::player::{Bus, PositionController};

pub const WINDOW_TITLE: &str = "Ion video player";
pub const WINDOW_SIZE: [f32; 2] = [640.0, 480.0];

fn rgba_frame_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

pub struct VideoPlayerApp {
    controller: PositionController<FfmpegEngine, SeekSlider>,
    bus: Bus,
    texture: Option<TextureHandle>,
    streams_text: String,
}

impl VideoPlayerApp {
    pub fn new(controller: PositionController<FfmpegEngine, SeekSlider>, bus: Bus) -> Self {
        Self {
            controller,
            bus,
            texture: None,
            streams_text: String::new(),
        }
    }

    fn update_streams(&mut self) {
        if !self.controller.take_streams_changed() {
            return;
        }
        if let Some(info) = self.controller.engine().media_info() {
            self.streams_text = describe_streams(&info);
        }
    }

    fn update_texture(&mut self, ctx: &egui::Context) {
        if !shows_picture(self.controller.state()) {
            self.texture = None;
            return;
        }

        let Some(frame) = self.controller.engine().take_video_frame() else {
            return;
        };
        self.upload_frame(ctx, frame);
    }

    fn upload_frame(&mut self, ctx: &egui::Context, frame: VideoFrame) {
        let expected_size = rgba_frame_size(frame.width, frame.height);
        if frame.image_data.len() != expected_size {
            log::warn!("Invalid frame data size: expected {}, got {}", expected_size, frame.image_data.len());
            return;
        }

        let color_image = ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.image_data,
        );
        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("video_frame", color_image, egui::TextureOptions::LINEAR));
            }
        }
    }

    fn show_video(&self, ui: &mut egui::Ui) {
        let rect = ui.max_rect();
        ui.painter().rect_filled(rect, 0.0, Color32::BLACK);

        let Some(texture) = &self.texture else {
            return;
        };

        let size = texture.size_vec2();
        let scale = (rect.width() / size.x).min(rect.height() / size.y);
        let image_rect = egui::Rect::from_center_size(rect.center(), size * scale);
        ui.painter().image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            Color32::WHITE,
        );
    }
}

impl eframe::App for VideoPlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.controller.iterate(now, &self.bus);
        self.update_streams();
        self.update_texture(ctx);

        egui::TopBottomPanel::bottom("transport").show(ctx, |ui| {
            transport_bar(ui, &mut self.controller, true);
            status_line(ui, &mut self.controller);
        });

        egui::SidePanel::right("streams")
            .default_width(200.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.monospace(&self.streams_text);
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.show_video(ui));

        if self.controller.state() == TransportState::Playing {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(next_repaint(&self.controller, now, Duration::from_millis(50)));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("Window closed, stopping playback");
        let _ = self.controller.on_stop_command();
        self.controller.shutdown();
    }
}
