use std::time::{Duration, Instant};
use eframe::egui;
use crate::core::{ClockTime, TransportState};
use crate::engine::PlaybackEngine;
use crate::player::{PositionController, SeekDecision, SliderSurface};

/// Seek bar model. egui only reports changes that come from the pointer, so a
/// programmatic write never produces a value-changed echo.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekSlider {
    min: f64,
    max: f64,
    value: f64,
}

impl SeekSlider {
    pub fn new() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            value: 0.0,
        }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Default for SeekSlider {
    fn default() -> Self {
        Self::new()
    }
}

impl SliderSurface for SeekSlider {
    fn set_range(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max.max(min);
        self.value = self.value.clamp(self.min, self.max);
    }

    fn set_value(&mut self, value: f64) -> Option<f64> {
        self.value = value.clamp(self.min, self.max);
        None
    }
}

pub fn time_label(position: Option<ClockTime>, duration: Option<ClockTime>) -> String {
    let show = |t: Option<ClockTime>| t.map(|t| t.to_string()).unwrap_or_else(|| "--:--".to_string());
    format!("{} / {}", show(position), show(duration))
}

/// Play, pause and (optionally) stop buttons followed by the seek slider.
pub fn transport_bar<E: PlaybackEngine>(
    ui: &mut egui::Ui,
    controller: &mut PositionController<E, SeekSlider>,
    show_stop: bool,
) {
    let state = controller.state();

    ui.horizontal(|ui| {
        if ui.add_enabled(state.can_play(), egui::Button::new("▶")).on_hover_text("Play").clicked() {
            let _ = controller.on_play_command(Instant::now());
        }
        if ui.add_enabled(state.can_pause(), egui::Button::new("⏸")).on_hover_text("Pause").clicked() {
            let _ = controller.on_pause_command();
        }
        if show_stop && ui.add_enabled(state.can_stop(), egui::Button::new("⏹")).on_hover_text("Stop").clicked() {
            let _ = controller.on_stop_command();
        }

        let label = time_label(controller.position(), controller.duration());
        let (min, max) = controller.slider().range();
        let mut value = controller.slider().value();

        ui.spacing_mut().slider_width = (ui.available_width() - 170.0).max(80.0);
        let response = ui.add_enabled(
            state.can_seek(),
            egui::Slider::new(&mut value, min..=max).show_value(false),
        );

        if response.changed() {
            apply_user_seek(controller, value);
        }

        ui.monospace(label);
    });
}

/// Forwards a drag to the controller. The slider keeps the dragged value only
/// when the seek went out; otherwise it snaps back to the last refresh.
pub fn apply_user_seek<E: PlaybackEngine>(
    controller: &mut PositionController<E, SeekSlider>,
    value: f64,
) -> SeekDecision {
    let decision = controller.on_seek_requested(value);
    if decision == SeekDecision::Issued {
        let _ = controller.slider_mut().set_value(value);
    }
    log::debug!("Slider moved to {:.2}s: {:?}", value, decision);
    decision
}

/// How long the UI may sleep before the controller needs another iteration.
/// Bus messages arrive from other threads, so idle frames still come around
/// every `max_idle`.
pub fn next_repaint<E: PlaybackEngine>(
    controller: &PositionController<E, SeekSlider>,
    now: Instant,
    max_idle: Duration,
) -> Duration {
    match controller.next_tick_in(now) {
        Some(tick) => tick.min(max_idle),
        None => max_idle,
    }
}

/// Whether the video area should show the last frame or plain black.
pub fn shows_picture(state: TransportState) -> bool {
    state >= TransportState::Paused
}

/// Last engine error, dismissable.
pub fn status_line<E: PlaybackEngine>(ui: &mut egui::Ui, controller: &mut PositionController<E, SeekSlider>) {
    ui.horizontal(|ui| {
        match controller.last_error() {
            Some(error) => {
                ui.colored_label(egui::Color32::from_rgb(220, 80, 80), format!("⚠ {}", error));
                if ui.small_button("✖").clicked() {
                    controller.clear_error();
                }
            }
            None => {
                ui.label(controller.state().display_text());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SeekFlags, StateChangeReturn};
    use crate::engine::EngineError;
    use crate::player::SourceId;

    struct SeekableEngine {
        source: SourceId,
    }

    impl PlaybackEngine for SeekableEngine {
        fn source(&self) -> &SourceId {
            &self.source
        }

        fn set_state(&mut self, _target: TransportState) -> Result<StateChangeReturn, EngineError> {
            Ok(StateChangeReturn::Async)
        }

        fn seek(&mut self, _flags: SeekFlags, _position: ClockTime) -> Result<(), EngineError> {
            Ok(())
        }

        fn query_duration(&self) -> Result<ClockTime, EngineError> {
            Ok(ClockTime::from_seconds_f64(100.0))
        }

        fn query_position(&self) -> Result<ClockTime, EngineError> {
            Ok(ClockTime::from_seconds_f64(10.0))
        }
    }

    fn create_controller() -> PositionController<SeekableEngine, SeekSlider> {
        let engine = SeekableEngine { source: SourceId::new(1, "playbin") };
        PositionController::new(engine, SeekSlider::new(), Duration::from_secs(1))
    }

    #[test]
    fn test_rejected_drag_leaves_slider_alone() {
        let mut controller = create_controller();

        assert_eq!(apply_user_seek(&mut controller, 42.0), SeekDecision::Rejected);
        assert_eq!(controller.slider().value(), 0.0);
    }

    #[test]
    fn test_drag_after_end_of_stream_snaps_back() {
        let mut controller = create_controller();
        let source = controller.engine().source().clone();
        controller.on_engine_state_changed(&source, TransportState::Ready, TransportState::Paused, None);
        assert_eq!(controller.slider().value(), 10.0);

        controller.on_end_of_stream();
        assert_eq!(apply_user_seek(&mut controller, 42.0), SeekDecision::Rejected);
        assert_eq!(controller.slider().value(), 10.0);
    }

    #[test]
    fn test_issued_drag_moves_slider() {
        let mut controller = create_controller();
        let source = controller.engine().source().clone();
        controller.on_engine_state_changed(&source, TransportState::Ready, TransportState::Paused, None);

        assert_eq!(apply_user_seek(&mut controller, 42.0), SeekDecision::Issued);
        assert_eq!(controller.slider().value(), 42.0);
    }

    #[test]
    fn test_seek_slider_never_echoes() {
        let mut slider = SeekSlider::new();
        slider.set_range(0.0, 200.0);
        assert_eq!(slider.set_value(12.5), None);
        assert_eq!(slider.value(), 12.5);
    }

    #[test]
    fn test_seek_slider_clamps_to_range() {
        let mut slider = SeekSlider::new();
        slider.set_range(0.0, 30.0);
        slider.set_value(45.0);
        assert_eq!(slider.value(), 30.0);

        slider.set_value(20.0);
        slider.set_range(0.0, 10.0);
        assert_eq!(slider.value(), 10.0);
        assert_eq!(slider.range(), (0.0, 10.0));
    }

    #[test]
    fn test_picture_only_once_prerolled() {
        assert!(!shows_picture(TransportState::Null));
        assert!(!shows_picture(TransportState::Ready));
        assert!(shows_picture(TransportState::Paused));
        assert!(shows_picture(TransportState::Playing));
    }

    #[test]
    fn test_time_label() {
        assert_eq!(time_label(None, None), "--:-- / --:--");
        assert_eq!(
            time_label(Some(ClockTime::from_seconds_f64(45.0)), Some(ClockTime::from_seconds_f64(200.0))),
            "0:00:45.000 / 0:03:20.000"
        );
    }
}
