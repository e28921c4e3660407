use egui::{Color32, RichText};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::session::{
    ClickMode, Outcome, SessionLimits, SessionState, Watchdog, IDLE_SECS_RANGE, WINDOW_SECS_RANGE,
};

// -------------- Palette --------------
fn mode_color(mode: ClickMode) -> Color32 {
    match mode {
        ClickMode::Butterfly => Color32::from_rgb(255, 107, 107),
        ClickMode::Jitter => Color32::from_rgb(78, 205, 196),
        ClickMode::Drag => Color32::from_rgb(69, 183, 209),
        ClickMode::Normal => Color32::from_rgb(150, 206, 180),
    }
}

/// Hover shade: each channel pulled down by 30, clamped at zero.
fn darken(color: Color32) -> Color32 {
    Color32::from_rgb(
        color.r().saturating_sub(30),
        color.g().saturating_sub(30),
        color.b().saturating_sub(30),
    )
}

const RESET_RED: Color32 = Color32::from_rgb(231, 76, 60);
const LIVE_GREEN: Color32 = Color32::from_rgb(0, 255, 0);

// -------------- App --------------
pub struct CpsApp {
    state: Arc<Mutex<SessionState>>,
    watchdog: Option<Watchdog>,
    /// Mode button under the pointer last frame; drives the hover fill.
    hovered: Option<ClickMode>,
    idle_secs: f32,
    window_secs: Option<f32>,
}

impl CpsApp {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            watchdog: None,
            hovered: None,
            idle_secs: limits.idle_timeout.as_secs_f32(),
            window_secs: limits.window.map(|w| w.as_secs_f32()),
        }
    }

    fn current_limits(&self) -> SessionLimits {
        SessionLimits::from_secs(self.idle_secs, self.window_secs)
    }

    fn on_mode_click(&mut self, ctx: &egui::Context, mode: ClickMode) {
        let opened = self.state.lock().record_click(mode, Instant::now());
        if opened {
            if let Some(dog) = self.watchdog.take() {
                dog.stop();
            }
            let limits = self.current_limits();
            log::debug!("run opened: {} {:?}", mode.label(), limits);
            let repaint_ctx = ctx.clone();
            self.watchdog = Some(Watchdog::spawn(Arc::clone(&self.state), limits, move || {
                repaint_ctx.request_repaint()
            }));
        }
    }

    fn reset(&mut self) {
        if let Some(dog) = self.watchdog.take() {
            dog.stop();
        }
        self.state.lock().reset();
    }
}

impl eframe::App for CpsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Snapshot under the lock; the watchdog may finalize between frames.
        let (scores, clicks, live, outcome, mode, active) = {
            let st = self.state.lock();
            (
                st.last_cps,
                st.clicks,
                st.live_cps(Instant::now()),
                st.outcome,
                st.mode,
                st.started.is_some(),
            )
        };

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading(RichText::new("CPS Tester").size(24.0).strong());
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                egui::Grid::new("scores")
                    .num_columns(2)
                    .spacing([40.0, 6.0])
                    .show(ui, |ui| {
                        for pair in ClickMode::ALL.chunks(2) {
                            for &m in pair {
                                ui.label(
                                    RichText::new(format!(
                                        "{}: {:.2}",
                                        m.label(),
                                        scores[m.index()]
                                    ))
                                    .strong()
                                    .color(mode_color(m)),
                                );
                            }
                            ui.end_row();
                        }
                    });

                ui.add_space(10.0);
                let (headline, shown_clicks) = match outcome {
                    Some(Outcome::Scored { cps, clicks }) => {
                        (format!("Final CPS: {cps:.2}"), clicks)
                    }
                    Some(Outcome::TooShort { clicks }) => {
                        ("Not enough clicks to score".to_owned(), clicks)
                    }
                    None => (format!("Current CPS: {:.2}", live.unwrap_or(0.0)), clicks),
                };
                ui.label(RichText::new(headline).size(18.0).strong().color(LIVE_GREEN));
                ui.label(RichText::new(format!("Clicks: {shown_clicks}")).size(14.0));
                ui.label(match mode {
                    Some(m) => format!("Mode: {}", m.label()),
                    None => "Select a click type to start".to_owned(),
                });
            });

            ui.add_space(16.0);

            // 2x2 mode buttons; hover fill echoes last frame's pointer.
            let mut next_hover = None;
            let button_size = egui::vec2((ui.available_width() - 20.0) / 2.0, 110.0);
            for pair in ClickMode::ALL.chunks(2) {
                ui.horizontal(|ui| {
                    for &m in pair {
                        let base = mode_color(m);
                        let fill = if self.hovered == Some(m) {
                            darken(base)
                        } else {
                            base
                        };
                        let text = RichText::new(m.label())
                            .size(20.0)
                            .strong()
                            .color(Color32::WHITE);
                        let resp = ui.add_sized(
                            button_size,
                            egui::Button::new(text).fill(fill).rounding(6.0),
                        );
                        if resp.hovered() {
                            next_hover = Some(m);
                        }
                        if resp.clicked() {
                            self.on_mode_click(ctx, m);
                        }
                    }
                });
            }
            self.hovered = next_hover;

            ui.add_space(16.0);

            ui.group(|ui| {
                ui.label("Session");
                ui.horizontal(|ui| {
                    ui.label("Idle timeout (s):");
                    ui.add(
                        egui::DragValue::new(&mut self.idle_secs)
                            .speed(0.1)
                            .clamp_range(IDLE_SECS_RANGE),
                    );
                });
                ui.horizontal(|ui| {
                    let mut timed = self.window_secs.is_some();
                    if ui.checkbox(&mut timed, "Fixed window").clicked() {
                        self.window_secs = if timed { Some(10.0) } else { None };
                    }
                    if let Some(ref mut secs) = self.window_secs {
                        ui.add(
                            egui::DragValue::new(secs)
                                .speed(0.5)
                                .clamp_range(WINDOW_SECS_RANGE)
                                .suffix(" s"),
                        );
                    }
                });
                match &self.watchdog {
                    Some(dog) if dog.is_running() => ui.label("Status: Running"),
                    _ => ui.label("Status: Idle"),
                };
            });

            ui.add_space(10.0);
            ui.vertical_centered(|ui| {
                let reset_text = RichText::new("Reset").strong().color(Color32::WHITE);
                if ui
                    .add_sized(
                        egui::vec2(120.0, 32.0),
                        egui::Button::new(reset_text).fill(RESET_RED).rounding(6.0),
                    )
                    .clicked()
                {
                    self.reset();
                }
            });
        });

        // Keep the live readout ticking while a run is open.
        if active {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
