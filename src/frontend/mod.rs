//! Kiosk display
//!
//! The display only reads: messages from the capture loop, the latest
//! preview frame, the feedback overlay and the mode watch channel. Operator
//! actions go back as [`KioskCommand`](crate::kiosk::KioskCommand)s.

pub mod dialogs;
pub mod status_bar;

use crate::config::{AppState, KioskConfig};
use crate::kiosk::{KioskHandle, KioskMessage, Overlay};
use crate::types::{
    AttendanceMode, CaptureStats, CaptureStatus, HighlightColor, ModeState, Rect, ScanOutcome,
    SessionInfo, SessionSummary,
};
use dialogs::{
    show_dialog, LateCheckInAction, LateCheckInDialog, LateCheckInState, SwitchSessionAction,
    SwitchSessionContext, SwitchSessionDialog, SwitchSessionState,
};
use egui::{Color32, FontId, RichText, Stroke, TextureHandle, TextureOptions};
use status_bar::{render_status_bar, StatusBarContext};
use std::time::{Duration, Instant};

/// Repaint period; the camera preview is live
const REPAINT_INTERVAL: Duration = Duration::from_millis(33);

pub fn highlight_color32(color: HighlightColor) -> Color32 {
    let [r, g, b] = color.rgb();
    Color32::from_rgb(r, g, b)
}

pub fn mode_color(mode: AttendanceMode) -> Color32 {
    match mode {
        AttendanceMode::CheckIn => Color32::from_rgb(46, 204, 113),
        AttendanceMode::CheckOut => Color32::from_rgb(230, 126, 34),
    }
}

/// Map a region in source-frame pixels onto the drawn preview
///
/// `preview_scale` is preview pixels per source pixel and `fit` is screen
/// points per preview pixel.
pub fn overlay_rect(region: Rect, preview_scale: f32, fit: f32, origin: egui::Pos2) -> egui::Rect {
    let k = preview_scale * fit;
    egui::Rect::from_min_size(
        origin + egui::vec2(region.x as f32 * k, region.y as f32 * k),
        egui::vec2(region.width as f32 * k, region.height as f32 * k),
    )
}

/// The kiosk window
pub struct KioskApp {
    handle: KioskHandle,
    config: KioskConfig,
    app_state: AppState,
    session: Option<SessionInfo>,
    sessions: Vec<SessionInfo>,
    capture_status: CaptureStatus,
    stats: CaptureStats,
    summary: SessionSummary,
    session_ended: bool,
    last_error: Option<String>,
    /// Payload of the last `NotCheckedIn` scan, offered to the late dialog
    last_refused: Option<String>,
    texture: Option<TextureHandle>,
    texture_seq: Option<u64>,
    preview_scale: f32,
    late_open: bool,
    late_state: LateCheckInState,
    switch_open: bool,
    switch_state: SwitchSessionState,
}

impl KioskApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        handle: KioskHandle,
        config: KioskConfig,
        app_state: AppState,
    ) -> Self {
        handle.request_summary();
        Self {
            handle,
            config,
            app_state,
            session: None,
            sessions: Vec::new(),
            capture_status: CaptureStatus::Idle,
            stats: CaptureStats::default(),
            summary: SessionSummary::default(),
            session_ended: false,
            last_error: None,
            last_refused: None,
            texture: None,
            texture_seq: None,
            preview_scale: 1.0,
            late_open: false,
            late_state: LateCheckInState::default(),
            switch_open: false,
            switch_state: SwitchSessionState::default(),
        }
    }

    /// Apply pending loop messages; returns whether any arrived
    fn process_messages(&mut self) -> bool {
        let messages = self.handle.drain();
        let had_messages = !messages.is_empty();

        for msg in messages {
            match msg {
                KioskMessage::CaptureStatus(status) => {
                    self.capture_status = status;
                    if status == CaptureStatus::Scanning {
                        self.last_error = None;
                    }
                }
                KioskMessage::SessionChanged(session) => {
                    self.app_state.last_session_id = Some(session.id);
                    self.session_ended = false;
                    self.last_refused = None;
                    self.summary = SessionSummary::default();
                    self.session = Some(session);
                }
                KioskMessage::Sessions(sessions) => self.sessions = sessions,
                KioskMessage::Summary(summary) => self.summary = summary,
                KioskMessage::Stats(stats) => self.stats = stats,
                KioskMessage::ScanResolved(report) => {
                    match report.outcome {
                        ScanOutcome::NotCheckedIn => self.last_refused = Some(report.payload),
                        ScanOutcome::SessionEnded => self.session_ended = true,
                        _ => {}
                    }
                    if report.outcome.is_success() {
                        self.handle.request_summary();
                    }
                }
                KioskMessage::SessionEnded => {
                    self.session_ended = true;
                    self.late_open = false;
                }
                KioskMessage::Error(e) => self.last_error = Some(e),
                KioskMessage::Shutdown => {
                    tracing::info!("Capture loop reported shutdown");
                }
            }
        }

        had_messages
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        let Some(preview) = self.handle.frames.newer_than(self.texture_seq) else {
            return;
        };
        let (w, h) = preview.image.dimensions();
        let image = egui::ColorImage::from_gray([w as usize, h as usize], preview.image.as_raw());

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("camera", image, TextureOptions::LINEAR));
            }
        }
        self.texture_seq = Some(preview.sequence);
        self.preview_scale = preview.scale;
    }

    fn render_header(&self, ui: &mut egui::Ui, mode: &ModeState) {
        ui.horizontal(|ui| {
            ui.heading(&self.config.ui.kiosk_title);
            ui.separator();
            match &self.session {
                Some(session) => ui.label(session.headline()),
                None => ui.label("No session"),
            };

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if self.session_ended || mode.session_ended {
                    ui.colored_label(Color32::LIGHT_RED, RichText::new("SESSION ENDED").strong());
                    return;
                }
                if mode.mode == AttendanceMode::CheckIn {
                    ui.label(
                        RichText::new(format!("Check-out in {}", mode.countdown_label()))
                            .monospace(),
                    );
                }
                ui.label(
                    RichText::new(mode.mode.to_string())
                        .strong()
                        .size(20.0)
                        .color(mode_color(mode.mode)),
                );
                if mode.degraded {
                    ui.colored_label(Color32::YELLOW, "no schedule")
                        .on_hover_text("Session has no start time; cutover counted from kiosk start");
                }
            });
        });
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let scanning = matches!(
                self.capture_status,
                CaptureStatus::Scanning | CaptureStatus::Opening
            );

            if ui
                .add_enabled(!scanning && !self.session_ended, egui::Button::new("Start"))
                .clicked()
            {
                self.handle.start_capture();
            }
            if ui.add_enabled(scanning, egui::Button::new("Stop")).clicked() {
                self.handle.stop_capture();
            }
            if ui.button("Switch session").clicked() {
                self.handle.list_sessions();
                self.switch_state.selected = self.session.as_ref().map(|s| s.id);
                self.switch_open = true;
            }
            if ui
                .add_enabled(!self.session_ended, egui::Button::new("Late check-in"))
                .clicked()
            {
                self.late_state = match &self.last_refused {
                    Some(key) => LateCheckInState::for_key(key.clone()),
                    None => LateCheckInState::default(),
                };
                self.late_open = true;
            }
        });
    }

    fn render_camera(&self, ui: &mut egui::Ui, overlay: Option<&Overlay>) {
        let Some(texture) = &self.texture else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("Camera idle").color(Color32::GRAY).size(24.0));
            });
            return;
        };

        let available = ui.available_size();
        let tex_size = texture.size_vec2();
        let fit = (available.x / tex_size.x)
            .min(available.y / tex_size.y)
            .max(0.01);
        let response = ui.image((texture.id(), tex_size * fit));
        let painter = ui.painter_at(response.rect);

        if let Some(overlay) = overlay {
            let color = highlight_color32(overlay.color);
            let anchor = match overlay.region {
                Some(region) => {
                    let rect = overlay_rect(region, self.preview_scale, fit, response.rect.min);
                    painter.rect_stroke(rect, 4.0, Stroke::new(3.0, color), egui::StrokeKind::Outside);
                    rect.left_top() - egui::vec2(0.0, 6.0)
                }
                None => response.rect.left_top() + egui::vec2(12.0, 36.0),
            };
            painter.text(
                anchor,
                egui::Align2::LEFT_BOTTOM,
                &overlay.message,
                FontId::proportional(22.0),
                color,
            );
        }

        if self.session_ended {
            painter.text(
                response.rect.center(),
                egui::Align2::CENTER_CENTER,
                "Session ended",
                FontId::proportional(40.0),
                Color32::LIGHT_RED,
            );
        }
    }

    fn render_dialogs(&mut self, ctx: &egui::Context) {
        if let Some(LateCheckInAction::Submit {
            lookup_key,
            justification,
        }) = show_dialog::<LateCheckInDialog>(ctx, &mut self.late_open, &mut self.late_state, ())
        {
            self.handle.late_check_in(lookup_key, justification);
            self.last_refused = None;
        }

        let switch_ctx = SwitchSessionContext {
            sessions: &self.sessions,
            current: self.session.as_ref().map(|s| s.id),
        };
        match show_dialog::<SwitchSessionDialog>(
            ctx,
            &mut self.switch_open,
            &mut self.switch_state,
            switch_ctx,
        ) {
            Some(SwitchSessionAction::Switch(id)) => self.handle.switch_session(id),
            Some(SwitchSessionAction::Refresh) => self.handle.list_sessions(),
            None => {}
        }
    }
}

impl eframe::App for KioskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_messages();
        self.refresh_texture(ctx);
        ctx.request_repaint_after(REPAINT_INTERVAL);

        let mode = self.handle.mode_state();
        let overlay = self.handle.feedback.current_overlay(Instant::now());
        let status_line = self.handle.feedback.status_line();

        egui::TopBottomPanel::top("kiosk_header").show(ctx, |ui| {
            self.render_header(ui, &mode);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            render_status_bar(
                ui,
                &StatusBarContext {
                    capture_status: self.capture_status,
                    status_line: &status_line,
                    summary: self.summary,
                    stats: &self.stats,
                    last_error: self.last_error.as_deref(),
                },
            );
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_controls(ui);
            ui.separator();
            self.render_camera(ui, overlay.as_ref());
        });

        self.render_dialogs(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.handle.shutdown();
        if let Err(e) = self.app_state.save() {
            tracing::warn!("Failed to save app state: {}", e);
        }
    }
}
