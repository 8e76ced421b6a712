//! Status bar: capture state, status line, headcount and counters

use egui::{Color32, RichText, Ui};

use crate::types::{CaptureStats, CaptureStatus, SessionSummary};

pub struct StatusBarContext<'a> {
    pub capture_status: CaptureStatus,
    pub status_line: &'a str,
    pub summary: SessionSummary,
    pub stats: &'a CaptureStats,
    pub last_error: Option<&'a str>,
}

pub fn status_color(status: CaptureStatus) -> Color32 {
    match status {
        CaptureStatus::Scanning => Color32::GREEN,
        CaptureStatus::Opening => Color32::YELLOW,
        CaptureStatus::Idle => Color32::GRAY,
        CaptureStatus::Error => Color32::RED,
        CaptureStatus::Ended => Color32::LIGHT_RED,
    }
}

pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        ui.colored_label(status_color(ctx.capture_status), "●");
        ui.label(RichText::new(ctx.capture_status.to_string()).small());

        ui.separator();
        ui.label(RichText::new(ctx.status_line).small());

        ui.separator();
        ui.label(
            RichText::new(format!(
                "Present: {}  In: {}  Out: {}",
                ctx.summary.present(),
                ctx.summary.checked_in,
                ctx.summary.checked_out
            ))
            .small(),
        );

        ui.separator();
        ui.label(
            RichText::new(format!(
                "Frames: {}  Scans: {}  Dropped: {}",
                ctx.stats.frames_read, ctx.stats.scans_accepted, ctx.stats.scans_suppressed
            ))
            .small(),
        );

        if ctx.stats.read_failures > 0 {
            ui.colored_label(
                Color32::LIGHT_RED,
                RichText::new(format!("Read errors: {}", ctx.stats.read_failures)).small(),
            );
        }

        if let Some(error) = ctx.last_error {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(Color32::RED, RichText::new(error).small());
            });
        }
    });
}
