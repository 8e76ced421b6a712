//! Late check-in dialog
//!
//! Offered after a `NotCheckedIn` scan. The operator types the student's
//! lookup key and a reason; both are required.

use super::{Dialog, DialogAction, DialogState};
use egui::{Color32, Ui};

#[derive(Debug, Default, Clone)]
pub struct LateCheckInState {
    pub lookup_key: String,
    pub justification: String,
}

impl LateCheckInState {
    /// Pre-fill the key, e.g. from the scan that was refused
    pub fn for_key(key: impl Into<String>) -> Self {
        Self {
            lookup_key: key.into(),
            justification: String::new(),
        }
    }

    /// Trimmed action if the input is acceptable
    pub fn to_action(&self) -> Option<LateCheckInAction> {
        self.is_valid().then(|| LateCheckInAction::Submit {
            lookup_key: self.lookup_key.trim().to_string(),
            justification: self.justification.trim().to_string(),
        })
    }
}

impl DialogState for LateCheckInState {
    fn is_valid(&self) -> bool {
        !self.lookup_key.trim().is_empty() && !self.justification.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LateCheckInAction {
    Submit {
        lookup_key: String,
        justification: String,
    },
}

pub struct LateCheckInDialog;

impl Dialog for LateCheckInDialog {
    type State = LateCheckInState;
    type Action = LateCheckInAction;
    type Context<'a> = ();

    fn title(_state: &Self::State) -> &'static str {
        "Late Check-in"
    }

    fn render(state: &mut Self::State, _ctx: (), ui: &mut Ui) -> DialogAction<Self::Action> {
        ui.label("Record a check-in after the check-in window has closed.");
        ui.add_space(6.0);

        egui::Grid::new("late_check_in_grid")
            .num_columns(2)
            .spacing([8.0, 6.0])
            .show(ui, |ui| {
                ui.label("Student ID:");
                ui.text_edit_singleline(&mut state.lookup_key);
                ui.end_row();

                ui.label("Reason:");
                ui.text_edit_singleline(&mut state.justification);
                ui.end_row();
            });

        if !state.is_valid() {
            ui.colored_label(Color32::GRAY, "Both fields are required.");
        }

        ui.separator();
        ui.horizontal(|ui| {
            let confirm = ui.add_enabled(state.is_valid(), egui::Button::new("Confirm"));
            if confirm.clicked() {
                if let Some(action) = state.to_action() {
                    return DialogAction::CloseWithAction(action);
                }
            }
            if ui.button("Cancel").clicked() {
                return DialogAction::Close;
            }
            DialogAction::None
        })
        .inner
    }
}
