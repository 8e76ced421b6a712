//! Change the active session

use super::{Dialog, DialogAction, DialogState};
use crate::types::SessionInfo;
use egui::Ui;

#[derive(Debug, Default, Clone)]
pub struct SwitchSessionState {
    pub selected: Option<i64>,
}

impl DialogState for SwitchSessionState {
    fn is_valid(&self) -> bool {
        self.selected.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchSessionAction {
    Switch(i64),
    Refresh,
}

pub struct SwitchSessionContext<'a> {
    pub sessions: &'a [SessionInfo],
    pub current: Option<i64>,
}

pub struct SwitchSessionDialog;

impl Dialog for SwitchSessionDialog {
    type State = SwitchSessionState;
    type Action = SwitchSessionAction;
    type Context<'a> = SwitchSessionContext<'a>;

    fn title(_state: &Self::State) -> &'static str {
        "Switch Session"
    }

    fn width() -> f32 {
        460.0
    }

    fn render(
        state: &mut Self::State,
        ctx: SwitchSessionContext<'_>,
        ui: &mut Ui,
    ) -> DialogAction<Self::Action> {
        if ctx.sessions.is_empty() {
            ui.label("No active sessions.");
        }

        egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
            for session in ctx.sessions {
                let mut label = session.headline();
                if ctx.current == Some(session.id) {
                    label.push_str("  (current)");
                }
                ui.selectable_value(&mut state.selected, Some(session.id), label);
            }
        });

        ui.separator();
        ui.horizontal(|ui| {
            let open = ui.add_enabled(state.is_valid(), egui::Button::new("Open"));
            if open.clicked() {
                if let Some(id) = state.selected {
                    return DialogAction::CloseWithAction(SwitchSessionAction::Switch(id));
                }
            }
            if ui.button("Refresh").clicked() {
                return DialogAction::Action(SwitchSessionAction::Refresh);
            }
            if ui.button("Cancel").clicked() {
                return DialogAction::Close;
            }
            DialogAction::None
        })
        .inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_required() {
        let mut state = SwitchSessionState::default();
        assert!(!state.is_valid());
        state.selected = Some(3);
        assert!(state.is_valid());
        state.reset();
        assert!(state.selected.is_none());
    }
}
