//! Operator dialogs
//!
//! Each dialog implements [`Dialog`]: its state, the action it can produce
//! and how it renders. [`show_dialog`] drives the window lifecycle and resets
//! the state when the dialog closes.

use egui::{Align2, Context, Ui};

pub mod late_check_in;
pub mod switch_session;

pub use late_check_in::{LateCheckInAction, LateCheckInDialog, LateCheckInState};
pub use switch_session::{
    SwitchSessionAction, SwitchSessionContext, SwitchSessionDialog, SwitchSessionState,
};

/// What a dialog asks for after a frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogAction<A> {
    /// Keep showing
    #[default]
    None,
    /// Close, nothing to do
    Close,
    /// Close and perform `A`
    CloseWithAction(A),
    /// Stay open and perform `A`
    Action(A),
}

impl<A> DialogAction<A> {
    pub fn should_close(&self) -> bool {
        matches!(self, DialogAction::Close | DialogAction::CloseWithAction(_))
    }

    pub fn into_action(self) -> Option<A> {
        match self {
            DialogAction::CloseWithAction(a) | DialogAction::Action(a) => Some(a),
            _ => None,
        }
    }
}

/// Dialog state with reset-on-close and an input check
pub trait DialogState: Default {
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the confirm button may be pressed
    fn is_valid(&self) -> bool {
        true
    }
}

pub trait Dialog {
    type State: DialogState;
    type Action;
    type Context<'a>;

    fn title(state: &Self::State) -> &'static str;

    /// Window width in points
    fn width() -> f32 {
        380.0
    }

    fn render(
        state: &mut Self::State,
        ctx: Self::Context<'_>,
        ui: &mut Ui,
    ) -> DialogAction<Self::Action>;
}

/// Show `D` centered on screen while `is_open` is set
///
/// Returns the action the dialog produced this frame, if any.
pub fn show_dialog<D: Dialog>(
    ctx: &Context,
    is_open: &mut bool,
    state: &mut D::State,
    dialog_ctx: D::Context<'_>,
) -> Option<D::Action> {
    if !*is_open {
        return None;
    }

    let mut outcome = DialogAction::None;
    egui::Window::new(D::title(state))
        .collapsible(false)
        .resizable(false)
        .default_width(D::width())
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            outcome = D::render(state, dialog_ctx, ui);
        });

    if outcome.should_close() {
        *is_open = false;
        state.reset();
    }
    outcome.into_action()
}
