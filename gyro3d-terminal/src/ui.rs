//! Keyboard handling: maps key events to commands and runs the text prompts.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use gyro3d_core::{Axis, UserCommand};

/// What the app should do in response to a key.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    None,
    Quit,
    Command(UserCommand),
    /// The caller opens the prompt with [`InputHandler::edit_endpoint`]
    OpenEndpointPrompt,
    ApplyEndpoint(String),
    UploadModel(String),
    ResetRemote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    EditEndpoint(String),
    ChooseModel(String),
}

pub struct InputHandler {
    mode: Mode,
    rotate_step: f32,
    scale_step: f32,
}

impl InputHandler {
    pub fn new(rotate_step: f32, scale_step: f32) -> Self {
        Self {
            mode: Mode::Normal,
            rotate_step,
            scale_step,
        }
    }

    /// Prompt line to show while a prompt is open
    pub fn prompt(&self) -> Option<String> {
        match &self.mode {
            Mode::Normal => None,
            Mode::EditEndpoint(text) => Some(format!("Endpoint URL: {}_", text)),
            Mode::ChooseModel(text) => Some(format!("Model file (Esc for default): {}_", text)),
        }
    }

    /// Open the endpoint prompt pre-filled with `current`
    pub fn edit_endpoint(&mut self, current: &str) {
        self.mode = Mode::EditEndpoint(current.to_string());
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> UiAction {
        if key.kind != KeyEventKind::Press {
            return UiAction::None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return UiAction::Quit;
        }

        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.normal_key(key.code),
            Mode::EditEndpoint(text) => match edit_text(text, key.code) {
                Edit::Continue(text) => {
                    self.mode = Mode::EditEndpoint(text);
                    UiAction::None
                }
                Edit::Submit(text) if !text.trim().is_empty() => {
                    UiAction::ApplyEndpoint(text.trim().to_string())
                }
                Edit::Submit(_) | Edit::Cancel => UiAction::None,
            },
            Mode::ChooseModel(text) => match edit_text(text, key.code) {
                Edit::Continue(text) => {
                    self.mode = Mode::ChooseModel(text);
                    UiAction::None
                }
                Edit::Submit(text) if !text.trim().is_empty() => {
                    UiAction::UploadModel(text.trim().to_string())
                }
                // Dismissing the chooser goes back to the default model
                Edit::Submit(_) | Edit::Cancel => UiAction::Command(UserCommand::ResetModel),
            },
        }
    }

    fn normal_key(&mut self, code: KeyCode) -> UiAction {
        let rotate = |axis, delta| UiAction::Command(UserCommand::Rotate(axis, delta));
        match code {
            KeyCode::Char('q') | KeyCode::Esc => UiAction::Quit,
            KeyCode::Char('w') | KeyCode::Up => rotate(Axis::X, self.rotate_step),
            KeyCode::Char('s') | KeyCode::Down => rotate(Axis::X, -self.rotate_step),
            KeyCode::Char('a') | KeyCode::Left => rotate(Axis::Y, -self.rotate_step),
            KeyCode::Char('d') | KeyCode::Right => rotate(Axis::Y, self.rotate_step),
            KeyCode::Char('e') => rotate(Axis::Z, self.rotate_step),
            KeyCode::Char('r') => rotate(Axis::Z, -self.rotate_step),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                UiAction::Command(UserCommand::Scale(self.scale_step))
            }
            KeyCode::Char('-') => UiAction::Command(UserCommand::Scale(-self.scale_step)),
            KeyCode::Char('0') => UiAction::ResetRemote,
            KeyCode::Char('c') => UiAction::OpenEndpointPrompt,
            KeyCode::Char('m') => {
                self.mode = Mode::ChooseModel(String::new());
                UiAction::None
            }
            _ => UiAction::None,
        }
    }
}

enum Edit {
    Continue(String),
    Submit(String),
    Cancel,
}

fn edit_text(mut text: String, code: KeyCode) -> Edit {
    match code {
        KeyCode::Enter => Edit::Submit(text),
        KeyCode::Esc => Edit::Cancel,
        KeyCode::Backspace => {
            text.pop();
            Edit::Continue(text)
        }
        KeyCode::Char(c) => {
            text.push(c);
            Edit::Continue(text)
        }
        _ => Edit::Continue(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn handler() -> InputHandler {
        InputHandler::new(FRAC_PI_2, 0.1)
    }

    fn type_text(handler: &mut InputHandler, text: &str) {
        for c in text.chars() {
            assert_eq!(handler.handle_key(press(KeyCode::Char(c))), UiAction::None);
        }
    }

    #[test]
    fn test_rotation_keys() {
        let mut h = handler();
        assert_eq!(
            h.handle_key(press(KeyCode::Char('w'))),
            UiAction::Command(UserCommand::Rotate(Axis::X, FRAC_PI_2))
        );
        assert_eq!(
            h.handle_key(press(KeyCode::Left)),
            UiAction::Command(UserCommand::Rotate(Axis::Y, -FRAC_PI_2))
        );
        assert_eq!(
            h.handle_key(press(KeyCode::Char('r'))),
            UiAction::Command(UserCommand::Rotate(Axis::Z, -FRAC_PI_2))
        );
    }

    #[test]
    fn test_scale_and_reset_keys() {
        let mut h = handler();
        assert_eq!(
            h.handle_key(press(KeyCode::Char('='))),
            UiAction::Command(UserCommand::Scale(0.1))
        );
        assert_eq!(
            h.handle_key(press(KeyCode::Char('-'))),
            UiAction::Command(UserCommand::Scale(-0.1))
        );
        assert_eq!(h.handle_key(press(KeyCode::Char('0'))), UiAction::ResetRemote);
        assert_eq!(
            h.handle_key(press(KeyCode::Char('c'))),
            UiAction::OpenEndpointPrompt
        );
    }

    #[test]
    fn test_quit_keys() {
        let mut h = handler();
        assert_eq!(h.handle_key(press(KeyCode::Char('q'))), UiAction::Quit);
        assert_eq!(
            h.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            UiAction::Quit
        );
    }

    #[test]
    fn test_release_events_ignored() {
        let mut h = handler();
        let mut key = press(KeyCode::Char('w'));
        key.kind = KeyEventKind::Release;
        assert_eq!(h.handle_key(key), UiAction::None);
    }

    #[test]
    fn test_endpoint_prompt() {
        let mut h = handler();
        h.edit_endpoint("http://a");
        assert!(h.prompt().is_some());
        // Keys edit the text instead of rotating
        type_text(&mut h, "bc");
        h.handle_key(press(KeyCode::Backspace));
        assert_eq!(h.prompt().as_deref(), Some("Endpoint URL: http://ab_"));
        assert_eq!(
            h.handle_key(press(KeyCode::Enter)),
            UiAction::ApplyEndpoint("http://ab".into())
        );
        assert!(h.prompt().is_none());
    }

    #[test]
    fn test_endpoint_prompt_cancel() {
        let mut h = handler();
        h.edit_endpoint("http://a");
        assert_eq!(h.handle_key(press(KeyCode::Esc)), UiAction::None);
        assert!(h.prompt().is_none());
    }

    #[test]
    fn test_model_prompt_submit() {
        let mut h = handler();
        assert_eq!(h.handle_key(press(KeyCode::Char('m'))), UiAction::None);
        type_text(&mut h, "/tmp/x.glb");
        assert_eq!(
            h.handle_key(press(KeyCode::Enter)),
            UiAction::UploadModel("/tmp/x.glb".into())
        );
    }

    #[test]
    fn test_model_prompt_cancel_resets_model() {
        let mut h = handler();
        h.handle_key(press(KeyCode::Char('m')));
        assert_eq!(
            h.handle_key(press(KeyCode::Esc)),
            UiAction::Command(UserCommand::ResetModel)
        );

        h.handle_key(press(KeyCode::Char('m')));
        assert_eq!(
            h.handle_key(press(KeyCode::Enter)),
            UiAction::Command(UserCommand::ResetModel)
        );
    }
}
