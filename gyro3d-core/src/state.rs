/// Application state shared by telemetry, user commands and the render loop
use crate::mapping::{to_render_rotation, OrientationSample};
use crate::model::ActiveModel;
use crate::transform::{compose, Axis, RenderRotation, RenderTransform, UserOffset};

/// Discrete user actions that change the displayed object
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Rotate(Axis, f32),
    Scale(f32),
    /// Model prompt cancelled: back to the placeholder geometry
    ResetModel,
    /// Upload finished: display the model served at this URL
    UseCustomModel(String),
}

/// The single source of truth for what the next frame shows.
///
/// The telemetry base is written only by [`AppState::apply_sample`]; the
/// offset and active model only by [`AppState::apply`]. Both are read
/// together in [`AppState::transform`].
#[derive(Debug, Clone, Default)]
pub struct AppState {
    base: RenderRotation,
    offset: UserOffset,
    active_model: ActiveModel,
    model_revision: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&self) -> RenderRotation {
        self.base
    }

    pub fn offset(&self) -> UserOffset {
        self.offset
    }

    pub fn active_model(&self) -> &ActiveModel {
        &self.active_model
    }

    /// Bumped by every model command, even one naming the current model.
    ///
    /// Uploads always land at the same URL, so the URL alone cannot tell a
    /// fresh upload from the model already on screen.
    pub fn model_revision(&self) -> u64 {
        self.model_revision
    }

    /// Replace the base orientation with a freshly mapped sample
    pub fn apply_sample(&mut self, sample: &OrientationSample) {
        self.base = to_render_rotation(sample);
    }

    pub fn apply(&mut self, command: UserCommand) {
        match command {
            UserCommand::Rotate(axis, delta) => self.offset.rotate_axis(axis, delta),
            UserCommand::Scale(delta) => self.offset.scale_by(delta),
            UserCommand::ResetModel => self.select_model(ActiveModel::Default),
            UserCommand::UseCustomModel(url) => self.select_model(ActiveModel::Custom(url)),
        }
    }

    fn select_model(&mut self, model: ActiveModel) {
        self.active_model = model;
        self.model_revision += 1;
    }

    pub fn transform(&self) -> RenderTransform {
        compose(&self.base, &self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_maps_before_offset() {
        let mut state = AppState::new();
        state.apply_sample(&OrientationSample::new(1.0, 2.0, 3.0));
        let transform = state.transform();
        assert_eq!(transform.rotation.as_array(), [1.0, 3.0, 2.0]);
        assert_eq!(transform.scale, 1.0);
    }

    #[test]
    fn test_offset_then_zero_sample() {
        let mut state = AppState::new();
        state.apply(UserCommand::Rotate(Axis::Y, 1.5708));
        state.apply_sample(&OrientationSample::new(0.0, 0.0, 0.0));
        assert_eq!(state.transform().rotation.as_array(), [0.0, 1.5708, 0.0]);
    }

    #[test]
    fn test_latest_sample_wins() {
        let mut state = AppState::new();
        for i in 0..5 {
            state.apply_sample(&OrientationSample::new(i as f32, 0.0, 0.0));
        }
        assert_eq!(state.base().x, 4.0);
    }

    #[test]
    fn test_reset_model_keeps_offsets() {
        let mut state = AppState::new();
        state.apply(UserCommand::Rotate(Axis::Z, 0.3));
        state.apply(UserCommand::Scale(0.5));
        state.apply(UserCommand::UseCustomModel("http://device:8080/model.glb".into()));
        assert_eq!(
            state.active_model(),
            &ActiveModel::Custom("http://device:8080/model.glb".into())
        );

        state.apply(UserCommand::ResetModel);
        assert_eq!(state.active_model(), &ActiveModel::Default);
        assert_eq!(state.offset().rotation.z, 0.3);
        assert_eq!(state.offset().scale, 1.5);
    }

    #[test]
    fn test_repeat_upload_bumps_revision() {
        let mut state = AppState::new();
        let url = "http://device/model.glb";
        state.apply(UserCommand::UseCustomModel(url.into()));
        let first = state.model_revision();
        state.apply(UserCommand::UseCustomModel(url.into()));
        assert_eq!(state.active_model(), &ActiveModel::Custom(url.into()));
        assert!(state.model_revision() > first);

        let before = state.model_revision();
        state.apply(UserCommand::Rotate(Axis::X, 1.0));
        assert_eq!(state.model_revision(), before);
    }

    #[test]
    fn test_samples_never_change_offsets_or_model() {
        let mut state = AppState::new();
        state.apply(UserCommand::Scale(1.0));
        let before = state.offset();
        state.apply_sample(&OrientationSample::new(9.0, 8.0, 7.0));
        assert_eq!(state.offset(), before);
        assert_eq!(state.active_model(), &ActiveModel::Default);
    }
}
