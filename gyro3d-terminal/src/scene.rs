//! Keeps the visible mesh in step with the active model and decides when a
//! new frame must be drawn.

use gyro3d_core::model::DEFAULT_CUBE_SIZE;
use gyro3d_core::{ActiveModel, Mesh, ModelError, RenderTransform};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::loader::{HttpModelLoader, ModelSource};

struct PendingLoad {
    url: String,
    rx: oneshot::Receiver<Result<Mesh, ModelError>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameKey {
    transform: RenderTransform,
    mesh_version: u64,
    viewport: (u16, u16),
}

/// Owns the mesh on screen.
///
/// The default cube is always available immediately. A custom model keeps
/// the previous mesh on screen until its load finishes; a failed load keeps
/// it for good and records the error.
pub struct SceneDriver {
    mesh: Mesh,
    requested: ActiveModel,
    requested_revision: u64,
    pending: Option<PendingLoad>,
    mesh_version: u64,
    last_drawn: Option<FrameKey>,
    load_error: Option<String>,
    source: Box<dyn ModelSource>,
}

impl SceneDriver {
    pub fn new() -> Self {
        Self::with_source(Box::new(HttpModelLoader))
    }

    pub fn with_source(source: Box<dyn ModelSource>) -> Self {
        Self {
            mesh: Mesh::cube(DEFAULT_CUBE_SIZE),
            requested: ActiveModel::Default,
            requested_revision: 0,
            pending: None,
            mesh_version: 0,
            last_drawn: None,
            load_error: None,
            source,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Why the last custom model could not be shown, if it failed
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Advance one frame. Returns whether the frame needs redrawing.
    ///
    /// A new `revision` reloads the model even when `active` is unchanged.
    pub fn frame(
        &mut self,
        active: &ActiveModel,
        revision: u64,
        transform: RenderTransform,
        viewport: (u16, u16),
    ) -> bool {
        if *active != self.requested || revision != self.requested_revision {
            self.switch_model(active.clone(), revision);
        }
        self.poll_load();

        let key = FrameKey {
            transform: transform.sanitized(),
            mesh_version: self.mesh_version,
            viewport,
        };
        if self.last_drawn == Some(key) {
            return false;
        }
        self.last_drawn = Some(key);
        true
    }

    fn switch_model(&mut self, active: ActiveModel, revision: u64) {
        // Dropping the receiver discards whatever the old load produces
        self.pending = None;
        self.load_error = None;
        match &active {
            ActiveModel::Default => {
                tracing::info!("Showing default model");
                self.replace_mesh(Mesh::cube(DEFAULT_CUBE_SIZE));
            }
            ActiveModel::Custom(url) => {
                tracing::info!(%url, "Loading custom model");
                self.pending = Some(PendingLoad {
                    url: url.clone(),
                    rx: self.source.spawn_load(url.clone()),
                });
            }
        }
        self.requested = active;
        self.requested_revision = revision;
    }

    fn poll_load(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => Err(ModelError::Fetch {
                url: pending.url.clone(),
                reason: "loader stopped".into(),
            }),
        };
        let url = pending.url.clone();
        self.pending = None;

        match result {
            Ok(mesh) => self.replace_mesh(mesh),
            Err(e) => {
                tracing::error!(%url, error = %e, "Model load failed; keeping previous mesh");
                self.load_error = Some(e.to_string());
            }
        }
    }

    fn replace_mesh(&mut self, mesh: Mesh) {
        self.mesh = mesh;
        self.mesh_version += 1;
    }
}

impl Default for SceneDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyro3d_core::{AppState, RenderRotation, Triangle, UserCommand};
    use nalgebra::Point3;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Senders = Rc<RefCell<Vec<(String, oneshot::Sender<Result<Mesh, ModelError>>)>>>;

    /// Hands every load back to the test to complete by hand.
    struct ManualSource {
        senders: Senders,
    }

    impl ModelSource for ManualSource {
        fn spawn_load(&self, url: String) -> oneshot::Receiver<Result<Mesh, ModelError>> {
            let (tx, rx) = oneshot::channel();
            self.senders.borrow_mut().push((url, tx));
            rx
        }
    }

    fn driver() -> (SceneDriver, Senders) {
        let senders = Senders::default();
        let source = ManualSource {
            senders: senders.clone(),
        };
        (SceneDriver::with_source(Box::new(source)), senders)
    }

    fn one_triangle() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_triangle(Triangle::from_positions(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ));
        mesh
    }

    fn complete(senders: &Senders, index: usize, result: Result<Mesh, ModelError>) {
        let (_, tx) = senders.borrow_mut().remove(index);
        let _ = tx.send(result);
    }

    const VIEW: (u16, u16) = (80, 24);

    /// Drive a frame from the app state, the way the render loop does
    fn frame(driver: &mut SceneDriver, state: &AppState) -> bool {
        driver.frame(
            state.active_model(),
            state.model_revision(),
            state.transform(),
            VIEW,
        )
    }

    #[test]
    fn test_starts_with_cube() {
        let (driver, _) = driver();
        assert_eq!(driver.mesh().triangles.len(), 12);
        assert!(!driver.is_loading());
    }

    #[test]
    fn test_redraw_only_on_change() {
        let (mut driver, _) = driver();
        let active = ActiveModel::Default;
        let t = RenderTransform::default();
        assert!(driver.frame(&active, 0, t, VIEW));
        assert!(!driver.frame(&active, 0, t, VIEW));

        let rotated = RenderTransform {
            rotation: RenderRotation::new(0.1, 0.0, 0.0),
            scale: 1.0,
        };
        assert!(driver.frame(&active, 0, rotated, VIEW));
        assert!(driver.frame(&active, 0, rotated, (100, 30)));
        assert!(!driver.frame(&active, 0, rotated, (100, 30)));
    }

    #[test]
    fn test_non_finite_transform_compares_sanitized() {
        let (mut driver, _) = driver();
        let active = ActiveModel::Default;
        let nan = RenderTransform {
            rotation: RenderRotation::new(f32::NAN, 0.0, 0.0),
            scale: 1.0,
        };
        assert!(driver.frame(&active, 0, nan, VIEW));
        assert!(!driver.frame(&active, 0, nan, VIEW));
        assert!(!driver.frame(&active, 0, RenderTransform::default(), VIEW));
    }

    #[test]
    fn test_custom_model_replaces_mesh_when_loaded() {
        let (mut driver, senders) = driver();
        let mut state = AppState::new();
        frame(&mut driver, &state);

        state.apply(UserCommand::UseCustomModel("http://h/model.glb".into()));
        frame(&mut driver, &state);
        assert!(driver.is_loading());
        assert_eq!(senders.borrow()[0].0, "http://h/model.glb");
        // Cube stays up while loading
        assert_eq!(driver.mesh().triangles.len(), 12);

        complete(&senders, 0, Ok(one_triangle()));
        assert!(frame(&mut driver, &state));
        assert_eq!(driver.mesh().triangles.len(), 1);
        assert!(!driver.is_loading());
    }

    #[test]
    fn test_failed_load_keeps_previous_mesh() {
        let (mut driver, senders) = driver();
        let mut state = AppState::new();
        state.apply(UserCommand::UseCustomModel("http://h/broken.glb".into()));
        frame(&mut driver, &state);

        complete(&senders, 0, Err(ModelError::Empty));
        frame(&mut driver, &state);
        assert_eq!(driver.mesh().triangles.len(), 12);
        assert_eq!(driver.load_error(), Some("model contains no triangles"));
    }

    #[test]
    fn test_superseded_load_is_discarded() {
        let (mut driver, senders) = driver();
        let mut state = AppState::new();
        state.apply(UserCommand::UseCustomModel("http://h/a.glb".into()));
        frame(&mut driver, &state);
        state.apply(UserCommand::ResetModel);
        frame(&mut driver, &state);

        // The first load finishes after the reset; nothing changes
        complete(&senders, 0, Ok(one_triangle()));
        assert!(!frame(&mut driver, &state));
        assert_eq!(driver.mesh().triangles.len(), 12);
    }

    #[test]
    fn test_same_url_uploaded_twice_loads_twice() {
        let (mut driver, senders) = driver();
        let mut state = AppState::new();
        let url = "http://dev/model.glb";

        state.apply(UserCommand::UseCustomModel(url.into()));
        frame(&mut driver, &state);
        complete(&senders, 0, Ok(one_triangle()));
        frame(&mut driver, &state);
        assert!(senders.borrow().is_empty());

        // A second upload replaces the file behind the same URL
        state.apply(UserCommand::UseCustomModel(url.into()));
        frame(&mut driver, &state);
        assert_eq!(senders.borrow().len(), 1);
        assert_eq!(senders.borrow()[0].0, url);

        let mut two = one_triangle();
        two.triangles.extend(one_triangle().triangles);
        complete(&senders, 0, Ok(two));
        assert!(frame(&mut driver, &state));
        assert_eq!(driver.mesh().triangles.len(), 2);

        // Later frames do not reload again
        assert!(!frame(&mut driver, &state));
        assert!(senders.borrow().is_empty());
    }

    #[test]
    fn test_reset_clears_error_and_restores_cube() {
        let (mut driver, senders) = driver();
        let mut state = AppState::new();
        state.apply(UserCommand::UseCustomModel("http://h/a.glb".into()));
        frame(&mut driver, &state);
        complete(&senders, 0, Ok(one_triangle()));
        frame(&mut driver, &state);

        state.apply(UserCommand::UseCustomModel("http://h/b.glb".into()));
        frame(&mut driver, &state);
        complete(&senders, 0, Err(ModelError::Empty));
        frame(&mut driver, &state);
        assert!(driver.load_error().is_some());
        assert_eq!(driver.mesh().triangles.len(), 1);

        state.apply(UserCommand::ResetModel);
        assert!(frame(&mut driver, &state));
        assert!(driver.load_error().is_none());
        assert_eq!(driver.mesh().triangles.len(), 12);
    }
}
