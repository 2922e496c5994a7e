/// Sensor-space to render-space coordinate mapping
use serde::Deserialize;

use crate::transform::RenderRotation;

/// One orientation reading from the remote gyroscope (radians)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OrientationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl OrientationSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Decode a telemetry payload of the form `{"x": .., "y": .., "z": ..}`
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Map a sensor reading into render-space axes.
///
/// The sensor reports Z as "up" while the renderer uses Y, so the second and
/// third components trade places: `{x, y, z}` becomes `[x, z, y]`. Non-finite
/// values pass through untouched.
pub fn to_render_rotation(sample: &OrientationSample) -> RenderRotation {
    RenderRotation::new(sample.x, sample.z, sample.y)
}
