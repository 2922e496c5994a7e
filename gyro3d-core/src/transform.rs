/// Rotation state, user offsets and composition into the render transform
use nalgebra::{Matrix4, Vector3};

/// Render-space axis selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Rotation around the three render-space axes (in radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RenderRotation {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn get(&self, axis: Axis) -> f32 {
        self.as_array()[axis.index()]
    }

    /// Add `delta` radians around a single axis
    pub fn rotate(&mut self, axis: Axis, delta: f32) {
        match axis {
            Axis::X => self.x += delta,
            Axis::Y => self.y += delta,
            Axis::Z => self.z += delta,
        }
    }

    /// Element-wise sum, no wrapping
    pub fn add(&self, other: &RenderRotation) -> RenderRotation {
        RenderRotation::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Default for RenderRotation {
    fn default() -> Self {
        Self::zero()
    }
}

/// Rotation and scale adjustments made by the user, independent of telemetry.
///
/// Offsets accumulate across repeated commands and survive reconnects and
/// model swaps. Angles are never wrapped into a canonical range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserOffset {
    pub rotation: RenderRotation,
    pub scale: f32,
}

impl UserOffset {
    pub fn new() -> Self {
        Self {
            rotation: RenderRotation::zero(),
            scale: 1.0,
        }
    }

    pub fn rotate_axis(&mut self, axis: Axis, delta: f32) {
        self.rotation.rotate(axis, delta);
    }

    /// No floor or ceiling: zero and negative scales are the caller's concern
    pub fn scale_by(&mut self, delta: f32) {
        self.scale += delta;
    }
}

impl Default for UserOffset {
    fn default() -> Self {
        Self::new()
    }
}

/// Final rotation and uniform scale applied to the displayed geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTransform {
    pub rotation: RenderRotation,
    pub scale: f32,
}

impl RenderTransform {
    /// Replace values the rasterizer cannot use: non-finite angles become 0
    /// and a non-finite scale becomes 1.
    pub fn sanitized(&self) -> RenderTransform {
        let finite_or = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        RenderTransform {
            rotation: RenderRotation::new(
                finite_or(self.rotation.x, 0.0),
                finite_or(self.rotation.y, 0.0),
                finite_or(self.rotation.z, 0.0),
            ),
            scale: finite_or(self.scale, 1.0),
        }
    }
}

impl Default for RenderTransform {
    fn default() -> Self {
        compose(&RenderRotation::zero(), &UserOffset::new())
    }
}

/// Merge the telemetry base orientation with the user offset.
///
/// Rotation is summed per axis; scale comes from the offset alone.
pub fn compose(base: &RenderRotation, offset: &UserOffset) -> RenderTransform {
    RenderTransform {
        rotation: base.add(&offset.rotation),
        scale: offset.scale,
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Create a rotation matrix from a rotation state
    pub fn rotation_matrix(rotation: &RenderRotation) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.z));

        // Apply rotations in order: Z, Y, X
        rz * ry * rx
    }

    pub fn scale_matrix(scale: f32) -> Matrix4<f32> {
        Matrix4::new_scaling(scale)
    }

    /// Model matrix for a composed transform: scale first, then rotate
    pub fn model_matrix(transform: &RenderTransform) -> Matrix4<f32> {
        let transform = transform.sanitized();
        Self::rotation_matrix(&transform.rotation) * Self::scale_matrix(transform.scale)
    }
}
