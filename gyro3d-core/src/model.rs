//! Model references and decoding of model files into meshes.

use thiserror::Error;

use crate::geometry::Mesh;
use crate::{glb, stl};

/// Edge length of the placeholder cube
pub const DEFAULT_CUBE_SIZE: f32 = 1.0;

/// Radius loaded models are normalised to, matching the placeholder cube
pub const MODEL_FIT_RADIUS: f32 = 0.866;

/// Errors produced while fetching or decoding a model file.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The file ended before a complete structure was read
    #[error("model data truncated while reading {0}")]
    Truncated(&'static str),

    /// The file was read but its contents are invalid
    #[error("malformed model: {0}")]
    Malformed(String),

    /// The model uses a glTF feature this loader does not handle
    #[error("unsupported model feature: {0}")]
    Unsupported(String),

    /// Decoding succeeded but produced no triangles
    #[error("model contains no triangles")]
    Empty,

    /// Fetching the model bytes failed
    #[error("failed to fetch model from {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// The geometry currently selected for display.
///
/// Only explicit user actions change this; telemetry and connection state
/// never do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveModel {
    #[default]
    Default,
    Custom(String),
}

impl ActiveModel {
    pub fn is_custom(&self) -> bool {
        matches!(self, ActiveModel::Custom(_))
    }
}

/// Decode model bytes, sniffing binary glTF first and falling back to STL.
///
/// The result is recentred and scaled to the placeholder cube's extent.
pub fn decode_model(data: &[u8]) -> Result<Mesh, ModelError> {
    let mut mesh = if glb::is_glb(data) {
        glb::parse_glb(data)?
    } else {
        stl::parse_stl(data)?
    };

    if mesh.is_empty() {
        return Err(ModelError::Empty);
    }
    mesh.fit_to_sphere(MODEL_FIT_RADIUS);
    tracing::debug!(triangles = mesh.triangles.len(), "Decoded model");
    Ok(mesh)
}
