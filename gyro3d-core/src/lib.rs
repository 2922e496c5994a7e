/// gyro3d Core Library - Telemetry-driven orientation pipeline
///
/// This library provides the stateless core: sensor-to-render coordinate
/// mapping, transform composition, the connection state machine, stream and
/// HTTP parsing, and model decoding (GLB and STL) into meshes.

pub mod geometry;
pub mod glb;
pub mod http;
pub mod mapping;
pub mod model;
pub mod projection;
pub mod sse;
pub mod state;
pub mod stl;
pub mod telemetry;
pub mod transform;

// Re-export commonly used types
pub use geometry::{Mesh, Triangle, Vertex};
pub use http::{Endpoint, EndpointError, HttpError};
pub use mapping::{to_render_rotation, OrientationSample};
pub use model::{decode_model, ActiveModel, ModelError};
pub use projection::Camera;
pub use sse::{SseEvent, SseParser};
pub use state::{AppState, UserCommand};
pub use telemetry::{ConnectionState, ConnectionStatus, Outcome, TelemetryEvent, TelemetryMessage};
pub use transform::{compose, Axis, RenderRotation, RenderTransform, Transform, UserOffset};
