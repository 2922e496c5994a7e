//! Fetching custom models from a URL.

use gyro3d_core::{decode_model, Endpoint, Mesh, ModelError};
use tokio::sync::oneshot;

use crate::net;

/// Where meshes for custom models come from.
///
/// Loads run in the background; the result arrives on the returned receiver.
pub trait ModelSource {
    fn spawn_load(&self, url: String) -> oneshot::Receiver<Result<Mesh, ModelError>>;
}

/// Loads models over HTTP.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpModelLoader;

impl ModelSource for HttpModelLoader {
    fn spawn_load(&self, url: String) -> oneshot::Receiver<Result<Mesh, ModelError>> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = fetch_model(&url).await;
            // The receiver is gone if the model was replaced meanwhile
            let _ = tx.send(result);
        });
        rx
    }
}

/// Download and decode the model at `url`.
pub async fn fetch_model(url: &str) -> Result<Mesh, ModelError> {
    let fetch_error = |reason: String| ModelError::Fetch {
        url: url.to_string(),
        reason,
    };

    let endpoint = Endpoint::parse(url).map_err(|e| fetch_error(e.to_string()))?;
    tracing::info!(%url, "Fetching model");
    let (head, body) = net::get(&endpoint, "")
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    if !head.is_success() {
        return Err(fetch_error(format!("HTTP {} {}", head.status, head.reason)));
    }

    let mesh = decode_model(&body)?;
    tracing::info!(%url, triangles = mesh.triangles.len(), "Model loaded");
    Ok(mesh)
}
