//! Requests to the device outside the telemetry stream: orientation reset
//! and model upload.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use gyro3d_core::http::multipart_file_body;
use gyro3d_core::{Endpoint, HttpError};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::net;

pub const RESET_PATH: &str = "reset";
pub const UPLOAD_PATH: &str = "uploadModel";
/// Where the device serves the most recently uploaded model.
pub const MODEL_PATH: &str = "model.glb";
/// Multipart field carrying the model file.
pub const MODEL_FIELD: &str = "model";

/// A failed model upload. Always recoverable; shown to the user.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("upload failed: {0}")]
    Transport(#[from] HttpError),

    #[error("upload rejected: HTTP {status} {reason}")]
    Rejected { status: u16, reason: String },
}

/// Ask the device to zero its orientation. Fire-and-forget: failures are
/// logged and never reach the UI.
pub fn reset_remote_orientation(endpoint: Endpoint) -> JoinHandle<()> {
    tokio::spawn(async move {
        match net::get(&endpoint, RESET_PATH).await {
            Ok((head, _)) if head.is_success() => {
                tracing::info!(url = %endpoint.url(RESET_PATH), "Remote orientation reset");
            }
            Ok((head, _)) => {
                tracing::warn!(status = head.status, reason = %head.reason, "Reset request rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %endpoint.url(RESET_PATH), "Reset request failed");
            }
        }
    })
}

/// Upload a model file and return the URL it will be served from.
///
/// Only a 2xx status counts as accepted; redirects are not followed.
pub async fn upload_model(endpoint: &Endpoint, path: &Path) -> Result<String, UploadError> {
    let contents = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| MODEL_PATH.to_string());

    let boundary = format!(
        "gyro3d-{:x}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    );
    let body = multipart_file_body(&boundary, MODEL_FIELD, &filename, &contents);
    let headers = [(
        "Content-Type",
        format!("multipart/form-data; boundary={}", boundary),
    )];

    tracing::info!(%filename, bytes = contents.len(), url = %endpoint.url(UPLOAD_PATH), "Uploading model");
    let mut response = net::send(endpoint, "POST", UPLOAD_PATH, &headers, &body).await?;
    // Drain so the server sees a clean close; the content is irrelevant
    let _ = response.body.read_to_end(net::MAX_BODY_LEN).await;

    if !response.head.is_success() {
        return Err(UploadError::Rejected {
            status: response.head.status,
            reason: response.head.reason,
        });
    }
    Ok(endpoint.url(MODEL_PATH))
}
