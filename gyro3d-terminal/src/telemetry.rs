//! Live telemetry stream: one SSE connection at a time.

use gyro3d_core::sse::SseParser;
use gyro3d_core::{
    ConnectionState, ConnectionStatus, Endpoint, EndpointError, HttpError, OrientationSample,
    Outcome, TelemetryEvent, TelemetryMessage,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::net;

/// Path of the event stream below the endpoint URL.
pub const EVENTS_PATH: &str = "events";

/// Owner of the single live telemetry connection.
///
/// The stream runs as a background task that reports generation-tagged
/// [`TelemetryMessage`]s over a channel. The render loop calls [`drain`]
/// once per frame; messages from a closed instance are discarded there.
///
/// [`drain`]: TelemetryConnection::drain
pub struct TelemetryConnection {
    status: ConnectionStatus,
    endpoint: Option<Endpoint>,
    task: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<TelemetryMessage>,
    events_rx: mpsc::UnboundedReceiver<TelemetryMessage>,
}

impl TelemetryConnection {
    /// Construct without connecting; nothing happens until `set_endpoint`.
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            status: ConnectionStatus::new(),
            endpoint: None,
            task: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.status.last_error()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Whether a transport task currently exists
    pub fn has_transport(&self) -> bool {
        self.task.is_some()
    }

    /// Apply a new endpoint: close the current stream, then open a new one.
    ///
    /// The previous transport is fully released before the new connection
    /// starts. An unparsable URL leaves the connection `Errored`.
    pub async fn set_endpoint(&mut self, url: &str) -> Result<(), EndpointError> {
        self.close_transport().await;

        let endpoint = match Endpoint::parse(url) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Rejected telemetry endpoint");
                self.endpoint = None;
                self.status.fail(e.to_string());
                return Err(e);
            }
        };

        let generation = self.status.begin_connecting();
        tracing::info!(url = %endpoint.url(EVENTS_PATH), generation, "Connecting telemetry stream");
        self.task = Some(tokio::spawn(stream_events(
            endpoint.clone(),
            generation,
            self.events_tx.clone(),
        )));
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Explicit teardown: close the transport and go `Disconnected`.
    pub async fn close(&mut self) {
        self.close_transport().await;
        self.status.disconnect();
    }

    async fn close_transport(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Wait until the task's socket has actually been dropped
            let _ = task.await;
            tracing::debug!(generation = self.status.generation(), "Closed telemetry stream");
        }
    }

    /// Apply every queued message in arrival order and return the samples
    /// to show, oldest first. Malformed payloads are dropped here.
    pub fn drain(&mut self) -> Vec<OrientationSample> {
        let mut samples = Vec::new();
        while let Ok(message) = self.events_rx.try_recv() {
            match self.status.accept(message) {
                Outcome::Stale => tracing::trace!("Discarded stale telemetry message"),
                Outcome::Opened => tracing::info!("Telemetry stream open"),
                Outcome::Sample(sample) => samples.push(sample),
                Outcome::Dropped(reason) => {
                    tracing::warn!(%reason, "Dropping malformed telemetry sample")
                }
                Outcome::Failed(reason) => {
                    tracing::error!(%reason, "Telemetry stream failed");
                    if let Some(task) = self.task.take() {
                        task.abort();
                    }
                }
            }
        }
        samples
    }
}

impl Default for TelemetryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TelemetryConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Background task: open the stream, decode events, report them.
async fn stream_events(
    endpoint: Endpoint,
    generation: u64,
    tx: mpsc::UnboundedSender<TelemetryMessage>,
) {
    let reason = match read_stream(&endpoint, generation, &tx).await {
        Ok(()) => "stream closed by server".to_string(),
        Err(e) => e.to_string(),
    };
    let _ = tx.send(TelemetryMessage {
        generation,
        event: TelemetryEvent::Failed(reason),
    });
}

async fn read_stream(
    endpoint: &Endpoint,
    generation: u64,
    tx: &mpsc::UnboundedSender<TelemetryMessage>,
) -> Result<(), HttpError> {
    let headers = [
        ("Accept", "text/event-stream".to_string()),
        ("Cache-Control", "no-cache".to_string()),
    ];
    let mut response = net::send(endpoint, "GET", EVENTS_PATH, &headers, &[]).await?;

    if response.head.status != 200 {
        return Err(HttpError::Status {
            status: response.head.status,
            reason: response.head.reason.clone(),
        });
    }
    if let Some(content_type) = response.head.content_type() {
        if !content_type.starts_with("text/event-stream") {
            return Err(HttpError::Malformed(format!(
                "unexpected content type {:?}",
                content_type
            )));
        }
    }

    let send = |event| tx.send(TelemetryMessage { generation, event }).is_ok();
    if !send(TelemetryEvent::Opened) {
        return Ok(());
    }

    let mut parser = SseParser::new();
    let mut sample_count: u64 = 0;
    while let Some(bytes) = response.body.next_chunk().await? {
        parser.push_data(&bytes);
        while let Some(event) = parser.next_event() {
            let Some(telemetry) = TelemetryEvent::from_sse(&event) else {
                tracing::trace!(event = %event.event, "Ignoring non-data event");
                continue;
            };
            if !send(telemetry) {
                // Receiver gone: the app is shutting down
                return Ok(());
            }
            sample_count += 1;
            if sample_count % 1000 == 0 {
                tracing::debug!(sample_count, generation, "Telemetry events received");
            }
        }
    }
    Ok(())
}
