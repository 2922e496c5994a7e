//! Telemetry events and the connection lifecycle state machine.
//!
//! A connection instance only ever talks to the rest of the program through
//! [`TelemetryMessage`]s tagged with its generation. [`ConnectionStatus`]
//! owns the current generation, so anything sent by an instance that has
//! since been closed is recognised as stale and dropped.

use std::fmt;

use crate::mapping::OrientationSample;
use crate::sse::SseEvent;

/// SSE event name that carries orientation payloads
pub const DATA_EVENT: &str = "data";

/// Lifecycle of the single live telemetry connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Errored => "error",
        };
        f.write_str(label)
    }
}

/// What a connection instance reports about its stream
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// The transport accepted the stream request
    Opened,
    /// A well-formed orientation payload
    Sample(OrientationSample),
    /// A `data` event whose payload failed to decode
    Malformed(String),
    /// The transport failed or the stream ended
    Failed(String),
}

impl TelemetryEvent {
    /// Interpret a decoded SSE frame. Only `data` events carry payloads.
    pub fn from_sse(event: &SseEvent) -> Option<Self> {
        if event.event != DATA_EVENT {
            return None;
        }
        Some(match OrientationSample::from_json(&event.data) {
            Ok(sample) => TelemetryEvent::Sample(sample),
            Err(e) => TelemetryEvent::Malformed(format!("{} in payload {:?}", e, event.data)),
        })
    }
}

/// An event tagged with the generation of the instance that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub generation: u64,
    pub event: TelemetryEvent,
}

/// Result of feeding one message through the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// From a closed instance, or not valid in the current state
    Stale,
    Opened,
    Sample(OrientationSample),
    /// Payload dropped; the last good rotation stays in effect
    Dropped(String),
    /// Entered `Errored`; the caller must release the transport
    Failed(String),
}

/// Connection state plus the generation counter guarding it.
#[derive(Debug, Default)]
pub struct ConnectionStatus {
    state: ConnectionState,
    generation: u64,
    last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a new instance. The caller has already closed the previous one.
    /// Returns the generation the new instance must tag its messages with.
    pub fn begin_connecting(&mut self) -> u64 {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.generation
    }

    /// Explicit teardown; later messages from the old instance become stale
    pub fn disconnect(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
    }

    /// Fail without a transport, e.g. for an endpoint that does not parse
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.generation += 1;
        self.state = ConnectionState::Errored;
        self.last_error = Some(reason.into());
    }

    /// Apply one message to the state machine.
    pub fn accept(&mut self, message: TelemetryMessage) -> Outcome {
        if message.generation != self.generation {
            return Outcome::Stale;
        }

        match (self.state, message.event) {
            (ConnectionState::Connecting, TelemetryEvent::Opened) => {
                self.state = ConnectionState::Open;
                self.last_error = None;
                Outcome::Opened
            }
            (ConnectionState::Open, TelemetryEvent::Sample(sample)) => Outcome::Sample(sample),
            (ConnectionState::Open, TelemetryEvent::Malformed(reason)) => Outcome::Dropped(reason),
            (ConnectionState::Connecting | ConnectionState::Open, TelemetryEvent::Failed(reason)) => {
                self.fail(reason.clone());
                Outcome::Failed(reason)
            }
            _ => Outcome::Stale,
        }
    }
}
