#![forbid(unsafe_code)]

mod error;

pub use crate::error::{EngineError, Result};

/// Lifecycle events an engine reports through registered listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Initialization finished; the engine accepts state and run control.
    Ready,
    /// An engine-internal fault. The message is engine-specific text.
    Error { message: String },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Ready => EventKind::Ready,
            EngineEvent::Error { .. } => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Error,
}

pub type EventListener = Box<dyn FnMut(&EngineEvent)>;

/// Removable media handed to [`Engine::load_cdrom`]. The engine fetches and
/// interprets the image itself; this layer only carries the location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub url: String,
}

impl MediaDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Capability surface of an external machine engine.
///
/// The engine owns CPU interpretation, device models, and its run-state
/// format; run-state bytes are opaque to callers. Construction is inert:
/// listeners registered before [`Engine::power_on`] are guaranteed to
/// observe the [`EngineEvent::Ready`] (or [`EngineEvent::Error`]) emitted
/// by initialization.
pub trait Engine {
    fn add_listener(&mut self, kind: EventKind, listener: EventListener);

    /// Drive initialization to completion. Emits `Ready` on success or
    /// `Error` on a fault via the listeners; does not start execution.
    fn power_on(&mut self);

    /// Start or resume execution. No-op while already running.
    fn run(&mut self);

    /// Pause execution. No-op while already stopped.
    fn stop(&mut self);

    /// Export the full run-state as an opaque blob.
    fn save_state(&mut self) -> Result<Vec<u8>>;

    /// Replace the current run-state with a previously exported blob.
    /// Implementations validate the blob and leave existing state intact
    /// when it is rejected.
    fn restore_state(&mut self, bytes: &[u8]) -> Result<()>;

    /// Attach removable optical media to boot from.
    fn load_cdrom(&mut self, media: MediaDescriptor) -> Result<()>;
}
