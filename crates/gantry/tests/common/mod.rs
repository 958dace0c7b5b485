#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use gantry::{ControlSurface, FetchError, Transport};
use gantry_engine::{
    Engine, EngineError, EngineEvent, EventKind, EventListener, MediaDescriptor,
    Result as EngineResult,
};

/// Engine calls in the order the session made them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PowerOn,
    Run,
    Stop,
    Save,
    Restore,
    LoadCdrom(String),
}

/// Scriptable engine double. Construction is inert; `power_on` fires
/// `Ready` (or `Error` when `fail_power_on` is set) into listeners, like
/// the capability contract requires.
pub struct FakeEngine {
    pub calls: Vec<Call>,
    pub powered: bool,
    pub fail_power_on: Option<String>,
    pub save_error: Option<String>,
    pub restore_error: Option<String>,
    pub cdrom_error: Option<String>,
    pub saved_blob: Vec<u8>,
    pub restored_payloads: Vec<Vec<u8>>,
    listeners: Vec<(EventKind, EventListener)>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            powered: false,
            fail_power_on: None,
            save_error: None,
            restore_error: None,
            cdrom_error: None,
            saved_blob: b"fake-run-state".to_vec(),
            restored_payloads: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

impl std::fmt::Debug for FakeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeEngine")
            .field("calls", &self.calls)
            .field("powered", &self.powered)
            .field("fail_power_on", &self.fail_power_on)
            .field("save_error", &self.save_error)
            .field("restore_error", &self.restore_error)
            .field("cdrom_error", &self.cdrom_error)
            .field("saved_blob", &self.saved_blob)
            .field("restored_payloads", &self.restored_payloads)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl FakeEngine {
    fn emit(&mut self, event: &EngineEvent) {
        let kind = event.kind();
        for (registered, listener) in self.listeners.iter_mut() {
            if *registered == kind {
                listener(event);
            }
        }
    }

    pub fn calls_of(&self, wanted: &Call) -> usize {
        self.calls.iter().filter(|call| *call == wanted).count()
    }
}

impl Engine for FakeEngine {
    fn add_listener(&mut self, kind: EventKind, listener: EventListener) {
        self.listeners.push((kind, listener));
    }

    fn power_on(&mut self) {
        self.calls.push(Call::PowerOn);
        match self.fail_power_on.clone() {
            Some(message) => self.emit(&EngineEvent::Error { message }),
            None => {
                self.powered = true;
                self.emit(&EngineEvent::Ready);
            }
        }
    }

    fn run(&mut self) {
        self.calls.push(Call::Run);
    }

    fn stop(&mut self) {
        self.calls.push(Call::Stop);
    }

    fn save_state(&mut self) -> EngineResult<Vec<u8>> {
        self.calls.push(Call::Save);
        match &self.save_error {
            Some(message) => Err(EngineError::Export(message.clone())),
            None => Ok(self.saved_blob.clone()),
        }
    }

    fn restore_state(&mut self, bytes: &[u8]) -> EngineResult<()> {
        self.calls.push(Call::Restore);
        match &self.restore_error {
            Some(message) => Err(EngineError::Import(message.clone())),
            None => {
                self.restored_payloads.push(bytes.to_vec());
                Ok(())
            }
        }
    }

    fn load_cdrom(&mut self, media: MediaDescriptor) -> EngineResult<()> {
        self.calls.push(Call::LoadCdrom(media.url.clone()));
        match &self.cdrom_error {
            Some(message) => Err(EngineError::Media(message.clone())),
            None => Ok(()),
        }
    }
}

enum FakeResponse {
    Body(Vec<u8>),
    Status(u16, &'static str),
}

/// Transport double with scripted per-path responses. Unknown paths
/// answer 404; every request is recorded.
pub struct FakeTransport {
    responses: HashMap<String, FakeResponse>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_body(mut self, path: &str, body: &[u8]) -> Self {
        self.responses
            .insert(path.to_string(), FakeResponse::Body(body.to_vec()));
        self
    }

    pub fn with_status(mut self, path: &str, status: u16, reason: &'static str) -> Self {
        self.responses
            .insert(path.to_string(), FakeResponse::Status(status, reason));
        self
    }

    pub fn recorded(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, method: &str, path: &str) {
        self.requests.lock().unwrap().push(format!("{method} {path}"));
    }

    fn lookup(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        match self.responses.get(path) {
            Some(FakeResponse::Body(body)) => Ok(body.clone()),
            Some(FakeResponse::Status(status, reason)) => Err(FetchError::Status {
                url: path.to_string(),
                status: *status,
                reason: reason.to_string(),
            }),
            None => Err(FetchError::Status {
                url: path.to_string(),
                status: 404,
                reason: "Not Found".to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn head(&self, path: &str) -> Result<(), FetchError> {
        self.record("HEAD", path);
        self.lookup(path).map(|_| ())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.record("GET", path);
        self.lookup(path)
    }
}

/// Control surface double recording installs and alerts.
#[derive(Default)]
pub struct RecordingSurface {
    pub save_controls: usize,
    pub restore_controls: usize,
    pub alerts: Vec<String>,
}

impl ControlSurface for RecordingSurface {
    fn install_save_control(&mut self) {
        self.save_controls += 1;
    }

    fn install_restore_control(&mut self) {
        self.restore_controls += 1;
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}
