use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use gantry_engine::{Engine, EngineError, EngineEvent, EventKind, MediaDescriptor};
use thiserror::Error;

use crate::config::{BootConfig, DEFAULT_ENGINE_URL};
use crate::controls::ControlSurface;
use crate::fetch::Transport;
use crate::{loader, probe};

/// Run condition of the session's engine as observed by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Engine constructed and ready; execution not started yet.
    Constructed,
    /// Boot run-state fetch/import in progress.
    AwaitingState,
    Running,
    Stopped,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("engine construction failed: {0}")]
    Construct(#[source] EngineError),

    #[error("engine failed to power on: {message}")]
    PowerOn { message: String },

    #[error("fresh boot failed: {0}")]
    Media(#[source] EngineError),
}

/// Capability set for [`bootstrap`].
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Probe the engine asset before construction and fall back to the
    /// default asset path when it is unreachable.
    pub probe_engine_asset: bool,
    /// Directory saved run-state artifacts are written into.
    pub download_dir: PathBuf,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            probe_engine_asset: true,
            download_dir: PathBuf::from("."),
        }
    }
}

/// One engine session: the engine handle plus the per-session state the
/// orchestration and the run-state controls operate on. Replaces the
/// process-wide engine handle and module-level flags of earlier designs
/// with owned state.
#[derive(Debug)]
pub struct Session<E> {
    pub(crate) engine: E,
    pub(crate) config: BootConfig,
    pub(crate) run_state: RunState,
    pub(crate) controls_installed: bool,
    pub(crate) state_op_in_flight: Rc<Cell<bool>>,
    pub(crate) restore_selection: Option<PathBuf>,
    pub(crate) download_dir: PathBuf,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E, config: BootConfig, download_dir: PathBuf) -> Self {
        Self {
            engine,
            config,
            run_state: RunState::Constructed,
            controls_installed: false,
            state_op_in_flight: Rc::new(Cell::new(false)),
            restore_selection: None,
            download_dir,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn controls_installed(&self) -> bool {
        self.controls_installed
    }

    pub fn state_op_in_flight(&self) -> bool {
        self.state_op_in_flight.get()
    }

    /// Path most recently selected for restore, until the restore consumes
    /// it. Cleared so re-selecting the same file later still works.
    pub fn restore_selection(&self) -> Option<&PathBuf> {
        self.restore_selection.as_ref()
    }

    /// Install the save/restore controls on the surface. At most once per
    /// session; later calls are no-ops.
    pub fn install_controls<S: ControlSurface>(&mut self, surface: &mut S) {
        if self.controls_installed {
            tracing::debug!("run-state controls already installed");
            return;
        }
        surface.install_save_control();
        surface.install_restore_control();
        self.controls_installed = true;
        tracing::info!("run-state controls installed");
    }
}

/// Bring up one engine session: probe (optional), construct, power on,
/// install controls, then either restore the boot run-state or fall back
/// to a fresh optical boot. On success the returned session is running.
pub async fn bootstrap<E, F, T, S>(
    factory: F,
    transport: &T,
    surface: &mut S,
    mut config: BootConfig,
    options: BootstrapOptions,
) -> Result<Session<E>, BootstrapError>
where
    E: Engine,
    F: FnOnce(&BootConfig) -> Result<E, EngineError>,
    T: Transport + ?Sized,
    S: ControlSurface,
{
    // Execution must not start until the state-restore attempt has settled.
    config.autostart = false;

    if options.probe_engine_asset
        && !probe::engine_asset_reachable(transport, &config.engine_url).await
    {
        tracing::warn!("engine asset unreachable; using fallback {DEFAULT_ENGINE_URL}");
        config.engine_url = DEFAULT_ENGINE_URL.to_string();
    }

    let mut engine = factory(&config).map_err(BootstrapError::Construct)?;
    tracing::info!(
        "engine constructed ({} MiB guest memory, engine asset {})",
        config.memory_bytes / (1024 * 1024),
        config.engine_url
    );

    let ready = Rc::new(Cell::new(false));
    let ready_flag = Rc::clone(&ready);
    engine.add_listener(EventKind::Ready, Box::new(move |_| ready_flag.set(true)));

    let power_fault: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let fault_slot = Rc::clone(&power_fault);
    engine.add_listener(
        EventKind::Error,
        Box::new(move |event| {
            if let EngineEvent::Error { message } = event {
                tracing::error!("engine fault: {message}");
                let mut slot = fault_slot.borrow_mut();
                if slot.is_none() {
                    *slot = Some(message.clone());
                }
            }
        }),
    );

    engine.power_on();
    if !ready.get() {
        let message = power_fault
            .borrow_mut()
            .take()
            .unwrap_or_else(|| "engine never became ready".to_string());
        return Err(BootstrapError::PowerOn { message });
    }
    tracing::info!("engine ready");

    let mut session = Session::new(engine, config, options.download_dir);
    session.install_controls(surface);

    session.run_state = RunState::AwaitingState;
    let state_url = session.config.state_url.clone();
    if loader::load_state_from_path(&mut session.engine, transport, &state_url).await {
        session.run_state = RunState::Running;
    } else {
        let cdrom_url = session.config.cdrom_url.clone();
        tracing::info!("no boot run-state; fresh boot from {cdrom_url}");
        session
            .engine
            .load_cdrom(MediaDescriptor::new(cdrom_url))
            .map_err(BootstrapError::Media)?;
        session.engine.run();
        session.run_state = RunState::Running;
    }
    Ok(session)
}
