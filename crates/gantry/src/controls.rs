use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use gantry_engine::{Engine, EngineError};
use thiserror::Error;

use crate::session::{RunState, Session};

/// Fixed name of the saved run-state artifact.
pub const STATE_DOWNLOAD_FILENAME: &str = "gantry-vm-state.bin";

const BUSY_ALERT: &str = "A state operation is already in progress.";

/// User-facing surface the session installs its run-state controls on.
///
/// The production implementation is the terminal front-end; tests record
/// the calls. `alert` is a blocking notification shown for failed state
/// operations.
pub trait ControlSurface {
    fn install_save_control(&mut self);
    fn install_restore_control(&mut self);
    fn alert(&mut self, message: &str);
}

#[derive(Debug, Error)]
pub enum ControlsError {
    #[error("another state operation is in progress")]
    Busy,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("state artifact write failed: {0}")]
    ArtifactWrite(std::io::Error),

    #[error("state file read failed: {0}")]
    FileRead(std::io::Error),
}

/// In-flight marker for one state operation. Dropping it clears the
/// session's flag, including when the owning future is dropped before the
/// operation finishes.
pub(crate) struct StateOpGuard {
    in_flight: Rc<Cell<bool>>,
}

impl Drop for StateOpGuard {
    fn drop(&mut self) {
        self.in_flight.set(false);
    }
}

impl<E: Engine> Session<E> {
    /// At most one state operation may be in flight per session.
    pub(crate) fn try_begin_state_op(&mut self) -> Result<StateOpGuard, ControlsError> {
        if self.state_op_in_flight.get() {
            return Err(ControlsError::Busy);
        }
        self.state_op_in_flight.set(true);
        Ok(StateOpGuard {
            in_flight: Rc::clone(&self.state_op_in_flight),
        })
    }

    /// Save-control activation: export the run-state and write it to the
    /// download directory under [`STATE_DOWNLOAD_FILENAME`]. Failures are
    /// logged and alerted on the surface; the run condition is unchanged
    /// either way.
    pub async fn save_state<S: ControlSurface>(
        &mut self,
        surface: &mut S,
    ) -> Result<(), ControlsError> {
        let _op = match self.try_begin_state_op() {
            Ok(guard) => guard,
            Err(err) => {
                surface.alert(BUSY_ALERT);
                return Err(err);
            }
        };
        let result = self.export_to_artifact().await;
        match result {
            Ok(path) => {
                tracing::info!("run-state saved to {}", path.display());
                Ok(())
            }
            Err(err) => {
                tracing::error!("state save failed: {err}");
                surface.alert(&format!("Error saving state: {err}"));
                Err(err)
            }
        }
    }

    async fn export_to_artifact(&mut self) -> Result<PathBuf, ControlsError> {
        let bytes = self.engine.save_state()?;
        tracing::info!("exported run-state ({} bytes)", bytes.len());
        let path = self.download_dir.join(STATE_DOWNLOAD_FILENAME);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(ControlsError::ArtifactWrite)?;
        Ok(path)
    }

    /// Restore-control activation with `path` as the selected file: stop
    /// the engine, read the file, import the bytes, and resume execution
    /// on success. On any failure the engine stays stopped and the failure
    /// is alerted on the surface.
    pub async fn restore_state_from<S: ControlSurface>(
        &mut self,
        surface: &mut S,
        path: PathBuf,
    ) -> Result<(), ControlsError> {
        let _op = match self.try_begin_state_op() {
            Ok(guard) => guard,
            Err(err) => {
                surface.alert(BUSY_ALERT);
                return Err(err);
            }
        };
        self.restore_selection = Some(path.clone());
        let result = self.import_from_file(path).await;
        if let Err(err) = &result {
            tracing::error!("state restore failed: {err}");
            surface.alert(&format!("Error restoring state: {err}"));
        }
        result
    }

    async fn import_from_file(&mut self, path: PathBuf) -> Result<(), ControlsError> {
        self.engine.stop();
        self.run_state = RunState::Stopped;
        let read = tokio::fs::read(&path).await;
        // The selection is consumed by the read either way; clearing it
        // lets the same file be selected again later.
        self.restore_selection = None;
        let bytes = read.map_err(ControlsError::FileRead)?;
        tracing::info!("read state file {} ({} bytes)", path.display(), bytes.len());
        self.engine.restore_state(&bytes)?;
        self.engine.run();
        self.run_state = RunState::Running;
        tracing::info!("run-state restored; execution resumed");
        Ok(())
    }
}
