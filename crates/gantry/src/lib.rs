#![forbid(unsafe_code)]

//! Session front-end for an external x86 machine engine.
//!
//! gantry owns none of the emulation. The engine (consumed through
//! [`gantry_engine::Engine`]) interprets CPU and devices and defines the
//! run-state blob format; this crate is the orchestration around it:
//!
//! - [`BootConfig`]: boot-time configuration built from environment overrides
//! - [`bootstrap`]: probe, construct, power on, then restore-or-fresh-boot
//! - [`load_state_from_path`]: fetch + import + run, normalized to `bool`
//! - [`Session`]: per-session state plus the save/restore run-state controls
//! - [`Transport`]: byte-source seam (HTTP via reqwest, or a local directory)
//!
//! The terminal front-end in `src/main.rs` wires the reference engine from
//! `gantry-vm` to these pieces.

mod config;
mod controls;
mod fetch;
mod loader;
mod probe;
mod session;

pub use config::{
    BootConfig, BootDevice, NetDevice, NetModel, DEFAULT_BIOS_URL, DEFAULT_CDROM_URL,
    DEFAULT_ENGINE_URL, DEFAULT_MEMORY_BYTES, DEFAULT_NET_RELAY_URL, DEFAULT_STATE_URL,
    DEFAULT_VGA_BIOS_URL, DEFAULT_VGA_MEMORY_BYTES,
};
pub use controls::{ControlSurface, ControlsError, STATE_DOWNLOAD_FILENAME};
pub use fetch::{FetchError, FsTransport, HttpTransport, Transport};
pub use loader::load_state_from_path;
pub use probe::engine_asset_reachable;
pub use session::{bootstrap, BootstrapError, BootstrapOptions, RunState, Session};
