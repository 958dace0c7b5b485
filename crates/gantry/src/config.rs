use serde::Serialize;

/// Engine asset location used when `GANTRY_ENGINE_URL` is unset, and the
/// fallback substituted when the reachability probe fails.
pub const DEFAULT_ENGINE_URL: &str = "/assets/engine.wasm";
pub const DEFAULT_BIOS_URL: &str = "/firmware/bios.bin";
pub const DEFAULT_VGA_BIOS_URL: &str = "/firmware/vgabios.bin";
pub const DEFAULT_STATE_URL: &str = "/images/boot-state.bin";
pub const DEFAULT_CDROM_URL: &str = "/images/boot.iso";

pub const DEFAULT_MEMORY_BYTES: usize = 512 * 1024 * 1024;
pub const DEFAULT_VGA_MEMORY_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_NET_RELAY_URL: &str = "ws://127.0.0.1:8080/l2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootDevice {
    Cdrom,
    Hdd,
    Floppy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetModel {
    Virtio,
}

/// Network device handed to the engine. The relay is dialed by the engine,
/// never by this layer; the URL is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetDevice {
    pub model: NetModel,
    pub relay_url: String,
}

impl Default for NetDevice {
    fn default() -> Self {
        Self {
            model: NetModel::Virtio,
            relay_url: DEFAULT_NET_RELAY_URL.to_string(),
        }
    }
}

/// Static boot-time configuration for one engine session.
///
/// Built once from environment overrides (see [`BootConfig::from_env`]),
/// then consumed by engine construction. Nothing mutates it afterwards
/// except the probe fallback, which may rewrite `engine_url` before the
/// engine is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootConfig {
    /// Location of the engine's own binary asset.
    pub engine_url: String,
    /// Primary firmware image.
    pub bios_url: String,
    /// Video firmware image.
    pub vga_bios_url: String,
    /// Well-known location of the boot run-state file. The bootstrap tries
    /// this first and falls back to optical boot when it cannot be loaded.
    pub state_url: String,
    /// Optical image used for a fresh boot.
    pub cdrom_url: String,
    /// Guest memory size in bytes.
    pub memory_bytes: usize,
    /// Video memory size in bytes.
    pub vga_memory_bytes: usize,
    /// Devices tried in order at power-on.
    pub boot_order: [BootDevice; 3],
    pub net: NetDevice,
    /// Always false: execution starts only after the state-restore attempt
    /// has settled, so a restored machine never runs twice from reset.
    pub autostart: bool,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            bios_url: DEFAULT_BIOS_URL.to_string(),
            vga_bios_url: DEFAULT_VGA_BIOS_URL.to_string(),
            state_url: DEFAULT_STATE_URL.to_string(),
            cdrom_url: DEFAULT_CDROM_URL.to_string(),
            memory_bytes: DEFAULT_MEMORY_BYTES,
            vga_memory_bytes: DEFAULT_VGA_MEMORY_BYTES,
            boot_order: [BootDevice::Cdrom, BootDevice::Hdd, BootDevice::Floppy],
            net: NetDevice::default(),
            autostart: false,
        }
    }
}

impl BootConfig {
    /// Build the session configuration from environment overrides.
    ///
    /// Recognized variables, each optional:
    /// - `GANTRY_ENGINE_URL`
    /// - `GANTRY_BIOS_URL`
    /// - `GANTRY_VGA_BIOS_URL`
    /// - `GANTRY_STATE_URL`
    /// - `GANTRY_CDROM_URL`
    ///
    /// Everything else (memory sizes, boot order, network device,
    /// autostart) uses the documented defaults.
    pub fn from_env() -> Self {
        Self {
            engine_url: env_or("GANTRY_ENGINE_URL", DEFAULT_ENGINE_URL),
            bios_url: env_or("GANTRY_BIOS_URL", DEFAULT_BIOS_URL),
            vga_bios_url: env_or("GANTRY_VGA_BIOS_URL", DEFAULT_VGA_BIOS_URL),
            state_url: env_or("GANTRY_STATE_URL", DEFAULT_STATE_URL),
            cdrom_url: env_or("GANTRY_CDROM_URL", DEFAULT_CDROM_URL),
            ..Self::default()
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
