#![forbid(unsafe_code)]

use gantry_engine::{
    Engine, EngineError, EngineEvent, EventKind, EventListener, MediaDescriptor, Result,
};

const STATE_MAGIC: [u8; 4] = *b"GVST";
const STATE_VERSION: u16 = 2;

/// One serial heartbeat line per this many executed steps.
const HEARTBEAT_INTERVAL: u64 = 32;

/// Deterministic reference engine.
///
/// Not an emulator: a counter machine whose whole run-state (registers,
/// serial log, RAM) round-trips through an opaque versioned blob, so the
/// front-end orchestration can be exercised end to end without the real
/// engine. Identical inputs always produce identical serial output and
/// RAM contents.
pub struct ReferenceVm {
    powered: bool,
    running: bool,
    booted: bool,
    acc: u64,
    ip: u64,
    ram: Vec<u8>,
    serial: Vec<u8>,
    serial_cursor: usize,
    optical: Option<MediaDescriptor>,
    listeners: Vec<(EventKind, EventListener)>,
}

impl ReferenceVm {
    pub fn new(ram_bytes: usize) -> Self {
        Self {
            powered: false,
            running: false,
            booted: false,
            acc: 0,
            ip: 0,
            ram: vec![0u8; ram_bytes],
            serial: Vec::new(),
            serial_cursor: 0,
            optical: None,
            listeners: Vec::new(),
        }
    }

    /// Execute up to `steps` steps. Returns the number executed, which is
    /// zero whenever the machine is not running.
    pub fn step(&mut self, steps: u64) -> u64 {
        if !self.running {
            return 0;
        }
        for _ in 0..steps {
            self.step_once();
        }
        steps
    }

    fn step_once(&mut self) {
        let len = self.ram.len() as u64;
        let addr = (self.ip.wrapping_mul(13).wrapping_add(self.acc) % len) as usize;
        let val = self.ram[addr].wrapping_add((self.acc as u8) ^ (self.ip as u8));
        self.ram[addr] = val;
        self.acc = self.acc.wrapping_add(u64::from(val) + 1);
        self.ip = self.ip.wrapping_add(1);
        if self.ip % HEARTBEAT_INTERVAL == 0 {
            let line = format!("[{:>10}] acc={:016x}\r\n", self.ip, self.acc);
            self.serial.extend_from_slice(line.as_bytes());
        }
    }

    /// Serial bytes produced since the previous call.
    pub fn take_output(&mut self) -> Vec<u8> {
        let out = self.serial[self.serial_cursor..].to_vec();
        self.serial_cursor = self.serial.len();
        out
    }

    /// Entire serial log since power-on (or since the restored state's
    /// power-on).
    pub fn serial_output(&self) -> &[u8] {
        &self.serial
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn optical_media(&self) -> Option<&MediaDescriptor> {
        self.optical.as_ref()
    }

    fn emit(&mut self, event: &EngineEvent) {
        let kind = event.kind();
        for (registered, listener) in self.listeners.iter_mut() {
            if *registered == kind {
                listener(event);
            }
        }
    }
}

impl Engine for ReferenceVm {
    fn add_listener(&mut self, kind: EventKind, listener: EventListener) {
        self.listeners.push((kind, listener));
    }

    fn power_on(&mut self) {
        if self.powered {
            return;
        }
        if self.ram.is_empty() {
            self.emit(&EngineEvent::Error {
                message: "guest memory size is zero".into(),
            });
            return;
        }
        self.powered = true;
        self.emit(&EngineEvent::Ready);
    }

    fn run(&mut self) {
        if !self.powered || self.running {
            return;
        }
        self.running = true;
        if !self.booted {
            self.booted = true;
            let banner = match &self.optical {
                Some(media) => format!("gantry-vm: boot from optical media {}\r\n", media.url),
                None => "gantry-vm: boot with blank memory\r\n".to_string(),
            };
            self.serial.extend_from_slice(banner.as_bytes());
        }
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn save_state(&mut self) -> Result<Vec<u8>> {
        if !self.powered {
            return Err(EngineError::NotPoweredOn);
        }
        let compressed = lz4_flex::block::compress(&self.ram);
        let mut blob = Vec::with_capacity(47 + self.serial.len() + compressed.len());
        blob.extend_from_slice(&STATE_MAGIC);
        blob.extend_from_slice(&STATE_VERSION.to_le_bytes());
        blob.extend_from_slice(&self.acc.to_le_bytes());
        blob.extend_from_slice(&self.ip.to_le_bytes());
        blob.push(u8::from(self.booted));
        // Section lengths are u64: guest RAM can exceed u32::MAX bytes.
        blob.extend_from_slice(&(self.serial.len() as u64).to_le_bytes());
        blob.extend_from_slice(&self.serial);
        blob.extend_from_slice(&(self.ram.len() as u64).to_le_bytes());
        blob.extend_from_slice(&(compressed.len() as u64).to_le_bytes());
        blob.extend_from_slice(&compressed);
        Ok(blob)
    }

    fn restore_state(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.powered {
            return Err(EngineError::NotPoweredOn);
        }
        let mut cur = bytes;
        let magic = take(&mut cur, 4)?;
        if magic != STATE_MAGIC {
            return Err(EngineError::Import("bad state magic".into()));
        }
        let version = take_u16(&mut cur)?;
        if version != STATE_VERSION {
            return Err(EngineError::Import(format!(
                "unsupported state version {version}"
            )));
        }
        let acc = take_u64(&mut cur)?;
        let ip = take_u64(&mut cur)?;
        let booted = take_u8(&mut cur)? != 0;
        let serial_len = take_len(&mut cur)?;
        let serial = take(&mut cur, serial_len)?.to_vec();
        let ram_len = take_u64(&mut cur)?;
        if ram_len != self.ram.len() as u64 {
            return Err(EngineError::Import(format!(
                "ram size mismatch: state has {ram_len} bytes, machine has {} bytes",
                self.ram.len()
            )));
        }
        let compressed_len = take_len(&mut cur)?;
        let compressed = take(&mut cur, compressed_len)?;
        let ram = lz4_flex::block::decompress(compressed, self.ram.len())
            .map_err(|err| EngineError::Import(format!("ram payload: {err}")))?;

        self.acc = acc;
        self.ip = ip;
        self.booted = booted;
        self.serial = serial;
        self.serial_cursor = self.serial.len();
        self.ram = ram;
        Ok(())
    }

    fn load_cdrom(&mut self, media: MediaDescriptor) -> Result<()> {
        if !self.powered {
            return Err(EngineError::NotPoweredOn);
        }
        if media.url.is_empty() {
            return Err(EngineError::Media("empty media url".into()));
        }
        self.optical = Some(media);
        Ok(())
    }
}

fn take<'a>(cur: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if cur.len() < len {
        return Err(EngineError::Import("truncated state blob".into()));
    }
    let (head, rest) = cur.split_at(len);
    *cur = rest;
    Ok(head)
}

fn take_u8(cur: &mut &[u8]) -> Result<u8> {
    Ok(take(cur, 1)?[0])
}

fn take_u16(cur: &mut &[u8]) -> Result<u16> {
    let bytes = take(cur, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn take_u64(cur: &mut &[u8]) -> Result<u64> {
    let bytes = take(cur, 8)?;
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| EngineError::Import("truncated state blob".into()))?;
    Ok(u64::from_le_bytes(arr))
}

fn take_len(cur: &mut &[u8]) -> Result<usize> {
    usize::try_from(take_u64(cur)?)
        .map_err(|_| EngineError::Import("state section too large for this machine".into()))
}
