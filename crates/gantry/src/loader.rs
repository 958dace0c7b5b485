use std::io::Read;

use gantry_engine::Engine;

use crate::fetch::Transport;

const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// Fetch a run-state file, import it, and start execution.
///
/// Returns whether the machine is now running restored state. Every
/// failure (fetch, non-success status, decompression, import) is logged
/// and normalized to `false`; nothing propagates. On `false` the engine
/// has not been run and the caller decides how to boot instead.
pub async fn load_state_from_path<E, T>(engine: &mut E, transport: &T, path: &str) -> bool
where
    E: Engine,
    T: Transport + ?Sized,
{
    let body = match transport.get(path).await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!("boot state fetch failed: {err}");
            return false;
        }
    };
    tracing::info!("fetched boot state from {path} ({} bytes)", body.len());

    let bytes = match decompress_if_framed(body) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("boot state decompression failed for {path}: {err}");
            return false;
        }
    };

    if let Err(err) = engine.restore_state(&bytes) {
        tracing::warn!("boot state import failed for {path}: {err}");
        return false;
    }
    engine.run();
    tracing::info!("boot state restored; execution started");
    true
}

/// State files come in two flavors: raw engine blobs and lz4-frame
/// compressed ones. The frame magic disambiguates; raw bytes pass through
/// untouched.
fn decompress_if_framed(body: Vec<u8>) -> std::io::Result<Vec<u8>> {
    if body.len() < LZ4_FRAME_MAGIC.len() || body[..4] != LZ4_FRAME_MAGIC {
        return Ok(body);
    }
    let mut decoder = lz4_flex::frame::FrameDecoder::new(body.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
