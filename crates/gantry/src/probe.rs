use crate::fetch::Transport;

/// Reachability check for the engine asset, issued before construction.
///
/// Unreachable only means the caller should fall back to the default asset
/// path; it never aborts the bootstrap.
pub async fn engine_asset_reachable<T: Transport + ?Sized>(transport: &T, url: &str) -> bool {
    match transport.head(url).await {
        Ok(()) => {
            tracing::info!("engine asset reachable at {url}");
            true
        }
        Err(err) => {
            tracing::warn!("engine asset probe failed: {err}");
            false
        }
    }
}
