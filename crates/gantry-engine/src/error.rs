use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures reported by an engine across the capability surface.
///
/// The message payloads are engine-specific text; callers treat them as
/// opaque and only branch on the variant.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine construction failed: {0}")]
    Construct(String),

    #[error("engine is not powered on")]
    NotPoweredOn,

    #[error("state export failed: {0}")]
    Export(String),

    #[error("state import failed: {0}")]
    Import(String),

    #[error("media attach failed: {0}")]
    Media(String),
}
