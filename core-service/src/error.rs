use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Nothing is loaded")]
    NoCurrentTrack,

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl CoreError {
    /// The failure came from the catalog rejecting or mangling a request.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, CoreError::Catalog(err) if err.is_contract_violation())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
