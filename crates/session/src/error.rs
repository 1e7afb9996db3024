use thiserror::Error;

use crate::engine::EngineError;
use crate::persist::PersistenceError;
use crate::state::SessionState;
use crate::vfs::VfsError;

pub const LOAD_REJECTED_REASON: &str = "unsupported or corrupt image";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("engine failed to initialize: {0}")]
    InitializationFailure(#[source] EngineError),
    #[error("engine is not initialized yet")]
    EngineNotReady,
    #[error("unsupported cartridge format: {name} (expected .gba, .gbc or .gb)")]
    UnsupportedFormat { name: String },
    #[error("unsupported or corrupt image: {name}")]
    LoadRejected { name: String },
    #[error("asset not found in virtual filesystem: {path}")]
    AssetNotFound { path: String },
    #[error("no cartridge is loaded")]
    NoCartridge,
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Filesystem(VfsError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<VfsError> for SessionError {
    fn from(error: VfsError) -> Self {
        match error {
            VfsError::NotFound { path } => SessionError::AssetNotFound { path },
            other => SessionError::Filesystem(other),
        }
    }
}
