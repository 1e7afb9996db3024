use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine primitive `{primitive}` failed: {message}")]
    Call {
        primitive: &'static str,
        message: String,
    },
    #[error("engine primitive `{0}` is not exposed by the loaded module")]
    Missing(&'static str),
    #[error("failed to bind engine to surface: {0}")]
    Bind(String),
}

impl EngineError {
    pub fn call(primitive: &'static str, message: impl Into<String>) -> Self {
        Self::Call {
            primitive,
            message: message.into(),
        }
    }
}

/// Writes are not durable until [`EngineFs::sync`] returns.
pub trait EngineFs {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), EngineError>;
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, EngineError>;
    fn unlink(&mut self, path: &str) -> Result<(), EngineError>;
    fn path_exists(&mut self, path: &str) -> bool;
    fn sync(&mut self) -> Result<(), EngineError>;
}

pub trait Engine: EngineFs {
    /// Returns `Ok(false)` when the engine refuses the image.
    fn load_game(&mut self, path: &str) -> Result<bool, EngineError>;
    fn pause_game(&mut self) -> Result<(), EngineError>;
    fn resume_game(&mut self) -> Result<(), EngineError>;
    fn quit_game(&mut self) -> Result<(), EngineError>;
    fn button_press(&mut self, name: &str) -> Result<(), EngineError>;
    fn button_unpress(&mut self, name: &str) -> Result<(), EngineError>;
    fn set_fast_forward_multiplier(&mut self, multiplier: u8) -> Result<(), EngineError>;
    fn set_volume(&mut self, volume: f32) -> Result<(), EngineError>;
    fn quick_reload(&mut self) -> Result<(), EngineError>;
    fn toggle_input(&mut self, enabled: bool) -> Result<(), EngineError>;
    fn list_roms(&mut self) -> Result<Vec<String>, EngineError>;
    fn list_saves(&mut self) -> Result<Vec<String>, EngineError>;
}

#[async_trait(?Send)]
pub trait EngineBinder {
    type Surface;

    async fn bind(&self, surface: &Self::Surface) -> Result<Box<dyn Engine>, EngineError>;
}
