pub mod controller;
pub mod engine;
pub mod error;
pub mod frame_loop;
pub mod gamepad;
mod hashing;
pub mod input;
pub mod persist;
pub mod router;
pub mod state;
pub mod transfer;
pub mod vfs;

#[cfg(test)]
mod test_support;

pub use controller::{SaveImport, SessionConfig, SessionController, StartPolicy};
pub use engine::{Engine, EngineBinder, EngineError, EngineFs};
pub use error::{SessionError, LOAD_REJECTED_REASON};
pub use frame_loop::{FrameScheduler, PollLoop, SchedulerError};
pub use gamepad::{pad_button, GamepadPoller, PollerState, PAD_BUTTON_MAP};
pub use hashing::content_hash;
pub use input::{Button, ButtonAction, InputEvent, InputSource, KeyBindings, KeyboardCollector};
pub use persist::{
    Account, AssetKind, AssetStore, AssetUpload, Credentials, Library, PersistenceError,
    StoredAsset,
};
pub use router::{InputRouter, RouteChange, RouteState, SurfaceKind};
pub use state::{
    SessionHandle, SessionSnapshot, SessionState, MAX_SPEED, MAX_VOLUME, MIN_SPEED, MIN_VOLUME,
};
pub use transfer::UploadReport;
pub use vfs::{
    is_cartridge_name, save_name_for, PathLayout, VfsError, VirtualFileBridge,
    CARTRIDGE_EXTENSIONS, SAVE_EXTENSION,
};
