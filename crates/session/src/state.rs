use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::warn;

use crate::router::RouteState;

static STATE_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_state_lock_poison_once(operation: &'static str) {
    if STATE_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "session state lock poisoned; recovered inner value");
    }
}

pub const MIN_SPEED: u8 = 1;
pub const MAX_SPEED: u8 = 5;
pub const MIN_VOLUME: u8 = 0;
pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Idle,
    Loading,
    Running,
    Paused,
    Error(String),
}

impl SessionState {
    pub fn is_error(&self) -> bool {
        matches!(self, SessionState::Error(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("uninitialized"),
            SessionState::Idle => f.write_str("idle"),
            SessionState::Loading => f.write_str("loading"),
            SessionState::Running => f.write_str("running"),
            SessionState::Paused => f.write_str("paused"),
            SessionState::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub state: SessionState,
    pub rom_id: Option<String>,
    pub speed: u8,
    pub volume: u8,
    pub input_enabled: bool,
    pub route: RouteState,
    pub gamepad_connected: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            revision: 0,
            state: SessionState::Uninitialized,
            rom_id: None,
            speed: MIN_SPEED,
            volume: MAX_VOLUME,
            input_enabled: true,
            route: RouteState::Routed,
            gamepad_connected: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionHandle {
    snapshot: Arc<RwLock<SessionSnapshot>>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> SessionSnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_state_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn revision(&self) -> u64 {
        match self.snapshot.read() {
            Ok(guard) => guard.revision,
            Err(poisoned) => {
                warn_state_lock_poison_once("read");
                poisoned.into_inner().revision
            }
        }
    }

    /// Stores `snapshot` with the next revision number; unchanged snapshots
    /// are not republished.
    pub(crate) fn publish(&self, mut snapshot: SessionSnapshot) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_state_lock_poison_once("write");
                poisoned.into_inner()
            }
        };
        snapshot.revision = guard.revision;
        if *guard == snapshot {
            return;
        }
        snapshot.revision = guard.revision.wrapping_add(1);
        *guard = snapshot;
    }
}
