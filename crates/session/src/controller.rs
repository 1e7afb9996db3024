use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineBinder, EngineError};
use crate::error::{SessionError, LOAD_REJECTED_REASON};
use crate::gamepad::GamepadPoller;
use crate::input::{
    Button, ButtonAction, ButtonStates, InputEvent, KeyBindings, KeyboardCollector,
};
use crate::router::{InputRouter, RouteChange, RouteState, SurfaceKind};
use crate::state::{
    SessionHandle, SessionSnapshot, SessionState, MAX_SPEED, MAX_VOLUME, MIN_SPEED, MIN_VOLUME,
};
use crate::vfs::{is_cartridge_name, save_name_for, PathLayout, VirtualFileBridge};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    #[default]
    AutoStart,
    WaitForStart,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub start_policy: StartPolicy,
    pub layout: PathLayout,
    pub key_bindings: KeyBindings,
}

#[derive(Debug, Clone, Copy)]
pub struct SaveImport<'a> {
    pub bytes: &'a [u8],
    pub name: Option<&'a str>,
}

pub struct SessionController {
    config: SessionConfig,
    engine: Option<Box<dyn Engine>>,
    bridge: VirtualFileBridge,
    state: SessionState,
    rom_id: Option<String>,
    speed: u8,
    volume: u8,
    input_enabled: bool,
    router: InputRouter,
    resume_on_restore: bool,
    poller: GamepadPoller,
    keyboard: KeyboardCollector,
    forwarded: ButtonStates,
    handle: SessionHandle,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Self {
        let bridge = VirtualFileBridge::new(config.layout.clone());
        let keyboard = KeyboardCollector::new(config.key_bindings.clone());
        Self {
            config,
            engine: None,
            bridge,
            state: SessionState::Uninitialized,
            rom_id: None,
            speed: MIN_SPEED,
            volume: MAX_VOLUME,
            input_enabled: true,
            router: InputRouter::new(),
            resume_on_restore: false,
            forwarded: ButtonStates::default(),
            poller: GamepadPoller::new(),
            keyboard,
            handle: SessionHandle::default(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn rom_id(&self) -> Option<&str> {
        self.rom_id.as_deref()
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn route_state(&self) -> RouteState {
        self.router.state()
    }

    pub fn start_policy(&self) -> StartPolicy {
        self.config.start_policy
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            revision: self.handle.revision(),
            state: self.state.clone(),
            rom_id: self.rom_id.clone(),
            speed: self.speed,
            volume: self.volume,
            input_enabled: self.input_enabled,
            route: self.router.state(),
            gamepad_connected: self.poller.active_pad().is_some(),
        }
    }

    pub async fn initialize<B>(
        &mut self,
        binder: &B,
        surface: &B::Surface,
    ) -> Result<(), SessionError>
    where
        B: EngineBinder + ?Sized,
    {
        if self.state != SessionState::Uninitialized {
            return Err(self.invalid_state("initialize"));
        }
        let bound = binder.bind(surface).await;
        self.complete_initialize(bound)
    }

    /// Second half of [`Self::initialize`], for hosts that await the binding
    /// themselves and must not hold the controller across that await.
    pub fn complete_initialize(
        &mut self,
        bound: Result<Box<dyn Engine>, EngineError>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(self.invalid_state("initialize"));
        }

        let setup = bound.and_then(|mut engine| {
            engine.set_fast_forward_multiplier(self.speed)?;
            engine.set_volume(volume_scale(self.volume))?;
            if !self.router.allows_input() {
                engine.toggle_input(false)?;
            }
            Ok(engine)
        });

        match setup {
            Ok(engine) => {
                self.engine = Some(engine);
                self.input_enabled = self.router.allows_input();
                self.state = SessionState::Idle;
                info!(speed = self.speed, volume = self.volume, "engine_bound");
                self.publish();
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "engine_initialization_failed");
                self.state = SessionState::Error(error.to_string());
                self.publish();
                Err(SessionError::InitializationFailure(error))
            }
        }
    }

    /// Validates `name` and quits any active game before the host starts an
    /// asynchronous read of the cartridge bytes.
    pub fn begin_load(&mut self, name: &str) -> Result<(), SessionError> {
        self.ensure_loadable()?;
        self.validate_cartridge_name(name)?;
        let released = self.release_active();
        self.settle(released)?;
        self.state = SessionState::Loading;
        self.publish();
        Ok(())
    }

    pub fn load_cartridge(&mut self, bytes: &[u8], name: &str) -> Result<(), SessionError> {
        self.ensure_loadable()?;
        self.validate_cartridge_name(name)?;
        let released = self.release_active();
        self.settle(released)?;
        self.state = SessionState::Loading;

        let written = match self.engine.as_deref_mut() {
            Some(engine) => self
                .bridge
                .write_cartridge(engine, name, bytes)
                .map_err(SessionError::from),
            None => Err(SessionError::EngineNotReady),
        };
        let path = self.settle(written)?;
        self.finish_load(name, &path)
    }

    /// Restores a persisted session: the save is put in place before the
    /// cartridge is loaded so the engine picks it up at load time.
    pub fn import_and_play(
        &mut self,
        rom_bytes: &[u8],
        rom_name: &str,
        save: Option<SaveImport<'_>>,
    ) -> Result<(), SessionError> {
        self.ensure_loadable()?;
        self.validate_cartridge_name(rom_name)?;
        let released = self.release_active();
        self.settle(released)?;

        if let Some(save) = save.filter(|save| !save.bytes.is_empty()) {
            let save_name = save
                .name
                .map_or_else(|| save_name_for(rom_name), ToString::to_string);
            let written = match self.engine.as_deref_mut() {
                Some(engine) => self
                    .bridge
                    .replace_save(engine, &save_name, save.bytes)
                    .map_err(SessionError::from),
                None => Err(SessionError::EngineNotReady),
            };
            self.settle(written)?;
            info!(save = %save_name, byte_len = save.bytes.len(), "save_imported");
        }

        self.load_cartridge(rom_bytes, rom_name)
    }

    pub fn toggle_playback(&mut self) -> Result<(), SessionError> {
        if self.engine.is_none() || self.rom_id.is_none() {
            debug!(state = %self.state, "toggle_ignored_without_cartridge");
            return Ok(());
        }

        match self.state {
            SessionState::Running => {
                let paused = self.pause_playback();
                self.settle(paused)?;
                self.resume_on_restore = false;
            }
            SessionState::Paused if !self.router.allows_input() => {
                self.resume_on_restore = true;
                debug!("resume_deferred_until_focus_released");
            }
            SessionState::Paused => {
                let resumed = self.resume_playback();
                self.settle(resumed)?;
            }
            _ => {
                debug!(state = %self.state, "toggle_ignored_in_state");
                return Ok(());
            }
        }
        self.publish();
        Ok(())
    }

    pub fn set_speed(&mut self, requested: i32) -> u8 {
        let clamped = requested.clamp(i32::from(MIN_SPEED), i32::from(MAX_SPEED)) as u8;
        self.speed = clamped;
        if let Some(engine) = self.engine.as_deref_mut() {
            if let Err(error) = engine.set_fast_forward_multiplier(clamped) {
                warn!(error = %error, speed = clamped, "speed_apply_failed");
            }
        }
        debug!(requested, speed = clamped, "speed_set");
        self.publish();
        clamped
    }

    pub fn step_speed(&mut self, delta: i32) -> u8 {
        self.set_speed(i32::from(self.speed) + delta)
    }

    pub fn set_volume(&mut self, requested: i32) -> u8 {
        let clamped = requested.clamp(i32::from(MIN_VOLUME), i32::from(MAX_VOLUME)) as u8;
        self.volume = clamped;
        if let Some(engine) = self.engine.as_deref_mut() {
            if let Err(error) = engine.set_volume(volume_scale(clamped)) {
                warn!(error = %error, volume = clamped, "volume_apply_failed");
            }
        }
        debug!(requested, volume = clamped, "volume_set");
        self.publish();
        clamped
    }

    pub fn quick_reload(&mut self) -> Result<(), SessionError> {
        if self.engine.is_none() {
            return Err(SessionError::EngineNotReady);
        }
        if self.rom_id.is_none() {
            return Err(SessionError::NoCartridge);
        }
        if !matches!(self.state, SessionState::Running | SessionState::Paused) {
            return Err(self.invalid_state("quick reload"));
        }
        let reloaded = self.engine_mut()?.quick_reload().map_err(SessionError::from);
        self.settle(reloaded)?;
        info!(rom = ?self.rom_id, "quick_reload");
        Ok(())
    }

    pub fn export_cartridge_bytes(&mut self, name: &str) -> Result<Vec<u8>, SessionError> {
        let engine = self
            .engine
            .as_deref_mut()
            .ok_or(SessionError::EngineNotReady)?;
        Ok(self.bridge.read_cartridge(engine, name)?)
    }

    pub fn export_save_bytes(&mut self, name: &str) -> Result<Vec<u8>, SessionError> {
        let engine = self
            .engine
            .as_deref_mut()
            .ok_or(SessionError::EngineNotReady)?;
        Ok(self.bridge.read_save(engine, name)?)
    }

    pub fn local_cartridges(&mut self) -> Result<Vec<String>, SessionError> {
        let mut names = self.engine_mut()?.list_roms()?;
        names.retain(|name| is_cartridge_name(name));
        Ok(names)
    }

    pub fn local_saves(&mut self) -> Result<Vec<String>, SessionError> {
        Ok(self.engine_mut()?.list_saves()?)
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        if self.engine.is_none() {
            return;
        }
        if !self.router.allows_input() || !self.input_enabled {
            debug!(
                button = event.button.engine_name(),
                action = ?event.action,
                source = ?event.source,
                "input_dropped"
            );
            return;
        }

        match (event.button, event.action) {
            (Button::Rt, ButtonAction::Press) => {
                self.step_speed(1);
            }
            (Button::Lt, ButtonAction::Press) => {
                self.step_speed(-1);
            }
            (Button::Ls, ButtonAction::Press) => {
                if let Err(error) = self.quick_reload() {
                    warn!(error = %error, "quick_reload_rejected");
                }
            }
            (Button::Rt | Button::Lt | Button::Ls, ButtonAction::Release) => {}
            (button, action) => {
                let Some(engine) = self.engine.as_deref_mut() else {
                    return;
                };
                let is_press = action == ButtonAction::Press;
                if !is_press && !self.forwarded.is_down(button) {
                    return;
                }
                let result = match action {
                    ButtonAction::Press => engine.button_press(button.engine_name()),
                    ButtonAction::Release => engine.button_unpress(button.engine_name()),
                };
                match result {
                    Ok(()) => self.forwarded.set(button, is_press),
                    Err(error) => {
                        warn!(error = %error, button = button.engine_name(), "button_forward_failed")
                    }
                }
            }
        }
    }

    pub fn key_down(&mut self, code: &str) {
        if let Some(event) = self.keyboard.key_down(code) {
            self.handle_input(event);
        }
    }

    pub fn key_up(&mut self, code: &str) {
        if let Some(event) = self.keyboard.key_up(code) {
            self.handle_input(event);
        }
    }

    pub fn gamepad_connected(&mut self, pad_index: u32, button_count: usize) -> bool {
        let started = self.poller.connect(pad_index, button_count);
        if started {
            self.publish();
        }
        started
    }

    pub fn gamepad_disconnected(&mut self, pad_index: u32) -> bool {
        let stopped = self.poller.disconnect(pad_index);
        if stopped {
            self.publish();
        }
        stopped
    }

    pub fn active_gamepad(&self) -> Option<u32> {
        self.poller.active_pad()
    }

    pub fn poll_gamepad(&mut self, pressed: &[bool]) {
        for event in self.poller.tick(pressed) {
            self.handle_input(event);
        }
    }

    pub fn focus_gained(&mut self, surface_id: &str, kind: SurfaceKind) -> Result<(), SessionError> {
        match self.router.focus_gained(surface_id, kind) {
            RouteChange::Suppressed => {
                let suppressed = self.suppress_for_focus();
                self.publish();
                self.settle(suppressed)?;
                info!(surface_id, ?kind, state = %self.state, "input_suppressed");
            }
            RouteChange::Restored | RouteChange::Unchanged => {}
        }
        Ok(())
    }

    pub fn focus_lost(&mut self, surface_id: &str) -> Result<(), SessionError> {
        match self.router.focus_lost(surface_id) {
            RouteChange::Restored => {
                let restored = self.restore_after_focus();
                self.publish();
                self.settle(restored)?;
                info!(surface_id, state = %self.state, "input_restored");
            }
            RouteChange::Suppressed | RouteChange::Unchanged => {}
        }
        Ok(())
    }

    fn suppress_for_focus(&mut self) -> Result<(), SessionError> {
        self.keyboard.reset();
        if self.engine.is_none() {
            self.input_enabled = false;
            return Ok(());
        }
        if self.state == SessionState::Running {
            self.pause_playback()?;
            self.resume_on_restore = true;
        } else if self.input_enabled {
            self.set_input(false)?;
        }
        Ok(())
    }

    fn restore_after_focus(&mut self) -> Result<(), SessionError> {
        if self.engine.is_none() {
            self.input_enabled = true;
            return Ok(());
        }
        if std::mem::take(&mut self.resume_on_restore) && self.state == SessionState::Paused {
            self.resume_playback()?;
        } else if self.state != SessionState::Paused {
            self.set_input(true)?;
        }
        Ok(())
    }

    fn finish_load(&mut self, name: &str, path: &str) -> Result<(), SessionError> {
        let loaded = self.engine_mut()?.load_game(path).map_err(SessionError::from);
        self.rom_id = Some(name.to_string());

        match self.settle(loaded)? {
            true => {}
            false => {
                warn!(rom = name, path, "cartridge_rejected");
                self.state = SessionState::Error(LOAD_REJECTED_REASON.to_string());
                self.publish();
                return Err(SessionError::LoadRejected {
                    name: name.to_string(),
                });
            }
        }

        let started = match self.config.start_policy {
            StartPolicy::AutoStart => self.enter_running_after_load(),
            StartPolicy::WaitForStart => self.pause_playback(),
        };
        self.settle(started)?;
        info!(rom = name, path, state = %self.state, "cartridge_loaded");
        self.publish();
        Ok(())
    }

    fn enter_running_after_load(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Running;
        if !self.router.allows_input() {
            self.pause_playback()?;
            self.resume_on_restore = true;
        } else if !self.input_enabled {
            self.set_input(true)?;
        }
        Ok(())
    }

    /// The cartridge stays active until both engine calls succeed.
    fn release_active(&mut self) -> Result<(), SessionError> {
        if self.rom_id.is_none() {
            return Ok(());
        }
        self.resume_on_restore = false;
        self.engine_mut()?.quit_game()?;
        self.forwarded = ButtonStates::default();
        self.set_input(true)?;
        let previous = self.rom_id.take();
        info!(rom = ?previous, "cartridge_released");
        Ok(())
    }

    fn pause_playback(&mut self) -> Result<(), SessionError> {
        self.engine_mut()?.pause_game()?;
        self.set_input(false)?;
        self.state = SessionState::Paused;
        info!(rom = ?self.rom_id, "playback_paused");
        Ok(())
    }

    fn resume_playback(&mut self) -> Result<(), SessionError> {
        self.engine_mut()?.resume_game()?;
        self.set_input(true)?;
        self.state = SessionState::Running;
        info!(rom = ?self.rom_id, "playback_resumed");
        Ok(())
    }

    fn set_input(&mut self, enabled: bool) -> Result<(), SessionError> {
        if !enabled {
            self.release_forwarded();
        }
        self.engine_mut()?.toggle_input(enabled)?;
        self.input_enabled = enabled;
        Ok(())
    }

    fn release_forwarded(&mut self) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        for button in Button::ALL {
            if !self.forwarded.is_down(button) {
                continue;
            }
            if let Err(error) = engine.button_unpress(button.engine_name()) {
                warn!(error = %error, button = button.engine_name(), "held_button_release_failed");
            }
            self.forwarded.set(button, false);
        }
    }

    fn ensure_loadable(&self) -> Result<(), SessionError> {
        if self.engine.is_none() {
            return Err(SessionError::EngineNotReady);
        }
        match self.state {
            SessionState::Uninitialized => Err(SessionError::EngineNotReady),
            _ => Ok(()),
        }
    }

    fn validate_cartridge_name(&mut self, name: &str) -> Result<(), SessionError> {
        if is_cartridge_name(name) {
            return Ok(());
        }
        let error = SessionError::UnsupportedFormat {
            name: name.to_string(),
        };
        warn!(name, "cartridge_format_rejected");
        self.state = SessionState::Error(error.to_string());
        self.publish();
        Err(error)
    }

    fn settle<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(error) = &result {
            if matches!(
                error,
                SessionError::Engine(_)
                    | SessionError::Filesystem(_)
                    | SessionError::AssetNotFound { .. }
            ) {
                warn!(error = %error, "engine_call_failed");
                self.state = SessionState::Error(error.to_string());
                self.publish();
            }
        }
        result
    }

    fn engine_mut(&mut self) -> Result<&mut dyn Engine, SessionError> {
        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(SessionError::EngineNotReady),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state.clone(),
        }
    }

    fn publish(&self) {
        self.handle.publish(self.snapshot());
    }
}

fn volume_scale(percent: u8) -> f32 {
    f32::from(percent) / 100.0
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::input::InputSource;
    use crate::test_support::{EngineCall, RecordingEngine};

    fn ready_with(engine: &RecordingEngine, config: SessionConfig) -> SessionController {
        let mut session = SessionController::new(config);
        session
            .complete_initialize(Ok(engine.boxed()))
            .expect("engine binds");
        engine.clear_calls();
        session
    }

    fn ready(engine: &RecordingEngine) -> SessionController {
        ready_with(engine, SessionConfig::default())
    }

    fn running(engine: &RecordingEngine, name: &str) -> SessionController {
        let mut session = ready(engine);
        session.load_cartridge(b"rom", name).expect("cartridge loads");
        engine.clear_calls();
        session
    }

    fn pad_with(index: usize) -> Vec<bool> {
        let mut pressed = vec![false; 16];
        pressed[index] = true;
        pressed
    }

    struct StaticBinder(RecordingEngine);

    #[async_trait(?Send)]
    impl EngineBinder for StaticBinder {
        type Surface = ();

        async fn bind(&self, _surface: &()) -> Result<Box<dyn Engine>, EngineError> {
            Ok(self.0.boxed())
        }
    }

    #[test]
    fn binding_applies_default_speed_and_volume() {
        let engine = RecordingEngine::new();
        let mut session = SessionController::new(SessionConfig::default());

        session
            .complete_initialize(Ok(engine.boxed()))
            .expect("engine binds");

        assert_eq!(
            engine.calls(),
            vec![EngineCall::SetFastForward(1), EngineCall::SetVolume(1.0)]
        );
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.handle().snapshot().state, SessionState::Idle);
    }

    #[tokio::test]
    async fn initialize_awaits_binder() {
        let engine = RecordingEngine::new();
        let mut session = SessionController::new(SessionConfig::default());

        session
            .initialize(&StaticBinder(engine.clone()), &())
            .await
            .expect("engine binds");

        assert_eq!(session.state(), &SessionState::Idle);
        let again = session.initialize(&StaticBinder(engine), &()).await;
        assert!(matches!(again, Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn failed_binding_reports_initialization_failure() {
        let mut session = SessionController::new(SessionConfig::default());

        let result = session.complete_initialize(Err(EngineError::Bind("no canvas".to_string())));

        assert!(matches!(
            result,
            Err(SessionError::InitializationFailure(EngineError::Bind(_)))
        ));
        assert!(session.state().is_error());
        assert!(matches!(
            session.load_cartridge(b"rom", "game.gba"),
            Err(SessionError::EngineNotReady)
        ));
    }

    #[test]
    fn load_before_initialize_is_rejected() {
        let mut session = SessionController::new(SessionConfig::default());
        assert!(matches!(
            session.load_cartridge(b"rom", "game.gba"),
            Err(SessionError::EngineNotReady)
        ));
        assert_eq!(session.state(), &SessionState::Uninitialized);
    }

    #[test]
    fn unsupported_extension_touches_nothing() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);

        let result = session.load_cartridge(b"rom", "game.xyz");

        assert!(matches!(result, Err(SessionError::UnsupportedFormat { .. })));
        assert!(engine.calls().is_empty());
        assert!(session.state().is_error());
        assert_eq!(session.rom_id(), None);
    }

    #[test]
    fn valid_cartridge_is_written_then_loaded_and_runs() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);

        session
            .load_cartridge(b"rom-bytes", "game.gba")
            .expect("cartridge loads");

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::WriteFile("/data/games/game.gba".to_string()),
                EngineCall::Sync,
                EngineCall::LoadGame("/data/games/game.gba".to_string()),
            ]
        );
        assert_eq!(engine.file("/data/games/game.gba"), Some(b"rom-bytes".to_vec()));
        assert_eq!(session.state(), &SessionState::Running);
        assert_eq!(session.rom_id(), Some("game.gba"));

        let snapshot = session.handle().snapshot();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.rom_id.as_deref(), Some("game.gba"));
    }

    #[test]
    fn rejected_image_enters_error_and_next_load_quits_first() {
        let engine = RecordingEngine::new().rejecting_loads();
        let mut session = ready(&engine);

        let result = session.load_cartridge(b"garbage", "broken.gba");

        assert!(matches!(result, Err(SessionError::LoadRejected { .. })));
        assert_eq!(
            session.state(),
            &SessionState::Error(LOAD_REJECTED_REASON.to_string())
        );

        engine.clear_calls();
        let _ = session.load_cartridge(b"garbage", "other.gba");
        assert_eq!(engine.position(&EngineCall::QuitGame), Some(0));
    }

    #[test]
    fn failed_sync_moves_session_to_error() {
        let engine = RecordingEngine::new().failing_sync();
        let mut session = ready(&engine);

        let result = session.load_cartridge(b"rom", "game.gba");

        assert!(matches!(result, Err(SessionError::Filesystem(_))));
        assert!(session.state().is_error());
        assert_eq!(engine.position(&EngineCall::LoadGame("/data/games/game.gba".to_string())), None);
    }

    #[test]
    fn toggling_twice_pauses_then_resumes_once_each() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");

        session.toggle_playback().expect("pause");
        assert_eq!(session.state(), &SessionState::Paused);
        assert!(!session.input_enabled());
        session.toggle_playback().expect("resume");

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::PauseGame,
                EngineCall::ToggleInput(false),
                EngineCall::ResumeGame,
                EngineCall::ToggleInput(true),
            ]
        );
        assert_eq!(session.state(), &SessionState::Running);
        assert!(session.input_enabled());
    }

    #[test]
    fn toggle_without_cartridge_is_a_no_op() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);

        session.toggle_playback().expect("no-op");

        assert!(engine.calls().is_empty());
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn loading_over_an_active_cartridge_quits_it_first() {
        let prepare: [(&str, fn(&mut SessionController)); 3] = [
            ("running", |_| {}),
            ("paused", |session| session.toggle_playback().expect("pause")),
            ("error", |session| {
                let _ = session.load_cartridge(b"rom", "bad.xyz");
            }),
        ];

        for (label, setup) in prepare {
            let engine = RecordingEngine::new();
            let mut session = running(&engine, "game.gba");
            setup(&mut session);
            engine.clear_calls();

            session
                .load_cartridge(b"next", "next.gb")
                .expect("next cartridge loads");

            let quit = engine.position(&EngineCall::QuitGame).expect(label);
            let input = engine.position(&EngineCall::ToggleInput(true)).expect(label);
            let write = engine
                .position(&EngineCall::WriteFile("/data/games/next.gb".to_string()))
                .expect(label);
            assert!(quit < input && input < write, "{label}: {:?}", engine.calls());
            assert_eq!(session.rom_id(), Some("next.gb"), "{label}");
            assert_eq!(session.state(), &SessionState::Running, "{label}");
        }
    }

    #[test]
    fn begin_load_quits_before_bytes_arrive() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");

        session.begin_load("next.gba").expect("begin");
        assert_eq!(
            engine.calls(),
            vec![EngineCall::QuitGame, EngineCall::ToggleInput(true)]
        );
        assert_eq!(session.state(), &SessionState::Loading);
        assert_eq!(session.rom_id(), None);

        session.load_cartridge(b"next", "next.gba").expect("load");
        assert_eq!(
            engine
                .calls()
                .iter()
                .filter(|call| **call == EngineCall::QuitGame)
                .count(),
            1
        );
        assert_eq!(session.state(), &SessionState::Running);
    }

    #[test]
    fn imported_save_is_in_place_before_load() {
        let engine = RecordingEngine::new().with_file("/data/saves/pokemon.sav", b"stale".to_vec());
        let mut session = ready(&engine);

        session
            .import_and_play(
                b"rom",
                "pokemon.gba",
                Some(SaveImport {
                    bytes: b"fresh",
                    name: None,
                }),
            )
            .expect("import");

        let unlink = engine
            .position(&EngineCall::Unlink("/data/saves/pokemon.sav".to_string()))
            .expect("old save removed");
        let write_save = engine
            .position(&EngineCall::WriteFile("/data/saves/pokemon.sav".to_string()))
            .expect("save written");
        let load = engine
            .position(&EngineCall::LoadGame("/data/games/pokemon.gba".to_string()))
            .expect("cartridge loaded");
        assert!(unlink < write_save && write_save < load);
        assert_eq!(engine.file("/data/saves/pokemon.sav"), Some(b"fresh".to_vec()));
        assert_eq!(session.state(), &SessionState::Running);
    }

    #[test]
    fn import_quits_active_game_before_writing_save() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "pokemon.gba");

        session
            .import_and_play(
                b"rom",
                "pokemon.gba",
                Some(SaveImport {
                    bytes: b"cloud",
                    name: Some("pokemon.sav"),
                }),
            )
            .expect("import");

        let quit = engine.position(&EngineCall::QuitGame).expect("quit");
        let write_save = engine
            .position(&EngineCall::WriteFile("/data/saves/pokemon.sav".to_string()))
            .expect("save written");
        assert!(quit < write_save);
    }

    #[test]
    fn import_with_bad_cartridge_name_writes_nothing() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);

        let result = session.import_and_play(
            b"rom",
            "notes.txt",
            Some(SaveImport {
                bytes: b"save",
                name: None,
            }),
        );

        assert!(matches!(result, Err(SessionError::UnsupportedFormat { .. })));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn speed_and_volume_are_clamped() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);

        assert_eq!(session.set_speed(9), 5);
        assert_eq!(session.set_speed(-3), 1);
        assert_eq!(session.step_speed(1), 2);
        assert_eq!(session.set_volume(150), 100);
        assert_eq!(session.set_volume(-5), 0);
        assert_eq!(session.set_volume(40), 40);

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SetFastForward(5),
                EngineCall::SetFastForward(1),
                EngineCall::SetFastForward(2),
                EngineCall::SetVolume(1.0),
                EngineCall::SetVolume(0.0),
                EngineCall::SetVolume(40.0 / 100.0),
            ]
        );
        let snapshot = session.handle().snapshot();
        assert_eq!((snapshot.speed, snapshot.volume), (2, 40));
    }

    #[test]
    fn speed_set_before_binding_is_applied_at_bind() {
        let engine = RecordingEngine::new();
        let mut session = SessionController::new(SessionConfig::default());
        session.set_speed(3);

        session
            .complete_initialize(Ok(engine.boxed()))
            .expect("engine binds");

        assert_eq!(engine.calls()[0], EngineCall::SetFastForward(3));
    }

    #[test]
    fn text_field_focus_pauses_and_blur_resumes() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");

        session
            .focus_gained("username", SurfaceKind::TextField)
            .expect("focus");
        assert_eq!(session.state(), &SessionState::Paused);
        assert_eq!(session.route_state(), RouteState::Suppressed);

        session.focus_lost("username").expect("blur");

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::PauseGame,
                EngineCall::ToggleInput(false),
                EngineCall::ResumeGame,
                EngineCall::ToggleInput(true),
            ]
        );
        assert_eq!(session.state(), &SessionState::Running);
        assert_eq!(session.route_state(), RouteState::Routed);
    }

    #[test]
    fn blur_does_not_resume_a_user_pause() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");
        session.toggle_playback().expect("pause");
        engine.clear_calls();

        session.focus_gained("login", SurfaceKind::Modal).expect("focus");
        session.focus_lost("login").expect("blur");

        assert!(engine.calls().is_empty());
        assert_eq!(session.state(), &SessionState::Paused);
    }

    #[test]
    fn toggle_while_suppressed_defers_resume_to_blur() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");
        session.toggle_playback().expect("pause");
        session.focus_gained("login", SurfaceKind::Modal).expect("focus");
        engine.clear_calls();

        session.toggle_playback().expect("deferred");
        assert!(engine.calls().is_empty());

        session.focus_lost("login").expect("blur");
        assert_eq!(session.state(), &SessionState::Running);
    }

    #[test]
    fn load_behind_open_modal_starts_paused() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);
        session.focus_gained("library", SurfaceKind::Modal).expect("focus");

        session.load_cartridge(b"rom", "game.gba").expect("load");
        assert_eq!(session.state(), &SessionState::Paused);

        session.focus_lost("library").expect("blur");
        assert_eq!(session.state(), &SessionState::Running);
        assert!(session.input_enabled());
    }

    #[test]
    fn wait_for_start_policy_leaves_cartridge_paused() {
        let engine = RecordingEngine::new();
        let config = SessionConfig {
            start_policy: StartPolicy::WaitForStart,
            ..SessionConfig::default()
        };
        let mut session = ready_with(&engine, config);

        session.load_cartridge(b"rom", "game.gba").expect("load");

        let load = engine
            .position(&EngineCall::LoadGame("/data/games/game.gba".to_string()))
            .expect("loaded");
        assert_eq!(engine.position(&EngineCall::PauseGame), Some(load + 1));
        assert_eq!(session.state(), &SessionState::Paused);

        session.toggle_playback().expect("start");
        assert_eq!(session.state(), &SessionState::Running);
    }

    #[test]
    fn input_is_dropped_while_suppressed() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");
        session
            .focus_gained("search", SurfaceKind::TextField)
            .expect("focus");
        engine.clear_calls();

        session.handle_input(InputEvent::press(InputSource::Gamepad, Button::A));
        session.key_down("KeyZ");

        assert!(engine.calls().is_empty());
    }

    #[test]
    fn gamepad_triggers_and_stick_click_are_overloaded() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");
        assert!(session.gamepad_connected(0, 16));
        assert!(session.handle().snapshot().gamepad_connected);

        session.poll_gamepad(&pad_with(7));
        session.poll_gamepad(&[false; 16]);
        session.poll_gamepad(&pad_with(6));
        session.poll_gamepad(&[false; 16]);
        session.poll_gamepad(&pad_with(10));
        session.poll_gamepad(&[false; 16]);
        session.poll_gamepad(&pad_with(0));
        session.poll_gamepad(&[false; 16]);

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SetFastForward(2),
                EngineCall::SetFastForward(1),
                EngineCall::QuickReload,
                EngineCall::ButtonPress("a".to_string()),
                EngineCall::ButtonUnpress("a".to_string()),
            ]
        );

        assert!(session.gamepad_disconnected(0));
        assert!(!session.handle().snapshot().gamepad_connected);
    }

    #[test]
    fn held_key_forwards_one_press_and_one_release() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");

        session.key_down("KeyZ");
        session.key_down("KeyZ");
        session.key_up("KeyZ");
        session.key_down("F5");

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::ButtonPress("a".to_string()),
                EngineCall::ButtonUnpress("a".to_string()),
            ]
        );
    }

    #[test]
    fn quick_reload_requires_a_cartridge() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);

        assert!(matches!(
            session.quick_reload(),
            Err(SessionError::NoCartridge)
        ));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn exports_read_back_files_or_report_missing() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");

        assert_eq!(
            session.export_cartridge_bytes("game.gba").expect("export"),
            b"rom".to_vec()
        );
        assert!(matches!(
            session.export_save_bytes("game.sav"),
            Err(SessionError::AssetNotFound { .. })
        ));
        assert_eq!(session.state(), &SessionState::Running);
    }

    #[test]
    fn local_listing_keeps_only_cartridge_extensions() {
        let engine = RecordingEngine::new()
            .with_file("/data/games/a.gba", vec![1])
            .with_file("/data/games/readme.txt", vec![2])
            .with_file("/data/saves/a.sav", vec![3]);
        let mut session = ready(&engine);

        assert_eq!(
            session.local_cartridges().expect("roms"),
            vec!["a.gba".to_string()]
        );
        assert_eq!(session.local_saves().expect("saves"), vec!["a.sav".to_string()]);
    }

    #[test]
    fn unchanged_snapshot_keeps_revision() {
        let engine = RecordingEngine::new();
        let mut session = ready(&engine);
        let handle = session.handle();
        let before = handle.revision();

        session.set_speed(2);
        let after_speed = handle.revision();
        session.set_speed(2);

        assert!(after_speed > before);
        assert_eq!(handle.revision(), after_speed);
    }

    #[test]
    fn failed_quit_keeps_cartridge_active_for_next_load() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "one.gba");
        engine.fail_next_quits(1);

        assert!(matches!(
            session.load_cartridge(b"two", "two.gba"),
            Err(SessionError::Engine(_))
        ));
        assert!(matches!(session.state(), SessionState::Error(_)));
        assert_eq!(session.rom_id(), Some("one.gba"));
        engine.clear_calls();

        session
            .load_cartridge(b"two", "two.gba")
            .expect("retry loads");

        let quit = engine.position(&EngineCall::QuitGame).expect("quit issued");
        let write = engine
            .position(&EngineCall::WriteFile("/data/games/two.gba".to_string()))
            .expect("cartridge written");
        assert!(quit < write, "{:?}", engine.calls());
        assert_eq!(session.rom_id(), Some("two.gba"));
        assert_eq!(session.state(), &SessionState::Running);
    }

    #[test]
    fn held_key_is_released_when_focus_suppresses_input() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");

        session.key_down("KeyZ");
        session
            .focus_gained("chat", SurfaceKind::TextField)
            .expect("focus");
        session.key_up("KeyZ");
        session.focus_lost("chat").expect("blur");

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::ButtonPress("a".to_string()),
                EngineCall::PauseGame,
                EngineCall::ButtonUnpress("a".to_string()),
                EngineCall::ToggleInput(false),
                EngineCall::ResumeGame,
                EngineCall::ToggleInput(true),
            ]
        );
    }

    #[test]
    fn held_pad_button_is_released_on_pause_and_not_twice() {
        let engine = RecordingEngine::new();
        let mut session = running(&engine, "game.gba");
        assert!(session.gamepad_connected(0, 16));

        session.poll_gamepad(&pad_with(0));
        session.toggle_playback().expect("pause");
        session.toggle_playback().expect("resume");
        session.poll_gamepad(&[false; 16]);

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::ButtonPress("a".to_string()),
                EngineCall::PauseGame,
                EngineCall::ButtonUnpress("a".to_string()),
                EngineCall::ToggleInput(false),
                EngineCall::ResumeGame,
                EngineCall::ToggleInput(true),
            ]
        );
    }
}
