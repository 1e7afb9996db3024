use std::cell::RefCell;
use std::rc::Weak;

use js_sys::Function;
use session::{Library, PollLoop, SessionController, SessionHandle, SurfaceKind};
use tracing::warn;
use web_sys::Window;

use crate::animation::{read_pad, RafScheduler};
use crate::config::FrontendConfig;
use crate::cookies::document_cookie;
use crate::js_engine::MgbaBinder;
use crate::listeners::EventListener;
use crate::remote::HttpAssetStore;

/// Everything one page session owns. DOM callbacks hold a `Weak` to it.
pub(crate) struct App {
    pub(crate) window: Window,
    pub(crate) session: RefCell<SessionController>,
    pub(crate) handle: SessionHandle,
    pub(crate) library: RefCell<Library>,
    pub(crate) store: HttpAssetStore,
    pub(crate) binder: MgbaBinder,
    poll: RefCell<PollLoop<RafScheduler>>,
    pub(crate) listeners: RefCell<Vec<EventListener>>,
}

impl App {
    pub(crate) fn new(
        config: &FrontendConfig,
        factory: Function,
        window: Window,
        this: &Weak<App>,
    ) -> Self {
        let frame_target = this.clone();
        let scheduler = RafScheduler::new(window.clone(), move || {
            if let Some(app) = frame_target.upgrade() {
                app.on_animation_frame();
            }
        });
        let session = SessionController::new(config.session_config());
        let handle = session.handle();

        Self {
            window,
            session: RefCell::new(session),
            handle,
            library: RefCell::new(Library::default()),
            store: HttpAssetStore::new(&config.api_base_url, &config.csrf_cookie, document_cookie),
            binder: MgbaBinder::new(factory),
            poll: RefCell::new(PollLoop::new(scheduler)),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Runs `apply` unless the session is already borrowed further up the
    /// stack, in which case the event is dropped.
    pub(crate) fn with_session<T>(
        &self,
        apply: impl FnOnce(&mut SessionController) -> T,
    ) -> Option<T> {
        match self.session.try_borrow_mut() {
            Ok(mut session) => Some(apply(&mut session)),
            Err(_) => {
                warn!("session_busy_event_dropped");
                None
            }
        }
    }

    pub(crate) fn on_animation_frame(&self) {
        let due = match self.poll.try_borrow_mut() {
            Ok(mut poll) => poll.on_frame(),
            Err(_) => return,
        };
        match due {
            Ok(true) => {}
            Ok(false) => return,
            Err(error) => {
                warn!(error = %error, "poll_loop_reschedule_failed");
                return;
            }
        }

        let Some(Some(pad_index)) = self.with_session(|session| session.active_gamepad()) else {
            return;
        };
        if let Some(pressed) = read_pad(&self.window, pad_index) {
            self.with_session(|session| session.poll_gamepad(&pressed));
        }
    }

    pub(crate) fn on_gamepad_connected(&self, pad_index: u32, button_count: usize) {
        let start = self
            .with_session(|session| session.gamepad_connected(pad_index, button_count))
            .unwrap_or(false);
        if start {
            if let Err(error) = self.poll.borrow_mut().start() {
                warn!(pad_index, error = %error, "poll_loop_start_failed");
            }
        }
    }

    pub(crate) fn on_gamepad_disconnected(&self, pad_index: u32) {
        let stop = self
            .with_session(|session| session.gamepad_disconnected(pad_index))
            .unwrap_or(false);
        if stop {
            self.poll.borrow_mut().stop();
        }
    }

    pub(crate) fn on_text_focus(&self, surface_id: &str) {
        let result =
            self.with_session(|session| session.focus_gained(surface_id, SurfaceKind::TextField));
        if let Some(Err(error)) = result {
            warn!(surface_id, error = %error, "focus_suppression_failed");
        }
    }

    pub(crate) fn on_text_blur(&self, surface_id: &str) {
        if let Some(Err(error)) = self.with_session(|session| session.focus_lost(surface_id)) {
            warn!(surface_id, error = %error, "focus_restore_failed");
        }
    }

    pub(crate) fn on_key_down(&self, code: &str) {
        self.with_session(|session| session.key_down(code));
    }

    pub(crate) fn on_key_up(&self, code: &str) {
        self.with_session(|session| session.key_up(code));
    }

    pub(crate) fn shutdown(&self) {
        self.listeners.borrow_mut().clear();
        self.poll.borrow_mut().stop();
    }
}
