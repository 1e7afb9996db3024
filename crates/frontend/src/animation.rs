use session::{FrameScheduler, SchedulerError};
use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::Window;

use crate::js_engine::describe;

pub(crate) struct RafScheduler {
    window: Window,
    callback: Closure<dyn FnMut()>,
}

impl RafScheduler {
    pub(crate) fn new(window: Window, on_frame: impl FnMut() + 'static) -> Self {
        Self {
            window,
            callback: Closure::wrap(Box::new(on_frame) as Box<dyn FnMut()>),
        }
    }
}

impl FrameScheduler for RafScheduler {
    type Token = i32;

    fn request_frame(&mut self) -> Result<i32, SchedulerError> {
        self.window
            .request_animation_frame(self.callback.as_ref().unchecked_ref())
            .map_err(|error| SchedulerError::Request(describe(&error)))
    }

    fn cancel_frame(&mut self, token: i32) {
        if let Err(error) = self.window.cancel_animation_frame(token) {
            warn!(token, error = %describe(&error), "animation_frame_cancel_failed");
        }
    }
}

/// Pressed state of each button on the pad at `pad_index`, or `None` when the
/// browser no longer reports it.
pub(crate) fn read_pad(window: &Window, pad_index: u32) -> Option<Vec<bool>> {
    let pads = window.navigator().get_gamepads().ok()?;
    let pad = pads.get(pad_index).dyn_into::<web_sys::Gamepad>().ok()?;
    Some(
        pad.buttons()
            .iter()
            .map(|button| {
                button
                    .dyn_into::<web_sys::GamepadButton>()
                    .map(|button| button.pressed())
                    .unwrap_or(false)
            })
            .collect(),
    )
}
