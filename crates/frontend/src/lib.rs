mod animation;
mod app;
mod bootstrap;
pub mod config;
pub mod cookies;
pub mod js_engine;
mod listeners;
pub mod remote;

use std::fmt::Display;
use std::rc::Rc;

use js_sys::{Function, Promise};
use serde::Serialize;
use session::{transfer, AssetKind, Credentials, EngineBinder, SaveImport, SurfaceKind};
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlCanvasElement;

use app::App;
use config::FrontendConfig;

#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_error(error: impl Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_error)
}

#[wasm_bindgen]
pub struct Frontend {
    app: Rc<App>,
}

#[wasm_bindgen]
impl Frontend {
    /// `factory` is the engine's module factory, called as `factory({ canvas })`.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, factory: Function) -> Result<Frontend, JsValue> {
        let config = FrontendConfig::from_json(config_json).map_err(js_error)?;
        bootstrap::init(&config.log_filter);

        let window = web_sys::window().ok_or_else(|| js_error("no global window"))?;
        let app = Rc::new_cyclic(|this| App::new(&config, factory, window.clone(), this));
        let listeners = listeners::install(Rc::downgrade(&app), &window, config.route_keyboard)?;
        *app.listeners.borrow_mut() = listeners;

        info!(
            api_base_url = %config.api_base_url,
            start_policy = ?config.start_policy,
            route_keyboard = config.route_keyboard,
            "frontend_ready"
        );
        Ok(Frontend { app })
    }

    /// Binds the engine to `canvas`. Resolves once the session is idle.
    pub fn initialize(&self, canvas: HtmlCanvasElement) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            let bound = app.binder.bind(&canvas).await;
            app.session
                .borrow_mut()
                .complete_initialize(bound)
                .map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.app.handle.snapshot())
    }

    pub fn revision(&self) -> f64 {
        self.app.handle.revision() as f64
    }

    pub fn begin_load(&self, name: &str) -> Result<(), JsValue> {
        self.app
            .session
            .borrow_mut()
            .begin_load(name)
            .map_err(js_error)
    }

    pub fn load_cartridge(&self, bytes: &[u8], name: &str) -> Result<(), JsValue> {
        self.app
            .session
            .borrow_mut()
            .load_cartridge(bytes, name)
            .map_err(js_error)
    }

    pub fn import_and_play(
        &self,
        rom_bytes: &[u8],
        rom_name: &str,
        save_bytes: Option<Vec<u8>>,
        save_name: Option<String>,
    ) -> Result<(), JsValue> {
        let save = save_bytes.as_deref().map(|bytes| SaveImport {
            bytes,
            name: save_name.as_deref(),
        });
        self.app
            .session
            .borrow_mut()
            .import_and_play(rom_bytes, rom_name, save)
            .map_err(js_error)
    }

    pub fn toggle_playback(&self) -> Result<(), JsValue> {
        self.app
            .session
            .borrow_mut()
            .toggle_playback()
            .map_err(js_error)
    }

    pub fn set_speed(&self, speed: i32) -> u8 {
        self.app.session.borrow_mut().set_speed(speed)
    }

    pub fn set_volume(&self, volume: i32) -> u8 {
        self.app.session.borrow_mut().set_volume(volume)
    }

    pub fn quick_reload(&self) -> Result<(), JsValue> {
        self.app
            .session
            .borrow_mut()
            .quick_reload()
            .map_err(js_error)
    }

    pub fn export_cartridge(&self, name: &str) -> Result<Vec<u8>, JsValue> {
        self.app
            .session
            .borrow_mut()
            .export_cartridge_bytes(name)
            .map_err(js_error)
    }

    pub fn export_save(&self, name: &str) -> Result<Vec<u8>, JsValue> {
        self.app
            .session
            .borrow_mut()
            .export_save_bytes(name)
            .map_err(js_error)
    }

    pub fn local_cartridges(&self) -> Result<JsValue, JsValue> {
        let names = self
            .app
            .session
            .borrow_mut()
            .local_cartridges()
            .map_err(js_error)?;
        to_js(&names)
    }

    pub fn local_saves(&self) -> Result<JsValue, JsValue> {
        let names = self
            .app
            .session
            .borrow_mut()
            .local_saves()
            .map_err(js_error)?;
        to_js(&names)
    }

    pub fn modal_opened(&self, modal_id: &str) -> Result<(), JsValue> {
        self.app
            .session
            .borrow_mut()
            .focus_gained(&format!("modal:{modal_id}"), SurfaceKind::Modal)
            .map_err(js_error)
    }

    pub fn modal_closed(&self, modal_id: &str) -> Result<(), JsValue> {
        self.app
            .session
            .borrow_mut()
            .focus_lost(&format!("modal:{modal_id}"))
            .map_err(js_error)
    }

    pub fn library(&self) -> Result<JsValue, JsValue> {
        to_js(&*self.app.library.borrow())
    }

    pub fn login(&self, username: String, password: String) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            let credentials = Credentials { username, password };
            let account = transfer::login(&app.store, &app.library, &credentials)
                .await
                .map_err(js_error)?;
            Ok(JsValue::from_str(&account.username))
        })
    }

    pub fn register(&self, username: String, password: String) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            let credentials = Credentials { username, password };
            transfer::register(&app.store, &credentials)
                .await
                .map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn refresh_library(&self) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            transfer::refresh_library(&app.store, &app.library)
                .await
                .map_err(js_error)?;
            let library = app.library.borrow().clone();
            to_js(&library)
        })
    }

    pub fn delete_cartridge(&self, hash: String) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            transfer::delete_cartridge(&app.store, &app.library, &hash)
                .await
                .map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn upload_cartridges(&self, names: JsValue) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            let names: Vec<String> = serde_wasm_bindgen::from_value(names).map_err(js_error)?;
            let report = transfer::upload_cartridges(&app.session, &app.store, &app.library, &names)
                .await
                .map_err(js_error)?;
            to_js(&report)
        })
    }

    pub fn upload_save(&self, save_name: String) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            let stored = transfer::upload_save(&app.session, &app.store, &app.library, &save_name)
                .await
                .map_err(js_error)?;
            to_js(&stored)
        })
    }

    pub fn resume_stored(&self, hash: String) -> Promise {
        let app = Rc::clone(&self.app);
        future_to_promise(async move {
            let (cartridge, save) = {
                let library = app.library.borrow();
                let cartridge = library
                    .find(AssetKind::Cartridge, &hash)
                    .cloned()
                    .ok_or_else(|| js_error(format!("no stored cartridge with hash {hash}")))?;
                let save = library.save_for(&cartridge).cloned();
                (cartridge, save)
            };
            transfer::resume_stored(&app.session, &app.store, &cartridge, save.as_ref())
                .await
                .map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn dispose(&self) {
        self.app.shutdown();
    }
}
