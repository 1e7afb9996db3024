use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect, Uint8Array};
use session::{Engine, EngineBinder, EngineError, EngineFs};
use tracing::{debug, info};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlCanvasElement;

const MAIN_LOOP_TIMING_MODE: i32 = 0;
const MAIN_LOOP_INTERVAL_MS: i32 = 16;

pub struct JsEngine {
    module: JsValue,
    fs: JsValue,
}

impl JsEngine {
    fn call(
        &self,
        primitive: &'static str,
        args: &[JsValue],
    ) -> Result<JsValue, EngineError> {
        invoke(&self.module, primitive, args)
    }

    fn call_unit(&self, primitive: &'static str, args: &[JsValue]) -> Result<(), EngineError> {
        self.call(primitive, args).map(|_| ())
    }

    fn string_list(&self, primitive: &'static str) -> Result<Vec<String>, EngineError> {
        let listed = self.call(primitive, &[])?;
        if !Array::is_array(&listed) {
            return Err(EngineError::call(primitive, "expected an array of names"));
        }
        Ok(Array::from(&listed)
            .iter()
            .filter_map(|entry| entry.as_string())
            .filter(|name| name != "." && name != "..")
            .collect())
    }
}

impl EngineFs for JsEngine {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let data = Uint8Array::from(bytes);
        invoke(&self.fs, "writeFile", &[JsValue::from_str(path), data.into()]).map(|_| ())
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, EngineError> {
        let data = invoke(&self.fs, "readFile", &[JsValue::from_str(path)])?;
        Ok(Uint8Array::new(&data).to_vec())
    }

    fn unlink(&mut self, path: &str) -> Result<(), EngineError> {
        invoke(&self.fs, "unlink", &[JsValue::from_str(path)]).map(|_| ())
    }

    fn path_exists(&mut self, path: &str) -> bool {
        invoke(&self.fs, "analyzePath", &[JsValue::from_str(path)])
            .and_then(|analysis| {
                Reflect::get(&analysis, &JsValue::from_str("exists"))
                    .map_err(|error| EngineError::call("analyzePath", describe(&error)))
            })
            .map(|exists| exists.is_truthy())
            .unwrap_or(false)
    }

    fn sync(&mut self) -> Result<(), EngineError> {
        self.call_unit("FSSync", &[])
    }
}

impl Engine for JsEngine {
    fn load_game(&mut self, path: &str) -> Result<bool, EngineError> {
        let loaded = self.call("loadGame", &[JsValue::from_str(path)])?;
        Ok(loaded.is_truthy())
    }

    fn pause_game(&mut self) -> Result<(), EngineError> {
        self.call_unit("pauseGame", &[])
    }

    fn resume_game(&mut self) -> Result<(), EngineError> {
        self.call_unit("resumeGame", &[])
    }

    fn quit_game(&mut self) -> Result<(), EngineError> {
        self.call_unit("quitGame", &[])
    }

    fn button_press(&mut self, name: &str) -> Result<(), EngineError> {
        self.call_unit("buttonPress", &[JsValue::from_str(name)])
    }

    fn button_unpress(&mut self, name: &str) -> Result<(), EngineError> {
        self.call_unit("buttonUnpress", &[JsValue::from_str(name)])
    }

    fn set_fast_forward_multiplier(&mut self, multiplier: u8) -> Result<(), EngineError> {
        self.call_unit(
            "setFastForwardMultiplier",
            &[JsValue::from_f64(f64::from(multiplier))],
        )
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        self.call_unit("setVolume", &[JsValue::from_f64(f64::from(volume))])
    }

    fn quick_reload(&mut self) -> Result<(), EngineError> {
        self.call_unit("quickReload", &[])
    }

    fn toggle_input(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.call_unit("toggleInput", &[JsValue::from_bool(enabled)])
    }

    fn list_roms(&mut self) -> Result<Vec<String>, EngineError> {
        self.string_list("listRoms")
    }

    fn list_saves(&mut self) -> Result<Vec<String>, EngineError> {
        self.string_list("listSaves")
    }
}

/// Binds through the `mGBA({ canvas })` factory exported by the engine's
/// JavaScript glue.
pub struct MgbaBinder {
    factory: Function,
}

impl MgbaBinder {
    pub fn new(factory: Function) -> Self {
        Self { factory }
    }
}

#[async_trait(?Send)]
impl EngineBinder for MgbaBinder {
    type Surface = HtmlCanvasElement;

    async fn bind(&self, canvas: &HtmlCanvasElement) -> Result<Box<dyn Engine>, EngineError> {
        let options = Object::new();
        Reflect::set(&options, &JsValue::from_str("canvas"), canvas.as_ref()).map_err(bind_error)?;
        let pending = self
            .factory
            .call1(&JsValue::NULL, &options)
            .map_err(bind_error)?;
        let module = JsFuture::from(Promise::resolve(&pending))
            .await
            .map_err(bind_error)?;

        let fs_ready = invoke(&module, "FSInit", &[])?;
        JsFuture::from(Promise::resolve(&fs_ready))
            .await
            .map_err(|error| EngineError::call("FSInit", describe(&error)))?;
        invoke(
            &module,
            "setMainLoopTiming",
            &[
                JsValue::from(MAIN_LOOP_TIMING_MODE),
                JsValue::from(MAIN_LOOP_INTERVAL_MS),
            ],
        )?;

        let fs = Reflect::get(&module, &JsValue::from_str("FS")).map_err(bind_error)?;
        if !fs.is_object() {
            return Err(EngineError::Missing("FS"));
        }
        info!(version = %module_version(&module), "engine_module_loaded");
        Ok(Box::new(JsEngine { module, fs }))
    }
}

fn invoke(target: &JsValue, name: &'static str, args: &[JsValue]) -> Result<JsValue, EngineError> {
    let function = Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or(EngineError::Missing(name))?;
    let arguments = args.iter().collect::<Array>();
    let result = function
        .apply(target, &arguments)
        .map_err(|error| EngineError::call(name, describe(&error)))?;
    debug!(primitive = name, "engine_call");
    Ok(result)
}

fn module_version(module: &JsValue) -> String {
    Reflect::get(module, &JsValue::from_str("version"))
        .and_then(|version| Reflect::get(&version, &JsValue::from_str("projectVersion")))
        .ok()
        .and_then(|version| version.as_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn bind_error(error: JsValue) -> EngineError {
    EngineError::Bind(describe(&error))
}

pub(crate) fn describe(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{value:?}")
}
