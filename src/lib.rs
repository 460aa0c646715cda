#![cfg(target_arch = "wasm32")]
//! Ambient sound mixing engine for the Soundscapes page.
//!
//! The UI (knobs, presets, themes) lives in the host page and talks to the
//! engine only through [`SoundscapeEngine`]: `unlock()` from a user gesture,
//! then `setLayer`/`setMaster` with volumes in [0, 1].

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

pub mod core;
mod engine;

use crate::core::LayerId;
use engine::Mixer;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("soundscapes-audio starting");
    Ok(())
}

/// Handle to the page's single mixing engine. Constructed once by the
/// composition point and passed to UI collaborators; there is no hidden
/// global instance.
#[wasm_bindgen]
pub struct SoundscapeEngine {
    inner: Rc<RefCell<Mixer>>,
}

#[wasm_bindgen]
impl SoundscapeEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> SoundscapeEngine {
        SoundscapeEngine {
            inner: Rc::new(RefCell::new(Mixer::new())),
        }
    }

    /// One-time unlock; call from a user-gesture handler. Resolves `true`
    /// once the context is up and all buffers have been requested; rejects
    /// only if the platform has no audio support.
    pub fn unlock(&self) -> js_sys::Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            engine::unlock(inner)
                .await
                .map(|_| JsValue::TRUE)
                .map_err(|e| JsValue::from_str(&e.to_string()))
        })
    }

    /// Set one layer's volume (0..1). Unknown names and calls before unlock
    /// are silent no-ops.
    #[wasm_bindgen(js_name = setLayer)]
    pub fn set_layer(&self, name: &str, v01: f32) {
        let Some(id) = LayerId::from_key(name) else {
            return;
        };
        engine::set_layer(&self.inner, id, v01);
    }

    /// Set the master volume (0..1, linear). No-op before unlock.
    #[wasm_bindgen(js_name = setMaster)]
    pub fn set_master(&self, v01: f32) {
        engine::set_master(&self.inner, v01);
    }

    #[wasm_bindgen(getter)]
    pub fn unlocked(&self) -> bool {
        self.inner.borrow().unlocked()
    }

    /// Whether a layer is currently audible (debug/UI affordance).
    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self, name: &str) -> bool {
        LayerId::from_key(name)
            .map(|id| self.inner.borrow().layer_playing(id))
            .unwrap_or(false)
    }
}

impl Default for SoundscapeEngine {
    fn default() -> Self {
        Self::new()
    }
}
