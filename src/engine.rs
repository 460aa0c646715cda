//! WebAudio side of the mixer: graph construction, lazy buffer loading,
//! smoothing ramps and debounced stop timers.
//!
//! All graph mutation happens through one `Rc<RefCell<Mixer>>`; timer and
//! `onended` closures clone the `Rc` and borrow at fire time.

use crate::core::{
    clamp01, LayerControl, LayerId, LevelPlan, TimerOp, DEFAULT_MASTER, SMOOTH_TAU_SEC,
    STOP_DELAY_MS,
};
use anyhow::anyhow;
use fnv::FnvHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys as web;

/// One ambient track: its gain stage, decoded samples and live source.
pub struct Layer {
    gain: web::GainNode,
    /// Decode-once cache; set at most once, `None` forever after a failed load.
    buffer: Option<web::AudioBuffer>,
    source: Option<web::AudioBufferSourceNode>,
    /// Keeps the `onended` callback of the current source alive.
    onended: Option<Closure<dyn FnMut()>>,
    /// Bumped on every start/stop so a stale `onended` cannot clobber a
    /// newer source's state.
    generation: u32,
    control: LayerControl,
}

struct StopTimer {
    handle: i32,
    _closure: Closure<dyn FnMut()>,
}

/// The mixing engine proper. Owns the audio context, the master bus and all
/// per-layer graph state. Exactly one per page, owned by the composition
/// point via `SoundscapeEngine`.
pub struct Mixer {
    ctx: Option<web::AudioContext>,
    master: Option<web::GainNode>,
    layers: FnvHashMap<LayerId, Layer>,
    stop_timers: FnvHashMap<LayerId, StopTimer>,
    unlocked: bool,
    loading: bool,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            ctx: None,
            master: None,
            layers: FnvHashMap::default(),
            stop_timers: FnvHashMap::default(),
            unlocked: false,
            loading: false,
        }
    }

    pub fn unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn layer_playing(&self, id: LayerId) -> bool {
        self.layers
            .get(&id)
            .map(|l| l.control.is_playing())
            .unwrap_or(false)
    }

    /// Create the audio context and master bus exactly once. Failure here
    /// means the platform has no audio support at all.
    fn ensure_ctx(&mut self) -> anyhow::Result<web::AudioContext> {
        if let Some(ctx) = &self.ctx {
            return Ok(ctx.clone());
        }
        let ctx = web::AudioContext::new().map_err(|e| anyhow!("audio unsupported: {:?}", e))?;

        let master =
            web::GainNode::new(&ctx).map_err(|e| anyhow!("master GainNode error: {:?}", e))?;
        master.gain().set_value(DEFAULT_MASTER);
        master
            .connect_with_audio_node(&ctx.destination())
            .map_err(|e| anyhow!("master connect error: {:?}", e))?;

        self.ctx = Some(ctx.clone());
        self.master = Some(master);
        Ok(ctx)
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

/// Idempotent one-time unlock; must run inside a user-gesture handler so the
/// context is allowed to resume. Fails only when audio is unsupported.
pub async fn unlock(mixer: Rc<RefCell<Mixer>>) -> anyhow::Result<()> {
    if mixer.borrow().unlocked {
        return Ok(());
    }

    let ctx = mixer.borrow_mut().ensure_ctx()?;

    if ctx.state() == web::AudioContextState::Suspended {
        // Autoplay policy may still block; a later gesture retries.
        match ctx.resume() {
            Ok(p) => {
                if let Err(e) = JsFuture::from(p).await {
                    log::warn!("audio resume failed: {:?}", e);
                }
            }
            Err(e) => log::warn!("audio resume failed: {:?}", e),
        }
    }

    if mixer.borrow().layers.is_empty() {
        load_all(&mixer)?;
    }

    mixer.borrow_mut().unlocked = true;
    Ok(())
}

/// Register every layer's gain stage, then fetch and decode each asset in an
/// independent task. Safe to call while a prior call is in flight; the
/// second caller is a no-op.
pub fn load_all(mixer: &Rc<RefCell<Mixer>>) -> anyhow::Result<()> {
    let ctx = {
        let mut m = mixer.borrow_mut();
        if m.loading || !m.layers.is_empty() {
            return Ok(());
        }
        let ctx = m.ensure_ctx()?;
        m.loading = true;
        let res = register_layers(&mut m, &ctx);
        m.loading = false;
        if let Err(e) = res {
            // Leave no half-registered graph behind: a later unlock() must
            // see an empty layer table and re-run the whole load sequence.
            for layer in m.layers.values() {
                _ = layer.gain.disconnect();
            }
            m.layers.clear();
            return Err(e);
        }
        ctx
    };

    // One task per layer: a slow or missing asset never delays the others.
    for id in LayerId::ALL {
        let mixer = mixer.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            match fetch_buffer(&ctx, id.asset_url()).await {
                Ok(buf) => {
                    if let Some(layer) = mixer.borrow_mut().layers.get_mut(&id) {
                        layer.buffer = Some(buf);
                    }
                }
                Err(e) => log::error!("failed to load {}: {}", id.key(), e),
            }
        });
    }

    Ok(())
}

fn register_layers(m: &mut Mixer, ctx: &web::AudioContext) -> anyhow::Result<()> {
    let master = m
        .master
        .clone()
        .ok_or_else(|| anyhow!("master bus missing"))?;

    for id in LayerId::ALL {
        let gain = web::GainNode::new(ctx).map_err(|e| anyhow!("layer GainNode error: {:?}", e))?;
        gain.gain().set_value(0.0);
        gain.connect_with_audio_node(&master)
            .map_err(|e| anyhow!("layer connect error: {:?}", e))?;
        m.layers.insert(
            id,
            Layer {
                gain,
                buffer: None,
                source: None,
                onended: None,
                generation: 0,
                control: LayerControl::default(),
            },
        );
    }
    Ok(())
}

async fn fetch_buffer(ctx: &web::AudioContext, url: &str) -> anyhow::Result<web::AudioBuffer> {
    let window = web::window().ok_or_else(|| anyhow!("no window"))?;

    let resp: web::Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| anyhow!("fetch {}: {:?}", url, e))?
        .dyn_into()
        .map_err(|e| anyhow!("fetch {}: {:?}", url, e))?;
    if !resp.ok() {
        return Err(anyhow!("missing sound file: {}", url));
    }

    let arr = JsFuture::from(
        resp.array_buffer()
            .map_err(|e| anyhow!("array_buffer {}: {:?}", url, e))?,
    )
    .await
    .map_err(|e| anyhow!("array_buffer {}: {:?}", url, e))?;
    let arr: js_sys::ArrayBuffer = arr
        .dyn_into()
        .map_err(|e| anyhow!("array_buffer {}: {:?}", url, e))?;

    let decoded = JsFuture::from(
        ctx.decode_audio_data(&arr)
            .map_err(|e| anyhow!("decode {}: {:?}", url, e))?,
    )
    .await
    .map_err(|e| anyhow!("decode {}: {:?}", url, e))?;
    decoded
        .dyn_into::<web::AudioBuffer>()
        .map_err(|_| anyhow!("decode {}: result is not an AudioBuffer", url))
}

/// Route a volume request into the layer's state machine and apply the
/// resulting plan to the graph. No-op before unlock. Safe at pointer-move
/// rate: exactly one ramp and at most one stop timer per layer, always.
pub fn set_layer(mixer: &Rc<RefCell<Mixer>>, id: LayerId, v01: f32) {
    let plan: LevelPlan = {
        let mut m = mixer.borrow_mut();
        if !m.unlocked {
            return;
        }
        let Some(layer) = m.layers.get_mut(&id) else {
            return;
        };
        let buffer_ready = layer.buffer.is_some();
        layer.control.request(v01, buffer_ready)
    };

    if plan.start {
        start_layer(mixer, id);
    }

    {
        let m = mixer.borrow();
        let (Some(ctx), Some(layer)) = (m.ctx.as_ref(), m.layers.get(&id)) else {
            return;
        };
        ramp(ctx, &layer.gain.gain(), plan.target_gain);
    }

    match plan.stop_timer {
        TimerOp::Arm => arm_stop_timer(mixer, id),
        TimerOp::Disarm => disarm_stop_timer(mixer, id),
    }
}

/// Linear master level (no perceptual curve), same smoothing ramp.
/// No start/stop machinery; the bus always exists once unlocked.
pub fn set_master(mixer: &Rc<RefCell<Mixer>>, v01: f32) {
    let m = mixer.borrow();
    if !m.unlocked {
        return;
    }
    let (Some(ctx), Some(master)) = (m.ctx.as_ref(), m.master.as_ref()) else {
        return;
    };
    ramp(ctx, &master.gain(), clamp01(v01));
}

/// Cancel any scheduled ramp, then glide toward `target`. Keeping this the
/// only write path to a gain param guarantees no two ramps fight.
fn ramp(ctx: &web::AudioContext, param: &web::AudioParam, target: f32) {
    let now = ctx.current_time();
    _ = param.cancel_scheduled_values(now);
    _ = param.set_target_at_time(target, now, SMOOTH_TAU_SEC);
}

/// Spawn the looping source for a layer. Never called while a source is
/// live; gain changes alone must not restart playback (restart clicks).
fn start_layer(mixer: &Rc<RefCell<Mixer>>, id: LayerId) {
    let mut m = mixer.borrow_mut();
    let Some(ctx) = m.ctx.clone() else { return };
    let Some(layer) = m.layers.get_mut(&id) else {
        return;
    };
    let Some(buffer) = layer.buffer.clone() else {
        layer.control.mark_stopped();
        return;
    };

    let src = match web::AudioBufferSourceNode::new(&ctx) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{} source error: {:?}", id.key(), e);
            layer.control.mark_stopped();
            return;
        }
    };
    src.set_buffer(Some(&buffer));
    src.set_loop(true);
    if let Err(e) = src.connect_with_audio_node(&layer.gain) {
        log::error!("{} source connect error: {:?}", id.key(), e);
        layer.control.mark_stopped();
        return;
    }

    layer.generation = layer.generation.wrapping_add(1);
    let generation = layer.generation;
    let ended = {
        let mixer = mixer.clone();
        Closure::wrap(Box::new(move || {
            let mut m = mixer.borrow_mut();
            if let Some(layer) = m.layers.get_mut(&id) {
                if layer.generation == generation {
                    layer.source = None;
                    layer.onended = None;
                    layer.control.mark_stopped();
                }
            }
        }) as Box<dyn FnMut()>)
    };
    src.set_onended(Some(ended.as_ref().unchecked_ref()));

    if let Err(e) = src.start() {
        log::error!("{} source start error: {:?}", id.key(), e);
        layer.control.mark_stopped();
        return;
    }

    layer.source = Some(src);
    layer.onended = Some(ended);
}

/// Tear down the layer's source. Stopping an already-stopped layer is a
/// silent no-op; stop/disconnect failures are swallowed.
fn stop_layer(mixer: &Rc<RefCell<Mixer>>, id: LayerId) {
    let mut m = mixer.borrow_mut();
    let Some(layer) = m.layers.get_mut(&id) else {
        return;
    };
    layer.generation = layer.generation.wrapping_add(1);
    if let Some(src) = layer.source.take() {
        src.set_onended(None);
        _ = src.stop();
        _ = src.disconnect();
    }
    layer.onended = None;
    layer.control.mark_stopped();
}

/// Schedule the debounced stop check, replacing any pending timer for this
/// layer. The check reads the live smoothed gain, not the volume that armed
/// it, so a layer still audibly fading is left alone.
fn arm_stop_timer(mixer: &Rc<RefCell<Mixer>>, id: LayerId) {
    disarm_stop_timer(mixer, id);

    let cb = {
        let mixer = mixer.clone();
        Closure::wrap(Box::new(move || {
            let due = {
                let mut m = mixer.borrow_mut();
                m.stop_timers.remove(&id);
                let Some(layer) = m.layers.get_mut(&id) else {
                    return;
                };
                let gain_now = layer.gain.gain().value();
                layer.control.stop_due(gain_now)
            };
            if due {
                stop_layer(&mixer, id);
            }
        }) as Box<dyn FnMut()>)
    };

    let Some(window) = web::window() else { return };
    match window.set_timeout_with_callback_and_timeout_and_arguments_0(
        cb.as_ref().unchecked_ref(),
        STOP_DELAY_MS,
    ) {
        Ok(handle) => {
            mixer
                .borrow_mut()
                .stop_timers
                .insert(id, StopTimer { handle, _closure: cb });
        }
        Err(e) => log::error!("{} stop timer error: {:?}", id.key(), e),
    }
}

fn disarm_stop_timer(mixer: &Rc<RefCell<Mixer>>, id: LayerId) {
    if let Some(timer) = mixer.borrow_mut().stop_timers.remove(&id) {
        if let Some(window) = web::window() {
            window.clear_timeout_with_handle(timer.handle);
        }
    }
}
