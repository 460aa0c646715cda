/// Volume-to-gain mapping and mixer tuning constants.
///
/// UI volumes are plain numbers in [0, 1]; the audio graph runs on gain
/// values produced by `curve`. Both the set path and the stop-threshold
/// check go through the same mapping so the hysteresis band stays aligned
/// with what is actually audible.
// Smoothing time constant for every gain ramp (seconds)
pub const SMOOTH_TAU_SEC: f64 = 0.06;

// Start/stop hysteresis around silence; START_AT must stay above STOP_AT
// or a knob hovering at the boundary flaps playback on and off.
pub const START_AT: f32 = 0.006;
pub const STOP_AT: f32 = 0.003;

// How long a layer must sit at/below STOP_AT before it may actually stop
pub const STOP_DELAY_MS: i32 = 700;

// Tolerance when comparing the live smoothed gain against the stop floor
pub const STOP_GAIN_EPSILON: f32 = 0.0005;

// Master bus level at context creation
pub const DEFAULT_MASTER: f32 = 0.8;

/// Clamp a volume request to [0, 1]. NaN collapses to silence.
#[inline]
pub fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Perceptual gain curve: compresses the low end so quiet mixing is
/// controllable with a linear knob.
#[inline]
pub fn curve(v01: f32) -> f32 {
    clamp01(v01).powf(1.8)
}

/// Smoothed-gain level at or below which a fired stop timer may stop playback.
#[inline]
pub fn stop_floor() -> f32 {
    curve(STOP_AT) + STOP_GAIN_EPSILON
}
