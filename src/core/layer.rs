// Layer identifiers and the per-layer playback state machine.
//
// `LayerControl` is pure bookkeeping: it turns a raw volume request into a
// `LevelPlan` describing what the audio graph should do, without touching
// the graph itself. The web engine applies the plan; host-side tests drive
// the machine directly. No inner doc comments here: this file is also
// include!-ed by the native test binaries.

use super::levels::{clamp01, curve, stop_floor, START_AT, STOP_AT};

/// One of the fixed set of ambient sound tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerId {
    Rain,
    Wind,
    Traffic,
    Room,
    Hum,
    Noise,
}

impl LayerId {
    pub const ALL: [LayerId; 6] = [
        LayerId::Rain,
        LayerId::Wind,
        LayerId::Traffic,
        LayerId::Room,
        LayerId::Hum,
        LayerId::Noise,
    ];

    /// Stable string id used by the UI layer.
    pub fn key(self) -> &'static str {
        match self {
            LayerId::Rain => "rain",
            LayerId::Wind => "wind",
            LayerId::Traffic => "traffic",
            LayerId::Room => "room",
            LayerId::Hum => "hum",
            LayerId::Noise => "noise",
        }
    }

    pub fn from_key(name: &str) -> Option<LayerId> {
        LayerId::ALL.iter().copied().find(|id| id.key() == name)
    }

    /// Location of the encoded asset for this layer.
    pub fn asset_url(self) -> &'static str {
        match self {
            LayerId::Rain => "sounds/rain.wav",
            LayerId::Wind => "sounds/wind.wav",
            LayerId::Traffic => "sounds/traffic.wav",
            LayerId::Room => "sounds/room.wav",
            LayerId::Hum => "sounds/hum.wav",
            LayerId::Noise => "sounds/noise.wav",
        }
    }
}

/// Stop-timer instruction attached to a `LevelPlan`.
///
/// `Arm` always replaces any pending timer for the layer, so at most one
/// timer is ever live regardless of request rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerOp {
    Arm,
    Disarm,
}

/// Graph-side actions for one volume request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelPlan {
    /// Spawn a new looping source (layer was stopped, buffer present).
    pub start: bool,
    /// Gain value to ramp toward, already curve-mapped.
    pub target_gain: f32,
    pub stop_timer: TimerOp,
}

/// Per-layer playback state machine.
///
/// Decouples what the user asked for (raw volume) from what the graph is
/// doing (smoothed gain, debounced start/stop): gain changes while playing
/// never restart the source, and stopping requires the volume to sit below
/// `STOP_AT` for the full debounce delay.
#[derive(Clone, Debug, Default)]
pub struct LayerControl {
    playing: bool,
    stop_armed: bool,
}

impl LayerControl {
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn stop_pending(&self) -> bool {
        self.stop_armed
    }

    /// Plan the response to a volume request.
    ///
    /// A request above `START_AT` with no buffer available is accepted
    /// silently: the gain is still tracked but nothing starts.
    pub fn request(&mut self, v01: f32, buffer_ready: bool) -> LevelPlan {
        let v = clamp01(v01);

        let start = !self.playing && buffer_ready && v > START_AT;
        if start {
            self.playing = true;
        }

        let stop_timer = if self.playing && v <= STOP_AT {
            self.stop_armed = true;
            TimerOp::Arm
        } else {
            self.stop_armed = false;
            TimerOp::Disarm
        };

        LevelPlan {
            start,
            target_gain: curve(v),
            stop_timer,
        }
    }

    /// Decide whether to stop now that an armed stop timer has fired.
    ///
    /// `smoothed_gain` is the live gain value at fire time, not the volume
    /// that armed the timer; the layer must not stop while still audible.
    pub fn stop_due(&mut self, smoothed_gain: f32) -> bool {
        self.stop_armed = false;
        if self.playing && smoothed_gain <= stop_floor() {
            self.playing = false;
            true
        } else {
            false
        }
    }

    /// Playback ended outside the engine's control (source `onended`).
    pub fn mark_stopped(&mut self) {
        self.playing = false;
        self.stop_armed = false;
    }
}
