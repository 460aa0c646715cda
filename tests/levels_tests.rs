// Host-side tests for the volume-to-gain mapping.
// The main crate is wasm-only, so we include the pure-Rust module directly.

#![allow(dead_code)]
mod levels {
    include!("../src/core/levels.rs");
}

use levels::*;

#[test]
fn curve_endpoints() {
    assert_eq!(curve(0.0), 0.0);
    assert!((curve(1.0) - 1.0).abs() < 1e-6);
}

#[test]
fn curve_is_monotonic_over_range() {
    let mut prev = curve(0.0);
    for i in 1..=1000 {
        let v = i as f32 / 1000.0;
        let g = curve(v);
        assert!(g >= prev, "curve not non-decreasing at v={v}");
        prev = g;
    }
}

#[test]
fn curve_compresses_low_end() {
    // The whole point of the power curve: low knob values map well below linear.
    let g = curve(0.5);
    assert!((g - 0.5_f32.powf(1.8)).abs() < 1e-6);
    assert!((g - 0.287).abs() < 0.01, "curve(0.5) should be ~0.287, got {g}");
    assert!(curve(0.1) < 0.1);
}

#[test]
fn out_of_range_volumes_are_clamped() {
    assert_eq!(curve(-0.5), 0.0);
    assert!((curve(1.5) - 1.0).abs() < 1e-6);
    assert_eq!(clamp01(2.0), 1.0);
    assert_eq!(clamp01(-1.0), 0.0);
}

#[test]
fn nan_volume_collapses_to_silence() {
    assert_eq!(clamp01(f32::NAN), 0.0);
    assert_eq!(curve(f32::NAN), 0.0);
}

#[test]
fn infinite_volumes_clamp_like_any_out_of_range_value() {
    assert_eq!(clamp01(f32::INFINITY), 1.0);
    assert!((curve(f32::INFINITY) - 1.0).abs() < 1e-6);
    assert_eq!(clamp01(f32::NEG_INFINITY), 0.0);
    assert_eq!(curve(f32::NEG_INFINITY), 0.0);
}

#[test]
fn hysteresis_band_is_ordered() {
    assert!(START_AT > STOP_AT, "start threshold must sit above stop threshold");
    assert!(STOP_AT > 0.0);
}

#[test]
fn stop_floor_sits_above_curved_stop_threshold() {
    assert!(stop_floor() > curve(STOP_AT));
    // An audibly mixed layer is always well clear of the floor.
    assert!(curve(0.5) > stop_floor());
}
