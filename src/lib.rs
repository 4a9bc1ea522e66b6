//! Real-time effect engine for addressable LED strips on the Raspberry Pi.
//!
//! The crate drives WS2812B-class strips and dual-chip RGBCCT strips (one
//! RGB chip plus one warm/cool-white chip per visual pixel) through a small
//! set of layers:
//! - [`color`]: packed color values and channel math
//! - [`palette`]: named gradient palettes with interpolated lookup
//! - [`surface`]: the pixel-surface abstraction and an in-memory test double
//! - [`segment`]: per-strip render state the effects mutate between frames
//! - [`effects`]: the effect registry, id → render function
//! - [`rgbcct`]: the logical→physical 2:1 adapter for dual-chip strips
//! - [`hardware`]: strip acquisition, gated behind the `hardware` feature
//! - [`controller`]: the render worker and the thread-safe control API
//!
//! Everything except the `rs_ws281x` driver binding builds and tests on any
//! machine; the driver is only compiled with `--features hardware`.

pub mod color;
pub mod controller;
pub mod effects;
pub mod hardware;
pub mod palette;
pub mod rgbcct;
pub mod segment;
pub mod surface;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

// ── Errors ─────────────────────────────────────────────────────────

/// Everything that can go wrong talking to or configuring the strip.
///
/// `HardwareUnavailable` is recoverable by design: the controller records it
/// and retries initialization on the next mutating call, so running on a
/// machine without the driver degrades to "not connected" instead of
/// panicking.
#[derive(Clone, Debug, Error)]
pub enum LedError {
    #[error("LED hardware unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("invalid GPIO pin {0}: PWM output requires pin 12, 13, 18, or 19")]
    InvalidPin(u8),
    #[error("invalid effect id {0}")]
    InvalidEffect(usize),
    #[error("invalid palette id {0}")]
    InvalidPalette(usize),
}

// ── Strip configuration ────────────────────────────────────────────

/// Static description of the attached strip.
///
/// `num_leds` is always the logical pixel count — what effects see. In
/// dual-chip mode every logical pixel is two chips on the wire, so the
/// physical surface is allocated at twice the size.
#[derive(Clone, Debug, PartialEq)]
pub struct StripConfig {
    pub num_leds: usize,
    pub gpio_pin: u8,
    /// Initial global brightness, 0.0–1.0.
    pub brightness: f32,
    /// Channel order on the wire, e.g. "GRB", "GRBW".
    pub pixel_order: String,
    pub speed: u8,
    pub intensity: u8,
    /// Strip has separate RGB and warm/cool-white chips per pixel.
    pub dual_chip: bool,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            num_leds: 60,
            gpio_pin: 18,
            brightness: 0.35,
            pixel_order: "GRB".to_string(),
            speed: 128,
            intensity: 128,
            dual_chip: false,
        }
    }
}

impl StripConfig {
    /// Number of pixels actually on the data line.
    pub fn physical_count(&self) -> usize {
        if self.dual_chip { self.num_leds * 2 } else { self.num_leds }
    }

    /// Channel order to configure the driver with. Dual-chip strips are
    /// plain 3-channel chips on the wire, so any white suffix in the
    /// configured order is dropped there.
    pub fn wire_order(&self) -> &str {
        if self.dual_chip && self.pixel_order.len() > 3 {
            &self.pixel_order[..3]
        } else {
            &self.pixel_order
        }
    }
}

// ── Shutdown signaling ─────────────────────────────────────────────

/// Set up a Ctrl+C handler that flips `running` to false.
pub fn setup_signal_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    running
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
