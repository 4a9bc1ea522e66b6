//! The pixel surface contract and the tagged pixel type.
//!
//! A [`PixelSurface`] is the minimal interface the engine needs from an
//! addressable-LED driver: indexable get/set of a channel tuple, a flush, and
//! teardown. The channel width (3, 4, or 5 channels) is declared once per
//! surface instead of being probed per call, and pixels travel as a tagged
//! [`Pixel`] enum so the compiler keeps widths honest.
//!
//! [`MemorySurface`] is the in-memory implementation used by tests and by
//! builds without the `hardware` feature, so the whole engine can be
//! exercised off the Pi.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::LedError;
use crate::color::Color;

// ── Channel width ──────────────────────────────────────────────────

/// How many channels a surface carries per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelWidth {
    /// 3 channels: R, G, B.
    Rgb,
    /// 4 channels: R, G, B + one white.
    Rgbw,
    /// 5 channels: R, G, B + warm white + cold white.
    Rgbcct,
}

impl ChannelWidth {
    pub const fn channels(self) -> usize {
        match self {
            ChannelWidth::Rgb => 3,
            ChannelWidth::Rgbw => 4,
            ChannelWidth::Rgbcct => 5,
        }
    }

    /// Derive the width from a channel-order string such as `GRB`, `GRBW`,
    /// or `GRBWW`. A double `W` (or five characters) marks a dual-white
    /// strip; a single `W` (or four characters) marks RGBW.
    pub fn from_order(order: &str) -> Self {
        let order = order.to_ascii_uppercase();
        if order.contains("WW") || order.len() >= 5 {
            ChannelWidth::Rgbcct
        } else if order.contains('W') || order.len() == 4 {
            ChannelWidth::Rgbw
        } else {
            ChannelWidth::Rgb
        }
    }
}

// ── Pixel ──────────────────────────────────────────────────────────

/// One pixel's channel values, tagged by width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pixel {
    Rgb([u8; 3]),
    Rgbw([u8; 4]),
    Rgbcct([u8; 5]),
}

impl Pixel {
    pub const fn black(width: ChannelWidth) -> Pixel {
        match width {
            ChannelWidth::Rgb => Pixel::Rgb([0; 3]),
            ChannelWidth::Rgbw => Pixel::Rgbw([0; 4]),
            ChannelWidth::Rgbcct => Pixel::Rgbcct([0; 5]),
        }
    }

    /// Unpack a [`Color`] into a pixel of the given width. Channels the
    /// width cannot carry are dropped.
    pub fn from_color(color: Color, width: ChannelWidth) -> Pixel {
        match width {
            ChannelWidth::Rgb => Pixel::Rgb([color.r(), color.g(), color.b()]),
            ChannelWidth::Rgbw => Pixel::Rgbw([color.r(), color.g(), color.b(), color.w()]),
            ChannelWidth::Rgbcct => {
                Pixel::Rgbcct([color.r(), color.g(), color.b(), color.w(), color.cw()])
            }
        }
    }

    /// Pack back into the codec's color format.
    pub fn to_color(self) -> Color {
        match self {
            Pixel::Rgb([r, g, b]) => Color::from_rgb(r, g, b),
            Pixel::Rgbw([r, g, b, w]) => Color::from_rgbw(r, g, b, w),
            Pixel::Rgbcct([r, g, b, w, cw]) => Color::from_rgbcct(r, g, b, w, cw),
        }
    }

    /// The RGB part regardless of width.
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            Pixel::Rgb([r, g, b]) => (r, g, b),
            Pixel::Rgbw([r, g, b, _]) => (r, g, b),
            Pixel::Rgbcct([r, g, b, _, _]) => (r, g, b),
        }
    }

    pub const fn width(self) -> ChannelWidth {
        match self {
            Pixel::Rgb(_) => ChannelWidth::Rgb,
            Pixel::Rgbw(_) => ChannelWidth::Rgbw,
            Pixel::Rgbcct(_) => ChannelWidth::Rgbcct,
        }
    }
}

// ── Surface trait ──────────────────────────────────────────────────

/// Contract required from an LED-strip driver (or an adapter in front of
/// one). Out-of-range reads return black and out-of-range writes are no-ops
/// so that effects written generically for varying lengths never fault.
pub trait PixelSurface {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channel width, fixed for the lifetime of the surface.
    fn width(&self) -> ChannelWidth;

    fn get(&self, index: usize) -> Pixel;

    fn set(&mut self, index: usize, pixel: Pixel);

    /// Flush the current pixel state to the wire.
    fn show(&mut self) -> Result<(), LedError>;

    /// Release the underlying driver. Further calls are no-ops.
    fn deinit(&mut self);

    /// Driver-level global brightness, 0.0–1.0.
    fn set_brightness(&mut self, value: f32);
}

impl core::fmt::Debug for dyn PixelSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelSurface")
            .field("len", &self.len())
            .field("width", &self.width())
            .finish()
    }
}

/// Fill every pixel with one color. Free function so adapters can override
/// per-pixel behavior in their own `set`.
pub fn fill(surface: &mut dyn PixelSurface, color: Color) {
    let pixel = Pixel::from_color(color, surface.width());
    for i in 0..surface.len() {
        surface.set(i, pixel);
    }
}

// ── Memory surface ─────────────────────────────────────────────────

/// In-memory pixel surface. The pixel buffer and flush counter are shared
/// through `Arc` so tests can observe what the render worker wrote.
pub struct MemorySurface {
    pixels: Arc<Mutex<Vec<Pixel>>>,
    width: ChannelWidth,
    brightness: f32,
    shows: Arc<AtomicUsize>,
}

impl MemorySurface {
    pub fn new(count: usize, width: ChannelWidth) -> Self {
        Self {
            pixels: Arc::new(Mutex::new(vec![Pixel::black(width); count])),
            width,
            brightness: 1.0,
            shows: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle to the pixel buffer.
    pub fn buffer(&self) -> Arc<Mutex<Vec<Pixel>>> {
        Arc::clone(&self.pixels)
    }

    /// Shared flush counter.
    pub fn show_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.shows)
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }
}

impl PixelSurface for MemorySurface {
    fn len(&self) -> usize {
        self.pixels.lock().unwrap().len()
    }

    fn width(&self) -> ChannelWidth {
        self.width
    }

    fn get(&self, index: usize) -> Pixel {
        let pixels = self.pixels.lock().unwrap();
        pixels.get(index).copied().unwrap_or(Pixel::black(self.width))
    }

    fn set(&mut self, index: usize, pixel: Pixel) {
        // The buffer holds the declared width; coerce mismatched writes.
        let pixel = if pixel.width() == self.width {
            pixel
        } else {
            Pixel::from_color(pixel.to_color(), self.width)
        };
        let mut pixels = self.pixels.lock().unwrap();
        if let Some(slot) = pixels.get_mut(index) {
            *slot = pixel;
        }
    }

    fn show(&mut self) -> Result<(), LedError> {
        self.shows.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deinit(&mut self) {}

    fn set_brightness(&mut self, value: f32) {
        self.brightness = value.clamp(0.0, 1.0);
    }
}

// ── Tests ──────────────────────────────────────────────────────────
