//! Dual-chip RGBCCT adapter.
//!
//! Some RGBCCT strips put two separate LED chips at every visual position:
//! one RGB chip and one warm/cool-white chip, wired as consecutive pixels on
//! the data line. [`DualChipSurface`] wraps a physical surface of
//! `2 * logical` pixels and presents the logical view the effect engine
//! expects: logical index `i` maps to physical `2i` (RGB) and `2i + 1`
//! (white). The white channels are global — one warm/cool pair for the whole
//! strip — and reads return only the RGB chip's value.
//!
//! The physical driver's brightness stays pinned at maximum; RGB and white
//! dimming both happen in software here so they can be scaled independently,
//! which a single driver-level brightness cannot express.

use crate::LedError;
use crate::color::Color;
use crate::surface::{ChannelWidth, Pixel, PixelSurface};

/// Coolest supported white temperature.
pub const KELVIN_MAX: u16 = 6500;
/// Warmest supported white temperature.
pub const KELVIN_MIN: u16 = 2700;

pub struct DualChipSurface {
    physical: Box<dyn PixelSurface>,
    logical: usize,

    // Global white channel values, 0–255 each.
    ww: u8,
    cw: u8,

    // Independent software brightness scalars, 0.0–1.0.
    rgb_brightness: f32,
    white_brightness: f32,
}

impl DualChipSurface {
    /// Wrap a physical surface. `physical.len()` must be `2 * logical`;
    /// anything beyond that range is simply never addressed.
    pub fn new(mut physical: Box<dyn PixelSurface>, logical: usize) -> Self {
        // Software dimming only — the driver would otherwise scale RGB and
        // white by the same factor.
        physical.set_brightness(1.0);
        Self {
            physical,
            logical,
            ww: 0,
            cw: 0,
            rgb_brightness: 1.0,
            white_brightness: 1.0,
        }
    }

    /// Set the global warm/cool white values directly and rewrite every
    /// white-chip pixel.
    pub fn set_cct(&mut self, ww: u8, cw: u8) {
        self.ww = ww;
        self.cw = cw;
        self.rewrite_white_pixels();
    }

    /// Set white output by color temperature. `ww` takes the full level at
    /// 2700 K and none at 6500 K, linear in between.
    pub fn set_white_temperature(&mut self, kelvin: u16, level: u8) {
        let kelvin = kelvin.clamp(KELVIN_MIN, KELVIN_MAX);
        let ww_ratio = 1.0 - (kelvin - KELVIN_MIN) as f32 / (KELVIN_MAX - KELVIN_MIN) as f32;
        self.ww = (level as f32 * ww_ratio) as u8;
        self.cw = (level as f32 * (1.0 - ww_ratio)) as u8;
        self.rewrite_white_pixels();
    }

    /// Applies on the next logical write; the render loop writes every tick,
    /// so the lag is one frame.
    pub fn set_rgb_brightness(&mut self, value: f32) {
        self.rgb_brightness = value.clamp(0.0, 1.0);
    }

    /// Rewrites every white-chip pixel and flushes immediately.
    pub fn set_white_brightness(&mut self, value: f32) -> Result<(), LedError> {
        self.white_brightness = value.clamp(0.0, 1.0);
        self.rewrite_white_pixels();
        self.physical.show()
    }

    pub fn ww(&self) -> u8 {
        self.ww
    }

    pub fn cw(&self) -> u8 {
        self.cw
    }

    pub fn rgb_brightness(&self) -> f32 {
        self.rgb_brightness
    }

    pub fn white_brightness(&self) -> f32 {
        self.white_brightness
    }

    /// The white-chip wire value. The chip's first two channels are wired
    /// swapped relative to the logical W/CW order, so the tuple is
    /// `(cw, ww, 0)` — keep this bit-for-bit.
    fn white_pixel(&self) -> Pixel {
        let ww = (self.ww as f32 * self.white_brightness) as u8;
        let cw = (self.cw as f32 * self.white_brightness) as u8;
        Pixel::Rgb([cw, ww, 0])
    }

    fn rewrite_white_pixels(&mut self) {
        let pixel = self.white_pixel();
        for i in 0..self.logical {
            self.physical.set(2 * i + 1, pixel);
        }
    }
}

impl PixelSurface for DualChipSurface {
    fn len(&self) -> usize {
        self.logical
    }

    /// The logical array is RGB-visible; white state is global, not
    /// per-pixel.
    fn width(&self) -> ChannelWidth {
        ChannelWidth::Rgb
    }

    fn get(&self, index: usize) -> Pixel {
        if index >= self.logical {
            return Pixel::black(ChannelWidth::Rgb);
        }
        self.physical.get(2 * index)
    }

    fn set(&mut self, index: usize, pixel: Pixel) {
        if index >= self.logical {
            return;
        }
        let (r, g, b) = pixel.rgb();
        let scaled = Pixel::Rgb([
            (r as f32 * self.rgb_brightness) as u8,
            (g as f32 * self.rgb_brightness) as u8,
            (b as f32 * self.rgb_brightness) as u8,
        ]);
        self.physical.set(2 * index, scaled);
        self.physical.set(2 * index + 1, self.white_pixel());
    }

    fn show(&mut self) -> Result<(), LedError> {
        self.physical.show()
    }

    fn deinit(&mut self) {
        self.physical.deinit();
    }

    fn set_brightness(&mut self, value: f32) {
        self.set_rgb_brightness(value);
    }
}

/// Convenience for the controller's blank-on-power-off path.
pub fn blank(surface: &mut dyn PixelSurface) -> Result<(), LedError> {
    crate::surface::fill(surface, Color::from_rgb(0, 0, 0));
    surface.show()
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::Mutex;

    fn adapter(logical: usize) -> (DualChipSurface, Arc<Mutex<Vec<Pixel>>>) {
        let physical = MemorySurface::new(logical * 2, ChannelWidth::Rgb);
        let buffer = physical.buffer();
        (DualChipSurface::new(Box::new(physical), logical), buffer)
    }

    #[test]
    fn len_is_logical_count() {
        let (surface, _) = adapter(7);
        assert_eq!(surface.len(), 7);
    }

    #[test]
    fn logical_write_produces_two_physical_writes() {
        let (mut surface, buffer) = adapter(4);
        surface.set_cct(200, 100);
        surface.set(2, Pixel::Rgb([10, 20, 30]));

        let pixels = buffer.lock().unwrap();
        assert_eq!(pixels[4], Pixel::Rgb([10, 20, 30]));
        // White chip gets (cw, ww, 0) — swapped wiring order.
        assert_eq!(pixels[5], Pixel::Rgb([100, 200, 0]));
    }

    #[test]
    fn get_returns_rgb_chip_unchanged() {
        let (mut surface, _) = adapter(3);
        surface.set_cct(255, 255);
        surface.set(1, Pixel::Rgb([1, 2, 3]));
        assert_eq!(surface.get(1), Pixel::Rgb([1, 2, 3]));
    }

    #[test]
    fn out_of_range_index_is_harmless() {
        let (mut surface, buffer) = adapter(2);
        surface.set(5, Pixel::Rgb([255, 255, 255]));
        assert!(buffer.lock().unwrap().iter().all(|p| *p == Pixel::Rgb([0, 0, 0])));
        assert_eq!(surface.get(5), Pixel::black(ChannelWidth::Rgb));
    }

    #[rstest]
    #[case(2700, 255, 255, 0)]
    #[case(6500, 255, 0, 255)]
    #[case(2000, 255, 255, 0)] // clamped to the warm end
    #[case(9000, 255, 0, 255)] // clamped to the cool end
    fn white_temperature_endpoints(
        #[case] kelvin: u16,
        #[case] level: u8,
        #[case] ww: u8,
        #[case] cw: u8,
    ) {
        let (mut surface, _) = adapter(3);
        surface.set_white_temperature(kelvin, level);
        assert_eq!((surface.ww(), surface.cw()), (ww, cw));
    }

    #[test]
    fn white_temperature_midpoint_balances() {
        let (mut surface, _) = adapter(3);
        surface.set_white_temperature(4600, 255);
        let diff = (surface.ww() as i16 - surface.cw() as i16).abs();
        assert!(diff <= 1, "ww={} cw={}", surface.ww(), surface.cw());
    }

    #[test]
    fn white_temperature_rewrites_all_white_chips() {
        let (mut surface, buffer) = adapter(3);
        surface.set_white_temperature(2700, 100);
        let pixels = buffer.lock().unwrap();
        for i in 0..3 {
            assert_eq!(pixels[2 * i + 1], Pixel::Rgb([0, 100, 0]));
        }
    }

    #[test]
    fn rgb_brightness_scales_next_write_only() {
        let (mut surface, _) = adapter(2);
        surface.set(0, Pixel::Rgb([200, 100, 50]));
        surface.set_rgb_brightness(0.5);
        // Existing pixel untouched until rewritten.
        assert_eq!(surface.get(0), Pixel::Rgb([200, 100, 50]));
        surface.set(0, Pixel::Rgb([200, 100, 50]));
        assert_eq!(surface.get(0), Pixel::Rgb([100, 50, 25]));
    }

    #[test]
    fn white_brightness_scales_and_flushes_immediately() {
        let physical = MemorySurface::new(4, ChannelWidth::Rgb);
        let buffer = physical.buffer();
        let shows = physical.show_counter();
        let mut surface = DualChipSurface::new(Box::new(physical), 2);

        surface.set_cct(200, 100);
        surface.set_white_brightness(0.5).unwrap();

        let pixels = buffer.lock().unwrap();
        assert_eq!(pixels[1], Pixel::Rgb([50, 100, 0]));
        assert_eq!(shows.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn fill_writes_white_for_every_logical_pixel() {
        let (mut surface, buffer) = adapter(3);
        surface.set_cct(10, 20);
        crate::surface::fill(&mut surface, Color::from_rgb(1, 1, 1));
        let pixels = buffer.lock().unwrap();
        for i in 0..3 {
            assert_eq!(pixels[2 * i], Pixel::Rgb([1, 1, 1]));
            assert_eq!(pixels[2 * i + 1], Pixel::Rgb([20, 10, 0]));
        }
    }
}
