//! Per-strip render state and pixel-level helpers for effects.
//!
//! A [`Segment`] covers a contiguous run of the strip (in this crate always
//! the whole strip) and owns everything an effect reads or mutates between
//! frames: the three color slots, speed/intensity/custom parameters, the
//! selected palette, and the WLED-style runtime block (`call`, `step`,
//! `aux0/1`, `next_time`, `data`). Pixel operations take the surface
//! explicitly so the segment itself stays plain state.
//!
//! All pixel indices here are segment-relative; translation to absolute
//! strip indices happens inside the accessors. Out-of-range indices are
//! silently ignored so effects written for arbitrary lengths never fault.

use std::time::Instant;

use crate::color::{BLACK, Color};
use crate::palette;
use crate::surface::{Pixel, PixelSurface};

pub struct Segment {
    start: usize,
    length: usize,

    /// Primary / background / tertiary colors.
    pub colors: [Color; 3],

    // Effect parameters, 0–255, interpreted by each effect.
    pub speed: u8,
    pub intensity: u8,
    pub custom1: u8,
    pub custom2: u8,
    pub custom3: u8,
    pub palette_id: usize,

    // Runtime state, owned by the active effect, cleared by `reset`.
    pub call: u32,
    pub step: u32,
    pub aux0: u32,
    pub aux1: u32,
    pub next_time: u64,
    pub data: Vec<u32>,

    start_time: Instant,
}

impl Segment {
    /// Segment over `[start, stop)`. `stop < start` yields an empty segment.
    pub fn new(start: usize, stop: usize) -> Self {
        Self {
            start,
            length: stop.saturating_sub(start),
            colors: [
                Color::from_rgb(255, 0, 0),
                Color::from_rgb(0, 0, 0),
                Color::from_rgb(0, 0, 255),
            ],
            speed: 128,
            intensity: 128,
            custom1: 0,
            custom2: 0,
            custom3: 0,
            palette_id: palette::DEFAULT_PALETTE,
            call: 0,
            step: 0,
            aux0: 0,
            aux1: 0,
            next_time: 0,
            data: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Milliseconds since segment construction. `Instant`-based, so immune
    /// to wall-clock adjustments — effects use this for phase computation.
    pub fn now(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Color slot accessor (0–2). Out-of-range slots read as black.
    pub fn color(&self, slot: usize) -> Color {
        self.colors.get(slot).copied().unwrap_or(BLACK)
    }

    pub fn get_pixel_color(&self, surface: &dyn PixelSurface, i: usize) -> Color {
        if i >= self.length {
            return BLACK;
        }
        surface.get(self.start + i).to_color()
    }

    pub fn set_pixel_color(&self, surface: &mut dyn PixelSurface, i: usize, color: Color) {
        if i >= self.length {
            return;
        }
        let pixel = Pixel::from_color(color, surface.width());
        surface.set(self.start + i, pixel);
    }

    pub fn fill(&self, surface: &mut dyn PixelSurface, color: Color) {
        for i in 0..self.length {
            self.set_pixel_color(surface, i, color);
        }
    }

    /// Fade every pixel toward black by `amount / 255`.
    pub fn fade_out(&self, surface: &mut dyn PixelSurface, amount: u8) {
        for i in 0..self.length {
            let faded = self.get_pixel_color(surface, i).fade(amount);
            self.set_pixel_color(surface, i, faded);
        }
    }

    /// Blend each pixel with its neighbors. Boundary pixels blend with their
    /// single neighbor at full `amount`; interior pixels blend left at
    /// `amount / 2`, then right at `amount / 2`. The left-first order is
    /// load-bearing for visual parity — do not reorder.
    pub fn blur(&self, surface: &mut dyn PixelSurface, amount: u8) {
        if amount == 0 || self.length < 3 {
            return;
        }
        let snapshot: Vec<Color> =
            (0..self.length).map(|i| self.get_pixel_color(surface, i)).collect();

        for i in 0..self.length {
            let blended = if i == 0 {
                snapshot[i].blend(snapshot[i + 1], amount)
            } else if i == self.length - 1 {
                snapshot[i].blend(snapshot[i - 1], amount)
            } else {
                let left = snapshot[i].blend(snapshot[i - 1], amount / 2);
                left.blend(snapshot[i + 1], amount / 2)
            };
            self.set_pixel_color(surface, i, blended);
        }
    }

    /// Palette lookup for this segment. With `use_index` and `length > 1`,
    /// `index` is mapped linearly onto 0–255 across the segment so effects
    /// can paint position-based gradients; otherwise the low byte of `index`
    /// is used directly.
    pub fn color_from_palette(&self, index: usize, use_index: bool, brightness: u8) -> Color {
        let pos = if use_index && self.length > 1 {
            ((index * 255) / (self.length - 1)).min(255) as u8
        } else {
            (index & 0xFF) as u8
        };
        palette::palette_or_default(self.palette_id).color_at(pos, brightness)
    }

    /// Clear the runtime block. Must run whenever the effect, its palette,
    /// speed, intensity, or colors change so the next effect starts clean
    /// instead of inheriting a previous effect's counters.
    pub fn reset(&mut self) {
        self.call = 0;
        self.step = 0;
        self.aux0 = 0;
        self.aux1 = 0;
        self.next_time = 0;
        self.data.clear();
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ChannelWidth, MemorySurface};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn segment_and_surface(len: usize) -> (Segment, MemorySurface) {
        (Segment::new(0, len), MemorySurface::new(len, ChannelWidth::Rgb))
    }

    #[test]
    fn set_and_get_round_trip() {
        let (seg, mut surface) = segment_and_surface(10);
        seg.set_pixel_color(&mut surface, 3, Color::from_rgb(1, 2, 3));
        assert_eq!(seg.get_pixel_color(&surface, 3), Color::from_rgb(1, 2, 3));
    }

    #[test]
    fn offset_segment_translates_indices() {
        let seg = Segment::new(4, 8);
        let mut surface = MemorySurface::new(8, ChannelWidth::Rgb);
        seg.set_pixel_color(&mut surface, 0, Color::from_rgb(7, 7, 7));
        assert_eq!(surface.get(4).to_color(), Color::from_rgb(7, 7, 7));
        assert_eq!(surface.get(0).to_color(), BLACK);
    }

    #[test]
    fn out_of_range_is_silent() {
        let (seg, mut surface) = segment_and_surface(4);
        seg.set_pixel_color(&mut surface, 100, Color::from_rgb(9, 9, 9));
        assert_eq!(seg.get_pixel_color(&surface, 100), BLACK);
    }

    #[test]
    fn stop_before_start_is_empty() {
        let seg = Segment::new(10, 5);
        assert_eq!(seg.length(), 0);
    }

    #[test]
    fn fill_covers_segment_only() {
        let seg = Segment::new(1, 4);
        let mut surface = MemorySurface::new(5, ChannelWidth::Rgb);
        seg.fill(&mut surface, Color::from_rgb(5, 5, 5));
        assert_eq!(surface.get(0).to_color(), BLACK);
        for i in 1..4 {
            assert_eq!(surface.get(i).to_color(), Color::from_rgb(5, 5, 5));
        }
        assert_eq!(surface.get(4).to_color(), BLACK);
    }

    #[test]
    fn fade_out_decays_toward_black() {
        let (seg, mut surface) = segment_and_surface(3);
        seg.fill(&mut surface, Color::from_rgb(200, 100, 40));
        seg.fade_out(&mut surface, 128);
        let faded = seg.get_pixel_color(&surface, 0);
        assert_eq!(faded, Color::from_rgb(200, 100, 40).fade(128));
        assert!(faded.r() < 200);
    }

    #[rstest]
    #[case(0, 10)] // amount 0 is a no-op
    #[case(128, 2)] // too short is a no-op
    fn blur_no_op_cases(#[case] amount: u8, #[case] len: usize) {
        let (seg, mut surface) = segment_and_surface(len);
        seg.set_pixel_color(&mut surface, 0, Color::from_rgb(255, 0, 0));
        let before: Vec<Color> = (0..len).map(|i| seg.get_pixel_color(&surface, i)).collect();
        seg.blur(&mut surface, amount);
        let after: Vec<Color> = (0..len).map(|i| seg.get_pixel_color(&surface, i)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn blur_spreads_a_point_left_biased() {
        let (seg, mut surface) = segment_and_surface(5);
        seg.set_pixel_color(&mut surface, 2, Color::from_rgb(255, 0, 0));
        seg.blur(&mut surface, 128);

        // Neighbors pick up red from the lit center.
        assert!(seg.get_pixel_color(&surface, 1).r() > 0);
        assert!(seg.get_pixel_color(&surface, 3).r() > 0);
        // The exact center value follows the left-then-right blend order.
        let expected = Color::from_rgb(255, 0, 0)
            .blend(BLACK, 64)
            .blend(BLACK, 64);
        assert_eq!(seg.get_pixel_color(&surface, 2), expected);
    }

    #[rstest]
    #[case(10)]
    #[case(2)]
    #[case(60)]
    fn palette_index_maps_segment_ends_to_palette_ends(#[case] len: usize) {
        let (seg, _) = segment_and_surface(len);
        let p = palette::palette_or_default(seg.palette_id);
        assert_eq!(seg.color_from_palette(0, true, 255), p.color_at(0, 255));
        assert_eq!(seg.color_from_palette(len - 1, true, 255), p.color_at(255, 255));
    }

    #[test]
    fn palette_raw_index_uses_low_byte() {
        let (seg, _) = segment_and_surface(10);
        let p = palette::palette_or_default(seg.palette_id);
        assert_eq!(seg.color_from_palette(256 + 85, false, 255), p.color_at(85, 255));
    }

    #[test]
    fn reset_zeroes_runtime_state() {
        let (mut seg, _) = segment_and_surface(10);
        seg.call = 7;
        seg.step = 1234;
        seg.aux0 = 9;
        seg.aux1 = 10;
        seg.next_time = 999;
        seg.data = vec![1, 2, 3];
        seg.reset();
        assert_eq!(seg.call, 0);
        assert_eq!(seg.step, 0);
        assert_eq!(seg.aux0, 0);
        assert_eq!(seg.aux1, 0);
        assert_eq!(seg.next_time, 0);
        assert!(seg.data.is_empty());
    }

    #[test]
    fn now_is_monotonic_from_construction() {
        let (seg, _) = segment_and_surface(1);
        let a = seg.now();
        let b = seg.now();
        assert!(b >= a);
    }
}
