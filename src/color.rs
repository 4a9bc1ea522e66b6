//! Packed color codec for up to five LED channels.
//!
//! Effects and palettes operate on a single packed integer per pixel so that
//! fades and blends are cheap channel-wise integer math. The layout follows
//! the WLED convention, extended by a second white channel for dual-chip
//! RGBCCT strips:
//!
//! ```text
//! bits  [0..8)   blue
//! bits  [8..16)  green
//! bits [16..24)  red
//! bits [24..32)  white (warm / primary white)
//! bits [32..40)  cold white (dual-chip mode only)
//! ```
//!
//! Channel ordering for the physical wire is *not* resolved here — that is
//! the hardware surface's job. Everything in this module is pure, integer
//! arithmetic, masked to 8 bits per channel.

use std::fmt;

// ── Color ──────────────────────────────────────────────────────────

/// A packed color value. `Copy` — pass it around freely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(u64);

/// All channels off.
pub const BLACK: Color = Color(0);

impl Color {
    /// Pack an RGB triple. White channels are zero.
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u64) << 16) | ((g as u64) << 8) | (b as u64))
    }

    /// Pack RGB plus a single white channel.
    pub const fn from_rgbw(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self(((w as u64) << 24) | ((r as u64) << 16) | ((g as u64) << 8) | (b as u64))
    }

    /// Pack all five channels (dual-chip RGBCCT).
    pub const fn from_rgbcct(r: u8, g: u8, b: u8, w: u8, cw: u8) -> Self {
        Self(
            ((cw as u64) << 32)
                | ((w as u64) << 24)
                | ((r as u64) << 16)
                | ((g as u64) << 8)
                | (b as u64),
        )
    }

    /// Reconstruct from a raw packed value (masked to the five channels).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw & 0xFF_FF_FF_FF_FF)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn r(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub const fn g(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    pub const fn b(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub const fn w(self) -> u8 {
        ((self.0 >> 24) & 0xFF) as u8
    }

    pub const fn cw(self) -> u8 {
        ((self.0 >> 32) & 0xFF) as u8
    }

    /// Linear per-channel interpolation toward `other`.
    /// `amount == 0` returns `self` unchanged, `amount == 255` returns `other`.
    pub fn blend(self, other: Color, amount: u8) -> Color {
        if amount == 0 {
            return self;
        }
        if amount == 255 {
            return other;
        }
        Color::from_rgbcct(
            blend_channel(self.r(), other.r(), amount),
            blend_channel(self.g(), other.g(), amount),
            blend_channel(self.b(), other.b(), amount),
            blend_channel(self.w(), other.w(), amount),
            blend_channel(self.cw(), other.cw(), amount),
        )
    }

    /// Fade every channel toward black by `amount / 255`.
    /// `fade(0)` is the identity; `fade(255)` is black.
    pub fn fade(self, amount: u8) -> Color {
        self.scale(255 - amount)
    }

    /// Scale every channel by `brightness / 255`.
    pub fn scale(self, brightness: u8) -> Color {
        if brightness == 255 {
            return self;
        }
        Color::from_rgbcct(
            scale_channel(self.r(), brightness),
            scale_channel(self.g(), brightness),
            scale_channel(self.b(), brightness),
            scale_channel(self.w(), brightness),
            scale_channel(self.cw(), brightness),
        )
    }

    /// Hex encoding of the RGB part, e.g. `#ff0080`. Used by status snapshots.
    pub fn hex_rgb(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r(), self.g(), self.b())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex_rgb())
    }
}

// ── Channel arithmetic ─────────────────────────────────────────────

fn blend_channel(a: u8, b: u8, amount: u8) -> u8 {
    let inv = 255 - amount as u16;
    ((a as u16 * inv + b as u16 * amount as u16) / 255) as u8
}

fn scale_channel(value: u8, factor: u8) -> u8 {
    ((value as u16 * factor as u16) / 255) as u8
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 0)]
    #[case(255, 255, 255)]
    #[case(17, 34, 51)]
    #[case(255, 0, 128)]
    fn rgb_round_trip(#[case] r: u8, #[case] g: u8, #[case] b: u8) {
        let c = Color::from_rgb(r, g, b);
        assert_eq!((c.r(), c.g(), c.b()), (r, g, b));
        assert_eq!(c.w(), 0);
        assert_eq!(c.cw(), 0);
    }

    #[test]
    fn five_channel_round_trip() {
        let c = Color::from_rgbcct(1, 2, 3, 4, 5);
        assert_eq!((c.r(), c.g(), c.b(), c.w(), c.cw()), (1, 2, 3, 4, 5));
    }

    #[test]
    fn from_raw_masks_to_five_channels() {
        let c = Color::from_raw(u64::MAX);
        assert_eq!(c.raw(), 0xFF_FF_FF_FF_FF);
    }

    #[test]
    fn blend_endpoints_are_exact() {
        let a = Color::from_rgb(10, 200, 33);
        let b = Color::from_rgbw(250, 1, 99, 40);
        assert_eq!(a.blend(b, 0), a);
        assert_eq!(a.blend(b, 255), b);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(127)]
    #[case(254)]
    #[case(255)]
    fn blend_with_self_is_identity(#[case] amount: u8) {
        let c = Color::from_rgbcct(12, 34, 56, 78, 90);
        assert_eq!(c.blend(c, amount), c);
    }

    #[test]
    fn blend_midpoint_is_halfway() {
        let a = Color::from_rgb(0, 0, 0);
        let b = Color::from_rgb(200, 100, 50);
        let mid = a.blend(b, 128);
        // Integer truncation: 200*128/255 = 100, 100*128/255 = 50, 50*128/255 = 25
        assert_eq!(mid, Color::from_rgb(100, 50, 25));
    }

    #[test]
    fn fade_zero_is_identity() {
        let c = Color::from_rgbcct(9, 8, 7, 6, 5);
        assert_eq!(c.fade(0), c);
    }

    #[test]
    fn fade_full_is_black() {
        assert_eq!(Color::from_rgbcct(255, 255, 255, 255, 255).fade(255), BLACK);
    }

    #[rstest]
    #[case(0)]
    #[case(64)]
    #[case(128)]
    #[case(255)]
    fn fade_never_increases_a_channel(#[case] amount: u8) {
        let c = Color::from_rgbcct(200, 150, 100, 50, 25);
        let faded = c.fade(amount);
        assert!(faded.r() <= c.r());
        assert!(faded.g() <= c.g());
        assert!(faded.b() <= c.b());
        assert!(faded.w() <= c.w());
        assert!(faded.cw() <= c.cw());
    }

    #[test]
    fn scale_halves() {
        let c = Color::from_rgb(200, 100, 50);
        // 200*127/255 = 99, 100*127/255 = 49, 50*127/255 = 24
        assert_eq!(c.scale(127), Color::from_rgb(99, 49, 24));
    }

    #[test]
    fn hex_rgb_formats_rgb_part_only() {
        assert_eq!(Color::from_rgbcct(255, 0, 128, 9, 9).hex_rgb(), "#ff0080");
    }

    #[test]
    fn display_matches_hex_encoding() {
        let c = Color::from_rgb(255, 0, 128);
        assert_eq!(format!("{c}"), "#ff0080");
    }
}
