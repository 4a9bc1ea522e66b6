//! Effect registry and the built-in effect catalogue.
//!
//! An effect is a plain function `(segment, surface) -> delay_ms`: it reads
//! and mutates the segment's parameters and runtime block, paints pixels, and
//! returns how long the render loop should wait before calling it again.
//! Effects are deterministic functions of segment state and `Segment::now()`;
//! the "random" ones keep a small xorshift state in the runtime block instead
//! of consulting a global RNG, so a reset always reproduces the same frames.
//!
//! Ids are stable — they are the external API surface. Dispatch is a static
//! table lookup; the controller rejects unknown ids before they ever reach
//! the render loop.

use crate::color::{BLACK, Color};
use crate::segment::Segment;
use crate::surface::PixelSurface;

/// Base frame delay in ms (~30 fps) for continuously animating effects.
pub const FRAMETIME: u32 = 33;

pub type EffectFn = fn(&mut Segment, &mut dyn PixelSurface) -> u32;

static EFFECTS: &[(&str, EffectFn)] = &[
    ("Static", static_color),
    ("Blink", blink),
    ("Breathe", breathe),
    ("Color Wipe", color_wipe),
    ("Random Color", random_color),
    ("Scan", scan),
    ("Dual Scan", dual_scan),
    ("Rainbow", rainbow),
    ("Rainbow Cycle", rainbow_cycle),
    ("Theater Chase", theater_chase),
    ("Running Lights", running_lights),
    ("Twinkle", twinkle),
    ("Sparkle", sparkle),
    ("Fade", fade),
    ("Chase", chase),
    ("Palette Flow", palette_flow),
];

pub fn effect(id: usize) -> Option<EffectFn> {
    EFFECTS.get(id).map(|(_, f)| *f)
}

pub fn effect_name(id: usize) -> Option<&'static str> {
    EFFECTS.get(id).map(|(name, _)| *name)
}

pub fn effect_count() -> usize {
    EFFECTS.len()
}

/// `(id, name)` for every registered effect.
pub fn all_effects() -> Vec<(usize, &'static str)> {
    EFFECTS.iter().enumerate().map(|(i, (name, _))| (i, *name)).collect()
}

// ── Shared helpers ─────────────────────────────────────────────────

/// Map speed (0 slow – 255 fast) to a per-frame delay.
fn speed_delay(speed: u8, min: u32, scale: u32) -> u32 {
    min + (255 - speed) as u32 * scale
}

/// Triangle wave over the byte range: 0 → 0, 128 → 255-ish, 255 → 0.
fn triwave8(x: u8) -> u8 {
    if x < 128 { x.wrapping_mul(2) } else { (255 - x).wrapping_mul(2) }
}

/// Xorshift step. State lives in the segment's runtime block so `reset`
/// restarts the sequence.
fn next_random(state: &mut u32) -> u8 {
    let mut x = if *state == 0 { 0x2545_F491 } else { *state };
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    (x >> 24) as u8
}

fn random_index(state: &mut u32, len: usize) -> usize {
    next_random(state) as usize * len / 256
}

// ── Catalogue ──────────────────────────────────────────────────────

/// 0: solid primary color.
fn static_color(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    seg.fill(surface, seg.color(0));
    350
}

/// 1: alternate between primary and background. Intensity sets the duty
/// cycle, speed the cycle length.
fn blink(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let cycle = speed_delay(seg.speed, 200, 10);
    let on_time = (cycle * seg.intensity as u32 / 255).clamp(20, cycle.saturating_sub(20).max(20));
    if seg.aux0 == 0 {
        seg.fill(surface, seg.color(0));
        seg.aux0 = 1;
        on_time
    } else {
        seg.fill(surface, seg.color(1));
        seg.aux0 = 0;
        cycle - on_time
    }
}

/// 2: sinusoid-ish brightness swell of the primary color.
fn breathe(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let cycle_ms = 1000 + (255 - seg.speed) as u64 * 20;
    let phase = ((seg.now() % cycle_ms) * 255 / cycle_ms) as u8;
    let level = triwave8(phase).max(12);
    seg.fill(surface, seg.color(0).scale(level));
    FRAMETIME
}

/// 3: wipe the primary color across, then wipe the background back.
fn color_wipe(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    if seg.call == 0 {
        seg.fill(surface, seg.color(1));
    }
    let pos = seg.step as usize % (len * 2);
    if pos < len {
        seg.set_pixel_color(surface, pos, seg.color(0));
    } else {
        seg.set_pixel_color(surface, pos - len, seg.color(1));
    }
    seg.step = seg.step.wrapping_add(1);
    speed_delay(seg.speed, 5, 2)
}

/// 4: fill with a new random palette color each cycle.
fn random_color(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let mut rng = seg.aux0;
    let pos = next_random(&mut rng);
    seg.aux0 = rng;
    seg.fill(surface, seg.color_from_palette(pos as usize, false, 255));
    speed_delay(seg.speed, 200, 20)
}

/// 5: single dot bouncing end to end over the background.
fn scan(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    seg.fill(surface, seg.color(1));
    seg.set_pixel_color(surface, seg.step as usize, seg.color(0));

    // aux0 is the direction flag.
    if seg.aux0 == 0 {
        if seg.step as usize + 1 >= len {
            seg.aux0 = 1;
        } else {
            seg.step += 1;
        }
    } else if seg.step == 0 {
        seg.aux0 = 0;
    } else {
        seg.step -= 1;
    }
    speed_delay(seg.speed, 10, 2)
}

/// 6: two mirrored dots bouncing from both ends.
fn dual_scan(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    seg.fill(surface, seg.color(1));
    let pos = seg.step as usize;
    seg.set_pixel_color(surface, pos, seg.color(0));
    seg.set_pixel_color(surface, len - 1 - pos, seg.color(2));

    if seg.aux0 == 0 {
        if pos + 1 >= len {
            seg.aux0 = 1;
        } else {
            seg.step += 1;
        }
    } else if seg.step == 0 {
        seg.aux0 = 0;
    } else {
        seg.step -= 1;
    }
    speed_delay(seg.speed, 10, 2)
}

/// 7: whole strip cycles through the palette in unison.
fn rainbow(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    seg.fill(surface, seg.color_from_palette(seg.step as usize, false, 255));
    seg.step = (seg.step + 1 + (seg.speed as u32 >> 5)) & 0xFF;
    FRAMETIME
}

/// 8: palette gradient spread across the strip, rotating.
fn rainbow_cycle(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    for i in 0..len {
        let base = if len > 1 { i * 255 / (len - 1) } else { 0 };
        let pos = (base + seg.step as usize) & 0xFF;
        seg.set_pixel_color(surface, i, seg.color_from_palette(pos, false, 255));
    }
    seg.step = (seg.step + 1 + (seg.speed as u32 >> 5)) & 0xFF;
    FRAMETIME
}

/// 9: every third pixel lit, pattern marching by one each frame.
fn theater_chase(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let offset = seg.step as usize % 3;
    for i in 0..seg.length() {
        let color = if (i + offset) % 3 == 0 { seg.color(0) } else { seg.color(1) };
        seg.set_pixel_color(surface, i, color);
    }
    seg.step = seg.step.wrapping_add(1);
    speed_delay(seg.speed, 50, 2)
}

/// 10: brightness wave of the primary color traveling along the strip.
/// Intensity shortens the wavelength.
fn running_lights(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    let wavelength = 4 + (255 - seg.intensity) as usize / 8;
    for i in 0..len {
        let phase = ((i * 255 / wavelength) + seg.step as usize) & 0xFF;
        let level = triwave8(phase as u8);
        seg.set_pixel_color(surface, i, seg.color(0).scale(level));
    }
    seg.step = (seg.step + 4 + (seg.speed as u32 >> 4)) & 0xFF;
    FRAMETIME
}

/// 11: decaying field with random palette-colored twinkles. Intensity sets
/// how often a new twinkle spawns.
fn twinkle(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    seg.fade_out(surface, 30);
    let mut rng = seg.aux0;
    if next_random(&mut rng) < seg.intensity {
        let i = random_index(&mut rng, len);
        let pos = next_random(&mut rng) as usize;
        let color = seg.color_from_palette(pos, false, 255);
        seg.set_pixel_color(surface, i, color);
    }
    seg.aux0 = rng;
    speed_delay(seg.speed, 10, 1)
}

/// 12: background fill with a single brief primary-color flash.
fn sparkle(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    seg.fill(surface, seg.color(1));
    let mut rng = seg.aux0;
    let i = random_index(&mut rng, len);
    seg.aux0 = rng;
    seg.set_pixel_color(surface, i, seg.color(0));
    speed_delay(seg.speed, 10, 1)
}

/// 13: smooth crossfade between background and primary colors.
fn fade(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let amount = triwave8((seg.step & 0xFF) as u8);
    seg.fill(surface, seg.color(1).blend(seg.color(0), amount));
    seg.step = (seg.step + 1 + (seg.speed as u32 >> 5)) & 0xFF;
    FRAMETIME
}

/// 14: block of three primary-color pixels running over the background,
/// wrapping around.
fn chase(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    seg.fill(surface, seg.color(1));
    let head = seg.step as usize % len;
    for offset in 0..3usize.min(len) {
        seg.set_pixel_color(surface, (head + offset) % len, seg.color(0));
    }
    seg.step = seg.step.wrapping_add(1);
    speed_delay(seg.speed, 10, 2)
}

/// 15: per-pixel palette gradient drifting along the strip, softened with a
/// light blur.
fn palette_flow(seg: &mut Segment, surface: &mut dyn PixelSurface) -> u32 {
    let len = seg.length();
    if len == 0 {
        return FRAMETIME;
    }
    for i in 0..len {
        let base = if len > 1 { i * 255 / (len - 1) } else { 0 };
        let pos = (base + seg.step as usize) & 0xFF;
        seg.set_pixel_color(surface, i, seg.color_from_palette(pos, false, 255));
    }
    seg.blur(surface, seg.intensity / 4);
    seg.step = (seg.step + 1 + (seg.speed as u32 >> 4)) & 0xFF;
    FRAMETIME
}

// ── Tests ──────────────────────────────────────────────────────────
