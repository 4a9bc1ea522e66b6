//! Gradient palettes and interpolated color lookup.
//!
//! A palette is an ordered list of `(position, r, g, b)` control points over
//! the range 0–255, conceptually a 256-entry gradient. Lookup interpolates
//! linearly between the two bracketing stops, then applies brightness via the
//! codec's scale operation. The table is `'static` and process-wide —
//! palettes are immutable and shared by every controller instance.

use crate::color::Color;

// ── Palette ────────────────────────────────────────────────────────

pub struct Palette {
    pub name: &'static str,
    /// Control points `(position, r, g, b)`, positions ascending.
    stops: &'static [(u8, u8, u8, u8)],
}

impl Palette {
    /// Interpolated color at `pos` (0–255), scaled by `brightness` (0–255).
    pub fn color_at(&self, pos: u8, brightness: u8) -> Color {
        let color = self.interpolate(pos);
        color.scale(brightness)
    }

    fn interpolate(&self, pos: u8) -> Color {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return crate::color::BLACK,
        };
        if pos <= first.0 {
            return Color::from_rgb(first.1, first.2, first.3);
        }
        if pos >= last.0 {
            return Color::from_rgb(last.1, last.2, last.3);
        }

        // Find the bracketing pair. Stops are few, linear scan is fine.
        for pair in self.stops.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if pos >= lo.0 && pos <= hi.0 {
                let span = (hi.0 - lo.0) as u16;
                if span == 0 {
                    return Color::from_rgb(hi.1, hi.2, hi.3);
                }
                let amount = (((pos - lo.0) as u16 * 255) / span) as u8;
                let a = Color::from_rgb(lo.1, lo.2, lo.3);
                let b = Color::from_rgb(hi.1, hi.2, hi.3);
                return a.blend(b, amount);
            }
        }
        Color::from_rgb(last.1, last.2, last.3)
    }
}

// ── Table ──────────────────────────────────────────────────────────

/// Palette id used when an effect does not care (and the fallback for
/// out-of-range ids inside the engine; the controller rejects those earlier).
pub const DEFAULT_PALETTE: usize = 0;

static PALETTES: &[Palette] = &[
    Palette {
        name: "Default",
        stops: &[
            (0, 255, 0, 0),
            (42, 255, 160, 0),
            (85, 0, 255, 0),
            (127, 0, 255, 200),
            (170, 0, 0, 255),
            (212, 180, 0, 255),
            (255, 255, 0, 0),
        ],
    },
    Palette {
        name: "Party",
        stops: &[
            (0, 85, 0, 171),
            (42, 171, 0, 85),
            (85, 255, 0, 0),
            (127, 171, 85, 0),
            (170, 171, 171, 0),
            (212, 255, 85, 0),
            (255, 85, 0, 171),
        ],
    },
    Palette {
        name: "Ocean",
        stops: &[
            (0, 0, 0, 96),
            (64, 0, 32, 192),
            (128, 0, 128, 255),
            (192, 0, 200, 200),
            (255, 180, 255, 255),
        ],
    },
    Palette {
        name: "Forest",
        stops: &[
            (0, 0, 48, 0),
            (64, 0, 128, 16),
            (128, 48, 200, 16),
            (192, 128, 255, 64),
            (255, 0, 80, 16),
        ],
    },
    Palette {
        name: "Lava",
        stops: &[
            (0, 0, 0, 0),
            (46, 128, 0, 0),
            (96, 200, 32, 0),
            (146, 255, 96, 0),
            (219, 255, 200, 32),
            (255, 255, 255, 255),
        ],
    },
    Palette {
        name: "Cloud",
        stops: &[
            (0, 0, 0, 255),
            (85, 120, 120, 255),
            (170, 220, 220, 255),
            (255, 255, 255, 255),
        ],
    },
    Palette {
        name: "Sunset",
        stops: &[
            (0, 120, 0, 0),
            (64, 255, 64, 0),
            (128, 255, 160, 16),
            (192, 200, 64, 96),
            (255, 48, 0, 96),
        ],
    },
    Palette {
        name: "Fire",
        stops: &[
            (0, 0, 0, 0),
            (64, 180, 0, 0),
            (128, 255, 96, 0),
            (192, 255, 200, 16),
            (255, 255, 255, 128),
        ],
    },
    Palette {
        name: "Ice",
        stops: &[
            (0, 0, 16, 48),
            (85, 0, 80, 140),
            (170, 64, 160, 220),
            (255, 200, 240, 255),
        ],
    },
    Palette {
        name: "Pastel",
        stops: &[
            (0, 255, 160, 160),
            (64, 255, 220, 160),
            (128, 180, 255, 180),
            (192, 160, 200, 255),
            (255, 240, 160, 255),
        ],
    },
    Palette {
        name: "Aurora",
        stops: &[
            (0, 0, 200, 60),
            (64, 0, 255, 120),
            (128, 0, 120, 200),
            (192, 100, 0, 200),
            (255, 0, 200, 60),
        ],
    },
    Palette {
        name: "Pink Candy",
        stops: &[
            (0, 255, 255, 255),
            (64, 255, 80, 160),
            (128, 200, 0, 120),
            (192, 255, 80, 160),
            (255, 255, 255, 255),
        ],
    },
    Palette {
        name: "Heat",
        stops: &[
            (0, 0, 0, 0),
            (85, 255, 0, 0),
            (170, 255, 255, 0),
            (255, 255, 255, 255),
        ],
    },
    Palette {
        name: "Twilight",
        stops: &[
            (0, 16, 0, 48),
            (85, 96, 0, 128),
            (170, 255, 96, 48),
            (255, 255, 220, 128),
        ],
    },
    Palette {
        name: "Tropical",
        stops: &[
            (0, 0, 160, 128),
            (85, 255, 200, 0),
            (170, 255, 64, 0),
            (255, 0, 160, 128),
        ],
    },
    Palette {
        name: "Red & Blue",
        stops: &[
            (0, 255, 0, 0),
            (127, 16, 0, 32),
            (255, 0, 0, 255),
        ],
    },
];

/// Look up a palette by id. `None` for unknown ids — the controller maps
/// that to an invalid-palette rejection before any state changes.
pub fn palette(id: usize) -> Option<&'static Palette> {
    PALETTES.get(id)
}

/// Palette to use for an id that may be out of range (engine-internal
/// fallback to the default palette).
pub fn palette_or_default(id: usize) -> &'static Palette {
    PALETTES.get(id).unwrap_or(&PALETTES[DEFAULT_PALETTE])
}

pub fn palette_count() -> usize {
    PALETTES.len()
}

/// `(id, name)` for every registered palette.
pub fn all_palettes() -> Vec<(usize, &'static str)> {
    PALETTES.iter().enumerate().map(|(i, p)| (i, p.name)).collect()
}

// ── Tests ──────────────────────────────────────────────────────────
