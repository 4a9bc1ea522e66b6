//! Hardware acquisition: the factory capability and the `rs_ws281x` surface.
//!
//! The render worker never talks to a driver crate directly — it asks a
//! [`HardwareFactory`] for a [`PixelSurface`] and treats failures as
//! recoverable (`HardwareUnavailable` is retried lazily on the next mutating
//! call). The real factory is gated behind the `hardware` feature exactly
//! like the driver dependency itself, so the library and its tests build on
//! any machine; [`MemoryFactory`] stands in everywhere else.

use std::sync::{Arc, Mutex};

use crate::surface::{ChannelWidth, MemorySurface, Pixel, PixelSurface};
use crate::{LedError, StripConfig};

/// GPIO pins the Pi can drive with PWM — the only ones the ws281x timing
/// works on.
pub const PWM_PINS: [u8; 4] = [12, 13, 18, 19];

pub fn validate_pin(pin: u8) -> Result<(), LedError> {
    if PWM_PINS.contains(&pin) { Ok(()) } else { Err(LedError::InvalidPin(pin)) }
}

/// Capability for acquiring the physical pixel surface. Implementations must
/// be shareable across threads: creation happens inside the render worker,
/// and a respawned worker reuses the same factory.
pub trait HardwareFactory: Send + Sync {
    /// Build a surface sized for `config.physical_count()` pixels in
    /// `config.wire_order()` channel order.
    fn create(&self, config: &StripConfig) -> Result<Box<dyn PixelSurface>, LedError>;
}

// ── Memory factory ─────────────────────────────────────────────────

/// Factory producing [`MemorySurface`]s. Tests use the retained buffer and
/// flush-counter handles to observe what the worker rendered; the failing
/// variant exercises the hardware-unavailable path.
#[derive(Default)]
pub struct MemoryFactory {
    fail_with: Option<String>,
    last_buffer: Mutex<Option<Arc<Mutex<Vec<Pixel>>>>>,
    last_shows: Mutex<Option<Arc<std::sync::atomic::AtomicUsize>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose every `create` fails with the given cause.
    pub fn failing(cause: &str) -> Self {
        Self { fail_with: Some(cause.to_string()), ..Self::default() }
    }

    /// Pixel buffer of the most recently created surface.
    pub fn buffer(&self) -> Option<Arc<Mutex<Vec<Pixel>>>> {
        self.last_buffer.lock().unwrap().clone()
    }

    /// Flush counter of the most recently created surface.
    pub fn show_counter(&self) -> Option<Arc<std::sync::atomic::AtomicUsize>> {
        self.last_shows.lock().unwrap().clone()
    }
}

impl HardwareFactory for MemoryFactory {
    fn create(&self, config: &StripConfig) -> Result<Box<dyn PixelSurface>, LedError> {
        if let Some(cause) = &self.fail_with {
            return Err(LedError::HardwareUnavailable(cause.clone()));
        }
        validate_pin(config.gpio_pin)?;
        let width = ChannelWidth::from_order(config.wire_order());
        let surface = MemorySurface::new(config.physical_count(), width);
        *self.last_buffer.lock().unwrap() = Some(surface.buffer());
        *self.last_shows.lock().unwrap() = Some(surface.show_counter());
        Ok(Box::new(surface))
    }
}

// ── ws281x factory ─────────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub use ws281x::Ws281xFactory;

#[cfg(feature = "hardware")]
mod ws281x {
    use super::*;
    use rs_ws281x::{ChannelBuilder, Controller, ControllerBuilder, StripType};

    /// Factory backed by the `rs_ws281x` driver (DMA + PWM on the Pi).
    pub struct Ws281xFactory;

    impl HardwareFactory for Ws281xFactory {
        fn create(&self, config: &StripConfig) -> Result<Box<dyn PixelSurface>, LedError> {
            validate_pin(config.gpio_pin)?;
            let order = config.wire_order();
            let width = ChannelWidth::from_order(order);
            let strip = strip_type(order)?;

            // Pins 13/19 sit on the Pi's second PWM channel.
            let channel = if config.gpio_pin == 13 || config.gpio_pin == 19 { 1 } else { 0 };
            let count = config.physical_count();

            let controller = ControllerBuilder::new()
                .freq(800_000)
                .dma(10)
                .channel(
                    channel,
                    ChannelBuilder::new()
                        .pin(config.gpio_pin as i32)
                        .count(count as i32)
                        .strip_type(strip)
                        // Driver brightness stays at max; dimming is done in
                        // software so RGB and white can scale independently.
                        .brightness(255)
                        .build(),
                )
                .build()
                .map_err(|e| {
                    LedError::HardwareUnavailable(format!("ws281x init failed: {e:?}"))
                })?;

            tracing::info!(
                "ws281x ready: {} pixels ({}, {} channels) on GPIO {}",
                count,
                order,
                width.channels(),
                config.gpio_pin
            );

            Ok(Box::new(Ws281xSurface {
                controller,
                channel,
                shadow: vec![Pixel::black(width); count],
                width,
                brightness: 1.0,
                active: true,
            }))
        }
    }

    fn strip_type(order: &str) -> Result<StripType, LedError> {
        let strip = match order.to_ascii_uppercase().as_str() {
            "RGB" => StripType::Ws2811Rgb,
            "RBG" => StripType::Ws2811Rbg,
            "GRB" => StripType::Ws2811Grb,
            "GBR" => StripType::Ws2811Gbr,
            "BRG" => StripType::Ws2811Brg,
            "BGR" => StripType::Ws2811Bgr,
            "RGBW" => StripType::Sk6812Rgbw,
            "RBGW" => StripType::Sk6812Rbgw,
            "GRBW" => StripType::Sk6812Grbw,
            "GBRW" => StripType::Sk6812Gbrw,
            "BRGW" => StripType::Sk6812Brgw,
            "BGRW" => StripType::Sk6812Bgrw,
            other => {
                return Err(LedError::HardwareUnavailable(format!(
                    "unsupported channel order '{other}'"
                )));
            }
        };
        Ok(strip)
    }

    /// Surface over one ws281x channel. A shadow buffer keeps the unscaled
    /// pixel values so reads are not affected by brightness scaling, matching
    /// how driver-level brightness behaves.
    pub struct Ws281xSurface {
        controller: Controller,
        channel: usize,
        shadow: Vec<Pixel>,
        width: ChannelWidth,
        brightness: f32,
        active: bool,
    }

    impl Ws281xSurface {
        fn write_raw(&mut self, index: usize, pixel: Pixel) {
            let scale = self.brightness;
            let (r, g, b) = pixel.rgb();
            let w = match pixel {
                Pixel::Rgbw([_, _, _, w]) | Pixel::Rgbcct([_, _, _, w, _]) => w,
                Pixel::Rgb(_) => 0,
            };
            let leds = self.controller.leds_mut(self.channel);
            if let Some(raw) = leds.get_mut(index) {
                // RawColor layout is [B, G, R, W].
                *raw = [
                    (b as f32 * scale) as u8,
                    (g as f32 * scale) as u8,
                    (r as f32 * scale) as u8,
                    (w as f32 * scale) as u8,
                ];
            }
        }
    }

    impl PixelSurface for Ws281xSurface {
        fn len(&self) -> usize {
            self.shadow.len()
        }

        fn width(&self) -> ChannelWidth {
            self.width
        }

        fn get(&self, index: usize) -> Pixel {
            self.shadow.get(index).copied().unwrap_or(Pixel::black(self.width))
        }

        fn set(&mut self, index: usize, pixel: Pixel) {
            if index >= self.shadow.len() {
                return;
            }
            self.shadow[index] = pixel;
            self.write_raw(index, pixel);
        }

        fn show(&mut self) -> Result<(), LedError> {
            if !self.active {
                return Ok(());
            }
            self.controller
                .render()
                .map_err(|e| LedError::HardwareUnavailable(format!("render failed: {e:?}")))
        }

        fn deinit(&mut self) {
            if !self.active {
                return;
            }
            for i in 0..self.shadow.len() {
                self.write_raw(i, Pixel::black(self.width));
            }
            if let Err(e) = self.controller.render() {
                tracing::warn!("blank on deinit failed: {e:?}");
            }
            self.active = false;
        }

        fn set_brightness(&mut self, value: f32) {
            self.brightness = value.clamp(0.0, 1.0);
            // Re-apply immediately, like a driver-level brightness property.
            for i in 0..self.shadow.len() {
                self.write_raw(i, self.shadow[i]);
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(12, true)]
    #[case(13, true)]
    #[case(18, true)]
    #[case(19, true)]
    #[case(0, false)]
    #[case(17, false)]
    #[case(21, false)]
    fn pin_validation(#[case] pin: u8, #[case] ok: bool) {
        assert_eq!(validate_pin(pin).is_ok(), ok);
    }

    #[test]
    fn memory_factory_sizes_surface_from_config() {
        let factory = MemoryFactory::new();
        let config = StripConfig { num_leds: 10, dual_chip: true, ..StripConfig::default() };
        let surface = factory.create(&config).unwrap();
        assert_eq!(surface.len(), 20);
    }

    #[test]
    fn memory_factory_rejects_bad_pin() {
        let factory = MemoryFactory::new();
        let config = StripConfig { gpio_pin: 7, ..StripConfig::default() };
        let err = factory.create(&config).err().expect("expected an error");
        assert!(matches!(err, LedError::InvalidPin(7)));
    }

    #[test]
    fn failing_factory_reports_cause() {
        let factory = MemoryFactory::failing("no driver");
        let err = factory.create(&StripConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no driver"));
    }
}
