//! Controller: render worker plus the external mutation/query API.
//!
//! All strip state — the hardware surface, the segment, power, the selected
//! effect — is owned by a single render worker thread. API methods never
//! touch that state directly; each one sends a `Command` through an `mpsc`
//! channel together with a reply sender and waits for the structured result.
//! The worker interleaves command handling with timer-driven render ticks, so
//! a mutation becomes visible on the next tick after its reply, and there is
//! no lock anywhere a frame could stall on.
//!
//! Hardware is acquired lazily inside the worker on the first mutating
//! command. Acquisition failures are recorded and retried on the next
//! mutating call — never in the background. `stop()` tears the worker down;
//! a later mutating call respawns it from the retained settings.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::hardware::HardwareFactory;
use crate::rgbcct::{self, DualChipSurface};
use crate::segment::Segment;
use crate::surface::PixelSurface;
use crate::{LedError, StripConfig, effects, palette};

/// Tick period while powered off.
const IDLE_DELAY_MS: u64 = 100;
/// Pause after a failed render tick before trying again.
const TICK_BACKOFF_MS: u64 = 100;
/// How long an API call waits for the worker's reply.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
/// How long `stop` waits for the worker to confirm teardown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Public API types ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerState {
    Off,
    On,
    Toggle,
}

/// Structured result of every mutator. `connected` is false when hardware
/// could not be acquired or the request was rejected; `error` then carries
/// the human-readable cause.
#[derive(Clone, Debug, Serialize)]
pub struct ControlResponse {
    pub connected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<Applied>,
}

impl ControlResponse {
    fn ok(message: impl Into<String>, applied: Applied) -> Self {
        Self { connected: true, message: message.into(), error: None, applied: Some(applied) }
    }

    fn not_connected(cause: impl Into<String>) -> Self {
        Self {
            connected: false,
            message: "LED hardware not initialized".to_string(),
            error: Some(cause.into()),
            applied: None,
        }
    }

    fn rejected(err: &LedError) -> Self {
        Self {
            connected: false,
            message: err.to_string(),
            error: Some(err.to_string()),
            applied: None,
        }
    }
}

/// The value(s) a successful mutator applied.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    Power { power_on: bool },
    RgbBrightness { percent: u8 },
    WhiteBrightness { percent: u8 },
    Color { rgb: (u8, u8, u8), power_on: bool },
    Colors { color1: String, color2: String, color3: String },
    Effect { id: usize, name: String, power_on: bool },
    Palette { id: usize, name: String, power_on: bool },
    Speed { speed: u8 },
    Intensity { intensity: u8 },
    ColorTemperature { kelvin: u16, level: u8 },
    Preset { effect_id: usize },
}

/// Status snapshot returned by `check_status`.
#[derive(Clone, Debug, Serialize)]
pub struct ControllerStatus {
    pub connected: bool,
    pub power_on: bool,
    pub num_leds: usize,
    pub gpio_pin: u8,
    pub rgb_brightness: u8,
    pub white_brightness: u8,
    pub current_effect: usize,
    pub effect_name: String,
    pub current_palette: usize,
    pub palette_name: String,
    pub speed: u8,
    pub intensity: u8,
    /// Hex-encoded RGB of the three color slots.
    pub colors: [String; 3],
    pub effect_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A complete look for the strip, applied in one call. Replaces ad hoc
/// parameter dictionaries: colors arrive structured, not as hex strings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectPreset {
    pub effect_id: usize,
    pub palette_id: usize,
    pub speed: u8,
    pub intensity: u8,
    pub color1: Option<(u8, u8, u8)>,
    pub color2: Option<(u8, u8, u8)>,
    pub color3: Option<(u8, u8, u8)>,
}

// ── Commands ───────────────────────────────────────────────────────

type Reply = mpsc::Sender<ControlResponse>;

enum Command {
    SetPower(PowerState, Reply),
    SetRgbBrightness(u8, Reply),
    SetWhiteBrightness(u8, Reply),
    SetColor(u8, u8, u8, Reply),
    SetColors([Option<(u8, u8, u8)>; 3], Reply),
    SetEffect { id: usize, speed: Option<u8>, intensity: Option<u8>, reply: Reply },
    SetPalette(usize, Reply),
    SetSpeed(u8, Reply),
    SetIntensity(u8, Reply),
    SetColorTemperature { kelvin: u16, level: u8, reply: Reply },
    Status(mpsc::Sender<ControllerStatus>),
    Shutdown(mpsc::Sender<()>),
}

// ── Retained settings ──────────────────────────────────────────────

/// Everything that must survive while hardware is unavailable (and across
/// worker restarts), so it can be reapplied once the strip comes up.
#[derive(Clone, Debug)]
struct Settings {
    powered_on: bool,
    effect_id: usize,
    palette_id: usize,
    speed: u8,
    intensity: u8,
    colors: [Color; 3],
    rgb_brightness: f32,
    white_brightness: f32,
}

impl Settings {
    fn from_config(config: &StripConfig) -> Self {
        Self {
            powered_on: false,
            effect_id: 8, // Rainbow Cycle, the out-of-the-box default
            palette_id: palette::DEFAULT_PALETTE,
            speed: config.speed,
            intensity: config.intensity,
            colors: [
                Color::from_rgb(255, 0, 0),
                Color::from_rgb(0, 0, 0),
                Color::from_rgb(0, 0, 255),
            ],
            rgb_brightness: config.brightness.clamp(0.0, 1.0),
            white_brightness: 1.0,
        }
    }
}

struct SharedState {
    settings: Settings,
    connected: bool,
    init_error: Option<String>,
}

// ── Controller handle ──────────────────────────────────────────────

struct WorkerHandle {
    tx: mpsc::Sender<Command>,
    join: thread::JoinHandle<()>,
}

pub struct LedController {
    config: StripConfig,
    factory: Arc<dyn HardwareFactory>,
    shared: Arc<Mutex<SharedState>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl LedController {
    /// No hardware I/O happens here — the worker acquires the strip lazily
    /// on the first mutating call.
    pub fn new(config: StripConfig, factory: Arc<dyn HardwareFactory>) -> Self {
        let settings = Settings::from_config(&config);
        Self {
            config,
            factory,
            shared: Arc::new(Mutex::new(SharedState {
                settings,
                connected: false,
                init_error: None,
            })),
            worker: Mutex::new(None),
        }
    }

    pub fn set_power(&self, state: PowerState) -> ControlResponse {
        self.request(|reply| Command::SetPower(state, reply))
    }

    /// RGB brightness as a percentage, 0–100.
    pub fn set_rgb_brightness(&self, percent: u8) -> ControlResponse {
        self.request(|reply| Command::SetRgbBrightness(percent.min(100), reply))
    }

    /// White-channel brightness as a percentage, 0–100. Dual-chip mode only.
    pub fn set_white_brightness(&self, percent: u8) -> ControlResponse {
        self.request(|reply| Command::SetWhiteBrightness(percent.min(100), reply))
    }

    /// Set a solid color: stores it as the primary color and switches to the
    /// static effect. Powers on.
    pub fn set_color(&self, r: u8, g: u8, b: u8) -> ControlResponse {
        self.request(|reply| Command::SetColor(r, g, b, reply))
    }

    /// Update any subset of the three color slots. Does not change the
    /// effect and does not power on.
    pub fn set_colors(
        &self,
        color1: Option<(u8, u8, u8)>,
        color2: Option<(u8, u8, u8)>,
        color3: Option<(u8, u8, u8)>,
    ) -> ControlResponse {
        self.request(|reply| Command::SetColors([color1, color2, color3], reply))
    }

    /// Select an effect, optionally overriding speed and intensity. Powers on.
    pub fn set_effect(
        &self,
        id: usize,
        speed: Option<u8>,
        intensity: Option<u8>,
    ) -> ControlResponse {
        self.request(|reply| Command::SetEffect { id, speed, intensity, reply })
    }

    /// Select a palette. Powers on.
    pub fn set_palette(&self, id: usize) -> ControlResponse {
        self.request(|reply| Command::SetPalette(id, reply))
    }

    pub fn set_speed(&self, speed: u8) -> ControlResponse {
        self.request(|reply| Command::SetSpeed(speed, reply))
    }

    pub fn set_intensity(&self, intensity: u8) -> ControlResponse {
        self.request(|reply| Command::SetIntensity(intensity, reply))
    }

    /// White color temperature in Kelvin (2700–6500) at `level` percent.
    /// Dual-chip mode only.
    pub fn set_color_temperature(&self, kelvin: u16, level: u8) -> ControlResponse {
        self.request(|reply| Command::SetColorTemperature {
            kelvin,
            level: level.min(100),
            reply,
        })
    }

    /// Apply a whole preset: power on, effect, palette, and any colors it
    /// carries.
    pub fn apply_preset(&self, preset: &EffectPreset) -> ControlResponse {
        let power = self.set_power(PowerState::On);
        if !power.connected {
            return power;
        }
        let effect = self.set_effect(preset.effect_id, Some(preset.speed), Some(preset.intensity));
        if !effect.connected {
            return effect;
        }
        let pal = self.set_palette(preset.palette_id);
        if !pal.connected {
            return pal;
        }
        if preset.color1.is_some() || preset.color2.is_some() || preset.color3.is_some() {
            let colors = self.set_colors(preset.color1, preset.color2, preset.color3);
            if !colors.connected {
                return colors;
            }
        }
        ControlResponse::ok(
            format!("Preset applied (effect {})", preset.effect_id),
            Applied::Preset { effect_id: preset.effect_id },
        )
    }

    /// All registered effects as `(id, name)`.
    pub fn get_effects(&self) -> Vec<(usize, &'static str)> {
        effects::all_effects()
    }

    /// All registered palettes as `(id, name)`.
    pub fn get_palettes(&self) -> Vec<(usize, &'static str)> {
        palette::all_palettes()
    }

    /// Best-effort initialization attempt, then a snapshot. Mutates nothing.
    pub fn check_status(&self) -> ControllerStatus {
        let tx = self.ensure_worker();
        let (reply_tx, reply_rx) = mpsc::channel();
        if tx.send(Command::Status(reply_tx)).is_ok()
            && let Ok(status) = reply_rx.recv_timeout(REQUEST_TIMEOUT)
        {
            return status;
        }
        // Worker unreachable — report from the retained snapshot.
        let shared = self.shared.lock().unwrap();
        status_from(&self.config, &shared.settings, false, false, shared.init_error.clone())
    }

    /// Terminate the render loop, blank the strip, and release the hardware.
    /// The controller reverts to uninitialized; a later mutating call starts
    /// over from the retained settings.
    pub fn stop(&self) {
        let handle = self.worker.lock().unwrap().take();
        if let Some(WorkerHandle { tx, join }) = handle {
            let (done_tx, done_rx) = mpsc::channel();
            if tx.send(Command::Shutdown(done_tx)).is_ok() {
                let _ = done_rx.recv_timeout(SHUTDOWN_TIMEOUT);
            }
            drop(tx);
            let _ = join.join();
        }
        let mut shared = self.shared.lock().unwrap();
        shared.connected = false;
    }

    fn request(&self, build: impl FnOnce(Reply) -> Command) -> ControlResponse {
        let tx = self.ensure_worker();
        let (reply_tx, reply_rx) = mpsc::channel();
        if tx.send(build(reply_tx)).is_err() {
            return ControlResponse::not_connected("render worker is not running");
        }
        reply_rx
            .recv_timeout(REQUEST_TIMEOUT)
            .unwrap_or_else(|_| ControlResponse::not_connected("render worker did not respond"))
    }

    /// Spawn the render worker if it is not already running.
    fn ensure_worker(&self) -> mpsc::Sender<Command> {
        let mut guard = self.worker.lock().unwrap();
        if let Some(handle) = guard.as_ref()
            && !handle.join.is_finished()
        {
            return handle.tx.clone();
        }

        let (tx, rx) = mpsc::channel();
        let config = self.config.clone();
        let factory = Arc::clone(&self.factory);
        let shared = Arc::clone(&self.shared);
        let join = thread::spawn(move || Worker::new(config, factory, shared, rx).run());
        let handle = WorkerHandle { tx: tx.clone(), join };
        *guard = Some(handle);
        tx
    }
}

fn status_from(
    config: &StripConfig,
    settings: &Settings,
    connected: bool,
    effect_running: bool,
    error: Option<String>,
) -> ControllerStatus {
    ControllerStatus {
        connected,
        power_on: settings.powered_on,
        num_leds: config.num_leds,
        gpio_pin: config.gpio_pin,
        rgb_brightness: (settings.rgb_brightness * 100.0).round() as u8,
        white_brightness: (settings.white_brightness * 100.0).round() as u8,
        current_effect: settings.effect_id,
        effect_name: effects::effect_name(settings.effect_id).unwrap_or("?").to_string(),
        current_palette: settings.palette_id,
        palette_name: palette::palette(settings.palette_id).map_or("?", |p| p.name).to_string(),
        speed: settings.speed,
        intensity: settings.intensity,
        colors: [
            settings.colors[0].hex_rgb(),
            settings.colors[1].hex_rgb(),
            settings.colors[2].hex_rgb(),
        ],
        effect_running,
        error,
    }
}

// ── Render worker ──────────────────────────────────────────────────

/// The strip surface the worker drives: either the driver directly, or the
/// dual-chip adapter in front of it.
enum StripSurface {
    Direct(Box<dyn PixelSurface>),
    Dual(DualChipSurface),
}

impl StripSurface {
    fn pixels(&mut self) -> &mut dyn PixelSurface {
        match self {
            StripSurface::Direct(surface) => surface.as_mut(),
            StripSurface::Dual(adapter) => adapter,
        }
    }

    fn dual(&mut self) -> Option<&mut DualChipSurface> {
        match self {
            StripSurface::Dual(adapter) => Some(adapter),
            StripSurface::Direct(_) => None,
        }
    }
}

struct Worker {
    config: StripConfig,
    factory: Arc<dyn HardwareFactory>,
    shared: Arc<Mutex<SharedState>>,
    settings: Settings,
    surface: Option<StripSurface>,
    segment: Option<Segment>,
    rx: mpsc::Receiver<Command>,
    next_tick: Instant,
}

impl Worker {
    fn new(
        config: StripConfig,
        factory: Arc<dyn HardwareFactory>,
        shared: Arc<Mutex<SharedState>>,
        rx: mpsc::Receiver<Command>,
    ) -> Self {
        let settings = shared.lock().unwrap().settings.clone();
        Self {
            config,
            factory,
            shared,
            settings,
            surface: None,
            segment: None,
            rx,
            next_tick: Instant::now(),
        }
    }

    fn run(mut self) {
        tracing::info!("render worker started");
        loop {
            if Instant::now() >= self.next_tick {
                self.tick();
            }
            let wait = self.next_tick.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(wait) {
                Ok(Command::Shutdown(done)) => {
                    self.teardown();
                    let _ = done.send(());
                    return;
                }
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.teardown();
                    return;
                }
            }
        }
    }

    /// One render tick: run the current effect, flush, schedule the next
    /// tick by the delay the effect asked for. A failed flush logs and backs
    /// off — the loop never dies from a single bad frame.
    fn tick(&mut self) {
        let mut delay = IDLE_DELAY_MS;
        if self.settings.powered_on
            && let (Some(surface), Some(segment)) = (self.surface.as_mut(), self.segment.as_mut())
        {
            // Looked up every tick so effect switches apply immediately.
            if let Some(effect) = effects::effect(self.settings.effect_id) {
                let requested = effect(segment, surface.pixels());
                match surface.pixels().show() {
                    Ok(()) => {
                        segment.call += 1;
                        delay = requested as u64;
                    }
                    Err(e) => {
                        tracing::error!("render tick failed: {e}");
                        delay = TICK_BACKOFF_MS;
                    }
                }
            } else {
                tracing::error!("effect id {} vanished from registry", self.settings.effect_id);
            }
        }
        self.next_tick = Instant::now() + Duration::from_millis(delay);
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::SetPower(state, reply) => {
                let _ = reply.send(self.do_set_power(state));
            }
            Command::SetRgbBrightness(percent, reply) => {
                let _ = reply.send(self.do_set_rgb_brightness(percent));
            }
            Command::SetWhiteBrightness(percent, reply) => {
                let _ = reply.send(self.do_set_white_brightness(percent));
            }
            Command::SetColor(r, g, b, reply) => {
                let _ = reply.send(self.do_set_color(r, g, b));
            }
            Command::SetColors(colors, reply) => {
                let _ = reply.send(self.do_set_colors(colors));
            }
            Command::SetEffect { id, speed, intensity, reply } => {
                let _ = reply.send(self.do_set_effect(id, speed, intensity));
            }
            Command::SetPalette(id, reply) => {
                let _ = reply.send(self.do_set_palette(id));
            }
            Command::SetSpeed(speed, reply) => {
                let _ = reply.send(self.do_set_speed(speed));
            }
            Command::SetIntensity(intensity, reply) => {
                let _ = reply.send(self.do_set_intensity(intensity));
            }
            Command::SetColorTemperature { kelvin, level, reply } => {
                let _ = reply.send(self.do_set_color_temperature(kelvin, level));
            }
            Command::Status(reply) => {
                // Best effort: try to come up, but report either way.
                let _ = self.ensure_initialized();
                let _ = reply.send(self.status());
            }
            Command::Shutdown(_) => unreachable!("handled in run()"),
        }
    }

    /// Lazy hardware acquisition plus reapplication of retained settings.
    fn ensure_initialized(&mut self) -> Result<(), LedError> {
        if self.surface.is_some() {
            return Ok(());
        }

        let physical = match self.factory.create(&self.config) {
            Ok(surface) => surface,
            Err(e) => {
                tracing::error!("hardware init failed: {e}");
                let mut shared = self.shared.lock().unwrap();
                shared.connected = false;
                shared.init_error = Some(e.to_string());
                return Err(e);
            }
        };

        let strip = if self.config.dual_chip {
            tracing::info!(
                "dual-chip RGBCCT mode: {} logical -> {} physical pixels",
                self.config.num_leds,
                self.config.physical_count()
            );
            let mut adapter = DualChipSurface::new(physical, self.config.num_leds);
            adapter.set_rgb_brightness(self.settings.rgb_brightness);
            if let Err(e) = adapter.set_white_brightness(self.settings.white_brightness) {
                tracing::warn!("initial white brightness flush failed: {e}");
            }
            StripSurface::Dual(adapter)
        } else {
            let mut surface = physical;
            surface.set_brightness(self.settings.rgb_brightness);
            StripSurface::Direct(surface)
        };

        let mut segment = Segment::new(0, self.config.num_leds);
        segment.speed = self.settings.speed;
        segment.intensity = self.settings.intensity;
        segment.palette_id = self.settings.palette_id;
        segment.colors = self.settings.colors;

        tracing::info!(
            "strip initialized: {} LEDs on GPIO {} ({})",
            self.config.num_leds,
            self.config.gpio_pin,
            self.config.pixel_order
        );
        self.surface = Some(strip);
        self.segment = Some(segment);
        self.publish(true, None);
        Ok(())
    }

    /// Push the current settings into the shared snapshot.
    fn publish(&self, connected: bool, init_error: Option<String>) {
        let mut shared = self.shared.lock().unwrap();
        shared.settings = self.settings.clone();
        shared.connected = connected;
        shared.init_error = init_error;
    }

    fn status(&self) -> ControllerStatus {
        let error = self.shared.lock().unwrap().init_error.clone();
        status_from(&self.config, &self.settings, self.surface.is_some(), true, error)
    }

    /// Power on and render on the very next loop iteration.
    fn power_on_now(&mut self) {
        self.settings.powered_on = true;
        self.next_tick = Instant::now();
    }

    fn reset_segment(&mut self) {
        if let Some(segment) = self.segment.as_mut() {
            segment.reset();
        }
    }

    fn do_set_power(&mut self, state: PowerState) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        let on = match state {
            PowerState::On => true,
            PowerState::Off => false,
            PowerState::Toggle => !self.settings.powered_on,
        };
        if on {
            self.power_on_now();
        } else {
            self.settings.powered_on = false;
            // Blank immediately instead of waiting for a tick.
            if let Some(surface) = self.surface.as_mut()
                && let Err(e) = rgbcct::blank(surface.pixels())
            {
                tracing::warn!("blank on power off failed: {e}");
            }
        }
        self.publish(true, None);
        ControlResponse::ok(
            if on { "Power on" } else { "Power off" },
            Applied::Power { power_on: on },
        )
    }

    fn do_set_rgb_brightness(&mut self, percent: u8) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        let value = percent as f32 / 100.0;
        self.settings.rgb_brightness = value;
        if let Some(surface) = self.surface.as_mut() {
            match surface {
                StripSurface::Dual(adapter) => adapter.set_rgb_brightness(value),
                StripSurface::Direct(s) => s.set_brightness(value),
            }
        }
        self.publish(true, None);
        ControlResponse::ok("RGB brightness updated", Applied::RgbBrightness { percent })
    }

    fn do_set_white_brightness(&mut self, percent: u8) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        let Some(adapter) = self.surface.as_mut().and_then(StripSurface::dual) else {
            return ControlResponse {
                connected: true,
                message: "White brightness control requires dual-chip RGBCCT mode".to_string(),
                error: Some("not a dual-chip strip".to_string()),
                applied: None,
            };
        };
        let value = percent as f32 / 100.0;
        if let Err(e) = adapter.set_white_brightness(value) {
            tracing::warn!("white brightness flush failed: {e}");
        }
        self.settings.white_brightness = value;
        self.publish(true, None);
        ControlResponse::ok("White brightness updated", Applied::WhiteBrightness { percent })
    }

    fn do_set_color(&mut self, r: u8, g: u8, b: u8) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        self.settings.colors[0] = Color::from_rgb(r, g, b);
        self.settings.effect_id = 0; // Static
        if let Some(segment) = self.segment.as_mut() {
            segment.colors[0] = Color::from_rgb(r, g, b);
        }
        self.reset_segment();
        self.power_on_now();
        self.publish(true, None);
        ControlResponse::ok("Color set", Applied::Color { rgb: (r, g, b), power_on: true })
    }

    fn do_set_colors(&mut self, colors: [Option<(u8, u8, u8)>; 3]) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        let mut changed = Vec::new();
        for (slot, value) in colors.iter().enumerate() {
            if let Some((r, g, b)) = *value {
                self.settings.colors[slot] = Color::from_rgb(r, g, b);
                if let Some(segment) = self.segment.as_mut() {
                    segment.colors[slot] = Color::from_rgb(r, g, b);
                }
                changed.push(format!("color{}={}", slot + 1, self.settings.colors[slot]));
            }
        }
        if !changed.is_empty() {
            self.reset_segment();
        }
        self.publish(true, None);
        ControlResponse::ok(
            format!("Colors updated: {}", changed.join(", ")),
            Applied::Colors {
                color1: self.settings.colors[0].hex_rgb(),
                color2: self.settings.colors[1].hex_rgb(),
                color3: self.settings.colors[2].hex_rgb(),
            },
        )
    }

    fn do_set_effect(
        &mut self,
        id: usize,
        speed: Option<u8>,
        intensity: Option<u8>,
    ) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        let Some(name) = effects::effect_name(id) else {
            return ControlResponse::rejected(&LedError::InvalidEffect(id));
        };
        self.settings.effect_id = id;
        if let Some(speed) = speed {
            self.settings.speed = speed;
        }
        if let Some(intensity) = intensity {
            self.settings.intensity = intensity;
        }
        if let Some(segment) = self.segment.as_mut() {
            segment.speed = self.settings.speed;
            segment.intensity = self.settings.intensity;
        }
        self.reset_segment();
        self.power_on_now();
        self.publish(true, None);
        ControlResponse::ok(
            format!("Effect set to {name}"),
            Applied::Effect { id, name: name.to_string(), power_on: true },
        )
    }

    fn do_set_palette(&mut self, id: usize) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        let Some(pal) = palette::palette(id) else {
            return ControlResponse::rejected(&LedError::InvalidPalette(id));
        };
        self.settings.palette_id = id;
        if let Some(segment) = self.segment.as_mut() {
            segment.palette_id = id;
        }
        self.reset_segment();
        self.power_on_now();
        self.publish(true, None);
        ControlResponse::ok(
            format!("Palette set to {}", pal.name),
            Applied::Palette { id, name: pal.name.to_string(), power_on: true },
        )
    }

    fn do_set_speed(&mut self, speed: u8) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        self.settings.speed = speed;
        if let Some(segment) = self.segment.as_mut() {
            segment.speed = speed;
        }
        self.reset_segment();
        self.publish(true, None);
        ControlResponse::ok("Speed updated", Applied::Speed { speed })
    }

    fn do_set_intensity(&mut self, intensity: u8) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        self.settings.intensity = intensity;
        if let Some(segment) = self.segment.as_mut() {
            segment.intensity = intensity;
        }
        self.reset_segment();
        self.publish(true, None);
        ControlResponse::ok("Intensity updated", Applied::Intensity { intensity })
    }

    fn do_set_color_temperature(&mut self, kelvin: u16, level: u8) -> ControlResponse {
        if let Err(e) = self.ensure_initialized() {
            return ControlResponse::not_connected(e.to_string());
        }
        let powered_on = self.settings.powered_on;
        let Some(adapter) = self.surface.as_mut().and_then(StripSurface::dual) else {
            return ControlResponse {
                connected: true,
                message: "Color temperature control requires dual-chip RGBCCT mode".to_string(),
                error: Some("not a dual-chip strip".to_string()),
                applied: None,
            };
        };
        let kelvin = kelvin.clamp(rgbcct::KELVIN_MIN, rgbcct::KELVIN_MAX);
        let scaled = (level as u16 * 255 / 100) as u8;
        adapter.set_white_temperature(kelvin, scaled);
        if powered_on && let Err(e) = adapter.show() {
            tracing::warn!("white temperature flush failed: {e}");
        }
        self.publish(true, None);
        ControlResponse::ok(
            format!("Color temperature set to {kelvin}K at {level}% brightness"),
            Applied::ColorTemperature { kelvin, level },
        )
    }

    fn teardown(&mut self) {
        if let Some(mut strip) = self.surface.take() {
            if let Err(e) = rgbcct::blank(strip.pixels()) {
                tracing::warn!("blank on shutdown failed: {e}");
            }
            strip.pixels().deinit();
        }
        self.segment = None;
        let mut shared = self.shared.lock().unwrap();
        shared.settings = self.settings.clone();
        shared.connected = false;
        tracing::info!("render worker stopped");
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MemoryFactory;
    use crate::surface::Pixel;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn controller(config: StripConfig) -> (LedController, Arc<MemoryFactory>) {
        let factory = Arc::new(MemoryFactory::new());
        (LedController::new(config, factory.clone()), factory)
    }

    fn small_config() -> StripConfig {
        StripConfig { num_leds: 10, ..StripConfig::default() }
    }

    /// Poll until `predicate` holds or the deadline passes.
    fn wait_for(mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn static_effect_fills_strip_after_one_tick() {
        let (controller, factory) = controller(small_config());
        let response = controller.set_color(255, 0, 0);
        assert!(response.connected);

        let shows = factory.show_counter().unwrap();
        assert!(wait_for(|| shows.load(Ordering::SeqCst) > 0));

        // set_color forces the static effect, so one tick paints everything.
        let response = controller.set_effect(0, None, None);
        assert!(response.connected);
        let buffer = factory.buffer().unwrap();
        assert!(wait_for(|| {
            buffer.lock().unwrap().iter().all(|p| *p == Pixel::Rgb([255, 0, 0]))
        }));
        controller.stop();
    }

    #[test]
    fn power_off_blanks_before_reply_returns() {
        let (controller, factory) = controller(small_config());
        controller.set_color(10, 20, 30);
        let shows = factory.show_counter().unwrap();
        assert!(wait_for(|| shows.load(Ordering::SeqCst) > 0));

        let response = controller.set_power(PowerState::Off);
        assert!(response.connected);
        assert_eq!(response.applied, Some(Applied::Power { power_on: false }));

        // Blanking is synchronous with the command, no tick needed.
        let buffer = factory.buffer().unwrap();
        assert!(buffer.lock().unwrap().iter().all(|p| *p == Pixel::Rgb([0, 0, 0])));
        controller.stop();
    }

    #[test]
    fn toggle_flips_power() {
        let (controller, _) = controller(small_config());
        let on = controller.set_power(PowerState::Toggle);
        assert_eq!(on.applied, Some(Applied::Power { power_on: true }));
        let off = controller.set_power(PowerState::Toggle);
        assert_eq!(off.applied, Some(Applied::Power { power_on: false }));
        controller.stop();
    }

    #[test]
    fn invalid_effect_is_rejected_without_mutation() {
        let (controller, _) = controller(small_config());
        controller.set_effect(1, None, None);
        let response = controller.set_effect(usize::MAX, None, None);
        assert!(!response.connected);
        assert!(response.error.unwrap().contains("invalid effect"));
        assert_eq!(controller.check_status().current_effect, 1);
        controller.stop();
    }

    #[test]
    fn invalid_palette_is_rejected_without_mutation() {
        let (controller, _) = controller(small_config());
        let response = controller.set_palette(9999);
        assert!(!response.connected);
        assert!(response.error.unwrap().contains("invalid palette"));
        assert_eq!(controller.check_status().current_palette, 0);
        controller.stop();
    }

    #[test]
    fn hardware_failure_is_reported_and_recoverable() {
        let factory = Arc::new(MemoryFactory::failing("driver not present"));
        let controller = LedController::new(small_config(), factory);
        let response = controller.set_color(1, 2, 3);
        assert!(!response.connected);
        assert!(response.error.unwrap().contains("driver not present"));

        let status = controller.check_status();
        assert!(!status.connected);
        assert!(status.error.unwrap().contains("driver not present"));
        controller.stop();
    }

    #[test]
    fn invalid_pin_fails_initialization() {
        let config = StripConfig { gpio_pin: 7, ..small_config() };
        let (controller, _) = controller(config);
        let response = controller.set_power(PowerState::On);
        assert!(!response.connected);
        assert!(response.error.unwrap().contains("invalid GPIO pin"));
        controller.stop();
    }

    #[test]
    fn speed_and_intensity_do_not_power_on() {
        let (controller, _) = controller(small_config());
        controller.set_speed(99);
        controller.set_intensity(42);
        controller.set_colors(Some((1, 2, 3)), None, None);
        let status = controller.check_status();
        assert!(!status.power_on);
        assert_eq!(status.speed, 99);
        assert_eq!(status.intensity, 42);
        assert_eq!(status.colors[0], "#010203");
        controller.stop();
    }

    #[test]
    fn set_colors_reports_hex_values() {
        let (controller, _) = controller(small_config());
        let response = controller.set_colors(Some((255, 0, 128)), None, Some((0, 255, 0)));
        assert!(response.connected);
        assert!(response.message.contains("color1=#ff0080"), "{}", response.message);
        assert!(response.message.contains("color3=#00ff00"), "{}", response.message);
        controller.stop();
    }

    #[test]
    fn status_snapshot_serializes_to_json() {
        let (controller, _) = controller(small_config());
        let status = controller.check_status();
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"connected\":true"), "{json}");
        assert!(json.contains("\"num_leds\":10"), "{json}");
        assert!(json.contains("\"effect_name\":\"Rainbow Cycle\""), "{json}");
        controller.stop();
    }

    #[test]
    fn effect_palette_and_color_power_on() {
        let (controller, _) = controller(small_config());
        controller.set_effect(2, Some(200), Some(100));
        let status = controller.check_status();
        assert!(status.power_on);
        assert_eq!(status.current_effect, 2);
        assert_eq!(status.speed, 200);
        assert_eq!(status.intensity, 100);
        controller.stop();
    }

    #[test]
    fn white_controls_require_dual_chip_mode() {
        let (controller, _) = controller(small_config());
        let response = controller.set_white_brightness(50);
        assert!(response.connected);
        assert!(response.error.is_some());
        let response = controller.set_color_temperature(3000, 50);
        assert!(response.connected);
        assert!(response.error.is_some());
        controller.stop();
    }

    #[test]
    fn color_temperature_reaches_white_chips() {
        let config = StripConfig { num_leds: 4, dual_chip: true, ..StripConfig::default() };
        let (controller, factory) = controller(config);
        let response = controller.set_color_temperature(2700, 100);
        assert!(response.connected);
        assert_eq!(
            response.applied,
            Some(Applied::ColorTemperature { kelvin: 2700, level: 100 })
        );
        let buffer = factory.buffer().unwrap();
        let pixels = buffer.lock().unwrap();
        // 8 physical pixels; odd ones carry (cw, ww, 0) = (0, 255, 0).
        assert_eq!(pixels.len(), 8);
        for i in 0..4 {
            assert_eq!(pixels[2 * i + 1], Pixel::Rgb([0, 255, 0]));
        }
        drop(pixels);
        controller.stop();
    }

    #[test]
    fn stop_then_mutate_respawns_with_retained_settings() {
        let (controller, _) = controller(small_config());
        controller.set_speed(123);
        controller.stop();

        let response = controller.set_power(PowerState::On);
        assert!(response.connected);
        let status = controller.check_status();
        assert_eq!(status.speed, 123);
        assert!(status.connected);
        controller.stop();
    }

    #[test]
    fn check_status_attempts_initialization() {
        let (controller, _) = controller(small_config());
        let status = controller.check_status();
        assert!(status.connected);
        assert!(!status.power_on);
        assert_eq!(status.num_leds, 10);
        controller.stop();
    }

    #[test]
    fn preset_applies_everything() {
        let (controller, _) = controller(small_config());
        let preset = EffectPreset {
            effect_id: 9,
            palette_id: 3,
            speed: 10,
            intensity: 20,
            color1: Some((1, 1, 1)),
            color2: None,
            color3: Some((2, 2, 2)),
        };
        let response = controller.apply_preset(&preset);
        assert!(response.connected);
        let status = controller.check_status();
        assert_eq!(status.current_effect, 9);
        assert_eq!(status.current_palette, 3);
        assert_eq!(status.speed, 10);
        assert_eq!(status.intensity, 20);
        assert_eq!(status.colors[0], "#010101");
        assert_eq!(status.colors[2], "#020202");
        assert!(status.power_on);
        controller.stop();
    }

    #[test]
    fn concurrent_set_speed_never_tears() {
        let (controller, _) = controller(small_config());
        controller.set_power(PowerState::On);
        let controller = Arc::new(controller);

        let mut handles = Vec::new();
        for value in 0..100u8 {
            let c = Arc::clone(&controller);
            handles.push(thread::spawn(move || {
                let response = c.set_speed(value);
                assert!(response.connected);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let speed = controller.check_status().speed;
        assert!(speed < 100, "speed {speed} was never submitted");
        controller.stop();
    }
}
