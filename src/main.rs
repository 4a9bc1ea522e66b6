//! LED strip controller binary.
//!
//! Brings up the render worker against the real ws281x driver, applies the
//! startup look from the command line, and runs until Ctrl+C.
//!
//! ```sh
//! sudo ./target/release/led-strip-rs --leds 120 --pin 18 --effect 8
//! ```

#[cfg(not(feature = "hardware"))]
fn main() {
    eprintln!("This binary requires the 'hardware' feature (rs_ws281x).");
    eprintln!("Build with: cargo build --release");
    eprintln!("Tests can run without it: cargo test --no-default-features");
    std::process::exit(1);
}

#[cfg(feature = "hardware")]
fn main() {
    use clap::Parser;
    use led_strip_rs::controller::{LedController, PowerState};
    use led_strip_rs::hardware::Ws281xFactory;
    use led_strip_rs::{StripConfig, is_running, setup_signal_handler};
    use std::sync::Arc;
    use std::time::Duration;

    /// LED strip effect engine
    #[derive(Parser)]
    #[command(name = "led-strip-rs")]
    #[command(about = "Real-time effect engine for WS2812B and RGBCCT LED strips")]
    #[command(version)]
    struct Args {
        /// Number of logical LEDs on the strip
        #[arg(long, default_value = "60")]
        leds: usize,

        /// GPIO pin driving the data line (12, 13, 18, or 19)
        #[arg(long, default_value = "18")]
        pin: u8,

        /// Initial brightness, 0.0-1.0
        #[arg(long, default_value = "0.35")]
        brightness: f32,

        /// Channel order on the wire, e.g. GRB or GRBW
        #[arg(long, default_value = "GRB")]
        order: String,

        /// Strip has separate RGB and warm/cool-white chips per pixel
        #[arg(long)]
        dual_chip: bool,

        /// Effect id to start with
        #[arg(long, default_value = "8")]
        effect: usize,

        /// Palette id to start with
        #[arg(long, default_value = "0")]
        palette: usize,

        /// Effect speed, 0-255
        #[arg(long, default_value = "128")]
        speed: u8,

        /// Effect intensity, 0-255
        #[arg(long, default_value = "128")]
        intensity: u8,

        /// Primary color as hex RGB, e.g. ff8800
        #[arg(long)]
        color: Option<String>,

        /// List available effects and palettes, then exit
        #[arg(long)]
        list: bool,

        /// Print the controller status as JSON, then exit
        #[arg(long)]
        status: bool,
    }

    // ANSI off for systemd/journald
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .compact()
        .init();

    let args = Args::parse();

    let config = StripConfig {
        num_leds: args.leds,
        gpio_pin: args.pin,
        brightness: args.brightness.clamp(0.0, 1.0),
        pixel_order: args.order.clone(),
        speed: args.speed,
        intensity: args.intensity,
        dual_chip: args.dual_chip,
    };

    let controller = LedController::new(config, Arc::new(Ws281xFactory));

    if args.list {
        println!("Effects:");
        for (id, name) in controller.get_effects() {
            println!("  {id:>2}  {name}");
        }
        println!("Palettes:");
        for (id, name) in controller.get_palettes() {
            println!("  {id:>2}  {name}");
        }
        return;
    }

    if args.status {
        match serde_json::to_string_pretty(&controller.check_status()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("status serialization failed: {e}");
                std::process::exit(1);
            }
        }
        controller.stop();
        return;
    }

    tracing::info!("led-strip-rs v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Strip: {} LEDs on GPIO {} ({}{})",
        args.leds,
        args.pin,
        args.order,
        if args.dual_chip { ", dual-chip" } else { "" }
    );

    if let Some(hex) = &args.color {
        match parse_hex_rgb(hex) {
            Some((r, g, b)) => {
                let response = controller.set_color(r, g, b);
                if !response.connected {
                    tracing::error!("{}", response.error.unwrap_or(response.message));
                    std::process::exit(1);
                }
            }
            None => {
                tracing::error!("invalid --color value '{hex}', expected hex like ff8800");
                std::process::exit(1);
            }
        }
    }

    let response = controller.set_effect(args.effect, Some(args.speed), Some(args.intensity));
    if !response.connected {
        tracing::error!("{}", response.error.unwrap_or(response.message));
        std::process::exit(1);
    }
    tracing::info!("{}", response.message);

    let response = controller.set_palette(args.palette);
    if !response.connected {
        tracing::error!("{}", response.error.unwrap_or(response.message));
        std::process::exit(1);
    }
    tracing::info!("{}", response.message);

    controller.set_power(PowerState::On);

    let running = setup_signal_handler();
    tracing::info!("Running — Ctrl+C to stop");
    while is_running(&running) {
        std::thread::sleep(Duration::from_millis(100));
    }

    tracing::info!("Shutting down");
    controller.stop();
}

#[cfg(feature = "hardware")]
fn parse_hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}
