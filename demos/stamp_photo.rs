//! Stamp an existing JPEG with coordinates, an address and the current time.
//!
//! ```sh
//! cargo run --example stamp_photo -- input.jpg output.jpg
//! ```

use chrono::{Local, Utc};
use geostamp::{FacingMode, LocationSample, OverlayStamper, RawFrame, ResolvedAddress};
use tracing_subscriber::{EnvFilter, fmt};

const USAGE: &str = "usage: stamp_photo <input.jpg> <output.jpg>";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut args = std::env::args().skip(1);
    let input = args.next().ok_or(USAGE)?;
    let output = args.next().ok_or(USAGE)?;

    let frame = RawFrame {
        jpeg: std::fs::read(&input)?,
    };
    let location = LocationSample {
        latitude: 40.820888,
        longitude: 14.422817,
        accuracy_m: 12.0,
        captured_at: Utc::now(),
    };
    let address = ResolvedAddress::resolved("Via Vesuvio, Massa di Somma, Campania, Italy");

    let stamper = OverlayStamper::new()?;
    let stamped = stamper.stamp(
        &frame,
        &location,
        &address,
        Local::now(),
        FacingMode::Environment,
    )?;
    std::fs::write(&output, stamped)?;
    println!("wrote {output}");
    Ok(())
}
