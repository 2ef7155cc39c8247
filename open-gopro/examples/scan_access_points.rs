//! Lists the Wi-Fi networks a nearby GoPro can see.
//!
//! Run with: `cargo run -p open-gopro --example scan_access_points`

use std::time::Duration;

use open_gopro::{BluetoothCamera, CameraOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let adapter = open_gopro::first_adapter().await?;
    let peripheral = open_gopro::find_camera(&adapter, "GoPro", Duration::from_secs(5)).await?;
    let camera = BluetoothCamera::connect(peripheral, CameraOptions::default()).await?;

    let result = camera.scan_wifi_networks().await;
    camera.close().await?;

    let result = result?;
    if result.entries.is_empty() {
        println!("No networks found.");
    }
    for entry in &result.entries {
        println!(
            "{:<32} {} bars {:>5} MHz{}",
            entry.ssid,
            entry.signal_strength_bars,
            entry.signal_frequency_mhz,
            if entry.is_configured() { " (configured)" } else { "" }
        );
    }

    Ok(())
}
