use std::time::Duration;

use open_gopro::{BluetoothCamera, CameraControl, CameraOptions};

async fn toggle_shutter(camera: &mut impl CameraControl, times: usize) -> Result<(), open_gopro::Error> {
    for _ in 0..times {
        camera.set_shutter(true).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        camera.set_shutter(false).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let adapter = open_gopro::first_adapter().await?;

    // start scanning for devices
    let peripheral = open_gopro::find_camera(&adapter, "GoPro", Duration::from_secs(2)).await?;
    let mut camera = BluetoothCamera::connect(peripheral, CameraOptions::default()).await?;

    let result = toggle_shutter(&mut camera, 3).await;
    camera.close().await?;
    result?;

    Ok(())
}
