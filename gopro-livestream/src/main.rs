use anyhow::Context;
use clap::Parser;
use gopro_livestream::config::Args;
use gopro_livestream::Config;
use open_gopro::{BluetoothCamera, CameraOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::try_from(Args::parse())?;

    let adapter = open_gopro::first_adapter().await?;
    let peripheral = open_gopro::find_camera(&adapter, &config.device, config.ble_scan)
        .await
        .with_context(|| format!("looking for a camera named like '{}'", config.device))?;

    let camera = BluetoothCamera::connect(
        peripheral,
        CameraOptions {
            response_timeout: config.response_timeout,
            ..CameraOptions::default()
        },
    )
    .await
    .context("opening camera session")?;
    tracing::info!("camera session open");

    if let Err(e) = camera.wait_until_ready(config.response_timeout).await {
        tracing::warn!(error = %e, "camera did not report ready, continuing");
    }

    gopro_livestream::run(&camera, &config, shutdown_signal())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "livestream failed"))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
