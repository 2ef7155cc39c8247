//! Join a GoPro to a Wi-Fi network over BLE, then push an RTMP livestream
//! for a fixed duration.
//!
//! The flow is written against [`StreamCamera`] so it can run against a
//! real [`BluetoothCamera`] or a scripted stand-in.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use open_gopro::proto::ScanEntry;
use open_gopro::{BluetoothCamera, LivestreamOptions, LivestreamStatus};
use tokio::time::Instant;

pub mod config;

pub use config::{Config, PollPolicy};

#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Camera(#[from] open_gopro::Error),
    #[error("SSID '{0}' not found in scan results")]
    SsidNotFound(String),
    #[error("livestream did not become ready after {attempts} status queries")]
    NotReady { attempts: u32 },
    #[error("interrupted by shutdown request")]
    Interrupted,
}

/// The camera operations the livestream flow needs.
#[async_trait::async_trait]
pub trait StreamCamera: Send + Sync {
    async fn scan_wifi_networks(&self) -> Result<Vec<ScanEntry>, open_gopro::Error>;
    async fn connect_wifi(&self, entry: &ScanEntry, password: &str) -> Result<(), open_gopro::Error>;
    async fn start_livestream(&self, options: &LivestreamOptions) -> Result<(), open_gopro::Error>;
    async fn livestream_status(&self) -> Result<LivestreamStatus, open_gopro::Error>;
    async fn set_shutter(&self, on: bool) -> Result<(), open_gopro::Error>;
    async fn keep_alive(&self) -> Result<(), open_gopro::Error>;
    async fn stop_livestream(&self) -> Result<(), open_gopro::Error>;
    async fn close(&self) -> Result<(), open_gopro::Error>;
}

#[async_trait::async_trait]
impl StreamCamera for BluetoothCamera {
    async fn scan_wifi_networks(&self) -> Result<Vec<ScanEntry>, open_gopro::Error> {
        Ok(BluetoothCamera::scan_wifi_networks(self).await?.entries)
    }

    async fn connect_wifi(&self, entry: &ScanEntry, password: &str) -> Result<(), open_gopro::Error> {
        self.connect_to_entry(entry, password).await.map(drop)
    }

    async fn start_livestream(&self, options: &LivestreamOptions) -> Result<(), open_gopro::Error> {
        BluetoothCamera::start_livestream(self, options).await
    }

    async fn livestream_status(&self) -> Result<LivestreamStatus, open_gopro::Error> {
        BluetoothCamera::livestream_status(self).await
    }

    async fn set_shutter(&self, on: bool) -> Result<(), open_gopro::Error> {
        BluetoothCamera::set_shutter(self, on).await
    }

    async fn keep_alive(&self) -> Result<(), open_gopro::Error> {
        BluetoothCamera::keep_alive(self).await
    }

    async fn stop_livestream(&self) -> Result<(), open_gopro::Error> {
        BluetoothCamera::stop_livestream(self).await
    }

    async fn close(&self) -> Result<(), open_gopro::Error> {
        BluetoothCamera::close(self).await
    }
}

/// Scans for `ssid` and, if the camera can see it, makes exactly one
/// connection attempt with `password`.
pub async fn connect_to_wifi<C>(camera: &C, ssid: &str, password: &str) -> Result<(), FlowError>
where
    C: StreamCamera + ?Sized,
{
    let entries = camera.scan_wifi_networks().await?;

    let Some(entry) = entries.iter().find(|entry| entry.ssid == ssid) else {
        return Err(FlowError::SsidNotFound(ssid.to_owned()));
    };

    tracing::info!(ssid, "found SSID, attempting to connect");
    camera.connect_wifi(entry, password).await?;
    tracing::info!(ssid, "camera connected to Wi-Fi");
    Ok(())
}

/// Polls the livestream status until it reports ready.
///
/// Issues at most `policy.attempts` queries, sleeping `policy.interval`
/// between them. A failed query counts as an attempt.
pub async fn wait_until_livestream_ready<C>(camera: &C, policy: PollPolicy) -> Result<(), FlowError>
where
    C: StreamCamera + ?Sized,
{
    tracing::info!(attempts = policy.attempts, "waiting for livestream to become ready");

    for attempt in 1..=policy.attempts {
        match camera.livestream_status().await {
            Ok(status) => {
                tracing::info!(attempt, state = ?status.state, error = ?status.error, "livestream status");
                if status.is_ready() {
                    tracing::info!("livestream is ready");
                    return Ok(());
                }
            }
            Err(e) => tracing::warn!(attempt, error = %e, "failed to query livestream status"),
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(FlowError::NotReady {
        attempts: policy.attempts,
    })
}

/// Runs the whole flow: Wi-Fi, livestream, stream for the configured
/// duration, stop. The camera session is closed on every path.
///
/// `shutdown` is watched for the whole flow. During the streaming period it
/// ends the stream early and the run still succeeds. Before that it aborts
/// the current stage with [`FlowError::Interrupted`]; once the livestream
/// has been started it is stopped first.
pub async fn run<C, F>(camera: &C, config: &Config, shutdown: F) -> Result<(), FlowError>
where
    C: StreamCamera + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let result = stream(camera, config, shutdown.as_mut()).await;

    if let Err(e) = camera.close().await {
        tracing::warn!(error = %e, "failed to close camera session");
    }
    result
}

async fn stream<C, F>(camera: &C, config: &Config, mut shutdown: Pin<&mut F>) -> Result<(), FlowError>
where
    C: StreamCamera + ?Sized,
    F: Future<Output = ()>,
{
    interruptible(
        connect_to_wifi(camera, &config.ssid, &config.password),
        shutdown.as_mut(),
    )
    .await?;

    tracing::info!(secs = config.wifi_settle.as_secs(), "letting the network settle");
    interruptible(
        async {
            tokio::time::sleep(config.wifi_settle).await;
            Ok::<(), FlowError>(())
        },
        shutdown.as_mut(),
    )
    .await?;

    // A single bounded request. A shutdown arriving meanwhile is seen by the
    // readiness stage, which stops the stream.
    camera.start_livestream(&config.livestream).await?;

    let streaming = async {
        interruptible(
            wait_until_livestream_ready(camera, config.poll),
            shutdown.as_mut(),
        )
        .await?;
        interruptible(
            async { camera.set_shutter(true).await.map_err(FlowError::from) },
            shutdown.as_mut(),
        )
        .await?;
        tracing::info!(url = %config.livestream.url, "RTMP livestream started");

        hold_stream(
            camera,
            config.stream_duration,
            config.keep_alive_interval,
            shutdown.as_mut(),
        )
        .await;
        Ok::<(), FlowError>(())
    }
    .await;

    let stopped = camera.stop_livestream().await;
    if let (Err(_), Err(e)) = (&streaming, &stopped) {
        tracing::warn!(error = %e, "failed to stop livestream");
    }
    streaming?;
    stopped?;
    Ok(())
}

/// Runs `stage` unless `shutdown` completes first.
async fn interruptible<T, S, F>(stage: S, shutdown: Pin<&mut F>) -> Result<T, FlowError>
where
    S: Future<Output = Result<T, FlowError>>,
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;

        _ = shutdown => {
            tracing::info!("shutdown requested, abandoning the flow");
            Err(FlowError::Interrupted)
        }
        result = stage => result,
    }
}

/// Waits out the stream while keeping the BLE link alive.
async fn hold_stream<C, F>(
    camera: &C,
    duration: Duration,
    keep_alive_every: Duration,
    mut shutdown: Pin<&mut F>,
) where
    C: StreamCamera + ?Sized,
    F: Future<Output = ()>,
{
    let end = tokio::time::sleep(duration);
    tokio::pin!(end);

    let mut keep_alive = tokio::time::interval_at(Instant::now() + keep_alive_every, keep_alive_every);

    loop {
        tokio::select! {
            biased;

            _ = &mut end => {
                tracing::info!(secs = duration.as_secs(), "stream duration elapsed");
                break;
            }
            _ = shutdown.as_mut() => {
                tracing::info!("shutdown requested, stopping stream early");
                break;
            }
            _ = keep_alive.tick() => {
                if let Err(e) = camera.keep_alive().await {
                    tracing::warn!(error = %e, "keep-alive failed");
                }
            }
        }
    }
}
