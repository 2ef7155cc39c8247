//! RTMP livestreaming.
//!
//! See https://gopro.github.io/OpenGoPro/ble/features/live_streaming.html.
//! The camera must already be connected to an access point. Streaming begins
//! once the status reports ready and the shutter is enabled.

use crate::ble::{ensure_success, BluetoothCamera};
use crate::proto::{
    action, feature, EnumLens, EnumLiveStreamError, EnumLiveStreamStatus, EnumWindowSize,
    NotifyLiveStreamStatus, RequestGetLiveStreamStatus, RequestReleaseNetwork,
    RequestSetLiveStreamMode, ResponseGeneric,
};
use crate::{COMMAND_REQ_CHARACTERISTIC, QUERY_REQ_CHARACTERISTIC};

#[derive(Debug, Clone, PartialEq)]
pub struct LivestreamOptions {
    pub url: String,
    pub encode: bool,
    pub window_size: Option<EnumWindowSize>,
    pub lens: Option<EnumLens>,
    pub minimum_bitrate: Option<i32>,
    pub maximum_bitrate: Option<i32>,
    pub starting_bitrate: Option<i32>,
    /// PEM certificate for RTMPS servers with self-signed certificates.
    pub certificate: Option<Vec<u8>>,
}

impl LivestreamOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            encode: true,
            window_size: None,
            lens: None,
            minimum_bitrate: None,
            maximum_bitrate: None,
            starting_bitrate: None,
            certificate: None,
        }
    }

    pub fn window_size(mut self, window_size: EnumWindowSize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    pub fn lens(mut self, lens: EnumLens) -> Self {
        self.lens = Some(lens);
        self
    }

    pub fn bitrate(mut self, minimum: i32, starting: i32, maximum: i32) -> Self {
        self.minimum_bitrate = Some(minimum);
        self.starting_bitrate = Some(starting);
        self.maximum_bitrate = Some(maximum);
        self
    }

    fn to_request(&self) -> RequestSetLiveStreamMode {
        RequestSetLiveStreamMode {
            url: Some(self.url.clone()),
            encode: Some(self.encode),
            window_size: self.window_size.map(|w| w as i32),
            cert: self.certificate.clone(),
            minimum_bitrate: self.minimum_bitrate,
            maximum_bitrate: self.maximum_bitrate,
            starting_bitrate: self.starting_bitrate,
            lens: self.lens.map(|l| l as i32),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivestreamStatus {
    pub state: EnumLiveStreamStatus,
    pub error: EnumLiveStreamError,
    pub bitrate: Option<i32>,
    pub encode: Option<bool>,
}

impl LivestreamStatus {
    pub fn is_ready(&self) -> bool {
        self.state == EnumLiveStreamStatus::Ready
    }
}

impl From<NotifyLiveStreamStatus> for LivestreamStatus {
    fn from(notif: NotifyLiveStreamStatus) -> Self {
        Self {
            state: notif
                .live_stream_status
                .and_then(|s| EnumLiveStreamStatus::try_from(s).ok())
                .unwrap_or(EnumLiveStreamStatus::Unavailable),
            error: notif
                .live_stream_error
                .and_then(|e| EnumLiveStreamError::try_from(e).ok())
                .unwrap_or(EnumLiveStreamError::None),
            bitrate: notif.live_stream_bitrate,
            encode: notif.live_stream_encode,
        }
    }
}

impl BluetoothCamera {
    /// Configures the camera to push to `options.url`.
    pub async fn start_livestream(&self, options: &LivestreamOptions) -> Result<(), crate::Error> {
        // The camera rejects the mode change while capturing.
        tolerate_rejected_shutter(self.set_shutter(false).await)?;

        tracing::info!(url = %options.url, "configuring livestream");
        let resp: ResponseGeneric = self
            .proto_request(
                COMMAND_REQ_CHARACTERISTIC,
                feature::COMMAND,
                action::SET_LIVESTREAM_MODE,
                action::SET_LIVESTREAM_MODE_RSP,
                &options.to_request(),
            )
            .await?;
        ensure_success(action::SET_LIVESTREAM_MODE_RSP, resp.result)
    }

    pub async fn livestream_status(&self) -> Result<LivestreamStatus, crate::Error> {
        let resp: NotifyLiveStreamStatus = self
            .proto_request(
                QUERY_REQ_CHARACTERISTIC,
                feature::QUERY,
                action::GET_LIVESTREAM_STATUS,
                action::LIVESTREAM_STATUS_RSP,
                &RequestGetLiveStreamStatus::default(),
            )
            .await?;
        Ok(resp.into())
    }

    /// Stops capturing and releases the camera's network connection.
    pub async fn stop_livestream(&self) -> Result<(), crate::Error> {
        tolerate_rejected_shutter(self.set_shutter(false).await)?;

        let resp: ResponseGeneric = self
            .proto_request(
                COMMAND_REQ_CHARACTERISTIC,
                feature::COMMAND,
                action::RELEASE_NETWORK,
                action::RELEASE_NETWORK_RSP,
                &RequestReleaseNetwork {},
            )
            .await?;
        ensure_success(action::RELEASE_NETWORK_RSP, resp.result)?;
        tracing::info!("livestream stopped");
        Ok(())
    }
}

/// A camera that is not capturing answers shutter-off with an error status.
/// That still leaves it in the state the caller wanted.
fn tolerate_rejected_shutter(result: Result<(), crate::Error>) -> Result<(), crate::Error> {
    match result {
        Err(crate::Error::CommandFailed { command, status }) => {
            tracing::debug!(command, status, "camera rejected shutter off");
            Ok(())
        }
        other => other,
    }
}
