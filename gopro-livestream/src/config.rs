use std::time::Duration;

use clap::{Parser, ValueEnum};
use open_gopro::proto::{EnumLens, EnumWindowSize};
use open_gopro::LivestreamOptions;

#[derive(Parser, Debug)]
#[command(name = "gopro-livestream")]
#[command(about = "Join a GoPro to Wi-Fi over BLE and push an RTMP livestream")]
pub struct Args {
    /// Wi-Fi network the camera should join
    #[arg(long, env = "GOPRO_WIFI_SSID", default_value = "CVISS_5G")]
    pub ssid: String,

    /// Wi-Fi password, ignored when the camera already knows the network
    #[arg(long, env = "GOPRO_WIFI_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// RTMP destination the camera pushes to
    #[arg(
        long,
        env = "GOPRO_RTMP_URL",
        default_value = "rtmp://192.168.1.132/live/stream1"
    )]
    pub rtmp_url: String,

    /// Substring of the camera's advertised BLE name
    #[arg(long, env = "GOPRO_DEVICE", default_value = "GoPro")]
    pub device: String,

    /// How long to scan for the camera over BLE
    #[arg(long, default_value_t = 5)]
    pub ble_scan_secs: u64,

    /// Upper bound for a single BLE request/response exchange
    #[arg(long, default_value_t = 10)]
    pub response_timeout_secs: u64,

    /// Livestream status queries before giving up
    #[arg(long, default_value_t = 15)]
    pub poll_attempts: u32,

    /// Delay between livestream status queries
    #[arg(long, default_value_t = 1)]
    pub poll_interval_secs: u64,

    /// Pause between joining Wi-Fi and starting the stream
    #[arg(long, default_value_t = 10)]
    pub wifi_settle_secs: u64,

    /// How long to stream before stopping
    #[arg(long, default_value_t = 60)]
    pub stream_secs: u64,

    /// Interval between keep-alive messages while streaming
    #[arg(long, default_value_t = 3)]
    pub keep_alive_secs: u64,

    #[arg(long, value_enum)]
    pub window_size: Option<WindowSize>,

    #[arg(long, value_enum)]
    pub lens: Option<Lens>,

    /// Minimum bitrate in kbps
    #[arg(long, requires_all = ["start_bitrate", "max_bitrate"])]
    pub min_bitrate: Option<i32>,

    /// Starting bitrate in kbps
    #[arg(long, requires_all = ["min_bitrate", "max_bitrate"])]
    pub start_bitrate: Option<i32>,

    /// Maximum bitrate in kbps
    #[arg(long, requires_all = ["min_bitrate", "start_bitrate"])]
    pub max_bitrate: Option<i32>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum WindowSize {
    #[value(name = "480")]
    P480,
    #[value(name = "720")]
    P720,
    #[value(name = "1080")]
    P1080,
}

impl From<WindowSize> for EnumWindowSize {
    fn from(w: WindowSize) -> Self {
        match w {
            WindowSize::P480 => EnumWindowSize::WindowSize480,
            WindowSize::P720 => EnumWindowSize::WindowSize720,
            WindowSize::P1080 => EnumWindowSize::WindowSize1080,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Lens {
    Wide,
    Linear,
    Superview,
}

impl From<Lens> for EnumLens {
    fn from(l: Lens) -> Self {
        match l {
            Lens::Wide => EnumLens::Wide,
            Lens::Linear => EnumLens::Linear,
            Lens::Superview => EnumLens::Superview,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--poll-attempts must be at least 1")]
    NoPollAttempts,
    #[error("--keep-alive-secs must be at least 1")]
    NoKeepAlive,
    #[error("unsupported stream URL {0}, expected rtmp:// or rtmps://")]
    StreamUrl(String),
    #[error("bitrates must satisfy min <= start <= max")]
    BitrateOrder,
}

/// Fixed-count poll: `attempts` queries spaced by `interval`.
///
/// No sleep follows the final query, so giving up takes
/// `(attempts - 1) * interval` plus the query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 15,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ssid: String,
    pub password: String,
    pub livestream: LivestreamOptions,
    pub device: String,
    pub ble_scan: Duration,
    pub response_timeout: Duration,
    pub poll: PollPolicy,
    pub wifi_settle: Duration,
    pub stream_duration: Duration,
    pub keep_alive_interval: Duration,
}

impl Config {
    /// A configuration with the stock timings.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>, rtmp_url: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            livestream: LivestreamOptions::new(rtmp_url),
            device: "GoPro".to_owned(),
            ble_scan: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            poll: PollPolicy::default(),
            wifi_settle: Duration::from_secs(10),
            stream_duration: Duration::from_secs(60),
            keep_alive_interval: Duration::from_secs(3),
        }
    }
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.poll_attempts == 0 {
            return Err(ConfigError::NoPollAttempts);
        }
        if args.keep_alive_secs == 0 {
            return Err(ConfigError::NoKeepAlive);
        }
        if !(args.rtmp_url.starts_with("rtmp://") || args.rtmp_url.starts_with("rtmps://")) {
            return Err(ConfigError::StreamUrl(args.rtmp_url));
        }

        let mut livestream = LivestreamOptions::new(args.rtmp_url);
        if let Some(window_size) = args.window_size {
            livestream = livestream.window_size(window_size.into());
        }
        if let Some(lens) = args.lens {
            livestream = livestream.lens(lens.into());
        }
        if let (Some(min), Some(start), Some(max)) =
            (args.min_bitrate, args.start_bitrate, args.max_bitrate)
        {
            if !(min <= start && start <= max) {
                return Err(ConfigError::BitrateOrder);
            }
            livestream = livestream.bitrate(min, start, max);
        }

        Ok(Self {
            ssid: args.ssid,
            password: args.password,
            livestream,
            device: args.device,
            ble_scan: Duration::from_secs(args.ble_scan_secs),
            response_timeout: Duration::from_secs(args.response_timeout_secs),
            poll: PollPolicy {
                attempts: args.poll_attempts,
                interval: Duration::from_secs(args.poll_interval_secs),
            },
            wifi_settle: Duration::from_secs(args.wifi_settle_secs),
            stream_duration: Duration::from_secs(args.stream_secs),
            keep_alive_interval: Duration::from_secs(args.keep_alive_secs),
        })
    }
}
