use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use gopro_livestream::{
    connect_to_wifi, run, wait_until_livestream_ready, Config, FlowError, PollPolicy, StreamCamera,
};
use open_gopro::proto::{EnumLiveStreamError, EnumLiveStreamStatus, ScanEntry};
use open_gopro::{LivestreamOptions, LivestreamStatus, ResponseKey};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Scan,
    Connect { ssid: String, password: String },
    StartLivestream { url: String },
    Status,
    Shutter(bool),
    KeepAlive,
    StopLivestream,
    Close,
}

/// A camera that answers from a script and records every call.
#[derive(Default)]
struct ScriptedCamera {
    networks: Vec<&'static str>,
    scan_fails: bool,
    connect_fails: bool,
    start_fails: bool,
    shutter_fails: bool,
    statuses: Mutex<VecDeque<Option<EnumLiveStreamStatus>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedCamera {
    fn with_networks(networks: &[&'static str]) -> Self {
        Self {
            networks: networks.to_vec(),
            ..Default::default()
        }
    }

    /// `None` makes the corresponding status query fail.
    fn statuses(self, statuses: &[Option<EnumLiveStreamStatus>]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn failure() -> open_gopro::Error {
        open_gopro::Error::Timeout(ResponseKey::Command(0x01))
    }
}

#[async_trait::async_trait]
impl StreamCamera for ScriptedCamera {
    async fn scan_wifi_networks(&self) -> Result<Vec<ScanEntry>, open_gopro::Error> {
        self.record(Call::Scan);
        if self.scan_fails {
            return Err(Self::failure());
        }
        Ok(self
            .networks
            .iter()
            .map(|ssid| ScanEntry {
                ssid: ssid.to_string(),
                signal_strength_bars: 3,
                signal_frequency_mhz: 5180,
                scan_entry_flags: 0,
            })
            .collect())
    }

    async fn connect_wifi(&self, entry: &ScanEntry, password: &str) -> Result<(), open_gopro::Error> {
        self.record(Call::Connect {
            ssid: entry.ssid.clone(),
            password: password.to_owned(),
        });
        if self.connect_fails {
            return Err(open_gopro::Error::ProvisioningFailed(
                open_gopro::proto::EnumProvisioning::ErrorPasswordAuth,
            ));
        }
        Ok(())
    }

    async fn start_livestream(&self, options: &LivestreamOptions) -> Result<(), open_gopro::Error> {
        self.record(Call::StartLivestream {
            url: options.url.clone(),
        });
        if self.start_fails {
            return Err(open_gopro::Error::RequestFailed {
                action: 0xF9,
                result: open_gopro::proto::EnumResultGeneric::ArgumentInvalid,
            });
        }
        Ok(())
    }

    async fn livestream_status(&self) -> Result<LivestreamStatus, open_gopro::Error> {
        self.record(Call::Status);
        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Some(EnumLiveStreamStatus::Config));
        match next {
            Some(state) => Ok(LivestreamStatus {
                state,
                error: EnumLiveStreamError::None,
                bitrate: None,
                encode: Some(true),
            }),
            None => Err(Self::failure()),
        }
    }

    async fn set_shutter(&self, on: bool) -> Result<(), open_gopro::Error> {
        self.record(Call::Shutter(on));
        if self.shutter_fails {
            return Err(open_gopro::Error::CommandFailed {
                command: 0x01,
                status: 0x02,
            });
        }
        Ok(())
    }

    async fn keep_alive(&self) -> Result<(), open_gopro::Error> {
        self.record(Call::KeepAlive);
        Ok(())
    }

    async fn stop_livestream(&self) -> Result<(), open_gopro::Error> {
        self.record(Call::StopLivestream);
        Ok(())
    }

    async fn close(&self) -> Result<(), open_gopro::Error> {
        self.record(Call::Close);
        Ok(())
    }
}

fn config() -> Config {
    Config::new("CVISS_5G", "snarasim", "rtmp://192.168.1.132/live/stream1")
}

fn is_streaming_call(call: &Call) -> bool {
    matches!(
        call,
        Call::StartLivestream { .. } | Call::Status | Call::Shutter(_) | Call::StopLivestream
    )
}

#[tokio::test]
async fn missing_ssid_never_attempts_connect() {
    let camera = ScriptedCamera::with_networks(&["Home5G", "Office"]);

    let err = connect_to_wifi(&camera, "CVISS_5G", "snarasim").await.unwrap_err();

    assert!(matches!(err, FlowError::SsidNotFound(ssid) if ssid == "CVISS_5G"));
    assert_eq!(camera.calls(), vec![Call::Scan]);
}

#[tokio::test]
async fn found_ssid_connects_exactly_once_with_password() {
    let camera = ScriptedCamera::with_networks(&["Home5G", "CVISS_5G"]);

    connect_to_wifi(&camera, "CVISS_5G", "snarasim").await.unwrap();

    assert_eq!(
        camera.calls(),
        vec![
            Call::Scan,
            Call::Connect {
                ssid: "CVISS_5G".into(),
                password: "snarasim".into()
            }
        ]
    );
}

#[tokio::test]
async fn scan_and_connect_failures_are_reported() {
    let camera = ScriptedCamera {
        scan_fails: true,
        ..ScriptedCamera::with_networks(&["CVISS_5G"])
    };
    let err = connect_to_wifi(&camera, "CVISS_5G", "pw").await.unwrap_err();
    assert!(matches!(err, FlowError::Camera(open_gopro::Error::Timeout(_))));
    assert_eq!(camera.calls(), vec![Call::Scan]);

    let camera = ScriptedCamera {
        connect_fails: true,
        ..ScriptedCamera::with_networks(&["CVISS_5G"])
    };
    let err = connect_to_wifi(&camera, "CVISS_5G", "pw").await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Camera(open_gopro::Error::ProvisioningFailed(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn readiness_returns_on_first_ready_status() {
    let camera = ScriptedCamera::default().statuses(&[
        Some(EnumLiveStreamStatus::Config),
        Some(EnumLiveStreamStatus::Config),
        Some(EnumLiveStreamStatus::Ready),
    ]);
    let started = Instant::now();

    wait_until_livestream_ready(&camera, PollPolicy::default())
        .await
        .unwrap();

    assert_eq!(camera.count(&Call::Status), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed <= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn readiness_gives_up_after_the_attempt_bound() {
    let camera = ScriptedCamera::default();
    let started = Instant::now();

    let err = wait_until_livestream_ready(&camera, PollPolicy::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::NotReady { attempts: 15 }));
    assert_eq!(camera.count(&Call::Status), 15);
    // Fourteen intervals between fifteen queries, none after the last.
    assert_eq!(started.elapsed(), Duration::from_secs(14));
}

#[tokio::test(start_paused = true)]
async fn failed_status_queries_count_as_attempts() {
    let camera = ScriptedCamera::default().statuses(&[None, None, Some(EnumLiveStreamStatus::Ready)]);
    let policy = PollPolicy {
        attempts: 2,
        interval: Duration::from_secs(1),
    };

    let err = wait_until_livestream_ready(&camera, policy).await.unwrap_err();

    assert!(matches!(err, FlowError::NotReady { attempts: 2 }));
    assert_eq!(camera.count(&Call::Status), 2);
}

#[tokio::test(start_paused = true)]
async fn wifi_failure_skips_streaming_and_closes_session() {
    let camera = ScriptedCamera::with_networks(&["Home5G"]);

    let err = run(&camera, &config(), std::future::pending()).await.unwrap_err();

    assert!(matches!(err, FlowError::SsidNotFound(_)));
    assert!(!camera.calls().iter().any(is_streaming_call));
    assert_eq!(camera.calls().last(), Some(&Call::Close));
}

#[tokio::test(start_paused = true)]
async fn start_failure_closes_without_stopping() {
    let camera = ScriptedCamera {
        start_fails: true,
        ..ScriptedCamera::with_networks(&["CVISS_5G"])
    };

    let err = run(&camera, &config(), std::future::pending()).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Camera(open_gopro::Error::RequestFailed { .. })
    ));
    assert_eq!(camera.count(&Call::StopLivestream), 0);
    assert_eq!(camera.count(&Call::Status), 0);
    assert_eq!(camera.calls().last(), Some(&Call::Close));
}

#[tokio::test(start_paused = true)]
async fn full_session_streams_for_the_configured_duration() {
    let camera = ScriptedCamera::with_networks(&["Home5G", "CVISS_5G"]).statuses(&[
        Some(EnumLiveStreamStatus::Idle),
        Some(EnumLiveStreamStatus::Ready),
    ]);
    let started = Instant::now();

    run(&camera, &config(), std::future::pending()).await.unwrap();

    // 10s settle, one poll interval, 60s of streaming.
    assert_eq!(started.elapsed(), Duration::from_secs(71));

    let calls: Vec<Call> = camera
        .calls()
        .into_iter()
        .filter(|c| *c != Call::KeepAlive)
        .collect();
    assert_eq!(
        calls,
        vec![
            Call::Scan,
            Call::Connect {
                ssid: "CVISS_5G".into(),
                password: "snarasim".into()
            },
            Call::StartLivestream {
                url: "rtmp://192.168.1.132/live/stream1".into()
            },
            Call::Status,
            Call::Status,
            Call::Shutter(true),
            Call::StopLivestream,
            Call::Close,
        ]
    );
    // Keep-alives at 3s, 6s, ... 57s of the 60s stream.
    assert_eq!(camera.count(&Call::KeepAlive), 19);
}

#[tokio::test(start_paused = true)]
async fn readiness_timeout_stops_and_closes() {
    let camera = ScriptedCamera::with_networks(&["CVISS_5G"]);

    let err = run(&camera, &config(), std::future::pending()).await.unwrap_err();

    assert!(matches!(err, FlowError::NotReady { attempts: 15 }));
    assert_eq!(camera.count(&Call::Shutter(true)), 0);
    let calls = camera.calls();
    assert_eq!(&calls[calls.len() - 2..], &[Call::StopLivestream, Call::Close]);
}

#[tokio::test(start_paused = true)]
async fn shutter_failure_is_surfaced() {
    let camera = ScriptedCamera {
        shutter_fails: true,
        ..ScriptedCamera::with_networks(&["CVISS_5G"])
    }
    .statuses(&[Some(EnumLiveStreamStatus::Ready)]);

    let err = run(&camera, &config(), std::future::pending()).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Camera(open_gopro::Error::CommandFailed { command: 0x01, .. })
    ));
    assert_eq!(camera.count(&Call::KeepAlive), 0);
    let calls = camera.calls();
    assert_eq!(&calls[calls.len() - 2..], &[Call::StopLivestream, Call::Close]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_ends_the_stream_early() {
    let camera = ScriptedCamera::with_networks(&["CVISS_5G"])
        .statuses(&[Some(EnumLiveStreamStatus::Ready)]);
    let started = Instant::now();

    let shutdown = tokio::time::sleep(Duration::from_secs(10 + 5));
    run(&camera, &config(), shutdown).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert_eq!(camera.count(&Call::KeepAlive), 1);
    let calls = camera.calls();
    assert_eq!(&calls[calls.len() - 2..], &[Call::StopLivestream, Call::Close]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_settling_skips_the_stream() {
    let camera = ScriptedCamera::with_networks(&["CVISS_5G"])
        .statuses(&[Some(EnumLiveStreamStatus::Ready)]);
    let started = Instant::now();

    let shutdown = tokio::time::sleep(Duration::from_secs(5));
    let err = run(&camera, &config(), shutdown).await.unwrap_err();

    assert!(matches!(err, FlowError::Interrupted));
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert!(!camera.calls().iter().any(is_streaming_call));
    assert_eq!(camera.calls().last(), Some(&Call::Close));
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_polling_stops_the_started_stream() {
    let camera = ScriptedCamera::with_networks(&["CVISS_5G"]);
    let started = Instant::now();

    // 10s settle, then three of the fifteen status queries.
    let shutdown = tokio::time::sleep(Duration::from_millis(12_500));
    let err = run(&camera, &config(), shutdown).await.unwrap_err();

    assert!(matches!(err, FlowError::Interrupted));
    assert_eq!(started.elapsed(), Duration::from_millis(12_500));
    assert_eq!(camera.count(&Call::Status), 3);
    assert_eq!(camera.count(&Call::Shutter(true)), 0);
    assert_eq!(camera.count(&Call::KeepAlive), 0);
    let calls = camera.calls();
    assert_eq!(&calls[calls.len() - 2..], &[Call::StopLivestream, Call::Close]);
}
