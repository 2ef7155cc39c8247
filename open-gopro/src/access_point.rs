//! Joining the camera to a Wi-Fi network as a client.
//!
//! See https://gopro.github.io/OpenGoPro/ble/features/access_point.html.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::ble::{decode_payload, ensure_success, recv_message, BluetoothCamera, ResponseKey};
use crate::proto::{
    action, feature, EnumProvisioning, EnumScanning, NotifProvisioningState, NotifStartScanning,
    RequestConnect, RequestConnectNew, RequestGetApEntries, RequestStartScan, ResponseConnect,
    ResponseGetApEntries, ResponseStartScanning, ScanEntry,
};
use crate::NETWORK_MANAGEMENT_REQ_CHARACTERISTIC;

const SCAN_NOTIFICATION: ResponseKey = ResponseKey::Feature {
    feature: feature::NETWORK_MANAGEMENT,
    action: action::NOTIF_START_SCAN,
};

const PROVISIONING_NOTIFICATION: ResponseKey = ResponseKey::Feature {
    feature: feature::NETWORK_MANAGEMENT,
    action: action::NOTIF_PROVIS_STATE,
};

/// Networks visible to the camera in one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub scan_id: i32,
    pub entries: Vec<ScanEntry>,
}

impl ScanResult {
    pub fn find(&self, ssid: &str) -> Option<&ScanEntry> {
        self.entries.iter().find(|entry| entry.ssid == ssid)
    }
}

impl BluetoothCamera {
    /// Asks the camera to scan for access points and returns everything it saw.
    pub async fn scan_wifi_networks(&self) -> Result<ScanResult, crate::Error> {
        let mut notifications = self.subscribe(SCAN_NOTIFICATION).await;

        let resp: ResponseStartScanning = self
            .proto_request(
                NETWORK_MANAGEMENT_REQ_CHARACTERISTIC,
                feature::NETWORK_MANAGEMENT,
                action::SCAN_WIFI_NETWORKS,
                action::SCAN_WIFI_NETWORKS_RSP,
                &RequestStartScan {},
            )
            .await?;
        ensure_success(action::SCAN_WIFI_NETWORKS_RSP, resp.result)?;

        let deadline = Instant::now() + self.options().scan_timeout;
        let done = wait_scan_complete(&mut notifications, deadline).await?;
        drop(notifications);

        let scan_id = done.scan_id.unwrap_or_default();
        let total_entries = done.total_entries.unwrap_or_default();
        tracing::info!(scan_id, total_entries, "access point scan complete");

        let resp: ResponseGetApEntries = self
            .proto_request(
                NETWORK_MANAGEMENT_REQ_CHARACTERISTIC,
                feature::NETWORK_MANAGEMENT,
                action::GET_AP_ENTRIES,
                action::GET_AP_ENTRIES_RSP,
                &RequestGetApEntries {
                    start_index: 0,
                    max_entries: total_entries,
                    scan_id,
                },
            )
            .await?;
        ensure_success(action::GET_AP_ENTRIES_RSP, resp.result)?;

        Ok(ScanResult {
            scan_id: resp.scan_id,
            entries: resp.entries,
        })
    }

    /// Provisions a network the camera has not joined before.
    pub async fn connect_wifi(
        &self,
        ssid: &str,
        password: &str,
    ) -> Result<EnumProvisioning, crate::Error> {
        self.provision(
            action::REQUEST_WIFI_CONNECT_NEW,
            action::REQUEST_WIFI_CONNECT_NEW_RSP,
            &RequestConnectNew {
                ssid: ssid.to_owned(),
                password: password.to_owned(),
            },
        )
        .await
    }

    /// Rejoins a network the camera already holds credentials for.
    pub async fn connect_provisioned_wifi(&self, ssid: &str) -> Result<EnumProvisioning, crate::Error> {
        self.provision(
            action::REQUEST_WIFI_CONNECT,
            action::REQUEST_WIFI_CONNECT_RSP,
            &RequestConnect {
                ssid: ssid.to_owned(),
            },
        )
        .await
    }

    /// Connects to a scanned network, reusing stored credentials when the
    /// camera reports the network as configured.
    pub async fn connect_to_entry(
        &self,
        entry: &ScanEntry,
        password: &str,
    ) -> Result<EnumProvisioning, crate::Error> {
        if entry.is_configured() {
            self.connect_provisioned_wifi(&entry.ssid).await
        } else {
            self.connect_wifi(&entry.ssid, password).await
        }
    }

    async fn provision<Req: prost::Message>(
        &self,
        request_action: u8,
        response_action: u8,
        request: &Req,
    ) -> Result<EnumProvisioning, crate::Error> {
        let mut notifications = self.subscribe(PROVISIONING_NOTIFICATION).await;

        let resp: ResponseConnect = self
            .proto_request(
                NETWORK_MANAGEMENT_REQ_CHARACTERISTIC,
                feature::NETWORK_MANAGEMENT,
                request_action,
                response_action,
                request,
            )
            .await?;
        ensure_success(response_action, resp.result)?;

        let state = provisioning_state(resp.provisioning_state);
        if state.is_terminal() {
            return finish_provisioning(state);
        }

        let timeout = std::time::Duration::from_secs(resp.timeout_seconds.max(0) as u64)
            + self.options().response_timeout;
        let state = wait_provisioned(&mut notifications, Instant::now() + timeout).await?;
        finish_provisioning(state)
    }
}

/// Whether a scan in `state` has finished successfully. Terminal failures are
/// errors; anything else means the camera is still scanning.
fn scan_finished(state: EnumScanning) -> Result<bool, crate::Error> {
    match state {
        EnumScanning::Success => Ok(true),
        EnumScanning::Unknown | EnumScanning::NeverStarted | EnumScanning::Started => Ok(false),
        failed => Err(crate::Error::ScanFailed(failed)),
    }
}

async fn wait_scan_complete(
    notifications: &mut UnboundedReceiver<Vec<u8>>,
    deadline: Instant,
) -> Result<NotifStartScanning, crate::Error> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let message = recv_message(notifications, SCAN_NOTIFICATION, remaining).await?;
        let notif: NotifStartScanning = decode_payload(&message)?;

        let state = EnumScanning::try_from(notif.scanning_state).unwrap_or(EnumScanning::Unknown);
        if scan_finished(state)? {
            return Ok(notif);
        }
        tracing::debug!(?state, "access point scan in progress");
    }
}

async fn wait_provisioned(
    notifications: &mut UnboundedReceiver<Vec<u8>>,
    deadline: Instant,
) -> Result<EnumProvisioning, crate::Error> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let message = recv_message(notifications, PROVISIONING_NOTIFICATION, remaining).await?;
        let notif: NotifProvisioningState = decode_payload(&message)?;
        let state = provisioning_state(notif.provisioning_state);
        tracing::debug!(?state, "provisioning state changed");

        if state.is_terminal() {
            return Ok(state);
        }
    }
}

fn provisioning_state(value: i32) -> EnumProvisioning {
    EnumProvisioning::try_from(value).unwrap_or(EnumProvisioning::Unknown)
}

fn finish_provisioning(state: EnumProvisioning) -> Result<EnumProvisioning, crate::Error> {
    if state.is_success() {
        tracing::info!(?state, "camera joined access point");
        Ok(state)
    } else {
        Err(crate::Error::ProvisioningFailed(state))
    }
}
