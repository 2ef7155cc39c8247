use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{
    bleuuid::uuid_from_u16, Central, CharPropFlags, Characteristic, Manager as _,
    Peripheral as _, ScanFilter, ValueNotification, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use uuid::Uuid;

use crate::packet::{self, Accumulator};
use crate::proto::EnumResultGeneric;
use crate::CameraControl;

/// Builds a `GP-XXXX` characteristic UUID.
const fn gopro_uuid(id: u16) -> Uuid {
    Uuid::from_u128(0xb5f9_0000_aa8d_11e3_9046_0002_a5d5_c51b | ((id as u128) << 96))
}

// See https://gopro.github.io/OpenGoPro/ble/protocol/ble_setup.html#ble-characteristics for these.
pub const COMMAND_REQ_CHARACTERISTIC: Uuid = gopro_uuid(0x0072);
pub const COMMAND_RESP_CHARACTERISTIC: Uuid = gopro_uuid(0x0073);
pub const SETTINGS_REQ_CHARACTERISTIC: Uuid = gopro_uuid(0x0074);
pub const SETTINGS_RESP_CHARACTERISTIC: Uuid = gopro_uuid(0x0075);
pub const QUERY_REQ_CHARACTERISTIC: Uuid = gopro_uuid(0x0076);
pub const QUERY_RESP_CHARACTERISTIC: Uuid = gopro_uuid(0x0077);
pub const NETWORK_MANAGEMENT_REQ_CHARACTERISTIC: Uuid = gopro_uuid(0x0091);
pub const NETWORK_MANAGEMENT_RESP_CHARACTERISTIC: Uuid = gopro_uuid(0x0092);

const RESPONSE_CHARACTERISTICS: [Uuid; 4] = [
    COMMAND_RESP_CHARACTERISTIC,
    SETTINGS_RESP_CHARACTERISTIC,
    QUERY_RESP_CHARACTERISTIC,
    NETWORK_MANAGEMENT_RESP_CHARACTERISTIC,
];

const COMMAND_SET_SHUTTER: u8 = 0x01;
const SETTING_KEEP_ALIVE: u8 = 0x5B;
const KEEP_ALIVE_VALUE: u8 = 0x42;
const QUERY_GET_STATUS_VALUES: u8 = 0x13;
const STATUS_SYSTEM_BUSY: u8 = 8;
const STATUS_ENCODING: u8 = 10;

lazy_static::lazy_static! {
    static ref CONTROL_QUERY_SERVICE: Uuid = uuid_from_u16(0xFEA6);

    pub static ref GOPRO_SCANFILTER: ScanFilter = ScanFilter {
        services: Vec::from([*CONTROL_QUERY_SERVICE]),
    };
}

/// Identifies which in-flight request a message from the camera answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKey {
    /// TLV responses, `[id, status, ...]`.
    Command(u8),
    /// Protobuf responses and notifications, `[feature, action, payload...]`.
    Feature { feature: u8, action: u8 },
}

struct Waiter {
    sender: UnboundedSender<Vec<u8>>,
    once: bool,
}

/// Routes complete messages to whoever registered for them.
#[derive(Default)]
struct Router {
    waiters: HashMap<ResponseKey, Waiter>,
}

impl Router {
    fn register(&mut self, key: ResponseKey, once: bool) -> UnboundedReceiver<Vec<u8>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if self.waiters.insert(key, Waiter { sender, once }).is_some() {
            tracing::debug!(?key, "replaced previous waiter");
        }
        receiver
    }

    fn route(&self, message: &[u8]) -> Option<ResponseKey> {
        if let [feature, action, ..] = message {
            let key = ResponseKey::Feature {
                feature: *feature,
                action: *action,
            };
            if self.waiters.contains_key(&key) {
                return Some(key);
            }
        }
        let key = ResponseKey::Command(*message.first()?);
        self.waiters.contains_key(&key).then_some(key)
    }

    /// Returns the message back when nobody was waiting for it.
    fn dispatch(&mut self, message: Vec<u8>) -> Result<(), Vec<u8>> {
        let Some(key) = self.route(&message) else {
            return Err(message);
        };
        let Some(waiter) = self.waiters.get(&key) else {
            return Err(message);
        };

        let once = waiter.once;
        match waiter.sender.send(message) {
            Ok(()) => {
                if once {
                    self.waiters.remove(&key);
                }
                Ok(())
            }
            Err(mpsc::error::SendError(message)) => {
                self.waiters.remove(&key);
                Err(message)
            }
        }
    }
}

/// Tunables for a camera session.
#[derive(Debug, Clone)]
pub struct CameraOptions {
    /// Upper bound for any single request/response exchange.
    pub response_timeout: Duration,
    /// How long the camera may take to finish an access point scan.
    pub scan_timeout: Duration,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(30),
        }
    }
}

/// Returns the first Bluetooth adapter of the host.
pub async fn first_adapter() -> Result<Adapter, crate::Error> {
    let manager = Manager::new().await?;
    manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(crate::Error::NoAdapter)
}

/// Scans for `scan_duration` and returns the first advertising GoPro whose
/// local name contains `name_filter`.
pub async fn find_camera(
    adapter: &Adapter,
    name_filter: &str,
    scan_duration: Duration,
) -> Result<Peripheral, crate::Error> {
    adapter.start_scan(GOPRO_SCANFILTER.clone()).await?;
    tokio::time::sleep(scan_duration).await;

    let mut found = None;
    for peripheral in adapter.peripherals().await? {
        let Some(props) = peripheral.properties().await? else {
            continue;
        };
        let name = props.local_name.unwrap_or_default();
        let advertises_gopro = props.services.contains(&*CONTROL_QUERY_SERVICE);
        tracing::debug!(%name, advertises_gopro, "discovered peripheral");

        if advertises_gopro && name.contains(name_filter) {
            tracing::info!(%name, address = %peripheral.address(), "found camera");
            found = Some(peripheral);
            break;
        }
    }

    adapter.stop_scan().await?;
    found.ok_or(crate::Error::CameraNotFound)
}

pub struct BluetoothCamera {
    remote: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
    router: Arc<tokio::sync::Mutex<Router>>,
    dispatcher: JoinHandle<()>,
    options: CameraOptions,
}

impl BluetoothCamera {
    pub async fn connect(p: Peripheral, options: CameraOptions) -> Result<Self, crate::Error> {
        let opened = !p.is_connected().await?;
        if opened {
            p.connect().await?;
        }
        let (characteristics, mut stream) =
            release_on_error(opened, Self::open_session(&p), p.disconnect()).await?;

        let router = Arc::new(tokio::sync::Mutex::new(Router::default()));

        use tokio_stream::StreamExt;

        let moved_router = router.clone();
        let dispatcher = tokio::task::spawn(async move {
            let mut accumulators: HashMap<Uuid, Accumulator> = HashMap::new();

            while let Some(msg) = stream.next().await {
                if !RESPONSE_CHARACTERISTICS.contains(&msg.uuid) {
                    tracing::debug!(uuid = %msg.uuid, "notification on unknown characteristic");
                    continue;
                }

                let message = match accumulators.entry(msg.uuid).or_default().feed(&msg.value) {
                    Ok(Some(message)) => message,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(uuid = %msg.uuid, error = %e, "dropping malformed packet");
                        continue;
                    }
                };

                tracing::trace!(uuid = %msg.uuid, ?message, "received message");
                if let Err(message) = moved_router.lock().await.dispatch(message) {
                    tracing::debug!(uuid = %msg.uuid, ?message, "unsolicited message");
                }
            }

            tracing::debug!("notification stream ended");
        });

        Ok(Self {
            remote: p,
            characteristics,
            router,
            dispatcher,
            options,
        })
    }

    /// Discovers services, subscribes to every response characteristic and
    /// opens the notification stream.
    async fn open_session(p: &Peripheral) -> Result<(HashMap<Uuid, Characteristic>, NotificationStream), crate::Error> {
        p.discover_services().await?;

        let characteristics: HashMap<Uuid, Characteristic> = p
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c))
            .collect();

        for c in notifying_characteristics(&characteristics)? {
            p.subscribe(c).await?;
        }

        let stream = p.notifications().await?;
        Ok((characteristics, stream))
    }

    pub fn options(&self) -> &CameraOptions {
        &self.options
    }

    /// Registers for exactly one message matching `key`.
    pub(crate) async fn wait_response(&self, key: ResponseKey) -> UnboundedReceiver<Vec<u8>> {
        self.router.lock().await.register(key, true)
    }

    /// Registers for every message matching `key` until the receiver is dropped.
    pub(crate) async fn subscribe(&self, key: ResponseKey) -> UnboundedReceiver<Vec<u8>> {
        self.router.lock().await.register(key, false)
    }

    async fn write_message(&self, characteristic: Uuid, message: &[u8]) -> Result<(), crate::Error> {
        let c = self
            .characteristics
            .get(&characteristic)
            .ok_or(crate::Error::MissingCharacteristic(characteristic))?;

        for packet in packet::fragment(message)? {
            self.remote
                .write(c, &packet, WriteType::WithoutResponse)
                .await?;
        }
        Ok(())
    }

    /// Sends a TLV message whose first byte is its id and returns the
    /// response payload after the status byte.
    async fn tlv_request(&self, characteristic: Uuid, message: &[u8]) -> Result<Vec<u8>, crate::Error> {
        let id = message[0];
        let key = ResponseKey::Command(id);
        let mut resp = self.wait_response(key).await;

        self.write_message(characteristic, message).await?;

        let resp = recv_message(&mut resp, key, self.options.response_timeout).await?;
        match resp.get(1) {
            Some(0) => Ok(resp[2..].to_vec()),
            Some(&status) => Err(crate::Error::CommandFailed {
                command: id,
                status,
            }),
            None => Err(crate::Error::Malformed(key)),
        }
    }

    /// Sends a protobuf request and decodes the matching protobuf response.
    pub(crate) async fn proto_request<Req, Resp>(
        &self,
        characteristic: Uuid,
        feature: u8,
        action: u8,
        response_action: u8,
        request: &Req,
    ) -> Result<Resp, crate::Error>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let key = ResponseKey::Feature {
            feature,
            action: response_action,
        };
        let mut resp = self.wait_response(key).await;

        let mut message = vec![feature, action];
        message.extend(request.encode_to_vec());
        self.write_message(characteristic, &message).await?;

        let resp = recv_message(&mut resp, key, self.options.response_timeout).await?;
        decode_payload(&resp)
    }

    pub async fn set_shutter(&self, on: bool) -> Result<(), crate::Error> {
        tracing::debug!(on, "setting shutter");
        self.tlv_request(
            COMMAND_REQ_CHARACTERISTIC,
            &[COMMAND_SET_SHUTTER, 0x01, if on { 0x01 } else { 0x00 }],
        )
        .await
        .map(drop)
    }

    /// Keeps the camera from powering down while it is idle on BLE.
    pub async fn keep_alive(&self) -> Result<(), crate::Error> {
        self.tlv_request(
            SETTINGS_REQ_CHARACTERISTIC,
            &[SETTING_KEEP_ALIVE, 0x01, KEEP_ALIVE_VALUE],
        )
        .await
        .map(drop)
    }

    /// Whether the camera is neither busy nor encoding.
    pub async fn is_ready(&self) -> Result<bool, crate::Error> {
        let values = self
            .tlv_request(
                QUERY_REQ_CHARACTERISTIC,
                &[QUERY_GET_STATUS_VALUES, STATUS_SYSTEM_BUSY, STATUS_ENCODING],
            )
            .await?;

        let statuses = parse_tlv(&values);
        let idle = |id| {
            statuses
                .iter()
                .find(|(status, _)| *status == id)
                .is_some_and(|(_, value)| value.iter().all(|b| *b == 0))
        };
        Ok(idle(STATUS_SYSTEM_BUSY) && idle(STATUS_ENCODING))
    }

    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), crate::Error> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_ready().await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(crate::Error::Timeout(ResponseKey::Command(
                    QUERY_GET_STATUS_VALUES,
                )));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Stops routing notifications and drops the BLE connection.
    pub async fn close(&self) -> Result<(), crate::Error> {
        self.dispatcher.abort();
        if self.remote.is_connected().await? {
            self.remote.disconnect().await?;
        }
        tracing::info!("camera session closed");
        Ok(())
    }
}

impl Drop for BluetoothCamera {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[async_trait::async_trait]
impl CameraControl for BluetoothCamera {
    async fn set_shutter(&mut self, on: bool) -> Result<(), crate::Error> {
        BluetoothCamera::set_shutter(self, on).await
    }
}

/// Waits up to `timeout` for the next message routed to `receiver`.
pub(crate) async fn recv_message(
    receiver: &mut UnboundedReceiver<Vec<u8>>,
    key: ResponseKey,
    timeout: Duration,
) -> Result<Vec<u8>, crate::Error> {
    match tokio::time::timeout(timeout, receiver.recv()).await {
        Ok(Some(message)) => Ok(message),
        Ok(None) => Err(crate::Error::Disconnected),
        Err(_) => Err(crate::Error::Timeout(key)),
    }
}

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// Awaits `setup`. If it fails on a link that was opened for it, `release`
/// drops the link before the setup error is returned.
async fn release_on_error<T, S, R>(opened: bool, setup: S, release: R) -> Result<T, crate::Error>
where
    S: Future<Output = Result<T, crate::Error>>,
    R: Future<Output = Result<(), btleplug::Error>>,
{
    let err = match setup.await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    if opened {
        tracing::debug!(error = %err, "session setup failed, disconnecting");
        if let Err(e) = release.await {
            tracing::warn!(error = %e, "failed to disconnect after setup error");
        }
    }
    Err(err)
}

/// The response characteristics that push notifications or indications.
/// Every response characteristic must be present.
fn notifying_characteristics(
    characteristics: &HashMap<Uuid, Characteristic>,
) -> Result<Vec<&Characteristic>, crate::Error> {
    let mut notifying = Vec::new();
    for uuid in RESPONSE_CHARACTERISTICS {
        let c = characteristics
            .get(&uuid)
            .ok_or(crate::Error::MissingCharacteristic(uuid))?;
        if c
            .properties
            .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
        {
            notifying.push(c);
        }
    }
    Ok(notifying)
}

/// Decodes the protobuf payload of a `[feature, action, payload...]` message.
pub(crate) fn decode_payload<M: prost::Message + Default>(message: &[u8]) -> Result<M, crate::Error> {
    Ok(M::decode(message.get(2..).unwrap_or_default())?)
}

pub(crate) fn ensure_success(action: u8, result: i32) -> Result<(), crate::Error> {
    match EnumResultGeneric::try_from(result).unwrap_or(EnumResultGeneric::Unknown) {
        EnumResultGeneric::Success => Ok(()),
        result => Err(crate::Error::RequestFailed { action, result }),
    }
}

/// Splits `[id, len, value..., id, len, value...]` into its entries.
/// A trailing entry whose value is cut short is dropped.
fn parse_tlv(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut entries = Vec::new();
    while let [id, len, rest @ ..] = bytes {
        let len = *len as usize;
        if rest.len() < len {
            break;
        }
        entries.push((*id, rest[..len].to_vec()));
        bytes = &rest[len..];
    }
    entries
}
