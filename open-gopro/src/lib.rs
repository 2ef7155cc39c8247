//! Control GoPro cameras over Bluetooth Low Energy.
//!
//! Implements the Open GoPro BLE protocol: packet framing, TLV commands,
//! protobuf feature commands, access point provisioning and livestreaming.
//! See https://gopro.github.io/OpenGoPro/ble/.

mod access_point;
mod ble;
mod livestream;
pub mod packet;
pub mod proto;

pub use access_point::*;
pub use ble::*;
pub use livestream::*;

use proto::{EnumProvisioning, EnumResultGeneric, EnumScanning};

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Bluetooth(#[from] btleplug::Error),
    #[error(transparent)]
    Packet(#[from] packet::PacketError),
    #[error("failed to decode camera response: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("camera does not expose characteristic {0}")]
    MissingCharacteristic(uuid::Uuid),
    #[error("camera did not answer {0:?} in time")]
    Timeout(ResponseKey),
    #[error("camera sent a truncated response to {0:?}")]
    Malformed(ResponseKey),
    #[error("command {command:#04x} failed with status {status}")]
    CommandFailed { command: u8, status: u8 },
    #[error("request answered by {action:#04x} failed: {result:?}")]
    RequestFailed {
        action: u8,
        result: EnumResultGeneric,
    },
    #[error("access point scan ended in state {0:?}")]
    ScanFailed(EnumScanning),
    #[error("access point provisioning ended in state {0:?}")]
    ProvisioningFailed(EnumProvisioning),
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("no GoPro camera found")]
    CameraNotFound,
    #[error("camera connection closed")]
    Disconnected,
}

#[async_trait::async_trait]
pub trait CameraControl: private::Sealed {
    async fn set_shutter(&mut self, on: bool) -> Result<(), crate::Error>;
}

mod private {
    pub trait Sealed {}

    impl Sealed for crate::BluetoothCamera {}
}
