//! Protobuf payloads exchanged with feature commands.
//!
//! Mirrors the proto2 definitions published at
//! https://gopro.github.io/OpenGoPro/ble/protocol/protobuf.html. Only the
//! messages needed for access point provisioning and livestreaming are
//! declared here.

/// Feature ids, the first byte of every protobuf message.
pub mod feature {
    pub const NETWORK_MANAGEMENT: u8 = 0x02;
    pub const COMMAND: u8 = 0xF1;
    pub const QUERY: u8 = 0xF5;
}

/// Action ids, the second byte of every protobuf message.
pub mod action {
    pub const SCAN_WIFI_NETWORKS: u8 = 0x02;
    pub const SCAN_WIFI_NETWORKS_RSP: u8 = 0x82;
    pub const GET_AP_ENTRIES: u8 = 0x03;
    pub const GET_AP_ENTRIES_RSP: u8 = 0x83;
    pub const REQUEST_WIFI_CONNECT: u8 = 0x04;
    pub const REQUEST_WIFI_CONNECT_RSP: u8 = 0x84;
    pub const REQUEST_WIFI_CONNECT_NEW: u8 = 0x05;
    pub const REQUEST_WIFI_CONNECT_NEW_RSP: u8 = 0x85;
    pub const NOTIF_START_SCAN: u8 = 0x0B;
    pub const NOTIF_PROVIS_STATE: u8 = 0x0C;

    pub const RELEASE_NETWORK: u8 = 0x78;
    pub const RELEASE_NETWORK_RSP: u8 = 0xF8;
    pub const SET_LIVESTREAM_MODE: u8 = 0x79;
    pub const SET_LIVESTREAM_MODE_RSP: u8 = 0xF9;

    pub const GET_LIVESTREAM_STATUS: u8 = 0x74;
    pub const LIVESTREAM_STATUS_RSP: u8 = 0xF4;
    pub const LIVESTREAM_STATUS_NOTIF: u8 = 0xF5;
}

/// Bits of [`ScanEntry::scan_entry_flags`].
pub mod scan_flag {
    pub const AUTHENTICATED: i32 = 0x01;
    pub const CONFIGURED: i32 = 0x02;
    pub const BEST_SSID: i32 = 0x04;
    pub const ASSOCIATED: i32 = 0x08;
    pub const UNSUPPORTED_TYPE: i32 = 0x10;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumResultGeneric {
    Unknown = 0,
    Success = 1,
    IllFormed = 2,
    NotSupported = 3,
    ArgumentOutOfBounds = 4,
    ArgumentInvalid = 5,
    ResourceNotAvailable = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumScanning {
    Unknown = 0,
    NeverStarted = 1,
    Started = 2,
    AbortedBySystem = 3,
    CancelledByUser = 4,
    Success = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumProvisioning {
    Unknown = 0,
    NeverStarted = 1,
    Started = 2,
    AbortedBySystem = 3,
    CancelledByUser = 4,
    SuccessNewAp = 5,
    SuccessOldAp = 6,
    ErrorFailedToAssociate = 7,
    ErrorPasswordAuth = 8,
    ErrorEulaBlocking = 9,
    ErrorNoInternet = 10,
    ErrorUnsupportedType = 11,
}

impl EnumProvisioning {
    pub fn is_success(self) -> bool {
        matches!(self, Self::SuccessNewAp | Self::SuccessOldAp)
    }

    /// Whether the camera will not report any further provisioning progress.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unknown | Self::NeverStarted | Self::Started)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumWindowSize {
    WindowSize480 = 4,
    WindowSize720 = 7,
    WindowSize1080 = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumLens {
    Wide = 0,
    Superview = 3,
    Linear = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumLiveStreamStatus {
    Idle = 0,
    Config = 1,
    Ready = 2,
    Streaming = 3,
    CompleteStayOn = 4,
    FailedStayOn = 5,
    Reconnecting = 6,
    Unavailable = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumLiveStreamError {
    None = 0,
    Network = 1,
    CreateStream = 2,
    OutOfMemory = 3,
    InputStream = 4,
    Internet = 5,
    OsNetwork = 6,
    SelectedNetworkTimeout = 7,
    SslHandshake = 8,
    CameraBlocked = 9,
    Unknown = 10,
    SdCardFull = 40,
    SdCardRemoved = 41,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnumRegisterLiveStreamStatus {
    Status = 1,
    Error = 2,
    Mode = 3,
    Bitrate = 4,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseGeneric {
    #[prost(enumeration = "EnumResultGeneric", required, tag = "1")]
    pub result: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestStartScan {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseStartScanning {
    #[prost(enumeration = "EnumResultGeneric", required, tag = "1")]
    pub result: i32,
    #[prost(enumeration = "EnumScanning", required, tag = "2")]
    pub scanning_state: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NotifStartScanning {
    #[prost(enumeration = "EnumScanning", required, tag = "1")]
    pub scanning_state: i32,
    #[prost(int32, optional, tag = "2")]
    pub scan_id: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub total_entries: Option<i32>,
    #[prost(int32, required, tag = "4")]
    pub total_configured_ssid: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestGetApEntries {
    #[prost(int32, required, tag = "1")]
    pub start_index: i32,
    #[prost(int32, required, tag = "2")]
    pub max_entries: i32,
    #[prost(int32, required, tag = "3")]
    pub scan_id: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ScanEntry {
    #[prost(string, required, tag = "1")]
    pub ssid: String,
    #[prost(int32, required, tag = "2")]
    pub signal_strength_bars: i32,
    #[prost(int32, required, tag = "4")]
    pub signal_frequency_mhz: i32,
    #[prost(int32, required, tag = "5")]
    pub scan_entry_flags: i32,
}

impl ScanEntry {
    /// The camera already holds credentials for this network.
    pub fn is_configured(&self) -> bool {
        self.scan_entry_flags & scan_flag::CONFIGURED != 0
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseGetApEntries {
    #[prost(enumeration = "EnumResultGeneric", required, tag = "1")]
    pub result: i32,
    #[prost(int32, required, tag = "2")]
    pub scan_id: i32,
    #[prost(message, repeated, tag = "3")]
    pub entries: Vec<ScanEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestConnect {
    #[prost(string, required, tag = "1")]
    pub ssid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestConnectNew {
    #[prost(string, required, tag = "1")]
    pub ssid: String,
    #[prost(string, required, tag = "2")]
    pub password: String,
}

/// Response to both [`RequestConnect`] and [`RequestConnectNew`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseConnect {
    #[prost(enumeration = "EnumResultGeneric", required, tag = "1")]
    pub result: i32,
    #[prost(enumeration = "EnumProvisioning", required, tag = "2")]
    pub provisioning_state: i32,
    #[prost(int32, required, tag = "3")]
    pub timeout_seconds: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NotifProvisioningState {
    #[prost(enumeration = "EnumProvisioning", required, tag = "1")]
    pub provisioning_state: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestSetLiveStreamMode {
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    #[prost(bool, optional, tag = "2")]
    pub encode: Option<bool>,
    #[prost(enumeration = "EnumWindowSize", optional, tag = "3")]
    pub window_size: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub cert: Option<Vec<u8>>,
    #[prost(int32, optional, tag = "7")]
    pub minimum_bitrate: Option<i32>,
    #[prost(int32, optional, tag = "8")]
    pub maximum_bitrate: Option<i32>,
    #[prost(int32, optional, tag = "9")]
    pub starting_bitrate: Option<i32>,
    #[prost(enumeration = "EnumLens", optional, tag = "10")]
    pub lens: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestReleaseNetwork {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestGetLiveStreamStatus {
    #[prost(
        enumeration = "EnumRegisterLiveStreamStatus",
        repeated,
        packed = "false",
        tag = "1"
    )]
    pub register_live_stream_status: Vec<i32>,
    #[prost(
        enumeration = "EnumRegisterLiveStreamStatus",
        repeated,
        packed = "false",
        tag = "2"
    )]
    pub unregister_live_stream_status: Vec<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NotifyLiveStreamStatus {
    #[prost(enumeration = "EnumLiveStreamStatus", optional, tag = "1")]
    pub live_stream_status: Option<i32>,
    #[prost(enumeration = "EnumLiveStreamError", optional, tag = "2")]
    pub live_stream_error: Option<i32>,
    #[prost(bool, optional, tag = "3")]
    pub live_stream_encode: Option<bool>,
    #[prost(int32, optional, tag = "4")]
    pub live_stream_bitrate: Option<i32>,
    #[prost(enumeration = "EnumWindowSize", repeated, packed = "false", tag = "5")]
    pub live_stream_window_size_supported: Vec<i32>,
    #[prost(bool, optional, tag = "6")]
    pub live_stream_encode_supported: Option<bool>,
    #[prost(int32, optional, tag = "8")]
    pub live_stream_minimum_stream_bitrate: Option<i32>,
    #[prost(int32, optional, tag = "9")]
    pub live_stream_maximum_stream_bitrate: Option<i32>,
    #[prost(bool, optional, tag = "10")]
    pub live_stream_lens_supported: Option<bool>,
    #[prost(enumeration = "EnumLens", repeated, packed = "false", tag = "11")]
    pub live_stream_lens_supported_list: Vec<i32>,
}
