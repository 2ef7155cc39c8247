//! Packet framing for the Open GoPro BLE transport.
//!
//! See https://gopro.github.io/OpenGoPro/ble/protocol/data_protocol.html#packetization.
//! A message is sent as a start packet carrying a length header followed by
//! as many continuation packets as needed, each at most [`MAX_PACKET_SIZE`] bytes.

/// Largest packet the camera accepts on any characteristic.
pub const MAX_PACKET_SIZE: usize = 20;

const CONTINUATION: u8 = 0b1000_0000;
const HEADER_TYPE_MASK: u8 = 0b0110_0000;
const HEADER_GENERAL: u8 = 0b0000_0000;
const HEADER_EXT_13: u8 = 0b0010_0000;
const HEADER_EXT_16: u8 = 0b0100_0000;

const MAX_GENERAL_LEN: usize = 0x1F;
const MAX_EXT_13_LEN: usize = 0x1FFF;
const MAX_EXT_16_LEN: usize = 0xFFFF;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("message of {0} bytes does not fit in a 16-bit length header")]
    MessageTooLong(usize),
    #[error("received an empty packet")]
    Empty,
    #[error("received a continuation packet without a start packet")]
    UnexpectedContinuation,
    #[error("start packet uses reserved header type")]
    ReservedHeader,
    #[error("start packet is shorter than its header")]
    TruncatedHeader,
}

/// Splits `message` into BLE packets.
pub fn fragment(message: &[u8]) -> Result<Vec<Vec<u8>>, PacketError> {
    let len = message.len();
    let header = match len {
        0..=MAX_GENERAL_LEN => vec![HEADER_GENERAL | len as u8],
        0..=MAX_EXT_13_LEN => vec![HEADER_EXT_13 | (len >> 8) as u8, len as u8],
        0..=MAX_EXT_16_LEN => vec![HEADER_EXT_16, (len >> 8) as u8, len as u8],
        _ => return Err(PacketError::MessageTooLong(len)),
    };

    let mut packets = Vec::new();
    let first_len = (MAX_PACKET_SIZE - header.len()).min(len);
    let mut first = header;
    first.extend_from_slice(&message[..first_len]);
    packets.push(first);

    for (index, chunk) in message[first_len..]
        .chunks(MAX_PACKET_SIZE - 1)
        .enumerate()
    {
        let mut packet = Vec::with_capacity(chunk.len() + 1);
        packet.push(CONTINUATION | (index as u8 & 0x0F));
        packet.extend_from_slice(chunk);
        packets.push(packet);
    }

    Ok(packets)
}

/// Reassembles packets received on a single characteristic.
#[derive(Debug, Default)]
pub struct Accumulator {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    expected: usize,
    bytes: Vec<u8>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one packet, returning the message once all of it has arrived.
    pub fn feed(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>, PacketError> {
        let (&first, rest) = packet.split_first().ok_or(PacketError::Empty)?;

        if first & CONTINUATION != 0 {
            let pending = self
                .pending
                .as_mut()
                .ok_or(PacketError::UnexpectedContinuation)?;
            pending.bytes.extend_from_slice(rest);
        } else {
            let (expected, payload) = match first & HEADER_TYPE_MASK {
                HEADER_GENERAL => ((first & 0x1F) as usize, rest),
                HEADER_EXT_13 => {
                    let (&low, payload) =
                        rest.split_first().ok_or(PacketError::TruncatedHeader)?;
                    ((((first & 0x1F) as usize) << 8) | low as usize, payload)
                }
                HEADER_EXT_16 => {
                    if rest.len() < 2 {
                        return Err(PacketError::TruncatedHeader);
                    }
                    (((rest[0] as usize) << 8) | rest[1] as usize, &rest[2..])
                }
                _ => return Err(PacketError::ReservedHeader),
            };

            if self.pending.is_some() {
                tracing::warn!("discarding partially received message");
            }
            self.pending = Some(Pending {
                expected,
                bytes: payload.to_vec(),
            });
        }

        match self.pending.take() {
            Some(mut pending) if pending.bytes.len() >= pending.expected => {
                pending.bytes.truncate(pending.expected);
                Ok(Some(pending.bytes))
            }
            other => {
                self.pending = other;
                Ok(None)
            }
        }
    }
}
