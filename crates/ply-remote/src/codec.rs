use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, RemoteResult};
use crate::message::{ChunkMessage, DEFAULT_MAX_MESSAGE_SIZE};

/// Bytes before the payload: length, tag, checksum.
pub const HEADER_LEN: usize = 4 + 1 + 4;

/// Remote transfer settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Largest payload accepted or produced, in bytes.
    pub max_message_size: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Frames messages as `[u32 BE length][u8 tag][u32 BE crc32][payload]`.
///
/// `length` counts everything after itself. The checksum covers the payload.
#[derive(Clone, Debug)]
pub struct ChunkCodec {
    max_message_size: usize,
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new(&RemoteConfig::default())
    }
}

impl ChunkCodec {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            max_message_size: config.max_message_size,
        }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn encode(&self, msg: &ChunkMessage) -> RemoteResult<Vec<u8>> {
        let payload =
            bincode::serialize(msg).map_err(|e| RemoteError::Serialization(e.to_string()))?;
        if payload.len() > self.max_message_size {
            return Err(RemoteError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_size,
            });
        }
        let len = u32::try_from(payload.len() + HEADER_LEN - 4).map_err(|_| {
            RemoteError::MessageTooLarge {
                size: payload.len(),
                max: u32::MAX as usize,
            }
        })?;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode one frame from the front of `data`. Returns the message and
    /// the number of bytes consumed.
    pub fn decode(&self, data: &[u8]) -> RemoteResult<(ChunkMessage, usize)> {
        if data.len() < HEADER_LEN {
            return Err(RemoteError::Framing(format!(
                "too short: {} bytes",
                data.len()
            )));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if len < HEADER_LEN - 4 {
            return Err(RemoteError::Framing(format!("frame length {len} too small")));
        }
        let payload_len = len - (HEADER_LEN - 4);
        if payload_len > self.max_message_size {
            return Err(RemoteError::MessageTooLarge {
                size: payload_len,
                max: self.max_message_size,
            });
        }
        let total = 4 + len;
        if data.len() < total {
            return Err(RemoteError::Framing(format!(
                "incomplete: have {}, need {total}",
                data.len()
            )));
        }

        let tag = data[4];
        let expected = u32::from_be_bytes([data[5], data[6], data[7], data[8]]);
        let payload = &data[HEADER_LEN..total];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(RemoteError::ChecksumMismatch { expected, actual });
        }

        let msg: ChunkMessage = bincode::deserialize(payload)
            .map_err(|e| RemoteError::Deserialization(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(RemoteError::TagMismatch {
                header: tag,
                payload: msg.type_tag(),
            });
        }
        Ok((msg, total))
    }
}
