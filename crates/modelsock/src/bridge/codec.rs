//! Length-prefixed frame codec.
//!
//! `[u32 big-endian length][length bytes]`, over any AsyncRead/AsyncWrite.
//! In control mode the prefix is the whole request and no bytes follow it.

use std::io;

use tokio_util::bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::{Flavor, Frame};

const PREFIX_LEN: usize = 4;

/// Upper bound on buffer space reserved ahead of a large payload.
/// The buffer still grows to the full frame as bytes arrive.
const MAX_RESERVE: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload truncated: expected {expected} bytes, got {received}")]
    TruncatedPayload { expected: usize, received: usize },

    #[error("frame of {length} bytes exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How the 4-byte prefix of an inbound frame is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Prefix is a payload length.
    Payload,
    /// Prefix is a control value; the frame has no payload.
    Control,
}

impl From<Flavor> for FrameMode {
    fn from(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Classification => FrameMode::Payload,
            Flavor::Generation => FrameMode::Control,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    Head,
    Data(usize),
}

/// Codec for the length-prefixed wire format.
///
/// Encoding always writes the prefix and the payload into one buffer, so the
/// length can never be observed without its payload behind it.
#[derive(Debug)]
pub struct FrameCodec {
    mode: FrameMode,
    max_length: usize,
    state: DecodeState,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Payload-mode codec with no length cap beyond the u32 prefix.
    pub fn new() -> Self {
        Self::with_mode(FrameMode::Payload)
    }

    pub fn with_mode(mode: FrameMode) -> Self {
        Self {
            mode,
            max_length: u32::MAX as usize,
            state: DecodeState::Head,
        }
    }

    pub fn for_flavor(flavor: Flavor) -> Self {
        Self::with_mode(flavor.into())
    }

    /// Reject inbound payloads longer than `max` bytes.
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = max;
        self
    }

    fn write_prefix(&self, value: usize, dst: &mut BytesMut) -> Result<(), FrameError> {
        let prefix = u32::try_from(value).map_err(|_| FrameError::FrameTooLarge {
            length: value,
            max: u32::MAX as usize,
        })?;
        dst.put_u32(prefix);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let length = match self.state {
            DecodeState::Head => {
                if src.len() < PREFIX_LEN {
                    return Ok(None);
                }
                let prefix = src.get_u32();
                if self.mode == FrameMode::Control {
                    tracing::trace!(value = prefix, "Decoded control frame");
                    return Ok(Some(Frame::Control(prefix)));
                }

                let length = prefix as usize;
                if length > self.max_length {
                    return Err(FrameError::FrameTooLarge {
                        length,
                        max: self.max_length,
                    });
                }
                self.state = DecodeState::Data(length);
                src.reserve(length.saturating_sub(src.len()).min(MAX_RESERVE));
                length
            }
            DecodeState::Data(length) => length,
        };

        if src.len() < length {
            return Ok(None);
        }

        self.state = DecodeState::Head;
        tracing::trace!(payload_bytes = length, "Decoded payload frame");
        Ok(Some(Frame::Payload(src.split_to(length).freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        match self.state {
            DecodeState::Head => {
                // A partial prefix at EOF is an ordinary hang-up.
                if !src.is_empty() {
                    tracing::debug!(prefix_bytes = src.len(), "Peer closed inside length prefix");
                    src.clear();
                }
                Ok(None)
            }
            DecodeState::Data(expected) => {
                let received = src.len();
                src.clear();
                self.state = DecodeState::Head;
                Err(FrameError::TruncatedPayload { expected, received })
            }
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.write_prefix(item.len(), dst)?;
        dst.reserve(item.len());
        dst.extend_from_slice(&item);
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Frame::Payload(bytes) => Encoder::<Bytes>::encode(self, bytes, dst),
            Frame::Control(value) => {
                dst.put_u32(value);
                Ok(())
            }
        }
    }
}
