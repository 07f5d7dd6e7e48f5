//! Control-channel framing.
//!
//! Frame format:
//! `[Type u16 BE] [Length u32 BE] [Payload: protobuf, Length bytes]`

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::MumbleError;
use crate::proto::{
    Authenticate, ChannelRemove, ChannelState, Ping, Reject, ServerSync, TextMessage, UserRemove,
    UserState, Version,
};

pub const HEADER_LEN: usize = 6;
pub const MAX_PAYLOAD_LEN: usize = 8 * 1024 * 1024;

/// Packet type ids.
pub mod kind {
    pub const VERSION: u16 = 0;
    pub const UDP_TUNNEL: u16 = 1;
    pub const AUTHENTICATE: u16 = 2;
    pub const PING: u16 = 3;
    pub const REJECT: u16 = 4;
    pub const SERVER_SYNC: u16 = 5;
    pub const CHANNEL_REMOVE: u16 = 6;
    pub const CHANNEL_STATE: u16 = 7;
    pub const USER_REMOVE: u16 = 8;
    pub const USER_STATE: u16 = 9;
    pub const TEXT_MESSAGE: u16 = 11;
}

/// A decoded control-channel packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPacket {
    Version(Version),
    /// Tunnelled voice data; carried opaquely.
    UdpTunnel(Bytes),
    Authenticate(Authenticate),
    Ping(Ping),
    Reject(Reject),
    ServerSync(ServerSync),
    ChannelRemove(ChannelRemove),
    ChannelState(ChannelState),
    UserRemove(UserRemove),
    UserState(UserState),
    TextMessage(TextMessage),
    /// Any packet type this client does not interpret.
    Other { kind: u16, payload: Bytes },
}

impl ControlPacket {
    /// Wire type id.
    pub fn kind(&self) -> u16 {
        match self {
            Self::Version(_) => kind::VERSION,
            Self::UdpTunnel(_) => kind::UDP_TUNNEL,
            Self::Authenticate(_) => kind::AUTHENTICATE,
            Self::Ping(_) => kind::PING,
            Self::Reject(_) => kind::REJECT,
            Self::ServerSync(_) => kind::SERVER_SYNC,
            Self::ChannelRemove(_) => kind::CHANNEL_REMOVE,
            Self::ChannelState(_) => kind::CHANNEL_STATE,
            Self::UserRemove(_) => kind::USER_REMOVE,
            Self::UserState(_) => kind::USER_STATE,
            Self::TextMessage(_) => kind::TEXT_MESSAGE,
            Self::Other { kind, .. } => *kind,
        }
    }

    /// Type name used in logs and errors.
    pub fn name(&self) -> &'static str {
        kind_name(self.kind())
    }

    fn payload_len(&self) -> usize {
        match self {
            Self::Version(m) => m.encoded_len(),
            Self::UdpTunnel(b) => b.len(),
            Self::Authenticate(m) => m.encoded_len(),
            Self::Ping(m) => m.encoded_len(),
            Self::Reject(m) => m.encoded_len(),
            Self::ServerSync(m) => m.encoded_len(),
            Self::ChannelRemove(m) => m.encoded_len(),
            Self::ChannelState(m) => m.encoded_len(),
            Self::UserRemove(m) => m.encoded_len(),
            Self::UserState(m) => m.encoded_len(),
            Self::TextMessage(m) => m.encoded_len(),
            Self::Other { payload, .. } => payload.len(),
        }
    }

    fn encode_payload(&self, dst: &mut BytesMut) -> Result<(), prost::EncodeError> {
        match self {
            Self::Version(m) => m.encode(dst),
            Self::Authenticate(m) => m.encode(dst),
            Self::Ping(m) => m.encode(dst),
            Self::Reject(m) => m.encode(dst),
            Self::ServerSync(m) => m.encode(dst),
            Self::ChannelRemove(m) => m.encode(dst),
            Self::ChannelState(m) => m.encode(dst),
            Self::UserRemove(m) => m.encode(dst),
            Self::UserState(m) => m.encode(dst),
            Self::TextMessage(m) => m.encode(dst),
            Self::UdpTunnel(payload) | Self::Other { payload, .. } => {
                dst.put_slice(payload);
                Ok(())
            }
        }
    }

    fn decode_payload(kind: u16, payload: Bytes) -> Result<Self, MumbleError> {
        let decode_err = |e: prost::DecodeError| MumbleError::Decode {
            kind: kind_name(kind),
            reason: e.to_string(),
        };
        let packet = match kind {
            kind::VERSION => Self::Version(Version::decode(payload).map_err(decode_err)?),
            kind::UDP_TUNNEL => Self::UdpTunnel(payload),
            kind::AUTHENTICATE => {
                Self::Authenticate(Authenticate::decode(payload).map_err(decode_err)?)
            }
            kind::PING => Self::Ping(Ping::decode(payload).map_err(decode_err)?),
            kind::REJECT => Self::Reject(Reject::decode(payload).map_err(decode_err)?),
            kind::SERVER_SYNC => Self::ServerSync(ServerSync::decode(payload).map_err(decode_err)?),
            kind::CHANNEL_REMOVE => {
                Self::ChannelRemove(ChannelRemove::decode(payload).map_err(decode_err)?)
            }
            kind::CHANNEL_STATE => {
                Self::ChannelState(ChannelState::decode(payload).map_err(decode_err)?)
            }
            kind::USER_REMOVE => Self::UserRemove(UserRemove::decode(payload).map_err(decode_err)?),
            kind::USER_STATE => Self::UserState(UserState::decode(payload).map_err(decode_err)?),
            kind::TEXT_MESSAGE => {
                Self::TextMessage(TextMessage::decode(payload).map_err(decode_err)?)
            }
            other => Self::Other {
                kind: other,
                payload,
            },
        };
        Ok(packet)
    }
}

/// Name of a packet type id, as in `Mumble.proto`.
pub fn kind_name(kind: u16) -> &'static str {
    match kind {
        kind::VERSION => "Version",
        kind::UDP_TUNNEL => "UDPTunnel",
        kind::AUTHENTICATE => "Authenticate",
        kind::PING => "Ping",
        kind::REJECT => "Reject",
        kind::SERVER_SYNC => "ServerSync",
        kind::CHANNEL_REMOVE => "ChannelRemove",
        kind::CHANNEL_STATE => "ChannelState",
        kind::USER_REMOVE => "UserRemove",
        kind::USER_STATE => "UserState",
        10 => "BanList",
        kind::TEXT_MESSAGE => "TextMessage",
        12 => "PermissionDenied",
        13 => "ACL",
        14 => "QueryUsers",
        15 => "CryptSetup",
        16 => "ContextActionModify",
        17 => "ContextAction",
        18 => "UserList",
        19 => "VoiceTarget",
        20 => "PermissionQuery",
        21 => "CodecVersion",
        22 => "UserStats",
        23 => "RequestBlob",
        24 => "ServerConfig",
        25 => "SuggestConfig",
        _ => "Unknown",
    }
}

/// Streaming codec for the control channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct MumbleCodec;

impl Decoder for MumbleCodec {
    type Item = ControlPacket;
    type Error = MumbleError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ControlPacket>, MumbleError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let kind = u16::from_be_bytes([src[0], src[1]]);
        let len = u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(MumbleError::FrameTooLarge(len));
        }

        let frame_len = HEADER_LEN + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        ControlPacket::decode_payload(kind, payload).map(Some)
    }
}

impl Encoder<ControlPacket> for MumbleCodec {
    type Error = MumbleError;

    fn encode(&mut self, item: ControlPacket, dst: &mut BytesMut) -> Result<(), MumbleError> {
        let len = item.payload_len();
        if len > MAX_PAYLOAD_LEN {
            return Err(MumbleError::FrameTooLarge(len));
        }
        dst.reserve(HEADER_LEN + len);
        dst.put_u16(item.kind());
        dst.put_u32(len as u32);
        item.encode_payload(dst)
            .map_err(|e| MumbleError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(packet: ControlPacket) -> BytesMut {
        let mut buf = BytesMut::new();
        MumbleCodec.encode(packet, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_header_layout() {
        let buf = encoded(ControlPacket::TextMessage(TextMessage::to_user(3, "hi")));
        assert_eq!(&buf[0..2], &[0, 11]);
        let len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        assert_eq!(len, buf.len() - HEADER_LEN);
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let full = encoded(ControlPacket::ServerSync(ServerSync {
            session: Some(42),
            welcome_text: Some("welcome".into()),
            ..Default::default()
        }));

        let mut partial = BytesMut::from(&full[..4]);
        assert!(MumbleCodec.decode(&mut partial).unwrap().is_none());

        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(MumbleCodec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[full.len() - 1..]);
        match MumbleCodec.decode(&mut partial).unwrap() {
            Some(ControlPacket::ServerSync(sync)) => assert_eq!(sync.session, Some(42)),
            other => panic!("unexpected packet: {other:?}"),
        }
        assert!(partial.is_empty());
    }

    #[test]
    fn test_decode_two_frames_in_one_buffer() {
        let mut buf = encoded(ControlPacket::Ping(Ping {
            timestamp: Some(1),
            ..Default::default()
        }));
        buf.extend_from_slice(&encoded(ControlPacket::UserRemove(UserRemove {
            session: 9,
            ..Default::default()
        })));

        assert!(matches!(
            MumbleCodec.decode(&mut buf).unwrap(),
            Some(ControlPacket::Ping(_))
        ));
        assert!(matches!(
            MumbleCodec.decode(&mut buf).unwrap(),
            Some(ControlPacket::UserRemove(UserRemove { session: 9, .. }))
        ));
        assert!(MumbleCodec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut buf = BytesMut::new();
        buf.put_u16(kind::TEXT_MESSAGE);
        buf.put_u32((MAX_PAYLOAD_LEN + 1) as u32);
        assert!(matches!(
            MumbleCodec.decode(&mut buf),
            Err(MumbleError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_opaque() {
        let mut buf = BytesMut::new();
        buf.put_u16(24);
        buf.put_u32(3);
        buf.put_slice(&[1, 2, 3]);

        match MumbleCodec.decode(&mut buf).unwrap() {
            Some(ControlPacket::Other { kind, payload }) => {
                assert_eq!(kind, 24);
                assert_eq!(&payload[..], &[1, 2, 3]);
                assert_eq!(kind_name(kind), "ServerConfig");
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let mut buf = BytesMut::new();
        buf.put_u16(kind::USER_REMOVE);
        buf.put_u32(2);
        buf.put_slice(&[0xff, 0xff]);

        assert!(matches!(
            MumbleCodec.decode(&mut buf),
            Err(MumbleError::Decode { kind: "UserRemove", .. })
        ));
    }
}
