// Binary framing for packets on the raw relay.
//
// The relay delivers opaque datagrams; every Cluegrid packet is one frame:
//
//   [ tag: 1 byte ][ channel_len: u16 BE ][ channel: UTF-8 ]
//                  [ payload_len: u16 BE ][ payload ]
//
// Tags distinguish the two handshake frames from RPC traffic so the
// handshake can be filtered *before* any JSON decoding is attempted:
//   0x01 ClientHello — payload is the sender's peer id (UTF-8)
//   0x02 HostWelcome — payload is the session id (UTF-8)
//   0x03 Rpc         — payload is a JSON-encoded `GameMessage`
//
// The logical channel name is carried in every frame. Receivers drop frames
// whose channel does not exactly match their session's channel — the guard
// against stale packets from a previous session on the same transport.
//
// Frames must decode exactly: trailing bytes are a `MalformedFrame`, not
// ignored, because a datagram is a single frame by construction.

use crate::error::ProtocolError;
use crate::types::PeerId;

const TAG_CLIENT_HELLO: u8 = 0x01;
const TAG_HOST_WELCOME: u8 = 0x02;
const TAG_RPC: u8 = 0x03;

/// Maximum payload size (u16 length prefix). RPC payloads are small JSON
/// objects; anything near this limit is malformed traffic.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// A decoded relay packet: the logical channel it was sent on plus its body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub channel: String,
    pub body: FrameBody,
}

/// The three kinds of frame body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameBody {
    /// Handshake: a client announcing itself to the host.
    ClientHello { peer: PeerId },
    /// Handshake: the host validating a client for this session.
    HostWelcome { session_id: String },
    /// Game traffic: JSON bytes of a `GameMessage`, decoded one layer up.
    Rpc(Vec<u8>),
}

impl Frame {
    pub fn client_hello(channel: &str, peer: PeerId) -> Frame {
        Frame {
            channel: channel.to_owned(),
            body: FrameBody::ClientHello { peer },
        }
    }

    pub fn host_welcome(channel: &str, session_id: &str) -> Frame {
        Frame {
            channel: channel.to_owned(),
            body: FrameBody::HostWelcome {
                session_id: session_id.to_owned(),
            },
        }
    }

    pub fn rpc(channel: &str, json: Vec<u8>) -> Frame {
        Frame {
            channel: channel.to_owned(),
            body: FrameBody::Rpc(json),
        }
    }
}

/// Encode a frame into a datagram.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let (tag, payload): (u8, &[u8]) = match &frame.body {
        FrameBody::ClientHello { peer } => (TAG_CLIENT_HELLO, peer.as_str().as_bytes()),
        FrameBody::HostWelcome { session_id } => (TAG_HOST_WELCOME, session_id.as_bytes()),
        FrameBody::Rpc(json) => (TAG_RPC, json.as_slice()),
    };

    let channel = frame.channel.as_bytes();
    if channel.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::MalformedFrame(format!(
            "channel name too long: {} bytes",
            channel.len()
        )));
    }
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::MalformedFrame(format!(
            "payload too large: {} bytes (max {MAX_PAYLOAD_SIZE})",
            payload.len()
        )));
    }

    let mut out = Vec::with_capacity(1 + 2 + channel.len() + 2 + payload.len());
    out.push(tag);
    #[expect(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(channel.len() as u16).to_be_bytes());
    out.extend_from_slice(channel);
    #[expect(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Decode a datagram into a frame. The entire buffer must be consumed.
pub fn decode_frame(data: &[u8]) -> Result<Frame, ProtocolError> {
    let mut cursor = Cursor { data, pos: 0 };

    let tag = cursor.take_byte()?;
    let channel_bytes = cursor.take_len_prefixed()?;
    let channel = str_from(channel_bytes, "channel")?;
    let payload = cursor.take_len_prefixed()?;

    if cursor.pos != data.len() {
        return Err(ProtocolError::MalformedFrame(format!(
            "{} trailing bytes after frame",
            data.len() - cursor.pos
        )));
    }

    let body = match tag {
        TAG_CLIENT_HELLO => FrameBody::ClientHello {
            peer: PeerId(str_from(payload, "hello payload")?.to_owned()),
        },
        TAG_HOST_WELCOME => FrameBody::HostWelcome {
            session_id: str_from(payload, "welcome payload")?.to_owned(),
        },
        TAG_RPC => FrameBody::Rpc(payload.to_vec()),
        other => {
            return Err(ProtocolError::MalformedFrame(format!(
                "unknown frame tag 0x{other:02x}"
            )));
        }
    };

    Ok(Frame {
        channel: channel.to_owned(),
        body,
    })
}

fn str_from<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str, ProtocolError> {
    std::str::from_utf8(bytes)
        .map_err(|_| ProtocolError::MalformedFrame(format!("{what} is not valid UTF-8")))
}

/// Minimal bounds-checked reader over a datagram.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take_byte(&mut self) -> Result<u8, ProtocolError> {
        let b = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| ProtocolError::MalformedFrame("truncated frame".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn take_len_prefixed(&mut self) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos + 2;
        let len_bytes: [u8; 2] = self
            .data
            .get(self.pos..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ProtocolError::MalformedFrame("truncated length prefix".into()))?;
        self.pos = end;
        let len = u16::from_be_bytes(len_bytes) as usize;
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or_else(|| ProtocolError::MalformedFrame("truncated body".into()))?;
        self.pos += len;
        Ok(bytes)
    }
}
