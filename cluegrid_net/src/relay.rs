// Adapter boundary for the rendezvous service's packet relay.
//
// The relay is the vendor's: it delivers opaque datagrams between peers
// identified by `PeerId` and has its own liveness detection. This layer
// treats it as fire-and-forget — there is no send error a coordinator could
// meaningfully act on (a vanished peer is surfaced via the lobby's leave
// notification, not here), and receipt is a non-blocking poll so the main
// tick can drain the queue without ever blocking.

use cluegrid_protocol::error::ProtocolError;
use cluegrid_protocol::framing::{Frame, encode_frame};
use cluegrid_protocol::message::GameMessage;
use cluegrid_protocol::types::PeerId;

/// Raw point-to-point packet relay. Implemented by the host application over
/// the rendezvous vendor's API; implemented in-memory by the test harness.
pub trait PacketRelay {
    /// Queue a datagram for delivery to `to`. Best-effort.
    fn send(&mut self, to: &PeerId, data: &[u8]);

    /// Receive the next pending datagram, if any. Never blocks.
    fn try_recv(&mut self) -> Option<(PeerId, Vec<u8>)>;
}

/// Serialize a `GameMessage` and send it to one peer on the given channel.
pub fn send_rpc(
    relay: &mut dyn PacketRelay,
    to: &PeerId,
    channel: &str,
    message: &GameMessage,
) -> Result<(), ProtocolError> {
    let json = serde_json::to_vec(message)?;
    let datagram = encode_frame(&Frame::rpc(channel, json))?;
    relay.send(to, &datagram);
    Ok(())
}

/// Serialize once, send to every peer in `to`.
pub fn broadcast_rpc<'a>(
    relay: &mut dyn PacketRelay,
    to: impl IntoIterator<Item = &'a PeerId>,
    channel: &str,
    message: &GameMessage,
) -> Result<(), ProtocolError> {
    let json = serde_json::to_vec(message)?;
    let datagram = encode_frame(&Frame::rpc(channel, json))?;
    for peer in to {
        relay.send(peer, &datagram);
    }
    Ok(())
}
