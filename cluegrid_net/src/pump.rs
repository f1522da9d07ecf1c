// Per-tick receive pump: drain, decode, filter, classify.
//
// The driving loop calls `drain` once per tick. It pulls datagrams from the
// relay until the queue is empty (receipt is non-blocking, so a tick's
// latency is bounded by what has already arrived), decodes each frame, and
// drops anything that fails validation:
// - undecodable frames → logged at warn, dropped, connection stays alive;
// - frames on a foreign logical channel → dropped at debug (stale traffic
//   from a previous session is expected, not an anomaly);
// - RPC payloads that are not valid `GameMessage` JSON → logged, dropped.
//
// Everything that survives comes back as a typed `InboundEvent` for the
// session layer to route (handshake events to the state machines, RPC to
// the lobby/game dispatch).

use cluegrid_protocol::framing::{FrameBody, decode_frame};
use cluegrid_protocol::message::GameMessage;
use cluegrid_protocol::types::PeerId;
use tracing::{debug, warn};

use crate::relay::PacketRelay;

/// A validated inbound packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// A `ClientHello` from `peer` (the frame's payload id; the transport
    /// sender is authoritative and they must agree).
    Hello { from: PeerId },
    /// A `HostWelcome` for `session_id`.
    Welcome { from: PeerId, session_id: String },
    /// A decoded RPC message.
    Rpc { from: PeerId, message: GameMessage },
}

/// Channel-scoped receive pump for one session.
pub struct PacketPump {
    channel: String,
}

impl PacketPump {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_owned(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Drain every pending datagram from the relay. Returns the validated
    /// events in arrival order.
    pub fn drain(&self, relay: &mut dyn PacketRelay) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        while let Some((from, data)) = relay.try_recv() {
            if let Some(event) = self.classify(from, &data) {
                events.push(event);
            }
        }
        events
    }

    fn classify(&self, from: PeerId, data: &[u8]) -> Option<InboundEvent> {
        let frame = match decode_frame(data) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%from, %err, "dropping undecodable packet");
                return None;
            }
        };

        if frame.channel != self.channel {
            debug!(%from, got = %frame.channel, expected = %self.channel,
                   "dropping packet from foreign channel");
            return None;
        }

        match frame.body {
            FrameBody::ClientHello { peer } => {
                if peer != from {
                    // The relay's sender id is the trusted one; a frame
                    // claiming another identity is dropped.
                    warn!(%from, claimed = %peer, "dropping hello with mismatched sender");
                    return None;
                }
                Some(InboundEvent::Hello { from })
            }
            FrameBody::HostWelcome { session_id } => {
                Some(InboundEvent::Welcome { from, session_id })
            }
            FrameBody::Rpc(payload) => match serde_json::from_slice::<GameMessage>(&payload) {
                Ok(message) => Some(InboundEvent::Rpc { from, message }),
                Err(err) => {
                    warn!(%from, %err, "dropping malformed RPC payload");
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use cluegrid_protocol::framing::{Frame, encode_frame};
    use cluegrid_protocol::types::CardId;

    use super::*;
    use crate::relay::send_rpc;

    /// Loopback relay: everything sent is immediately receivable, tagged
    /// with the destination as the sender (good enough for pump tests).
    #[derive(Default)]
    struct LoopbackRelay {
        queue: VecDeque<(PeerId, Vec<u8>)>,
    }

    impl LoopbackRelay {
        fn inject(&mut self, from: &str, data: Vec<u8>) {
            self.queue.push_back((PeerId::from(from), data));
        }
    }

    impl PacketRelay for LoopbackRelay {
        fn send(&mut self, to: &PeerId, data: &[u8]) {
            self.queue.push_back((to.clone(), data.to_vec()));
        }

        fn try_recv(&mut self) -> Option<(PeerId, Vec<u8>)> {
            self.queue.pop_front()
        }
    }

    #[test]
    fn drains_until_empty_in_arrival_order() {
        let mut relay = LoopbackRelay::default();
        let pump = PacketPump::new("chan");

        for nonce in 0..3 {
            send_rpc(
                &mut relay,
                &PeerId::from("p"),
                "chan",
                &GameMessage::TestAck { nonce },
            )
            .unwrap();
        }

        let events = pump.drain(&mut relay);
        assert_eq!(events.len(), 3);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(
                event,
                &InboundEvent::Rpc {
                    from: PeerId::from("p"),
                    message: GameMessage::TestAck { nonce: i as u64 },
                }
            );
        }
        // Queue fully drained.
        assert!(pump.drain(&mut relay).is_empty());
    }

    #[test]
    fn filters_foreign_channel() {
        let mut relay = LoopbackRelay::default();
        let pump = PacketPump::new("current-session");

        send_rpc(
            &mut relay,
            &PeerId::from("p"),
            "previous-session",
            &GameMessage::TestAck { nonce: 1 },
        )
        .unwrap();
        send_rpc(
            &mut relay,
            &PeerId::from("p"),
            "current-session",
            &GameMessage::TestAck { nonce: 2 },
        )
        .unwrap();

        let events = pump.drain(&mut relay);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            InboundEvent::Rpc {
                message: GameMessage::TestAck { nonce: 2 },
                ..
            }
        ));
    }

    #[test]
    fn drops_garbage_and_keeps_draining() {
        let mut relay = LoopbackRelay::default();
        let pump = PacketPump::new("chan");

        relay.inject("p", vec![0xFF, 0x00, 0x01]);
        send_rpc(
            &mut relay,
            &PeerId::from("p"),
            "chan",
            &GameMessage::CardSelected {
                card: CardId(1),
                by: PeerId::from("p"),
            },
        )
        .unwrap();

        let events = pump.drain(&mut relay);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn drops_malformed_rpc_json() {
        let mut relay = LoopbackRelay::default();
        let pump = PacketPump::new("chan");

        let frame = Frame::rpc("chan", b"{\"type\":\"no_such_message\"}".to_vec());
        relay.inject("p", encode_frame(&frame).unwrap());

        assert!(pump.drain(&mut relay).is_empty());
    }

    #[test]
    fn classifies_handshake_frames_without_json() {
        let mut relay = LoopbackRelay::default();
        let pump = PacketPump::new("chan");

        relay.inject(
            "client-1",
            encode_frame(&Frame::client_hello("chan", PeerId::from("client-1"))).unwrap(),
        );
        relay.inject(
            "host-1",
            encode_frame(&Frame::host_welcome("chan", "sess-9")).unwrap(),
        );

        let events = pump.drain(&mut relay);
        assert_eq!(
            events,
            vec![
                InboundEvent::Hello {
                    from: PeerId::from("client-1"),
                },
                InboundEvent::Welcome {
                    from: PeerId::from("host-1"),
                    session_id: "sess-9".into(),
                },
            ]
        );
    }

    #[test]
    fn drops_hello_with_spoofed_sender() {
        let mut relay = LoopbackRelay::default();
        let pump = PacketPump::new("chan");

        relay.inject(
            "actual-sender",
            encode_frame(&Frame::client_hello("chan", PeerId::from("claimed-other"))).unwrap(),
        );
        assert!(pump.drain(&mut relay).is_empty());
    }
}
