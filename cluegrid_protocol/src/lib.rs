// cluegrid_protocol — wire protocol and attribute vocabulary for Cluegrid.
//
// This crate defines everything that crosses a peer boundary: the RPC
// message enum and its JSON envelope, the binary packet framing used on the
// raw relay, and the attribute-store key/value vocabulary. It is shared by
// the networking (`cluegrid_net`), lobby (`cluegrid_lobby`), and game
// (`cluegrid_game`) crates and has no dependency on any of them.
//
// Module overview:
// - `types.rs`:      ID newtypes and shared enums — `PeerId`, `CardId`,
//                    `Team`, `IconSlot`, `CardCategory`, `SessionState`,
//                    `GameMode`, `TurnCounter` — with attribute codecs.
// - `message.rs`:    `GameMessage`, the `{type, payload}` JSON RPC envelope.
// - `framing.rs`:    Binary datagram framing — 1-byte tag, length-prefixed
//                    logical channel, payload. Handshake frames are
//                    distinguishable before JSON decoding is attempted.
// - `attributes.rs`: Attribute key constants, per-peer key builders,
//                    snapshot/update containers, session descriptor codec.
// - `error.rs`:      `ProtocolError` — malformed frame/message, channel
//                    mismatch. Nothing in this taxonomy is fatal.
//
// Design decisions:
// - **JSON for RPC payloads.** The envelope shape `{"type", "payload"}` is
//   part of the external interface; serde's adjacent tagging produces it
//   directly.
// - **Binary tag framing under the JSON.** Handshake traffic must be
//   classified and channel-filtered without touching a JSON parser, so the
//   frame header is a fixed binary layout.
// - **Attribute values are strings with explicit codecs.** The rendezvous
//   store only holds strings; every encoding (including "" for `Team::None`)
//   is pinned by tests because remote peers parse them.

pub mod attributes;
pub mod error;
pub mod framing;
pub mod message;
pub mod types;

pub use attributes::{AttributeMap, AttributeSnapshot, AttributeUpdate, SessionDescriptor};
pub use error::ProtocolError;
pub use framing::{Frame, FrameBody, MAX_PAYLOAD_SIZE, decode_frame, encode_frame};
pub use message::{EndReason, GameMessage, Hint};
pub use types::{
    CardCategory, CardId, GameMode, IconSlot, PeerId, SessionState, Team, TurnCounter,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode a GameMessage to JSON, wrap it in an RPC frame, decode the
    /// frame, and deserialize — the full path a packet takes on the wire.
    fn wire_roundtrip(msg: &GameMessage) {
        let json = serde_json::to_vec(msg).unwrap();
        let frame = Frame::rpc("session-wire-test", json);
        let datagram = encode_frame(&frame).unwrap();

        let decoded = decode_frame(&datagram).unwrap();
        assert_eq!(decoded.channel, "session-wire-test");
        let FrameBody::Rpc(payload) = decoded.body else {
            panic!("expected RPC body");
        };
        let recovered: GameMessage = serde_json::from_slice(&payload).unwrap();
        assert_eq!(&recovered, msg);
    }

    #[test]
    fn wire_card_selected() {
        wire_roundtrip(&GameMessage::CardSelected {
            card: CardId(3),
            by: PeerId::from("p-a"),
        });
    }

    #[test]
    fn wire_card_confirm_pressed() {
        wire_roundtrip(&GameMessage::CardConfirmPressed {
            card: CardId(11),
            by: PeerId::from("p-b"),
        });
    }

    #[test]
    fn wire_card_revealed() {
        wire_roundtrip(&GameMessage::CardRevealed {
            card: CardId(11),
            category: CardCategory::TeamB,
            is_assassin: false,
        });
    }

    #[test]
    fn wire_skip_turn_pair() {
        wire_roundtrip(&GameMessage::SkipTurnPressed {
            by: PeerId::from("p-c"),
        });
        wire_roundtrip(&GameMessage::SkipTurn {
            by: PeerId::from("p-c"),
        });
    }

    #[test]
    fn wire_turn_changed() {
        wire_roundtrip(&GameMessage::TurnChanged {
            turn: Team::A,
            turn_counter: TurnCounter(4),
            team_a_remaining: 9,
            team_b_remaining: 8,
        });
    }

    #[test]
    fn wire_hint_given() {
        wire_roundtrip(&GameMessage::HintGiven {
            team: Team::B,
            hint: Hint {
                word: "orchard".into(),
                count: 2,
            },
        });
    }

    #[test]
    fn wire_game_ended() {
        wire_roundtrip(&GameMessage::GameEnded {
            winner: Team::A,
            reason: EndReason::AllCardsFound,
        });
    }

    #[test]
    fn wire_test_ack() {
        wire_roundtrip(&GameMessage::TestAck { nonce: 0xA5A5 });
    }

    #[test]
    fn malformed_rpc_payload_is_a_message_error() {
        let frame = Frame::rpc("c", b"{not json".to_vec());
        let datagram = encode_frame(&frame).unwrap();
        let decoded = decode_frame(&datagram).unwrap();
        let FrameBody::Rpc(payload) = decoded.body else {
            panic!("expected RPC body");
        };
        let result: Result<GameMessage, _> = serde_json::from_slice(&payload);
        assert!(result.is_err());
    }
}
